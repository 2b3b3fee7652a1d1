//! `discuss search` command.

use anyhow::Result;
use clap::Args;
use serde_json::json;

use crate::opts::ClientOpts;
use crate::output::print_success;

use super::{connect, records_json};

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Name fragment to look for (case and accent insensitive)
    pub term: String,

    /// Maximum number of partners to collect
    #[arg(long)]
    pub limit: Option<usize>,
}

pub async fn cmd_search(opts: &ClientOpts, args: &SearchArgs) -> Result<()> {
    let messaging = connect(opts).await?;
    let limit = args.limit.unwrap_or(messaging.config().search_limit);

    let local = messaging.search_partners(&args.term, limit).await?;
    let known = messaging.local_partners(&args.term, limit)?;

    let mut warnings = Vec::new();
    if local.is_empty() && !known.is_empty() {
        warnings.push(format!(
            "no local match for '{}'; {} partner(s) fetched from the server",
            args.term,
            known.len()
        ));
    }

    let data = messaging.with_store(|store| {
        json!({
            "term": args.term,
            "limit": limit,
            "local": records_json(store, &local),
            "known": records_json(store, &known),
        })
    });
    print_success(opts, data, None, warnings)
}
