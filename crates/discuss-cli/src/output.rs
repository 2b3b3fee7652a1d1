//! Shared output helpers for human and JSON modes.
//!
//! Human mode prints primary data to stdout; meta fields and notices go to
//! stderr as `key: value` lines.
//! JSON mode wraps responses in `{ data, meta?, warnings? }` and respects
//! `--pretty`, `--no-meta`, and `--quiet`.

use std::io::Write;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::opts::ClientOpts;

pub fn print_success(
    opts: &ClientOpts,
    data: Value,
    meta: Option<Value>,
    mut warnings: Vec<String>,
) -> Result<()> {
    if opts.quiet {
        warnings.clear();
    }
    if opts.pretty || opts.json {
        print_json(opts, data, meta, warnings)
    } else {
        print_human(opts, data, meta, warnings)
    }
}

fn print_json(
    opts: &ClientOpts,
    data: Value,
    meta: Option<Value>,
    warnings: Vec<String>,
) -> Result<()> {
    let mut root = Map::new();
    root.insert("data".into(), data);
    if let Some(m) = meta.filter(|_| !opts.no_meta) {
        root.insert("meta".into(), m);
    }
    if !warnings.is_empty() {
        root.insert(
            "warnings".into(),
            warnings.into_iter().map(Value::String).collect(),
        );
    }
    let root = Value::Object(root);
    if opts.pretty {
        println!("{}", serde_json::to_string_pretty(&root)?);
    } else {
        println!("{}", serde_json::to_string(&root)?);
    }
    Ok(())
}

fn print_human(
    opts: &ClientOpts,
    data: Value,
    meta: Option<Value>,
    warnings: Vec<String>,
) -> Result<()> {
    let mut stderr = std::io::stderr();
    if let Some(meta) = meta.filter(|_| !opts.no_meta && !opts.quiet) {
        for (key, value) in meta_lines(&meta) {
            writeln!(stderr, "{key}: {value}")?;
        }
    }
    for w in warnings {
        writeln!(stderr, "notice: {}", w)?;
    }
    match data {
        Value::String(s) => println!("{s}"),
        other => println!("{}", serde_json::to_string_pretty(&other)?),
    }
    Ok(())
}

/// Flat `key: value` pairs for a meta object; strings print unquoted.
fn meta_lines(meta: &Value) -> Vec<(String, String)> {
    let render = |value: &Value| match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match meta {
        Value::Object(fields) => fields
            .iter()
            .map(|(key, value)| (key.clone(), render(value)))
            .collect(),
        other => vec![("meta".to_string(), render(other))],
    }
}
