//! Partner lookup: term canonicalization, local scan and the autocomplete
//! display state driven by it.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use discuss_store::{RecordId, Store, StoreResult};
use tokio::sync::watch;
use tracing::debug;
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

use crate::error::ClientResult;
use crate::messaging::Messaging;
use crate::models::{PARTNER_TYPE, PERSONA};

/// Case, diacritic and whitespace insensitive form of a search term.
pub fn clean_term(term: &str) -> String {
    let folded: String = term
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase();
    folded.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Partner personas whose cleaned name contains `cleaned`, in insertion order.
pub fn local_partner_matches(store: &Store, cleaned: &str, limit: usize) -> StoreResult<Vec<RecordId>> {
    let registry = store.registry(PERSONA)?;
    Ok(registry
        .iter()
        .filter(|persona| persona.text("type") == Some(PARTNER_TYPE))
        .filter(|persona| {
            persona
                .text("name")
                .is_some_and(|name| clean_term(name).contains(cleaned))
        })
        .map(|persona| persona.id())
        .take(limit)
        .collect())
}

/// What a partner dropdown shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SuggestionState {
    Closed,
    Loading { term: String },
    Ready { term: String, partners: Vec<RecordId> },
}

/// Dropdown state for UI-driven partner searches.
///
/// Every search takes a new generation. A response that arrives after a newer
/// search started (or after `close`) is not displayed, but whatever it merged
/// into the store stays there.
pub struct PartnerAutocomplete {
    messaging: Arc<Messaging>,
    limit: usize,
    generation: AtomicU64,
    display: watch::Sender<SuggestionState>,
}

impl PartnerAutocomplete {
    pub fn new(messaging: Arc<Messaging>) -> Self {
        let limit = messaging.config().search_limit;
        Self::with_limit(messaging, limit)
    }

    pub fn with_limit(messaging: Arc<Messaging>, limit: usize) -> Self {
        let (display, _) = watch::channel(SuggestionState::Closed);
        Self {
            messaging,
            limit,
            generation: AtomicU64::new(0),
            display,
        }
    }

    pub fn state(&self) -> SuggestionState {
        self.display.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SuggestionState> {
        self.display.subscribe()
    }

    /// Show loading, run the local-first search, then display the partners
    /// now known locally. Returns `None` when superseded before completion.
    pub async fn search(&self, term: &str) -> ClientResult<Option<Vec<RecordId>>> {
        let generation = self.begin(SuggestionState::Loading {
            term: term.to_string(),
        });

        let outcome = self.messaging.search_partners(term, self.limit).await;
        let partners = match outcome {
            Ok(local) if !local.is_empty() => local,
            // A miss filled the store from the server; rescan to pick it up.
            Ok(_) => self.messaging.local_partners(term, self.limit)?,
            Err(err) => {
                self.publish(generation, SuggestionState::Closed);
                return Err(err);
            }
        };

        let shown = self.publish(
            generation,
            SuggestionState::Ready {
                term: term.to_string(),
                partners: partners.clone(),
            },
        );
        if !shown {
            debug!(term, generation, "discarding superseded partner results");
        }
        Ok(shown.then_some(partners))
    }

    /// Hide the dropdown; responses still in flight will not reopen it.
    pub fn close(&self) {
        self.begin(SuggestionState::Closed);
    }

    /// Take the next generation and show `state` under the display lock, so no
    /// publish for an older generation can land in between.
    fn begin(&self, state: SuggestionState) -> u64 {
        let mut generation = 0;
        self.display.send_modify(|current| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            *current = state;
        });
        generation
    }

    fn publish(&self, generation: u64, state: SuggestionState) -> bool {
        self.display.send_if_modified(|current| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            *current = state;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, SessionInfo};
    use crate::models::build_store;
    use crate::route::RouteContext;
    use crate::rpc::mock::MockMessagingRpc;

    fn autocomplete() -> PartnerAutocomplete {
        let messaging = Messaging::new(
            build_store().unwrap(),
            Arc::new(MockMessagingRpc::new()),
            &SessionInfo {
                partner_id: 1,
                is_admin: false,
            },
            RouteContext::default(),
            ClientConfig::default(),
        )
        .unwrap();
        PartnerAutocomplete::with_limit(Arc::new(messaging), 5)
    }

    #[test]
    fn older_generation_cannot_overwrite_newer_display() {
        let ac = autocomplete();
        let first = ac.begin(SuggestionState::Loading { term: "a".into() });
        let second = ac.begin(SuggestionState::Loading { term: "ab".into() });
        assert!(second > first);

        let ready = SuggestionState::Ready {
            term: "ab".into(),
            partners: vec![],
        };
        assert!(ac.publish(second, ready.clone()));
        assert!(!ac.publish(first, SuggestionState::Loading { term: "a".into() }));
        assert!(!ac.publish(first, SuggestionState::Closed));
        assert_eq!(ac.state(), ready);
    }

    #[test]
    fn close_supersedes_pending_generation() {
        let ac = autocomplete();
        let pending = ac.begin(SuggestionState::Loading { term: "x".into() });
        ac.close();
        assert!(!ac.publish(
            pending,
            SuggestionState::Ready {
                term: "x".into(),
                partners: vec![],
            }
        ));
        assert_eq!(ac.state(), SuggestionState::Closed);
    }

    #[test]
    fn clean_term_folds_case_accents_and_spaces() {
        assert_eq!(clean_term("  Élodie   DUPONT "), "elodie dupont");
        assert_eq!(clean_term("Søren"), "søren");
        assert_eq!(clean_term("Zoë\tKrav"), "zoe krav");
        assert_eq!(clean_term(""), "");
    }
}
