use discuss_store::RecordKey;
use serde_json::Value;

/// Action that opens the discuss app regardless of the menu.
pub const DISCUSS_ACTION: &str = "mail.action_discuss";

/// Navigation state the discuss app compares the server's `menu_id` against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteContext {
    pub menu_id: Option<RecordKey>,
    pub action: Option<String>,
}

impl RouteContext {
    /// Parse a `#menu_id=5&action=...` fragment. Numeric values become
    /// integer keys; unknown parameters are ignored.
    pub fn from_hash(hash: &str) -> Self {
        let mut route = Self::default();
        for pair in hash.trim_start_matches('#').split('&') {
            let Some((name, value)) = pair.split_once('=') else {
                continue;
            };
            match name {
                "menu_id" => {
                    route.menu_id = Some(match value.parse::<i64>() {
                        Ok(id) => RecordKey::Int(id),
                        Err(_) => RecordKey::Text(value.to_string()),
                    });
                }
                "action" => route.action = Some(value.to_string()),
                _ => {}
            }
        }
        route
    }

    /// Exact identifier equality on the menu, or the discuss action in the hash.
    pub fn is_discuss_active(&self, server_menu_id: Option<&Value>) -> bool {
        let menu_matches = match (server_menu_id.and_then(RecordKey::from_value), &self.menu_id) {
            (Some(server), Some(current)) => server == *current,
            _ => false,
        };
        menu_matches || self.action.as_deref() == Some(DISCUSS_ACTION)
    }
}
