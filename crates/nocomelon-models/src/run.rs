//! Run identifiers.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Storage namespace used when a request carries no user id.
pub const DEFAULT_USER_ID: &str = "test";

/// Length of server-generated run ids.
const GENERATED_RUN_ID_LEN: usize = 8;

/// Maximum length of a caller-supplied user or run id.
pub const MAX_ID_LEN: usize = 128;

/// Identifier of one pipeline run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RunId(pub String);

impl RunId {
    /// Generate a new 8-character hex run id.
    pub fn new() -> Self {
        let hex = Uuid::new_v4().simple().to_string();
        Self(hex[..GENERATED_RUN_ID_LEN].to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for RunId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for RunId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Composite key of a checkpointed run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunKey {
    pub user_id: String,
    pub run_id: RunId,
}

impl RunKey {
    pub fn new(user_id: impl Into<String>, run_id: impl Into<RunId>) -> Self {
        Self {
            user_id: user_id.into(),
            run_id: run_id.into(),
        }
    }
}

impl fmt::Display for RunKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.user_id, self.run_id)
    }
}

/// Validate a user or run id.
///
/// Ids become file names, storage key segments and document ids, so only
/// alphanumeric characters, hyphens and underscores are allowed.
pub fn is_valid_id(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_ID_LEN
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Resolve an optional user id to its storage namespace.
pub fn user_namespace(user_id: Option<&str>) -> &str {
    match user_id {
        Some(id) if !id.is_empty() => id,
        _ => DEFAULT_USER_ID,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_run_id_is_short_hex() {
        let id = RunId::new();
        assert_eq!(id.as_str().len(), 8);
        assert!(id.as_str().chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_generated_run_ids_differ() {
        assert_ne!(RunId::new(), RunId::new());
    }

    #[test]
    fn test_valid_ids() {
        assert!(is_valid_id("abcd1234"));
        assert!(is_valid_id("uid_Xy-9"));
        assert!(is_valid_id(RunId::new().as_str()));

        assert!(!is_valid_id(""));
        assert!(!is_valid_id("../../x"));
        assert!(!is_valid_id("alice/checkpoints"));
        assert!(!is_valid_id("a\\b"));
        assert!(!is_valid_id("run.1"));
        assert!(!is_valid_id(&"a".repeat(MAX_ID_LEN + 1)));
    }

    #[test]
    fn test_user_namespace_defaults() {
        assert_eq!(user_namespace(None), "test");
        assert_eq!(user_namespace(Some("")), "test");
        assert_eq!(user_namespace(Some("alice")), "alice");
    }

    #[test]
    fn test_run_key_display() {
        let key = RunKey::new("alice", "abcd1234");
        assert_eq!(key.to_string(), "alice/abcd1234");
    }
}
