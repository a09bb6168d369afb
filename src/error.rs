//! Error types for the wiki collaborators
//!
//! The transformation engine itself is total and never returns these.

/// Failures talking to a page store, worklist or log
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("http: {0}")]
    Http(#[from] reqwest::Error),

    /// The MediaWiki API answered with an `error` object
    #[error("api error {code}: {info}")]
    Api { code: String, info: String },

    #[error("login failed: {reason}")]
    Login { reason: String },

    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

/// Why a page save did not happen
#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    /// Bot-exclusion marker, protection or block
    #[error("not permitted to edit {page}: {reason}")]
    NotPermitted { page: String, reason: String },

    #[error("edit conflict on {page}")]
    EditConflict { page: String },

    /// The store accepted the edit but nothing changed
    #[error("no change saved for {page}")]
    NoChange { page: String },

    #[error(transparent)]
    Failed(#[from] Error),
}

impl SaveError {
    /// Whether the runner should move on to the next page without
    /// counting this as a failure.
    pub fn is_skippable(&self) -> bool {
        matches!(
            self,
            SaveError::NotPermitted { .. } | SaveError::EditConflict { .. } | SaveError::NoChange { .. }
        )
    }
}
