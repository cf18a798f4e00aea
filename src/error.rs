use thiserror::Error;

/// Conditions that end a scrape run early. Everything else degrades to
/// "skip and continue" or "stop as if exhausted".
#[derive(Debug, Error)]
pub enum RunError {
    #[error("Failed to load cookies from {path}: {reason}")]
    Credentials { path: String, reason: String },

    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed after retry: {reason}")]
    Navigation { url: String, reason: String },
}
