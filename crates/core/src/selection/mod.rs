//! Selection: tokens, the session cache, callback payloads and the flow that
//! narrows a search result down to a single release.
//!
//! Every narrowing step stores its payload under a token derived from the
//! parent token, so button presses can be resolved without any other state.

mod cache;
mod callback;
mod flow;
mod token;

pub use cache::{Payload, SelectionCache, SessionId, SessionStore};
pub use callback::CallbackAction;
pub use flow::{
    detail_caption, FlowOutcome, SelectionFlow, View, BUNDLE_INFO_TEXT, CANCELED_TEXT,
    CATALOG_FAILED_TEXT, DETAILS_FAILED_TEXT, EXPIRED_TEXT, INDEX_FAILED_TEXT, INVALID_TEXT,
    NO_TITLES_TEXT, NO_TORRENTS_TEXT,
};
pub use token::{SelectionToken, TOKEN_LEN};

use thiserror::Error;

/// Errors that can occur while resolving a selection.
#[derive(Debug, Error)]
pub enum SelectionError {
    /// The token is unknown to the session. Shown as "selection expired".
    #[error("Selection expired: {0}")]
    Expired(String),

    /// The token resolves to a different kind of payload than expected.
    #[error("Invalid payload for {token}: expected {expected}, found {found}")]
    InvalidPayload {
        token: String,
        expected: String,
        found: String,
    },

    /// Unknown prefix or malformed button payload.
    #[error("Invalid callback data: {0}")]
    InvalidCallback(String),
}
