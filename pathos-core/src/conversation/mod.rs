//! Conversation sessions
//!
//! Per-session state (message history, latest affect and expression) and the concurrent
//! store that owns it.
//!
//! # Example
//!
//! ```rust,ignore
//! use pathos_core::conversation::SessionStore;
//!
//! let store = SessionStore::new("emotionally neutral", "welcoming");
//! let entry = store.get_or_create(None);
//! let session = store.snapshot(&entry.id).await;
//! ```

mod history;
mod session;
mod store;

pub use history::MessageHistory;
pub(crate) use session::TurnCommit;
pub use session::{Session, SessionMetadata};
pub use store::{SessionEntry, SessionHandle, SessionStore};
