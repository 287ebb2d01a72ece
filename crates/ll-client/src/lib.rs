//! # ll-client
//!
//! The client side of Living Library: the persisted data store, the story
//! ingestion workflow, and the assistant, all talking to the proxy through
//! [`ProxyClient`].

pub mod assistant;
pub mod ingest;
pub mod proxy;
pub mod store;

mod profile;
mod slots;

pub use assistant::{Assistant, ChatMessage, ChatSession, MessageAuthor};
pub use ingest::{RecoveryReport, PROCESSING_ERROR_PLACEHOLDER, PROCESSING_PLACEHOLDER};
pub use proxy::ProxyClient;
pub use store::LibraryStore;
