//! living-library/crates/ll-core/src/lib.rs
//!
//! The domain models, error taxonomy, and port definitions for Living Library.

pub mod models;
pub mod traits;
pub mod error;

// Re-exporting for easier access in other crates
pub use models::*;
pub use traits::*;
pub use error::*;
