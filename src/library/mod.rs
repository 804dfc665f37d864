//! Media tree access
//!
//! - Resolving request paths against the served root (traversal checks)
//! - File type classification
//! - Previous/next sibling lookup

pub mod adjacency;
pub mod kind;
pub mod root;

pub use adjacency::{adjacent, Adjacent, Sibling};
pub use kind::FileType;
pub use root::{MediaPath, MediaRoot};
