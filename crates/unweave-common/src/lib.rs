//! Shared primitives for the unweave rewrite engine.

pub mod error;
pub mod fingerprint;
pub mod span;

pub use error::{ParseError, RewriteError};
pub use fingerprint::Fingerprint;
pub use span::Span;
