//! # shellmate-error
//!
//! Unified error handling for shellmate.
//!
//! ## Design Philosophy
//!
//! - **ErrorKind**: Know what went wrong (e.g. CredentialsMissing, InferenceFailed)
//! - **ErrorStatus**: Decide how to treat it (Permanent, Temporary, Persistent)
//! - **Error Context**: Key-value pairs that point at the cause
//! - **Error Source**: Underlying errors are wrapped, never leaked raw
//!
//! ## Usage
//!
//! ```rust
//! use shellmate_error::{Error, ErrorKind};
//!
//! fn example() -> Result<(), Error> {
//!     Err(Error::new(ErrorKind::CredentialsMissing, "GEMINI_API_KEY is not set")
//!         .with_operation("config::from_env")
//!         .with_context("variable", "GEMINI_API_KEY"))
//! }
//! ```
//!
//! ## Principles
//!
//! - Library functions return `Result<T, shellmate_error::Error>`
//! - External errors are wrapped with `set_source(err)`
//! - An error is handled once; callers further up only add context

mod error;
mod kind;
mod status;

pub use error::Error;
pub use kind::ErrorKind;
pub use status::ErrorStatus;

/// Result type alias using the shellmate Error
pub type Result<T> = std::result::Result<T, Error>;
