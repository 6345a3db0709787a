//! Error types for shellmate-core
//!
//! Re-exports shellmate-error and adds the constructors the core modules share.

pub use shellmate_error::{Error, ErrorKind, ErrorStatus, Result};

/// Wrap a provider failure, naming the provider and model involved
pub fn provider_failed(
    err: crate::provider::ProviderError,
    provider: &str,
    model: &str,
) -> Error {
    Error::from(err)
        .with_context("provider", provider)
        .with_context("model", model)
}
