//! Error taxonomy for the persistence boundary. Content decoding and editor
//! operations never fail; only the store reports errors.

use thiserror::Error;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The song does not exist or is not visible to the caller. Both report
    /// the same way.
    #[error("{0} not found")]
    NotFound(String),

    /// The caller has no identity but the operation requires one.
    #[error("sign-in required to {0}")]
    Unauthorized(String),

    /// Metadata failed validation before reaching the database.
    #[error("{0}")]
    Invalid(String),

    #[error("{context}: {source}")]
    Database {
        context: &'static str,
        #[source]
        source: rusqlite::Error,
    },
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }
}

/// Attach a short description of the failing query to a rusqlite error.
pub(crate) trait StoreContext<T> {
    fn store_context(self, context: &'static str) -> StoreResult<T>;
}

impl<T> StoreContext<T> for Result<T, rusqlite::Error> {
    fn store_context(self, context: &'static str) -> StoreResult<T> {
        self.map_err(|source| StoreError::Database { context, source })
    }
}
