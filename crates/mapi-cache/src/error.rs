use thiserror::Error;

pub type CacheResult<T> = Result<T, CacheError>;

/// Failure reported by the backing database, including rows that are present but malformed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("database error: {message}")]
pub struct DatabaseError {
    message: String,
}

impl DatabaseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CacheError {
    /// No cached entry (for lookup-only caches) or no database row.
    #[error("not found")]
    NotFound,
    #[error("invalid parameter: {reason}")]
    InvalidParameter { reason: &'static str },
    #[error(transparent)]
    Database(#[from] DatabaseError),
    /// A deep copy of a caller value could not be allocated.
    #[error("out of memory while copying a value into the cache")]
    OutOfMemory,
}

impl CacheError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CacheError::NotFound)
    }

    pub(crate) fn invalid(reason: &'static str) -> Self {
        CacheError::InvalidParameter { reason }
    }
}

/// Fallible deep copy of a caller-owned slice.
pub(crate) fn try_copy<T: Clone>(src: &[T]) -> CacheResult<Vec<T>> {
    let mut copy = Vec::new();
    copy.try_reserve_exact(src.len())
        .map_err(|_| CacheError::OutOfMemory)?;
    copy.extend_from_slice(src);
    Ok(copy)
}
