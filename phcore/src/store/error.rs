use crate::placeholder::PlaceholderError;
use crate::types::RowId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Item not found: {0}")]
    NotFound(String),

    #[error("Row {0} changed type or thread")]
    Conflict(RowId),

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] PlaceholderError),

    #[error("Database operation error: {0}")]
    Database(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_malformed_record_surfaces_as_invalid_record() {
        let err: StoreError = PlaceholderError::MissingRowId.into();
        assert!(matches!(
            err,
            StoreError::InvalidRecord(PlaceholderError::MissingRowId)
        ));
        assert_eq!(
            err.to_string(),
            format!("Invalid record: {}", PlaceholderError::MissingRowId)
        );
    }
}
