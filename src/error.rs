use phcore::placeholder::matcher::MatchError;
use phcore::store::error::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    #[error(transparent)]
    Match(#[from] MatchError),
}
