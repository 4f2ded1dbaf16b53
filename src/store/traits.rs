use async_trait::async_trait;

pub use phcore::store::traits::*;

/// A message store that hands out transactions.
///
/// Opening a transaction may wait for other writers; everything done inside
/// it is synchronous.
#[async_trait]
pub trait TransactionalStore: Send + Sync {
    async fn write(&self) -> Box<dyn WriteTransaction + Send>;
    async fn read(&self) -> Box<dyn ReadTransaction + Send>;
}
