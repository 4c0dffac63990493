//! Profile store seam: a document store keyed by collection and user id with
//! point reads and field-wise merge-writes (last write wins per field).

use async_trait::async_trait;

use super::{error::StoreError, profile::ProfilePatch};

#[async_trait]
pub trait ProfileStore: Send + Sync {
    /// Read a document. `Ok(None)` when it does not exist.
    async fn read_document(
        &self,
        collection: &str,
        key: &str,
    ) -> Result<Option<ProfilePatch>, StoreError>;

    /// Merge the set fields of `patch` into the document, creating it when
    /// missing.
    async fn merge_write_document(
        &self,
        collection: &str,
        key: &str,
        patch: &ProfilePatch,
    ) -> Result<(), StoreError>;
}
