use tessera_common::error::TesseraResult;

use crate::model::TableMetadata;
use crate::pool::CancelToken;

/// Reads table metadata from one physical data source.
pub trait MetadataSource: Send + Sync {
    fn data_source(&self) -> &str;

    /// `Ok(None)` when the table does not exist. Long fetches should poll
    /// `cancel` between round trips and stop early once it is set.
    fn load_table(
        &self,
        actual_table: &str,
        cancel: &CancelToken,
    ) -> TesseraResult<Option<TableMetadata>>;
}
