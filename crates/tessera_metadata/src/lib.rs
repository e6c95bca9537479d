//! Table metadata loading for a sharded schema.
//!
//! Metadata is fetched from physical data sources on a caller-owned
//! [`WorkerPool`], renamed from actual to logic names, and kept in a
//! [`MetadataCache`] owned by the schema lifecycle.

pub mod cache;
pub mod loader;
pub mod model;
pub mod pool;
pub mod source;

pub use cache::MetadataCache;
pub use loader::MetadataLoader;
pub use model::{ColumnMetadata, IndexMetadata, SchemaMetadata, TableMetadata};
pub use pool::{CancelToken, WorkerPool};
pub use source::MetadataSource;
