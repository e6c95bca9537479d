use std::fmt;

use serde::{Deserialize, Serialize};
use tessera_common::error::{ConfigError, TesseraResult};

/// One physical location a logic table may live in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DataNode {
    pub data_source: String,
    pub table: String,
}

impl DataNode {
    pub fn new(data_source: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            data_source: data_source.into(),
            table: table.into(),
        }
    }

    /// Parse `<data_source>.<table>`. Exactly one dot is accepted.
    pub fn parse(text: &str) -> TesseraResult<Self> {
        let text = text.trim();
        match text.split_once('.') {
            Some((ds, table))
                if !ds.is_empty() && !table.is_empty() && !table.contains('.') =>
            {
                Ok(Self::new(ds, table))
            }
            _ => Err(ConfigError::InvalidDataNode(text.to_string()).into()),
        }
    }
}

impl fmt::Display for DataNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.data_source, self.table)
    }
}
