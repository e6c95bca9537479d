//! Sharding algorithms.
//!
//! An algorithm maps sharding values to a subset of the *available targets*
//! (data source names or actual table names) it is handed. Three families
//! exist, matching the strategy that drives them: standard (one column),
//! complex (several columns), and hint (values supplied out of band).

mod inline;
mod modulo;
mod range;

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tessera_common::datum::Datum;
use tessera_common::error::{ConfigError, RouteError, TesseraError, TesseraResult};

use crate::value::{ColumnShardingValue, ValueRange};

pub use inline::{ComplexInlineAlgorithm, HintInlineAlgorithm, InlineAlgorithm};
pub use modulo::{HashModAlgorithm, ModAlgorithm};
pub use range::{BoundaryRangeAlgorithm, VolumeRangeAlgorithm};

/// Single-column algorithm.
pub trait StandardShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    /// Target for one precise value, or `None` when no available target
    /// matches.
    fn shard_precise(
        &self,
        targets: &[String],
        logic_table: &str,
        column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>>;

    /// Every target a range may touch.
    fn shard_range(
        &self,
        targets: &[String],
        logic_table: &str,
        column: &str,
        range: &ValueRange,
    ) -> TesseraResult<Vec<String>>;
}

/// Multi-column algorithm. Receives only the columns the query supplied.
pub trait ComplexShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn shard(
        &self,
        targets: &[String],
        values: &[ColumnShardingValue<'_>],
    ) -> TesseraResult<Vec<String>>;
}

/// Algorithm driven by hint values instead of SQL predicates.
pub trait HintShardingAlgorithm: Send + Sync + fmt::Debug {
    fn type_name(&self) -> &'static str;

    fn shard(
        &self,
        targets: &[String],
        logic_table: &str,
        values: &[Datum],
    ) -> TesseraResult<Vec<String>>;
}

/// A configured algorithm instance, tagged by family.
#[derive(Debug, Clone)]
pub enum ShardingAlgorithm {
    Standard(Arc<dyn StandardShardingAlgorithm>),
    Complex(Arc<dyn ComplexShardingAlgorithm>),
    Hint(Arc<dyn HintShardingAlgorithm>),
}

impl ShardingAlgorithm {
    pub fn type_name(&self) -> &'static str {
        match self {
            ShardingAlgorithm::Standard(a) => a.type_name(),
            ShardingAlgorithm::Complex(a) => a.type_name(),
            ShardingAlgorithm::Hint(a) => a.type_name(),
        }
    }

    pub fn family(&self) -> &'static str {
        match self {
            ShardingAlgorithm::Standard(_) => "standard",
            ShardingAlgorithm::Complex(_) => "complex",
            ShardingAlgorithm::Hint(_) => "hint",
        }
    }
}

/// Scalar algorithm property as written in the rule document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PropValue {
    Int(i64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for PropValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropValue::Int(v) => write!(f, "{v}"),
            PropValue::Bool(v) => write!(f, "{v}"),
            PropValue::Text(v) => write!(f, "{v}"),
        }
    }
}

/// `type` + `props` of an algorithm or key generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlgorithmConfig {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub props: BTreeMap<String, PropValue>,
}

impl AlgorithmConfig {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            props: BTreeMap::new(),
        }
    }

    pub fn with_prop(mut self, key: &str, value: impl Into<PropValue>) -> Self {
        self.props.insert(key.to_string(), value.into());
        self
    }
}

impl From<i64> for PropValue {
    fn from(v: i64) -> Self {
        PropValue::Int(v)
    }
}

impl From<&str> for PropValue {
    fn from(v: &str) -> Self {
        PropValue::Text(v.to_string())
    }
}

impl From<bool> for PropValue {
    fn from(v: bool) -> Self {
        PropValue::Bool(v)
    }
}

/// Typed access to algorithm props, reporting failures against the
/// algorithm's configured name.
pub(crate) struct Props<'a> {
    name: &'a str,
    props: &'a BTreeMap<String, PropValue>,
}

impl<'a> Props<'a> {
    pub(crate) fn new(name: &'a str, props: &'a BTreeMap<String, PropValue>) -> Self {
        Self { name, props }
    }

    pub(crate) fn error(&self, reason: impl Into<String>) -> TesseraError {
        ConfigError::InvalidAlgorithm {
            name: self.name.to_string(),
            reason: reason.into(),
        }
        .into()
    }

    pub(crate) fn str(&self, key: &str) -> TesseraResult<String> {
        self.props
            .get(key)
            .map(|v| v.to_string())
            .ok_or_else(|| self.error(format!("props '{key}' is required")))
    }

    pub(crate) fn i64(&self, key: &str) -> TesseraResult<i64> {
        match self.props.get(key) {
            Some(PropValue::Int(v)) => Ok(*v),
            Some(PropValue::Text(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.error(format!("props '{key}' must be an integer, got '{s}'"))),
            Some(other) => Err(self.error(format!("props '{key}' must be an integer, got {other}"))),
            None => Err(self.error(format!("props '{key}' is required"))),
        }
    }

    pub(crate) fn i64_or(&self, key: &str, default: i64) -> TesseraResult<i64> {
        if self.props.contains_key(key) {
            self.i64(key)
        } else {
            Ok(default)
        }
    }

    pub(crate) fn positive(&self, key: &str) -> TesseraResult<i64> {
        let v = self.i64(key)?;
        if v <= 0 {
            return Err(self.error(format!("props '{key}' must be positive, got {v}")));
        }
        Ok(v)
    }

    pub(crate) fn bool_or(&self, key: &str, default: bool) -> TesseraResult<bool> {
        match self.props.get(key) {
            None => Ok(default),
            Some(PropValue::Bool(b)) => Ok(*b),
            Some(PropValue::Text(s)) => s
                .trim()
                .parse()
                .map_err(|_| self.error(format!("props '{key}' must be true or false, got '{s}'"))),
            Some(PropValue::Int(v)) => {
                Err(self.error(format!("props '{key}' must be true or false, got {v}")))
            }
        }
    }
}

/// Build the algorithm named `name` from its config. Type names are
/// case-insensitive.
pub fn create_algorithm(name: &str, config: &AlgorithmConfig) -> TesseraResult<ShardingAlgorithm> {
    let props = Props::new(name, &config.props);
    let algorithm = match config.kind.to_ascii_uppercase().as_str() {
        "MOD" => ShardingAlgorithm::Standard(Arc::new(ModAlgorithm::new(&props)?)),
        "HASH_MOD" => ShardingAlgorithm::Standard(Arc::new(HashModAlgorithm::new(&props)?)),
        "INLINE" => ShardingAlgorithm::Standard(Arc::new(InlineAlgorithm::new(&props)?)),
        "VOLUME_RANGE" => ShardingAlgorithm::Standard(Arc::new(VolumeRangeAlgorithm::new(&props)?)),
        "BOUNDARY_RANGE" => {
            ShardingAlgorithm::Standard(Arc::new(BoundaryRangeAlgorithm::new(&props)?))
        }
        "COMPLEX_INLINE" => {
            ShardingAlgorithm::Complex(Arc::new(ComplexInlineAlgorithm::new(&props)?))
        }
        "HINT_INLINE" => ShardingAlgorithm::Hint(Arc::new(HintInlineAlgorithm::new(&props)?)),
        other => return Err(props.error(format!("unknown algorithm type '{other}'"))),
    };
    tracing::debug!(name, kind = algorithm.type_name(), "sharding algorithm created");
    Ok(algorithm)
}

// ── Helpers shared by implementations ────────────────────────────────────────

/// Trailing decimal digits of a target name (`t_order_12` -> 12).
pub(crate) fn numeric_suffix(target: &str) -> Option<i64> {
    let digits = target
        .bytes()
        .rev()
        .take_while(|b| b.is_ascii_digit())
        .count();
    if digits == 0 {
        return None;
    }
    target[target.len() - digits..].parse().ok()
}

/// The available target whose numeric suffix equals `index`.
pub(crate) fn target_with_suffix(targets: &[String], index: i64) -> Option<String> {
    targets
        .iter()
        .find(|t| numeric_suffix(t) == Some(index))
        .cloned()
}

pub(crate) fn integer_value(algorithm: &str, value: &Datum) -> TesseraResult<i64> {
    value.as_i64().ok_or_else(|| {
        RouteError::InvalidShardingValue {
            algorithm: algorithm.to_string(),
            value: value.to_string(),
            reason: "value is not an integer".into(),
        }
        .into()
    })
}
