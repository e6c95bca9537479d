use tessera_common::datum::Datum;
use tessera_common::error::TesseraResult;
use xxhash_rust::xxh3::xxh3_64;

use super::{integer_value, target_with_suffix, Props, StandardShardingAlgorithm};
use crate::value::ValueRange;

/// `value mod sharding-count`, matched against the target's numeric suffix.
/// Negative values use the euclidean remainder so every value has a home.
#[derive(Debug)]
pub struct ModAlgorithm {
    count: i64,
}

impl ModAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        Ok(Self {
            count: props.positive("sharding-count")?,
        })
    }

    pub fn with_count(count: i64) -> Self {
        Self { count: count.max(1) }
    }
}

impl StandardShardingAlgorithm for ModAlgorithm {
    fn type_name(&self) -> &'static str {
        "MOD"
    }

    fn shard_precise(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>> {
        let v = integer_value(self.type_name(), value)?;
        Ok(target_with_suffix(targets, v.rem_euclid(self.count)))
    }

    fn shard_range(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        // A closed integer range narrower than the modulus touches only the
        // residues it spans; anything wider touches every target.
        if let Ok((Some(lo), Some(hi))) = range.as_i64_bounds() {
            if lo > hi {
                return Ok(Vec::new());
            }
            if hi.saturating_sub(lo) < self.count {
                let mut out = Vec::new();
                for v in lo..=hi {
                    if let Some(t) = target_with_suffix(targets, v.rem_euclid(self.count)) {
                        if !out.contains(&t) {
                            out.push(t);
                        }
                    }
                }
                return Ok(out);
            }
        }
        Ok(targets.to_vec())
    }
}

/// `xxh3(value) mod sharding-count`. Ranges touch every target.
#[derive(Debug)]
pub struct HashModAlgorithm {
    count: i64,
}

impl HashModAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        Ok(Self {
            count: props.positive("sharding-count")?,
        })
    }

    fn index_of(&self, value: &Datum) -> i64 {
        let mut buf = Vec::with_capacity(16);
        value.encode_for_hash(&mut buf);
        (xxh3_64(&buf) % self.count as u64) as i64
    }
}

impl StandardShardingAlgorithm for HashModAlgorithm {
    fn type_name(&self) -> &'static str {
        "HASH_MOD"
    }

    fn shard_precise(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>> {
        Ok(target_with_suffix(targets, self.index_of(value)))
    }

    fn shard_range(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        _range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        Ok(targets.to_vec())
    }
}
