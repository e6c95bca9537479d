use tessera_common::datum::Datum;
use tessera_common::error::{RouteError, TesseraResult};

use super::{integer_value, target_with_suffix, Props, StandardShardingAlgorithm};
use crate::value::ValueRange;

/// Maps an integer to a partition index over ascending boundaries:
/// partition 0 is `(-inf, b0)`, partition i is `[b(i-1), b(i))`, and the
/// last is `[b(n-1), +inf)`.
#[derive(Debug, Clone)]
struct Partitions {
    boundaries: Vec<i64>,
}

impl Partitions {
    fn index_of(&self, v: i64) -> i64 {
        self.boundaries.partition_point(|b| *b <= v) as i64
    }

    fn last_index(&self) -> i64 {
        self.boundaries.len() as i64
    }

    fn targets_for_range(
        &self,
        algorithm: &str,
        targets: &[String],
        range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        let (lo, hi) = range.as_i64_bounds().map_err(|_| RouteError::InvalidShardingValue {
            algorithm: algorithm.to_string(),
            value: range.to_string(),
            reason: "range bounds are not integers".into(),
        })?;
        if let (Some(lo), Some(hi)) = (lo, hi) {
            if lo > hi {
                return Ok(Vec::new());
            }
        }
        let first = lo.map(|v| self.index_of(v)).unwrap_or(0);
        let last = hi.map(|v| self.index_of(v)).unwrap_or(self.last_index());
        Ok((first..=last)
            .filter_map(|i| target_with_suffix(targets, i))
            .collect())
    }
}

/// Fixed-volume partitions between `range-lower` and `range-upper`.
#[derive(Debug)]
pub struct VolumeRangeAlgorithm {
    partitions: Partitions,
}

impl VolumeRangeAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let lower = props.i64("range-lower")?;
        let upper = props.i64("range-upper")?;
        let volume = props.positive("sharding-volume")?;
        if upper <= lower {
            return Err(props.error(format!(
                "range-upper ({upper}) must be greater than range-lower ({lower})"
            )));
        }
        let mut boundaries = Vec::new();
        let mut b = lower;
        while b < upper {
            boundaries.push(b);
            b = b.saturating_add(volume);
        }
        boundaries.push(upper);
        Ok(Self {
            partitions: Partitions { boundaries },
        })
    }
}

impl StandardShardingAlgorithm for VolumeRangeAlgorithm {
    fn type_name(&self) -> &'static str {
        "VOLUME_RANGE"
    }

    fn shard_precise(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>> {
        let v = integer_value(self.type_name(), value)?;
        Ok(target_with_suffix(targets, self.partitions.index_of(v)))
    }

    fn shard_range(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        self.partitions
            .targets_for_range(self.type_name(), targets, range)
    }
}

/// Partitions cut at explicit `sharding-ranges` boundaries.
#[derive(Debug)]
pub struct BoundaryRangeAlgorithm {
    partitions: Partitions,
}

impl BoundaryRangeAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let raw = props.str("sharding-ranges")?;
        let mut boundaries = Vec::new();
        for part in raw.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            let b: i64 = part
                .parse()
                .map_err(|_| props.error(format!("boundary '{part}' is not an integer")))?;
            if boundaries.last().is_some_and(|prev| *prev >= b) {
                return Err(props.error("sharding-ranges must be strictly ascending"));
            }
            boundaries.push(b);
        }
        if boundaries.is_empty() {
            return Err(props.error("sharding-ranges is empty"));
        }
        Ok(Self {
            partitions: Partitions { boundaries },
        })
    }
}

impl StandardShardingAlgorithm for BoundaryRangeAlgorithm {
    fn type_name(&self) -> &'static str {
        "BOUNDARY_RANGE"
    }

    fn shard_precise(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>> {
        let v = integer_value(self.type_name(), value)?;
        Ok(target_with_suffix(targets, self.partitions.index_of(v)))
    }

    fn shard_range(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        self.partitions
            .targets_for_range(self.type_name(), targets, range)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{create_algorithm, AlgorithmConfig, ShardingAlgorithm};
    use std::sync::Arc;

    fn standard(cfg: AlgorithmConfig) -> Arc<dyn StandardShardingAlgorithm> {
        match create_algorithm("r", &cfg).unwrap() {
            ShardingAlgorithm::Standard(a) => a,
            other => panic!("unexpected {other:?}"),
        }
    }

    fn targets(n: usize) -> Vec<String> {
        (0..n).map(|i| format!("t_{i}")).collect()
    }

    fn precise(a: &dyn StandardShardingAlgorithm, t: &[String], v: i64) -> Option<String> {
        a.shard_precise(t, "t", "c", &Datum::Int64(v)).unwrap()
    }

    #[test]
    fn test_volume_range_partitions() {
        // (-inf,10) [10,20) [20,30) [30,40) [40,+inf)
        let a = standard(
            AlgorithmConfig::new("VOLUME_RANGE")
                .with_prop("range-lower", 10i64)
                .with_prop("range-upper", 40i64)
                .with_prop("sharding-volume", 10i64),
        );
        let t = targets(5);
        assert_eq!(precise(a.as_ref(), &t, -5), Some("t_0".into()));
        assert_eq!(precise(a.as_ref(), &t, 10), Some("t_1".into()));
        assert_eq!(precise(a.as_ref(), &t, 29), Some("t_2".into()));
        assert_eq!(precise(a.as_ref(), &t, 40), Some("t_4".into()));
        assert_eq!(precise(a.as_ref(), &t, 1000), Some("t_4".into()));

        let r = a
            .shard_range(&t, "t", "c", &ValueRange::closed(Datum::Int64(15), Datum::Int64(25)))
            .unwrap();
        assert_eq!(r, vec!["t_1", "t_2"]);
        let r = a
            .shard_range(&t, "t", "c", &ValueRange::greater_than(Datum::Int64(35)))
            .unwrap();
        assert_eq!(r, vec!["t_3", "t_4"]);
    }

    #[test]
    fn test_boundary_range_partitions() {
        let a = standard(
            AlgorithmConfig::new("BOUNDARY_RANGE").with_prop("sharding-ranges", "1, 5, 10"),
        );
        let t = targets(4);
        assert_eq!(precise(a.as_ref(), &t, 0), Some("t_0".into()));
        assert_eq!(precise(a.as_ref(), &t, 1), Some("t_1".into()));
        assert_eq!(precise(a.as_ref(), &t, 9), Some("t_2".into()));
        assert_eq!(precise(a.as_ref(), &t, 10), Some("t_3".into()));
        let r = a
            .shard_range(&t, "t", "c", &ValueRange::less_than(Datum::Int64(5)))
            .unwrap();
        assert_eq!(r, vec!["t_0", "t_1"]);
    }

    #[test]
    fn test_boundary_range_rejects_unsorted() {
        let cfg = AlgorithmConfig::new("BOUNDARY_RANGE").with_prop("sharding-ranges", "5,1");
        assert!(create_algorithm("r", &cfg).unwrap_err().is_configuration());
    }

    #[test]
    fn test_range_with_text_bounds_is_rejected() {
        let a = standard(
            AlgorithmConfig::new("BOUNDARY_RANGE").with_prop("sharding-ranges", "1,5"),
        );
        let e = a
            .shard_range(
                &targets(3),
                "t",
                "c",
                &ValueRange::at_least(Datum::Text("x".into())),
            )
            .unwrap_err();
        assert!(e.is_unsupported());
    }
}
