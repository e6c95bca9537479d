use tessera_common::datum::Datum;
use tessera_common::error::{RouteError, TesseraError, TesseraResult};

use super::{ComplexShardingAlgorithm, HintShardingAlgorithm, Props, StandardShardingAlgorithm};
use crate::inline::InlineExpression;
use crate::value::{ColumnShardingValue, ShardingValue, ValueRange};

fn eval_error(algorithm: &str, value: impl ToString, reason: String) -> TesseraError {
    RouteError::InvalidShardingValue {
        algorithm: algorithm.to_string(),
        value: value.to_string(),
        reason,
    }
    .into()
}

fn find_target(targets: &[String], name: &str) -> Option<String> {
    targets
        .iter()
        .find(|t| t.eq_ignore_ascii_case(name))
        .cloned()
}

fn parse_expression(props: &Props<'_>) -> TesseraResult<InlineExpression> {
    let text = props.str("algorithm-expression")?;
    InlineExpression::parse(&text).map_err(|e| props.error(e.to_string()))
}

/// `algorithm-expression` evaluated with the sharding column bound to the
/// value, e.g. `t_order_${order_id % 2}`.
#[derive(Debug)]
pub struct InlineAlgorithm {
    expression: InlineExpression,
    allow_range: bool,
}

impl InlineAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let expression = parse_expression(props)?;
        if expression.variables().len() != 1 {
            return Err(props.error(format!(
                "expression '{}' must reference exactly one column",
                expression.source()
            )));
        }
        Ok(Self {
            expression,
            allow_range: props.bool_or("allow-range-query-with-inline-sharding", false)?,
        })
    }
}

impl StandardShardingAlgorithm for InlineAlgorithm {
    fn type_name(&self) -> &'static str {
        "INLINE"
    }

    fn shard_precise(
        &self,
        targets: &[String],
        _logic_table: &str,
        column: &str,
        value: &Datum,
    ) -> TesseraResult<Option<String>> {
        let lookup = |name: &str| name.eq_ignore_ascii_case(column).then(|| value.clone());
        let name = self
            .expression
            .evaluate(&lookup)
            .map_err(|reason| eval_error(self.type_name(), value, reason))?;
        Ok(find_target(targets, &name))
    }

    fn shard_range(
        &self,
        targets: &[String],
        _logic_table: &str,
        _column: &str,
        _range: &ValueRange,
    ) -> TesseraResult<Vec<String>> {
        if self.allow_range {
            Ok(targets.to_vec())
        } else {
            Err(RouteError::UnsupportedRange {
                algorithm: self.type_name().to_string(),
            }
            .into())
        }
    }
}

/// Multi-column inline expression; evaluated over the cartesian product of
/// the supplied per-column value lists.
#[derive(Debug)]
pub struct ComplexInlineAlgorithm {
    columns: Vec<String>,
    expression: InlineExpression,
    allow_range: bool,
}

impl ComplexInlineAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let expression = parse_expression(props)?;
        let columns = match props.str("sharding-columns") {
            Ok(text) => text
                .split(',')
                .map(|c| c.trim().to_string())
                .filter(|c| !c.is_empty())
                .collect(),
            Err(_) => expression.variables(),
        };
        Ok(Self {
            columns,
            expression,
            allow_range: props.bool_or("allow-range-query-with-inline-sharding", false)?,
        })
    }
}

impl ComplexShardingAlgorithm for ComplexInlineAlgorithm {
    fn type_name(&self) -> &'static str {
        "COMPLEX_INLINE"
    }

    fn shard(
        &self,
        targets: &[String],
        values: &[ColumnShardingValue<'_>],
    ) -> TesseraResult<Vec<String>> {
        let mut lists: Vec<(&str, &[Datum])> = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let supplied = values
                .iter()
                .find(|v| v.column.eq_ignore_ascii_case(column));
            match supplied.map(|v| v.value) {
                Some(ShardingValue::List(list)) => lists.push((column.as_str(), list.as_slice())),
                Some(ShardingValue::Range(_)) if !self.allow_range => {
                    return Err(RouteError::UnsupportedRange {
                        algorithm: self.type_name().to_string(),
                    }
                    .into());
                }
                // Unknown or ranged column: the expression cannot narrow.
                _ => return Ok(targets.to_vec()),
            }
        }

        let mut out: Vec<String> = Vec::new();
        let mut combination: Vec<&Datum> = Vec::with_capacity(lists.len());
        self.product(&lists, 0, &mut combination, targets, &mut out)?;
        Ok(out)
    }
}

impl ComplexInlineAlgorithm {
    fn product<'a>(
        &self,
        lists: &[(&str, &'a [Datum])],
        depth: usize,
        combination: &mut Vec<&'a Datum>,
        targets: &[String],
        out: &mut Vec<String>,
    ) -> TesseraResult<()> {
        if depth == lists.len() {
            let lookup = |name: &str| {
                lists
                    .iter()
                    .position(|(c, _)| c.eq_ignore_ascii_case(name))
                    .map(|i| combination[i].clone())
            };
            let name = self.expression.evaluate(&lookup).map_err(|reason| {
                let shown: Vec<String> = combination.iter().map(|d| d.to_string()).collect();
                eval_error(self.type_name(), shown.join(","), reason)
            })?;
            if let Some(t) = find_target(targets, &name) {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
            return Ok(());
        }
        for value in lists[depth].1 {
            combination.push(value);
            self.product(lists, depth + 1, combination, targets, out)?;
            combination.pop();
        }
        Ok(())
    }
}

/// Hint values bound to `value`, e.g. `ds_${value % 2}`. Defaults to
/// `${value}` so the hint names the target directly.
#[derive(Debug)]
pub struct HintInlineAlgorithm {
    expression: InlineExpression,
}

impl HintInlineAlgorithm {
    pub(crate) fn new(props: &Props<'_>) -> TesseraResult<Self> {
        let expression = match props.str("algorithm-expression") {
            Ok(text) => InlineExpression::parse(&text).map_err(|e| props.error(e.to_string()))?,
            Err(_) => InlineExpression::parse("${value}")?,
        };
        Ok(Self { expression })
    }
}

impl HintShardingAlgorithm for HintInlineAlgorithm {
    fn type_name(&self) -> &'static str {
        "HINT_INLINE"
    }

    fn shard(
        &self,
        targets: &[String],
        _logic_table: &str,
        values: &[Datum],
    ) -> TesseraResult<Vec<String>> {
        let mut out: Vec<String> = Vec::new();
        for value in values {
            let lookup = |name: &str| (name == "value").then(|| value.clone());
            let name = self
                .expression
                .evaluate(&lookup)
                .map_err(|reason| eval_error(self.type_name(), value, reason))?;
            if let Some(t) = find_target(targets, &name) {
                if !out.contains(&t) {
                    out.push(t);
                }
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::{create_algorithm, AlgorithmConfig, ShardingAlgorithm};

    fn tables() -> Vec<String> {
        vec!["t_order_0".into(), "t_order_1".into()]
    }

    #[test]
    fn test_inline_precise_and_range() {
        let cfg = AlgorithmConfig::new("INLINE")
            .with_prop("algorithm-expression", "t_order_${order_id % 2}");
        let ShardingAlgorithm::Standard(a) = create_algorithm("t", &cfg).unwrap() else {
            panic!("expected standard");
        };
        assert_eq!(
            a.shard_precise(&tables(), "t_order", "ORDER_ID", &Datum::Int64(5)).unwrap(),
            Some("t_order_1".into())
        );
        let e = a
            .shard_range(&tables(), "t_order", "order_id", &ValueRange::all())
            .unwrap_err();
        assert!(matches!(
            e,
            TesseraError::Route(RouteError::UnsupportedRange { .. })
        ));
    }

    #[test]
    fn test_inline_range_allowed() {
        let cfg = AlgorithmConfig::new("INLINE")
            .with_prop("algorithm-expression", "t_order_${order_id % 2}")
            .with_prop("allow-range-query-with-inline-sharding", true);
        let ShardingAlgorithm::Standard(a) = create_algorithm("t", &cfg).unwrap() else {
            panic!("expected standard");
        };
        let r = a
            .shard_range(&tables(), "t_order", "order_id", &ValueRange::all())
            .unwrap();
        assert_eq!(r, tables());
    }

    #[test]
    fn test_inline_requires_single_column() {
        let cfg = AlgorithmConfig::new("INLINE").with_prop("algorithm-expression", "t_${a}_${b}");
        assert!(create_algorithm("t", &cfg).unwrap_err().is_configuration());
    }

    #[test]
    fn test_complex_inline_cartesian() {
        let cfg = AlgorithmConfig::new("COMPLEX_INLINE")
            .with_prop("sharding-columns", "user_id, order_id")
            .with_prop("algorithm-expression", "t_${user_id % 2}_${order_id % 2}");
        let ShardingAlgorithm::Complex(a) = create_algorithm("c", &cfg).unwrap() else {
            panic!("expected complex");
        };
        let targets: Vec<String> = ["t_0_0", "t_0_1", "t_1_0", "t_1_1"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let users = ShardingValue::List(vec![Datum::Int64(1)]);
        let orders = ShardingValue::List(vec![Datum::Int64(2), Datum::Int64(3)]);
        let values = [
            ColumnShardingValue {
                logic_table: "t",
                column: "user_id",
                value: &users,
            },
            ColumnShardingValue {
                logic_table: "t",
                column: "order_id",
                value: &orders,
            },
        ];
        assert_eq!(a.shard(&targets, &values).unwrap(), vec!["t_1_0", "t_1_1"]);
        // Missing column cannot narrow.
        assert_eq!(a.shard(&targets, &values[..1]).unwrap(), targets);
    }

    #[test]
    fn test_hint_inline_default_expression() {
        let ShardingAlgorithm::Hint(a) =
            create_algorithm("h", &AlgorithmConfig::new("HINT_INLINE")).unwrap()
        else {
            panic!("expected hint");
        };
        let targets = vec!["ds_0".to_string(), "ds_1".to_string()];
        assert_eq!(
            a.shard(&targets, "t", &[Datum::Text("ds_1".into())]).unwrap(),
            vec!["ds_1"]
        );
        let cfg = AlgorithmConfig::new("HINT_INLINE").with_prop("algorithm-expression", "ds_${value % 2}");
        let ShardingAlgorithm::Hint(a) = create_algorithm("h", &cfg).unwrap() else {
            panic!("expected hint");
        };
        assert_eq!(
            a.shard(&targets, "t", &[Datum::Int64(4), Datum::Int64(7)]).unwrap(),
            vec!["ds_0", "ds_1"]
        );
    }
}
