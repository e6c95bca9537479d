use serde::{Deserialize, Serialize};
use tessera_common::datum::Datum;

/// Column reference as written. `owner` is a table name or alias.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ColumnRef {
    #[serde(default)]
    pub owner: Option<String>,
    pub name: String,
}

impl ColumnRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            owner: None,
            name: name.into(),
        }
    }

    pub fn qualified(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: Some(owner.into()),
            name: name.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    NotEq,
    Lt,
    LtEq,
    Gt,
    GtEq,
}

impl CompareOp {
    /// Mirror the operator so that `lit < col` reads as `col > lit`.
    pub fn flip(self) -> Self {
        match self {
            CompareOp::Eq => CompareOp::Eq,
            CompareOp::NotEq => CompareOp::NotEq,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::LtEq => CompareOp::GtEq,
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::GtEq => CompareOp::LtEq,
        }
    }
}

/// Predicate / value expression after binding.
///
/// Only the shapes that can carry sharding values are modelled; anything
/// else the binder produces arrives as `Other` and is ignored by routing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BoundExpr {
    Column(ColumnRef),
    Literal(Datum),
    /// Parameter marker with its 0-based ordinal in the parameter list.
    Param(usize),
    Compare {
        left: Box<BoundExpr>,
        op: CompareOp,
        right: Box<BoundExpr>,
    },
    InList {
        expr: Box<BoundExpr>,
        list: Vec<BoundExpr>,
        #[serde(default)]
        negated: bool,
    },
    Between {
        expr: Box<BoundExpr>,
        low: Box<BoundExpr>,
        high: Box<BoundExpr>,
        #[serde(default)]
        negated: bool,
    },
    And(Vec<BoundExpr>),
    Or(Vec<BoundExpr>),
    Not(Box<BoundExpr>),
    Other,
}

impl BoundExpr {
    pub fn col(name: &str) -> Self {
        BoundExpr::Column(ColumnRef::new(name))
    }

    pub fn qcol(owner: &str, name: &str) -> Self {
        BoundExpr::Column(ColumnRef::qualified(owner, name))
    }

    pub fn lit(value: impl Into<Datum>) -> Self {
        BoundExpr::Literal(value.into())
    }

    pub fn param(index: usize) -> Self {
        BoundExpr::Param(index)
    }

    pub fn compare(left: BoundExpr, op: CompareOp, right: BoundExpr) -> Self {
        BoundExpr::Compare {
            left: Box::new(left),
            op,
            right: Box::new(right),
        }
    }

    pub fn eq(left: BoundExpr, right: BoundExpr) -> Self {
        Self::compare(left, CompareOp::Eq, right)
    }

    pub fn in_list(expr: BoundExpr, list: Vec<BoundExpr>) -> Self {
        BoundExpr::InList {
            expr: Box::new(expr),
            list,
            negated: false,
        }
    }

    pub fn between(expr: BoundExpr, low: BoundExpr, high: BoundExpr) -> Self {
        BoundExpr::Between {
            expr: Box::new(expr),
            low: Box::new(low),
            high: Box::new(high),
            negated: false,
        }
    }

    /// Whether this node is a bindable value (literal or parameter marker).
    pub fn is_value(&self) -> bool {
        matches!(self, BoundExpr::Literal(_) | BoundExpr::Param(_))
    }

    /// Parameter ordinals referenced anywhere in this expression, in
    /// left-to-right order.
    pub fn param_indexes(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_params(&mut out);
        out
    }

    fn collect_params(&self, out: &mut Vec<usize>) {
        match self {
            BoundExpr::Param(i) => out.push(*i),
            BoundExpr::Compare { left, right, .. } => {
                left.collect_params(out);
                right.collect_params(out);
            }
            BoundExpr::InList { expr, list, .. } => {
                expr.collect_params(out);
                list.iter().for_each(|e| e.collect_params(out));
            }
            BoundExpr::Between {
                expr, low, high, ..
            } => {
                expr.collect_params(out);
                low.collect_params(out);
                high.collect_params(out);
            }
            BoundExpr::And(items) | BoundExpr::Or(items) => {
                items.iter().for_each(|e| e.collect_params(out));
            }
            BoundExpr::Not(inner) => inner.collect_params(out),
            BoundExpr::Column(_) | BoundExpr::Literal(_) | BoundExpr::Other => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_param_indexes_in_order() {
        let e = BoundExpr::And(vec![
            BoundExpr::eq(BoundExpr::col("a"), BoundExpr::param(0)),
            BoundExpr::in_list(
                BoundExpr::col("b"),
                vec![BoundExpr::param(1), BoundExpr::lit(3i64), BoundExpr::param(2)],
            ),
            BoundExpr::between(BoundExpr::col("c"), BoundExpr::param(3), BoundExpr::param(4)),
        ]);
        assert_eq!(e.param_indexes(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_flip() {
        assert_eq!(CompareOp::Lt.flip(), CompareOp::Gt);
        assert_eq!(CompareOp::GtEq.flip(), CompareOp::LtEq);
        assert_eq!(CompareOp::Eq.flip(), CompareOp::Eq);
    }

    #[test]
    fn test_expr_from_json() {
        let e: BoundExpr = serde_json::from_str(
            r#"{"compare":{"left":{"column":{"name":"order_id"}},"op":"eq","right":{"param":0}}}"#,
        )
        .unwrap();
        assert_eq!(e, BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(0)));
    }
}
