//! Sharding values handed to strategies and algorithms.

use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};
use tessera_common::datum::Datum;

/// A `[lower, upper]` range with independently open or closed ends.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ValueRange {
    pub lower: Bound<Datum>,
    pub upper: Bound<Datum>,
}

impl ValueRange {
    pub fn all() -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Unbounded,
        }
    }

    pub fn closed(lower: Datum, upper: Datum) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Included(upper),
        }
    }

    pub fn at_least(lower: Datum) -> Self {
        Self {
            lower: Bound::Included(lower),
            upper: Bound::Unbounded,
        }
    }

    pub fn greater_than(lower: Datum) -> Self {
        Self {
            lower: Bound::Excluded(lower),
            upper: Bound::Unbounded,
        }
    }

    pub fn at_most(upper: Datum) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Included(upper),
        }
    }

    pub fn less_than(upper: Datum) -> Self {
        Self {
            lower: Bound::Unbounded,
            upper: Bound::Excluded(upper),
        }
    }

    pub fn contains(&self, value: &Datum) -> bool {
        let above = match &self.lower {
            Bound::Included(l) => value >= l,
            Bound::Excluded(l) => value > l,
            Bound::Unbounded => true,
        };
        let below = match &self.upper {
            Bound::Included(u) => value <= u,
            Bound::Excluded(u) => value < u,
            Bound::Unbounded => true,
        };
        above && below
    }

    /// Intersection of two ranges; `None` when it is empty.
    pub fn intersect(&self, other: &ValueRange) -> Option<ValueRange> {
        let lower = tighter_lower(&self.lower, &other.lower);
        let upper = tighter_upper(&self.upper, &other.upper);
        let range = ValueRange { lower, upper };
        if range.is_empty() {
            None
        } else {
            Some(range)
        }
    }

    /// True when every bound has the same datum type as `value`.
    pub fn is_comparable_with(&self, value: &Datum) -> bool {
        self.bound_values().all(|b| same_type(b, value))
    }

    fn bound_values(&self) -> impl Iterator<Item = &Datum> {
        [&self.lower, &self.upper]
            .into_iter()
            .filter_map(|b| match b {
                Bound::Included(d) | Bound::Excluded(d) => Some(d),
                Bound::Unbounded => None,
            })
    }

    pub fn is_empty(&self) -> bool {
        match (&self.lower, &self.upper) {
            (Bound::Included(l), Bound::Included(u)) => l > u,
            (Bound::Included(l), Bound::Excluded(u))
            | (Bound::Excluded(l), Bound::Included(u))
            | (Bound::Excluded(l), Bound::Excluded(u)) => l >= u,
            _ => false,
        }
    }

    /// Integer view of the bounds as an inclusive `[lo, hi]`, with `None`
    /// for an unbounded side. Non-integer bounds yield `Err(())`.
    #[allow(clippy::result_unit_err)]
    pub fn as_i64_bounds(&self) -> Result<(Option<i64>, Option<i64>), ()> {
        let lo = match &self.lower {
            Bound::Included(d) => Some(d.as_i64().ok_or(())?),
            Bound::Excluded(d) => Some(d.as_i64().ok_or(())?.saturating_add(1)),
            Bound::Unbounded => None,
        };
        let hi = match &self.upper {
            Bound::Included(d) => Some(d.as_i64().ok_or(())?),
            Bound::Excluded(d) => Some(d.as_i64().ok_or(())?.saturating_sub(1)),
            Bound::Unbounded => None,
        };
        Ok((lo, hi))
    }
}

fn tighter_lower(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.max(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.max(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i > e {
                Bound::Included(i.clone())
            } else {
                Bound::Excluded(e.clone())
            }
        }
    }
}

fn tighter_upper(a: &Bound<Datum>, b: &Bound<Datum>) -> Bound<Datum> {
    match (a, b) {
        (Bound::Unbounded, x) | (x, Bound::Unbounded) => x.clone(),
        (Bound::Included(x), Bound::Included(y)) => Bound::Included(x.min(y).clone()),
        (Bound::Excluded(x), Bound::Excluded(y)) => Bound::Excluded(x.min(y).clone()),
        (Bound::Included(i), Bound::Excluded(e)) | (Bound::Excluded(e), Bound::Included(i)) => {
            if i < e {
                Bound::Included(i.clone())
            } else {
                Bound::Excluded(e.clone())
            }
        }
    }
}

impl fmt::Display for ValueRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.lower {
            Bound::Included(d) => write!(f, "[{d}")?,
            Bound::Excluded(d) => write!(f, "({d}")?,
            Bound::Unbounded => write!(f, "(-inf")?,
        }
        write!(f, ", ")?;
        match &self.upper {
            Bound::Included(d) => write!(f, "{d}]"),
            Bound::Excluded(d) => write!(f, "{d})"),
            Bound::Unbounded => write!(f, "+inf)"),
        }
    }
}

/// Values supplied for one sharding column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShardingValue {
    /// `=` or `IN`: every listed value is a candidate.
    List(Vec<Datum>),
    Range(ValueRange),
}

impl ShardingValue {
    /// Combine two constraints on the same column (conjunction).
    /// `None` means the conjunction can never be true.
    ///
    /// Only values of the same datum type are compared. A value that the
    /// other side cannot refute (`5` against `'5'` or `5.0`) is kept, so a
    /// mixed-type conjunction widens routing instead of emptying it.
    pub fn intersect(&self, other: &ShardingValue) -> Option<ShardingValue> {
        match (self, other) {
            (ShardingValue::List(a), ShardingValue::List(b)) => {
                let mut kept: Vec<Datum> = a
                    .iter()
                    .filter(|v| b.contains(v) || !b.iter().any(|x| same_type(x, v)))
                    .cloned()
                    .collect();
                for v in b {
                    if !kept.contains(v) && !a.iter().any(|x| same_type(x, v)) {
                        kept.push(v.clone());
                    }
                }
                (!kept.is_empty()).then_some(ShardingValue::List(kept))
            }
            (ShardingValue::List(list), ShardingValue::Range(range))
            | (ShardingValue::Range(range), ShardingValue::List(list)) => {
                let kept: Vec<Datum> = list
                    .iter()
                    .filter(|v| !range.is_comparable_with(v) || range.contains(v))
                    .cloned()
                    .collect();
                (!kept.is_empty()).then_some(ShardingValue::List(kept))
            }
            (ShardingValue::Range(a), ShardingValue::Range(b)) => {
                if a.bound_values().all(|x| b.is_comparable_with(x)) {
                    a.intersect(b).map(ShardingValue::Range)
                } else {
                    Some(self.clone())
                }
            }
        }
    }
}

fn same_type(a: &Datum, b: &Datum) -> bool {
    std::mem::discriminant(a) == std::mem::discriminant(b)
}

impl fmt::Display for ShardingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShardingValue::List(values) => {
                write!(f, "[")?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{v}")?;
                }
                write!(f, "]")
            }
            ShardingValue::Range(r) => write!(f, "{r}"),
        }
    }
}

/// One column's values as seen by a strategy.
#[derive(Debug, Clone, Copy)]
pub struct ColumnShardingValue<'a> {
    pub logic_table: &'a str,
    pub column: &'a str,
    pub value: &'a ShardingValue,
}
