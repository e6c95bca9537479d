//! Pagination widening for reads that fan out to several units.
//!
//! Each unit must return every row the merged page could need, so the
//! offset becomes 0 and the row count becomes offset + row count, or the
//! configured maximum when rows are regrouped after the fetch.

use tessera_common::datum::Datum;
use tessera_common::error::{RewriteError, TesseraError, TesseraResult};
use tessera_sql::{BoundStatement, PaginationValue};

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct PaginationRewrite {
    /// Replacement text for a literal OFFSET.
    pub offset_text: Option<String>,
    /// Replacement text for a literal row count.
    pub row_count_text: Option<String>,
    /// Parameter ordinal to replacement value, for parameterized values.
    pub parameter_overrides: Vec<(usize, Datum)>,
}

impl PaginationRewrite {
    pub(crate) fn override_for(&self, index: usize) -> Option<&Datum> {
        self.parameter_overrides
            .iter()
            .find(|(i, _)| *i == index)
            .map(|(_, v)| v)
    }
}

pub(crate) fn rewrite(
    statement: &BoundStatement,
    parameters: &[Datum],
    max_row_count: i64,
) -> TesseraResult<Option<PaginationRewrite>> {
    let Some(pagination) = statement.pagination() else {
        return Ok(None);
    };
    if pagination.offset.is_none() && pagination.row_count.is_none() {
        return Ok(None);
    }
    let select = statement.select.as_ref();
    let fetch_all = select.is_some_and(|s| s.has_aggregation || s.group_by_differs_from_order_by);

    let offset = match pagination.offset {
        Some(v) => resolve(v, parameters)?,
        None => 0,
    };
    let mut rewrite = PaginationRewrite::default();
    if let Some(v) = pagination.offset {
        apply(&mut rewrite.offset_text, &mut rewrite.parameter_overrides, v, 0);
    }
    if let Some(v) = pagination.row_count {
        let row_count = resolve(v, parameters)?;
        let widened = if fetch_all {
            max_row_count
        } else {
            offset.saturating_add(row_count)
        };
        apply(&mut rewrite.row_count_text, &mut rewrite.parameter_overrides, v, widened);
    }
    Ok(Some(rewrite))
}

fn apply(
    text: &mut Option<String>,
    overrides: &mut Vec<(usize, Datum)>,
    original: PaginationValue,
    value: i64,
) {
    match original {
        PaginationValue::Literal(_) => *text = Some(value.to_string()),
        PaginationValue::Param(i) => overrides.push((i, Datum::Int64(value))),
    }
}

fn resolve(value: PaginationValue, parameters: &[Datum]) -> TesseraResult<i64> {
    match value {
        PaginationValue::Literal(v) => Ok(v.max(0)),
        PaginationValue::Param(i) => {
            let datum = parameters.get(i).ok_or_else(|| {
                TesseraError::internal_bug(
                    "E-REWRITE-002",
                    format!("pagination parameter {i} is out of range"),
                    format!("supplied={}", parameters.len()),
                )
            })?;
            match datum.as_i64() {
                Some(v) if v >= 0 => Ok(v),
                _ => Err(RewriteError::InvalidPaginationValue {
                    index: i,
                    value: datum.to_string(),
                }
                .into()),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_sql::{Pagination, SelectClause, StatementKind};

    fn paged(offset: Option<PaginationValue>, row_count: Option<PaginationValue>) -> BoundStatement {
        BoundStatement::new(StatementKind::Select, "").with_select(SelectClause {
            pagination: Some(Pagination { offset, row_count }),
            ..SelectClause::default()
        })
    }

    #[test]
    fn test_literal_widening() {
        let s = paged(Some(PaginationValue::Literal(5)), Some(PaginationValue::Literal(10)));
        let r = rewrite(&s, &[], i64::MAX).unwrap().unwrap();
        assert_eq!(r.offset_text.as_deref(), Some("0"));
        assert_eq!(r.row_count_text.as_deref(), Some("15"));
        assert!(r.parameter_overrides.is_empty());
    }

    #[test]
    fn test_parameter_widening() {
        let s = paged(Some(PaginationValue::Param(1)), Some(PaginationValue::Param(0)));
        let r = rewrite(&s, &[Datum::Int64(10), Datum::Int64(5)], i64::MAX)
            .unwrap()
            .unwrap();
        assert_eq!(r.override_for(1), Some(&Datum::Int64(0)));
        assert_eq!(r.override_for(0), Some(&Datum::Int64(15)));
        assert_eq!(r.offset_text, None);
    }

    #[test]
    fn test_regrouped_reads_fetch_everything() {
        let mut s = paged(None, Some(PaginationValue::Literal(10)));
        if let Some(select) = s.select.as_mut() {
            select.group_by_differs_from_order_by = true;
        }
        let r = rewrite(&s, &[], 1_000).unwrap().unwrap();
        assert_eq!(r.row_count_text.as_deref(), Some("1000"));
    }

    #[test]
    fn test_bad_parameters() {
        let s = paged(None, Some(PaginationValue::Param(0)));
        assert!(rewrite(&s, &[], i64::MAX).unwrap_err().is_internal_bug());
        let err = rewrite(&s, &[Datum::Text("ten".into())], i64::MAX).unwrap_err();
        assert!(matches!(
            err,
            TesseraError::Rewrite(RewriteError::InvalidPaginationValue { index: 0, .. })
        ));
    }
}
