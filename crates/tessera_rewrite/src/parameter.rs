//! Parameter lists per rewritten statement.

use std::collections::BTreeSet;

use tessera_common::datum::Datum;
use tessera_sql::InsertClause;

use crate::pagination::PaginationRewrite;

/// All parameters in order, with widened pagination values substituted.
pub(crate) fn standard(parameters: &[Datum], pagination: Option<&PaginationRewrite>) -> Vec<Datum> {
    parameters
        .iter()
        .enumerate()
        .map(|(i, p)| {
            pagination
                .and_then(|r| r.override_for(i))
                .unwrap_or(p)
                .clone()
        })
        .collect()
}

/// Parameters of an INSERT unit: markers outside the VALUES rows keep
/// their place, and only the rows in `rows` contribute theirs. A row's
/// generated key, when bound as a marker, follows the row's own values.
pub(crate) fn grouped(
    parameters: &[Datum],
    insert: &InsertClause,
    rows: &[usize],
    generated: Option<&[Datum]>,
) -> Vec<Datum> {
    let row_markers: BTreeSet<usize> = (0..insert.rows.len())
        .flat_map(|r| insert.row_param_indexes(r))
        .collect();
    let first_row_marker = row_markers.first().copied().unwrap_or(parameters.len());

    let mut out = Vec::with_capacity(parameters.len());
    let outside = |i: &usize| !row_markers.contains(i);
    out.extend(
        (0..first_row_marker.min(parameters.len()))
            .filter(outside)
            .filter_map(|i| parameters.get(i).cloned()),
    );
    for &row in rows {
        out.extend(
            insert
                .row_param_indexes(row)
                .into_iter()
                .filter_map(|i| parameters.get(i).cloned()),
        );
        if let Some(key) = generated.and_then(|keys| keys.get(row)) {
            out.push(key.clone());
        }
    }
    out.extend(
        (first_row_marker..parameters.len())
            .filter(outside)
            .filter_map(|i| parameters.get(i).cloned()),
    );
    out
}
