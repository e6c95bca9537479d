use serde::{Deserialize, Serialize};

/// Inclusive byte range `[start, stop]` into the original SQL text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub stop: usize,
}

impl Span {
    pub fn new(start: usize, stop: usize) -> Self {
        Self { start, stop }
    }

    /// Span of the `nth` (0-based) occurrence of `needle` in `sql`.
    /// Intended for tools and tests that assemble statements by hand.
    pub fn locate(sql: &str, needle: &str, nth: usize) -> Option<Span> {
        if needle.is_empty() {
            return None;
        }
        sql.match_indices(needle)
            .nth(nth)
            .map(|(pos, m)| Span::new(pos, pos + m.len() - 1))
    }

    pub fn len(&self) -> usize {
        self.stop + 1 - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.stop < self.start
    }
}

/// Position-indexed token in the original SQL the rewriter may replace or
/// insert at. Substituting tokens cover a span; inserting tokens name the
/// byte position text is inserted before.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlToken {
    /// Logic table name (possibly `schema.`-qualified in the text; the span
    /// covers only the table identifier).
    Table { span: Span, name: String },
    /// Index name; rewritten to `<name>_<actual table>`. `table` names the
    /// logic table the index belongs to when the statement knows it.
    Index {
        span: Span,
        name: String,
        #[serde(default)]
        table: Option<String>,
    },
    /// The whole VALUES row list of an INSERT; `rows` are the spans of
    /// each parenthesised row, parallel to `InsertClause::rows`.
    InsertValues { span: Span, rows: Vec<Span> },
    /// Insertion point inside the INSERT column list for a generated key
    /// column (typically the position of the closing parenthesis).
    GeneratedKeyColumn { position: usize },
    /// Insertion point for projections the merge stage needs (ORDER BY /
    /// GROUP BY items missing from the select list).
    DerivedProjections { position: usize, items: Vec<String> },
    /// LIMIT row count value.
    RowCount { span: Span },
    /// OFFSET value.
    Offset { span: Span },
}

impl SqlToken {
    pub fn start_index(&self) -> usize {
        match self {
            SqlToken::Table { span, .. }
            | SqlToken::Index { span, .. }
            | SqlToken::InsertValues { span, .. }
            | SqlToken::RowCount { span }
            | SqlToken::Offset { span } => span.start,
            SqlToken::GeneratedKeyColumn { position }
            | SqlToken::DerivedProjections { position, .. } => *position,
        }
    }

    /// First byte after the token. Inserting tokens are zero-width.
    pub fn end_index(&self) -> usize {
        match self {
            SqlToken::Table { span, .. }
            | SqlToken::Index { span, .. }
            | SqlToken::InsertValues { span, .. }
            | SqlToken::RowCount { span }
            | SqlToken::Offset { span } => span.stop + 1,
            SqlToken::GeneratedKeyColumn { position }
            | SqlToken::DerivedProjections { position, .. } => *position,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SqlToken::Table { .. } => "table",
            SqlToken::Index { .. } => "index",
            SqlToken::InsertValues { .. } => "insert_values",
            SqlToken::GeneratedKeyColumn { .. } => "generated_key_column",
            SqlToken::DerivedProjections { .. } => "derived_projections",
            SqlToken::RowCount { .. } => "row_count",
            SqlToken::Offset { .. } => "offset",
        }
    }
}
