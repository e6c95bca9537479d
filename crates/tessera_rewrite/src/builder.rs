use tessera_common::error::{TesseraError, TesseraResult};
use tessera_sql::SqlToken;

/// Splices rendered tokens into the original SQL text.
pub(crate) struct SqlBuilder<'a> {
    sql: &'a str,
    tokens: Vec<&'a SqlToken>,
}

impl<'a> SqlBuilder<'a> {
    /// Zero-width tokens sort before a substitution starting at the same
    /// byte.
    pub(crate) fn new(sql: &'a str, tokens: &'a [SqlToken]) -> Self {
        let mut tokens: Vec<&SqlToken> = tokens.iter().collect();
        tokens.sort_by_key(|t| (t.start_index(), t.end_index()));
        Self { sql, tokens }
    }

    /// `render` receives each token with the original text it covers.
    pub(crate) fn build<F>(&self, mut render: F) -> TesseraResult<String>
    where
        F: FnMut(&SqlToken, &str) -> TesseraResult<String>,
    {
        let mut out = String::with_capacity(self.sql.len() + 16);
        let mut cursor = 0usize;
        for token in &self.tokens {
            let (start, end) = (token.start_index(), token.end_index());
            let gap = if start >= cursor {
                self.sql.get(cursor..start)
            } else {
                None
            };
            let original = self.sql.get(start..end);
            let (Some(gap), Some(original)) = (gap, original) else {
                return Err(TesseraError::internal_bug(
                    "E-REWRITE-003",
                    format!("{} token at {start}..{end} is out of place", token.kind_name()),
                    format!("cursor={cursor} sql_len={} sql={}", self.sql.len(), self.sql),
                ));
            };
            out.push_str(gap);
            out.push_str(&render(token, original)?);
            cursor = end;
        }
        out.push_str(&self.sql[cursor..]);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_sql::Span;

    #[test]
    fn test_splice_in_token_order() {
        let sql = "SELECT a FROM t WHERE x = 1";
        let tokens = vec![
            SqlToken::Table {
                span: Span::locate(sql, "t ", 0).map(|s| Span::new(s.start, s.start)).unwrap(),
                name: "t".into(),
            },
            SqlToken::DerivedProjections {
                position: 8,
                items: vec!["b".into()],
            },
        ];
        let out = SqlBuilder::new(sql, &tokens)
            .build(|token, original| {
                Ok(match token {
                    SqlToken::Table { .. } => format!("{original}_0"),
                    SqlToken::DerivedProjections { items, .. } => format!(", {}", items.join(", ")),
                    _ => original.to_string(),
                })
            })
            .unwrap();
        assert_eq!(out, "SELECT a, b FROM t_0 WHERE x = 1");
    }

    #[test]
    fn test_overlapping_tokens_are_a_bug() {
        let sql = "SELECT * FROM t_order";
        let tokens = vec![
            SqlToken::Table {
                span: Span::new(14, 20),
                name: "t_order".into(),
            },
            SqlToken::Table {
                span: Span::new(16, 20),
                name: "order".into(),
            },
        ];
        let err = SqlBuilder::new(sql, &tokens)
            .build(|_, original| Ok(original.to_string()))
            .unwrap_err();
        assert!(err.is_internal_bug());
    }

    #[test]
    fn test_span_past_end_is_a_bug() {
        let tokens = vec![SqlToken::RowCount {
            span: Span::new(10, 40),
        }];
        let err = SqlBuilder::new("SELECT 1", &tokens)
            .build(|_, original| Ok(original.to_string()))
            .unwrap_err();
        assert!(err.is_internal_bug());
    }
}
