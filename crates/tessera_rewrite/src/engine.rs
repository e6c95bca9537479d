use std::time::Instant;

use tessera_common::config::RewriteConfig;
use tessera_common::datum::Datum;
use tessera_common::error::{RewriteError, TesseraError, TesseraResult};
use tessera_route::{RouteContext, RouteUnit, StatementContext};
use tessera_sql::{InsertClause, PaginationValue, Span, SqlToken, StatementKind};

use crate::builder::SqlBuilder;
use crate::pagination::{self, PaginationRewrite};
use crate::parameter;
use crate::result::{SqlRewriteResult, SqlRewriteUnit};

#[derive(Debug, Clone, Default)]
pub struct SqlRewriteEngine {
    config: RewriteConfig,
}

/// Facts shared by every unit of one statement.
struct Shared<'a> {
    ctx: &'a StatementContext,
    route: &'a RouteContext,
    pagination: Option<PaginationRewrite>,
    insert: Option<&'a InsertClause>,
    /// Generated keys to splice in, with whether each is bound as `?`.
    generated: Option<(&'a str, &'a [Datum], bool)>,
}

impl SqlRewriteEngine {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    pub fn rewrite(
        &self,
        ctx: &StatementContext,
        route: &RouteContext,
    ) -> TesseraResult<SqlRewriteResult> {
        let start = Instant::now();
        match self.do_rewrite(ctx, route) {
            Ok(result) => {
                let outcome = if result.is_generic() { "generic" } else { "routed" };
                tessera_observability::record_rewrite(outcome, result.len());
                tracing::debug!(
                    outcome,
                    units = result.len(),
                    duration_us = start.elapsed().as_micros() as u64,
                    "statement rewritten"
                );
                Ok(result)
            }
            Err(e) => {
                e.log_if_fatal();
                tessera_observability::record_rewrite("failed", 0);
                Err(e)
            }
        }
    }

    fn do_rewrite(
        &self,
        ctx: &StatementContext,
        route: &RouteContext,
    ) -> TesseraResult<SqlRewriteResult> {
        let statement = ctx.statement();
        check_token_parameters(ctx)?;
        if route.is_empty() {
            return Ok(SqlRewriteResult::Generic(SqlRewriteUnit::new(
                statement.sql.clone(),
                ctx.parameters().to_vec(),
            )));
        }

        let pagination = if route.len() > 1 && statement.kind == StatementKind::Select {
            pagination::rewrite(statement, ctx.parameters(), self.config.max_row_count)?
        } else {
            None
        };
        let insert = statement.insert.as_ref();
        let generated = match (insert, ctx.generated_keys()) {
            (Some(insert), Some(keys)) if has_generated_key_token(&statement.tokens) => {
                let parameterized = (0..insert.rows.len())
                    .any(|r| !insert.row_param_indexes(r).is_empty());
                Some((keys.column.as_str(), keys.values.as_slice(), parameterized))
            }
            _ => None,
        };
        let shared = Shared {
            ctx,
            route,
            pagination,
            insert,
            generated,
        };

        let builder = SqlBuilder::new(&statement.sql, &statement.tokens);
        let mut units = Vec::with_capacity(route.len());
        for unit in route.units() {
            let rows = shared.rows_for(unit);
            let sql = builder.build(|token, original| shared.render(token, original, unit, &rows))?;
            let parameters = shared.parameters(&rows);
            units.push((unit.clone(), SqlRewriteUnit::new(sql, parameters)));
        }
        Ok(SqlRewriteResult::Routed(units))
    }
}

impl Shared<'_> {
    /// VALUES rows that belong to `unit`. Rows whose routing was not
    /// recorded go to every unit.
    fn rows_for(&self, unit: &RouteUnit) -> Vec<usize> {
        let Some(insert) = self.insert else {
            return Vec::new();
        };
        let per_row = self.route.original_data_nodes();
        if per_row.len() != insert.rows.len() {
            return (0..insert.rows.len()).collect();
        }
        let actual = unit.actual_table(&insert.table);
        (0..insert.rows.len())
            .filter(|&r| {
                per_row[r].iter().any(|node| {
                    node.data_source == unit.data_source() && Some(node.table.as_str()) == actual
                })
            })
            .collect()
    }

    fn render(
        &self,
        token: &SqlToken,
        original: &str,
        unit: &RouteUnit,
        rows: &[usize],
    ) -> TesseraResult<String> {
        match token {
            SqlToken::Table { name, .. } => unit
                .actual_table(name)
                .map(str::to_string)
                .ok_or_else(|| self.unresolved_table(name, unit)),
            SqlToken::Index { name, table, .. } => {
                let actual = match table {
                    Some(t) => unit.actual_table(t),
                    None => unit.table_mappers.first().map(|m| m.actual_name.as_str()),
                };
                Ok(match actual {
                    Some(actual) => format!("{name}_{actual}"),
                    None => name.clone(),
                })
            }
            SqlToken::InsertValues { rows: spans, .. } => self.render_rows(spans, rows),
            SqlToken::GeneratedKeyColumn { .. } => Ok(self
                .generated
                .map(|(column, _, _)| format!(", {column}"))
                .unwrap_or_default()),
            SqlToken::DerivedProjections { items, .. } => {
                if self.route.len() > 1 {
                    Ok(items.iter().map(|i| format!(", {i}")).collect())
                } else {
                    Ok(String::new())
                }
            }
            SqlToken::RowCount { .. } => Ok(self
                .pagination
                .as_ref()
                .and_then(|p| p.row_count_text.clone())
                .unwrap_or_else(|| original.to_string())),
            SqlToken::Offset { .. } => Ok(self
                .pagination
                .as_ref()
                .and_then(|p| p.offset_text.clone())
                .unwrap_or_else(|| original.to_string())),
        }
    }

    fn render_rows(&self, spans: &[Span], rows: &[usize]) -> TesseraResult<String> {
        let sql = &self.ctx.statement().sql;
        let mut rendered = Vec::with_capacity(rows.len());
        for &row in rows {
            let text = spans
                .get(row)
                .and_then(|s| sql.get(s.start..=s.stop))
                .ok_or_else(|| {
                    TesseraError::internal_bug(
                        "E-REWRITE-004",
                        format!("VALUES row {row} has no token span"),
                        format!("spans={} sql={sql}", spans.len()),
                    )
                })?;
            let Some((_, keys, parameterized)) = self.generated else {
                rendered.push(text.to_string());
                continue;
            };
            let body = text.trim_end().strip_suffix(')').ok_or_else(|| {
                RewriteError::Unsupported(format!("VALUES row {row} is not parenthesised: {text}"))
            })?;
            let value = if parameterized {
                "?".to_string()
            } else {
                keys.get(row).map(Datum::to_sql_literal).unwrap_or_else(|| "NULL".into())
            };
            rendered.push(format!("{body}, {value})"));
        }
        Ok(rendered.join(", "))
    }

    fn parameters(&self, rows: &[usize]) -> Vec<Datum> {
        let parameters = self.ctx.parameters();
        match self.insert {
            Some(insert) if has_insert_values_token(&self.ctx.statement().tokens) => {
                let keys = self
                    .generated
                    .filter(|(_, _, parameterized)| *parameterized)
                    .map(|(_, keys, _)| keys);
                parameter::grouped(parameters, insert, rows, keys)
            }
            _ => parameter::standard(parameters, self.pagination.as_ref()),
        }
    }

    fn unresolved_table(&self, table: &str, unit: &RouteUnit) -> TesseraError {
        TesseraError::internal_bug(
            "E-REWRITE-001",
            format!("table token {table} has no mapper in the route unit"),
            format!(
                "data_source={} mapped={:?} sql={}",
                unit.data_source(),
                unit.logic_table_names(),
                self.ctx.statement().sql
            ),
        )
    }
}

fn has_generated_key_token(tokens: &[SqlToken]) -> bool {
    tokens
        .iter()
        .any(|t| matches!(t, SqlToken::GeneratedKeyColumn { .. }))
}

fn has_insert_values_token(tokens: &[SqlToken]) -> bool {
    tokens
        .iter()
        .any(|t| matches!(t, SqlToken::InsertValues { .. }))
}

/// Every parameter ordinal a token consumes must be bound.
fn check_token_parameters(ctx: &StatementContext) -> TesseraResult<()> {
    let statement = ctx.statement();
    let supplied = ctx.parameters().len();
    let mut referenced: Vec<usize> = Vec::new();
    if let Some(p) = statement.pagination() {
        for v in [p.offset, p.row_count].into_iter().flatten() {
            if let PaginationValue::Param(i) = v {
                referenced.push(i);
            }
        }
    }
    if let Some(insert) = &statement.insert {
        if has_insert_values_token(&statement.tokens) {
            referenced.extend((0..insert.rows.len()).flat_map(|r| insert.row_param_indexes(r)));
        }
    }
    match referenced.into_iter().find(|i| *i >= supplied) {
        Some(index) => Err(TesseraError::internal_bug(
            "E-REWRITE-002",
            format!("token parameter {index} is out of range"),
            format!("supplied={supplied} sql={}", statement.sql),
        )),
        None => Ok(()),
    }
}
