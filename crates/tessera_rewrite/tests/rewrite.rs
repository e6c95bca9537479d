//! Routing followed by rewriting, checked on the produced SQL text and
//! parameter lists.

use tessera_common::config::RewriteConfig;
use tessera_common::datum::Datum;
use tessera_common::error::{RewriteError, TesseraError};
use tessera_rewrite::{SqlRewriteEngine, SqlRewriteResult};
use tessera_route::{RouteContext, RouteMapper, RouteUnit, ShardingRouter, StatementContext};
use tessera_rule::{ShardingRule, ShardingRuleConfig};
use tessera_sql::{
    BoundExpr, BoundStatement, DdlKind, InsertClause, Pagination, PaginationValue, SelectClause,
    Span, SqlToken, StatementKind, TableRef,
};

const RULE: &str = r#"
data_sources = ["ds_0", "ds_1"]
binding_tables = [["t_order", "t_order_item"]]
broadcast_tables = ["t_config"]

[[tables]]
logic_table = "t_order"
actual_data_nodes = "ds_${0..1}.t_order_${0..1}"
database_strategy = { type = "standard", column = "order_id", algorithm = "mod_2" }
table_strategy = { type = "standard", column = "order_id", algorithm = "mod_2" }
key_generate = { column = "order_id", generator = "counter" }

[[tables]]
logic_table = "t_order_item"
actual_data_nodes = "ds_${0..1}.t_order_item_${0..1}"
database_strategy = { type = "standard", column = "order_id", algorithm = "mod_2" }
table_strategy = { type = "standard", column = "order_id", algorithm = "mod_2" }

[algorithms.mod_2]
type = "MOD"
props = { sharding-count = "2" }

[key_generators.counter]
type = "INCREMENT"
props = { start = "100" }
"#;

fn rule() -> ShardingRule {
    ShardingRuleConfig::from_toml_str(RULE)
        .unwrap()
        .build()
        .unwrap()
}

fn table_token(sql: &str, name: &str, nth: usize) -> SqlToken {
    SqlToken::Table {
        span: Span::locate(sql, name, nth).unwrap(),
        name: name.to_string(),
    }
}

fn rewrite(rule: &ShardingRule, statement: BoundStatement, params: Vec<Datum>) -> SqlRewriteResult {
    let ctx = StatementContext::new(statement, params, rule);
    let route = ShardingRouter::default().route(rule, &ctx, None).unwrap();
    SqlRewriteEngine::default().rewrite(&ctx, &route).unwrap()
}

fn sqls(result: &SqlRewriteResult) -> Vec<String> {
    result.units().into_iter().map(|(_, u)| u.sql.clone()).collect()
}

fn ints(values: &[i64]) -> Vec<Datum> {
    values.iter().map(|v| Datum::Int64(*v)).collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Table tokens
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_single_unit_table_rewrite() {
    let rule = rule();
    let sql = "SELECT * FROM t_order WHERE order_id = ?";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(0)))
        .with_tokens(vec![table_token(sql, "t_order", 0)]);
    let result = rewrite(&rule, statement, ints(&[5]));
    let (unit, rewritten) = result.units()[0];
    assert_eq!(unit.map(RouteUnit::data_source), Some("ds_1"));
    assert_eq!(rewritten.sql, "SELECT * FROM t_order_1 WHERE order_id = ?");
    assert_eq!(rewritten.parameters, ints(&[5]));
}

#[test]
fn test_binding_join_rewrites_every_table() {
    let rule = rule();
    let sql = "SELECT * FROM t_order o JOIN t_order_item i ON o.order_id = i.order_id WHERE o.order_id = 5";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![
            TableRef::aliased("t_order", "o"),
            TableRef::aliased("t_order_item", "i"),
        ])
        .with_where(BoundExpr::eq(BoundExpr::qcol("o", "order_id"), BoundExpr::lit(5i64)))
        .with_tokens(vec![
            SqlToken::Table {
                span: Span::new(14, 20),
                name: "t_order".into(),
            },
            table_token(sql, "t_order_item", 0),
        ]);
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        sqls(&result),
        vec!["SELECT * FROM t_order_1 o JOIN t_order_item_1 i ON o.order_id = i.order_id WHERE o.order_id = 5"]
    );
}

#[test]
fn test_every_table_token_resolves_to_unit_actual_name() {
    let rule = rule();
    let sql = "SELECT * FROM t_order";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_tokens(vec![table_token(sql, "t_order", 0)]);
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(result.len(), 4);
    for (unit, rewritten) in result.units() {
        let actual = unit.and_then(|u| u.actual_table("t_order")).unwrap();
        assert_eq!(rewritten.sql, format!("SELECT * FROM {actual}"));
    }
}

#[test]
fn test_index_token_suffixed_with_actual_table() {
    let rule = rule();
    let sql = "CREATE INDEX idx_status ON t_order (status)";
    let statement = BoundStatement::new(StatementKind::Ddl(DdlKind::CreateIndex), sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_tokens(vec![
            SqlToken::Index {
                span: Span::locate(sql, "idx_status", 0).unwrap(),
                name: "idx_status".into(),
                table: Some("t_order".into()),
            },
            table_token(sql, "t_order", 0),
        ]);
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(result.len(), 4);
    assert_eq!(
        result.find("ds_1", "t_order", "t_order_0").map(|u| u.sql.as_str()),
        Some("CREATE INDEX idx_status_t_order_0 ON t_order_0 (status)")
    );
}

#[test]
fn test_unrouted_statement_is_generic() {
    let rule = rule();
    let statement = BoundStatement::new(StatementKind::Dal(tessera_sql::DalKind::Use), "USE shop");
    let result = rewrite(&rule, statement, vec![]);
    assert!(result.is_generic());
    assert_eq!(sqls(&result), vec!["USE shop"]);
}

#[test]
fn test_missing_table_mapper_is_internal_bug() {
    let rule = rule();
    let sql = "SELECT * FROM t_order";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_tokens(vec![table_token(sql, "t_order", 0)]);
    let ctx = StatementContext::new(statement, vec![], &rule);
    let mut route = RouteContext::new();
    route.add_unit(RouteUnit::new(RouteMapper::identity("ds_0"), vec![]));
    let err = SqlRewriteEngine::default().rewrite(&ctx, &route).unwrap_err();
    assert!(err.is_internal_bug());
    assert!(err.to_string().contains("E-REWRITE-001"));
}

// ═══════════════════════════════════════════════════════════════════════════
// Pagination and derived projections
// ═══════════════════════════════════════════════════════════════════════════

fn paged_select(sql: &str, pagination: Pagination, select: SelectClause) -> BoundStatement {
    let mut tokens = vec![table_token(sql, "t_order", 0)];
    if let Some(PaginationValue::Literal(v)) = pagination.row_count {
        tokens.push(SqlToken::RowCount {
            span: Span::locate(sql, &v.to_string(), 0).unwrap(),
        });
    }
    if let Some(PaginationValue::Literal(v)) = pagination.offset {
        tokens.push(SqlToken::Offset {
            span: Span::locate(sql, &format!("OFFSET {v}"), 0)
                .map(|s| Span::new(s.start + 7, s.stop))
                .unwrap(),
        });
    }
    BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_select(SelectClause {
            pagination: Some(pagination),
            ..select
        })
        .with_tokens(tokens)
}

#[test]
fn test_literal_pagination_widened_on_fan_out() {
    let rule = rule();
    let sql = "SELECT * FROM t_order LIMIT 10 OFFSET 5";
    let statement = paged_select(
        sql,
        Pagination {
            offset: Some(PaginationValue::Literal(5)),
            row_count: Some(PaginationValue::Literal(10)),
        },
        SelectClause::default(),
    );
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        result.find("ds_0", "t_order", "t_order_1").map(|u| u.sql.as_str()),
        Some("SELECT * FROM t_order_1 LIMIT 15 OFFSET 0")
    );
}

#[test]
fn test_aggregation_fetches_max_rows() {
    let rule = rule();
    let sql = "SELECT * FROM t_order LIMIT 10";
    let statement = paged_select(
        sql,
        Pagination {
            offset: None,
            row_count: Some(PaginationValue::Literal(10)),
        },
        SelectClause {
            has_aggregation: true,
            ..SelectClause::default()
        },
    );
    let ctx = StatementContext::new(statement, vec![], &rule);
    let route = ShardingRouter::default().route(&rule, &ctx, None).unwrap();
    let result = SqlRewriteEngine::new(RewriteConfig { max_row_count: 5000 })
        .rewrite(&ctx, &route)
        .unwrap();
    for (_, unit) in result.units() {
        assert!(unit.sql.ends_with("LIMIT 5000"), "{}", unit.sql);
    }
}

#[test]
fn test_parameter_pagination_rewritten_in_parameters() {
    let rule = rule();
    let sql = "SELECT * FROM t_order LIMIT ? OFFSET ?";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_select(SelectClause {
            pagination: Some(Pagination {
                offset: Some(PaginationValue::Param(1)),
                row_count: Some(PaginationValue::Param(0)),
            }),
            ..SelectClause::default()
        })
        .with_tokens(vec![table_token(sql, "t_order", 0)]);
    let result = rewrite(&rule, statement, ints(&[10, 5]));
    for (_, unit) in result.units() {
        assert!(unit.sql.ends_with("LIMIT ? OFFSET ?"));
        assert_eq!(unit.parameters, ints(&[15, 0]));
    }
}

#[test]
fn test_single_unit_pagination_untouched() {
    let rule = rule();
    let sql = "SELECT * FROM t_order WHERE order_id = 2 LIMIT 10 OFFSET 5";
    let mut statement = paged_select(
        sql,
        Pagination {
            offset: Some(PaginationValue::Literal(5)),
            row_count: Some(PaginationValue::Literal(10)),
        },
        SelectClause::default(),
    );
    statement = statement.with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(2i64)));
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        sqls(&result),
        vec!["SELECT * FROM t_order_0 WHERE order_id = 2 LIMIT 10 OFFSET 5"]
    );
}

#[test]
fn test_pagination_parameter_checks() {
    let rule = rule();
    let sql = "SELECT * FROM t_order LIMIT ?";
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_select(SelectClause {
            pagination: Some(Pagination {
                offset: None,
                row_count: Some(PaginationValue::Param(0)),
            }),
            ..SelectClause::default()
        })
        .with_tokens(vec![table_token(sql, "t_order", 0)]);

    let ctx = StatementContext::new(statement.clone(), vec![], &rule);
    let route = ShardingRouter::default().route(&rule, &ctx, None).unwrap();
    let err = SqlRewriteEngine::default().rewrite(&ctx, &route).unwrap_err();
    assert!(err.is_internal_bug());

    let ctx = StatementContext::new(statement, vec![Datum::Int64(-1)], &rule);
    let err = SqlRewriteEngine::default().rewrite(&ctx, &route).unwrap_err();
    assert!(matches!(
        err,
        TesseraError::Rewrite(RewriteError::InvalidPaginationValue { index: 0, .. })
    ));
}

#[test]
fn test_derived_projections_only_on_fan_out() {
    let rule = rule();
    let sql = "SELECT user_id FROM t_order ORDER BY order_id";
    let tokens = vec![
        SqlToken::DerivedProjections {
            position: "SELECT user_id".len(),
            items: vec!["order_id".into()],
        },
        table_token(sql, "t_order", 0),
    ];
    let statement = BoundStatement::new(StatementKind::Select, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_tokens(tokens.clone());
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        result.find("ds_0", "t_order", "t_order_0").map(|u| u.sql.as_str()),
        Some("SELECT user_id, order_id FROM t_order_0 ORDER BY order_id")
    );

    let sql_one = "SELECT user_id FROM t_order WHERE order_id = 1 ORDER BY order_id";
    let statement = BoundStatement::new(StatementKind::Select, sql_one)
        .with_tables(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)))
        .with_tokens(vec![tokens[0].clone(), table_token(sql_one, "t_order", 0)]);
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        sqls(&result),
        vec!["SELECT user_id FROM t_order_1 WHERE order_id = 1 ORDER BY order_id"]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// INSERT
// ═══════════════════════════════════════════════════════════════════════════

fn insert_statement(sql: &str, columns: &[&str], rows: Vec<Vec<BoundExpr>>, row_text: &[&str]) -> BoundStatement {
    let row_spans: Vec<Span> = row_text
        .iter()
        .enumerate()
        .map(|(i, text)| {
            let nth = row_text[..i].iter().filter(|t| *t == text).count();
            Span::locate(sql, text, nth).unwrap()
        })
        .collect();
    let values_span = Span::new(row_spans[0].start, row_spans[row_spans.len() - 1].stop);
    let column_list_end = sql.find(") VALUES").unwrap();
    BoundStatement::new(StatementKind::Insert, sql)
        .with_tables(vec![TableRef::new("t_order")])
        .with_insert(InsertClause {
            table: "t_order".into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
        .with_tokens(vec![
            table_token(sql, "t_order", 0),
            SqlToken::GeneratedKeyColumn {
                position: column_list_end,
            },
            SqlToken::InsertValues {
                span: values_span,
                rows: row_spans,
            },
        ])
}

#[test]
fn test_insert_rows_split_across_units() {
    let rule = rule();
    let sql = "INSERT INTO t_order (order_id, user_id) VALUES (?, ?), (?, ?)";
    let statement = insert_statement(
        sql,
        &["order_id", "user_id"],
        vec![
            vec![BoundExpr::param(0), BoundExpr::param(1)],
            vec![BoundExpr::param(2), BoundExpr::param(3)],
        ],
        &["(?, ?)", "(?, ?)"],
    );
    let result = rewrite(&rule, statement, ints(&[1, 10, 2, 20]));
    assert_eq!(result.len(), 2);
    let odd = result.find("ds_1", "t_order", "t_order_1").unwrap();
    assert_eq!(odd.sql, "INSERT INTO t_order_1 (order_id, user_id) VALUES (?, ?)");
    assert_eq!(odd.parameters, ints(&[1, 10]));
    let even = result.find("ds_0", "t_order", "t_order_0").unwrap();
    assert_eq!(even.parameters, ints(&[2, 20]));
    for (_, unit) in result.units() {
        // columns x rows assigned to the unit
        assert_eq!(unit.parameters.len(), 2);
    }
}

#[test]
fn test_insert_rows_on_same_node_stay_together() {
    let rule = rule();
    let sql = "INSERT INTO t_order (order_id, user_id) VALUES (1, 10), (3, 30), (2, 20)";
    let statement = insert_statement(
        sql,
        &["order_id", "user_id"],
        vec![
            vec![BoundExpr::lit(1i64), BoundExpr::lit(10i64)],
            vec![BoundExpr::lit(3i64), BoundExpr::lit(30i64)],
            vec![BoundExpr::lit(2i64), BoundExpr::lit(20i64)],
        ],
        &["(1, 10)", "(3, 30)", "(2, 20)"],
    );
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        result.find("ds_1", "t_order", "t_order_1").map(|u| u.sql.as_str()),
        Some("INSERT INTO t_order_1 (order_id, user_id) VALUES (1, 10), (3, 30)")
    );
    assert_eq!(
        result.find("ds_0", "t_order", "t_order_0").map(|u| u.sql.as_str()),
        Some("INSERT INTO t_order_0 (order_id, user_id) VALUES (2, 20)")
    );
}

#[test]
fn test_generated_key_parameterized() {
    let rule = rule();
    let sql = "INSERT INTO t_order (user_id) VALUES (?), (?)";
    let statement = insert_statement(
        sql,
        &["user_id"],
        vec![vec![BoundExpr::param(0)], vec![BoundExpr::param(1)]],
        &["(?)", "(?)"],
    );
    let result = rewrite(&rule, statement, ints(&[7, 8]));
    let even = result.find("ds_0", "t_order", "t_order_0").unwrap();
    assert_eq!(even.sql, "INSERT INTO t_order_0 (user_id, order_id) VALUES (?, ?)");
    assert_eq!(even.parameters, ints(&[7, 100]));
    let odd = result.find("ds_1", "t_order", "t_order_1").unwrap();
    assert_eq!(odd.parameters, ints(&[8, 101]));
}

#[test]
fn test_generated_key_literal() {
    let rule = rule();
    let sql = "INSERT INTO t_order (user_id) VALUES (7)";
    let statement = insert_statement(sql, &["user_id"], vec![vec![BoundExpr::lit(7i64)]], &["(7)"]);
    let result = rewrite(&rule, statement, vec![]);
    assert_eq!(
        sqls(&result),
        vec!["INSERT INTO t_order_0 (user_id, order_id) VALUES (7, 100)"]
    );
}
