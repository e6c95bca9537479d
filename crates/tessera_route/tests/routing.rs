//! End-to-end routing over a rule document: engine selection, binding
//! derivation, broadcast, cartesian narrowing, hints and the UPDATE
//! consistency check.

use proptest::prelude::*;
use tessera_common::config::{CartesianPolicy, RouterConfig};
use tessera_common::datum::Datum;
use tessera_common::error::{RouteError, TesseraError, TesseraResult};
use tessera_route::{
    HintContext, RouteContext, RouteEngineKind, RouteMapper, RouteUnit, ShardingRouter,
    StatementContext,
};
use tessera_rule::{ShardingRule, ShardingRuleConfig};
use tessera_sql::{
    Assignment, BoundExpr, BoundStatement, ColumnRef, CompareOp, DdlKind, InsertClause,
    StatementKind, TableRef,
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

[[tables]]
logic_table = "t_user"
actual_data_nodes = "ds_${0..1}.t_user_${0..2}"
database_strategy = { type = "standard", column = "user_id", algorithm = "mod_2" }
table_strategy = { type = "standard", column = "user_id", algorithm = "mod_3" }

[[tables]]
logic_table = "t_hinted"
actual_data_nodes = "ds_${0..1}.t_hinted_${0..1}"
database_strategy = { type = "hint", algorithm = "ds_hint" }
table_strategy = { type = "hint", algorithm = "table_hint" }

[algorithms.mod_2]
type = "MOD"
props = { sharding-count = "2" }

[algorithms.mod_3]
type = "MOD"
props = { sharding-count = "3" }

[algorithms.ds_hint]
type = "HINT_INLINE"
props = { algorithm-expression = "ds_${value}" }

[algorithms.table_hint]
type = "HINT_INLINE"
props = { algorithm-expression = "t_hinted_${value}" }

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

fn route_with(
    router: &ShardingRouter,
    rule: &ShardingRule,
    statement: BoundStatement,
    params: Vec<Datum>,
    hint: Option<&HintContext>,
) -> TesseraResult<RouteContext> {
    let ctx = StatementContext::new(statement, params, rule);
    router.route(rule, &ctx, hint)
}

fn route(rule: &ShardingRule, statement: BoundStatement, params: Vec<Datum>) -> TesseraResult<RouteContext> {
    route_with(&ShardingRouter::default(), rule, statement, params, None)
}

fn select(tables: Vec<TableRef>) -> BoundStatement {
    BoundStatement::new(StatementKind::Select, "").with_tables(tables)
}

fn unit(ds: &str, tables: &[(&str, &str)]) -> RouteUnit {
    RouteUnit::new(
        RouteMapper::identity(ds),
        tables.iter().map(|(l, a)| RouteMapper::new(*l, *a)).collect(),
    )
}

fn units(ctx: &RouteContext) -> Vec<RouteUnit> {
    ctx.units().cloned().collect()
}

// ═══════════════════════════════════════════════════════════════════════════
// Standard routing
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_single_table_precise_value() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(5i64)));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Standard));
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
}

#[test]
fn test_parameter_marker_resolved() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(0)));
    let ctx = route(&rule, statement, vec![Datum::Int64(4)]).unwrap();
    assert_eq!(units(&ctx), vec![unit("ds_0", &[("t_order", "t_order_0")])]);
}

#[test]
fn test_out_of_range_parameter_widens_routing() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(3)));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(ctx.len(), 4);
}

#[test]
fn test_or_branches_union() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order")]).with_where(BoundExpr::Or(vec![
        BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)),
        BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(2i64)),
    ]));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(
        units(&ctx),
        vec![
            unit("ds_1", &[("t_order", "t_order_1")]),
            unit("ds_0", &[("t_order", "t_order_0")]),
        ]
    );
}

#[test]
fn test_binding_join_single_unit() {
    let rule = rule();
    let statement = select(vec![
        TableRef::aliased("t_order", "o"),
        TableRef::aliased("t_order_item", "i"),
    ])
    .with_where(BoundExpr::And(vec![
        BoundExpr::eq(BoundExpr::qcol("o", "order_id"), BoundExpr::qcol("i", "order_id")),
        BoundExpr::eq(BoundExpr::qcol("o", "order_id"), BoundExpr::lit(5i64)),
    ]));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Standard));
    assert_eq!(
        units(&ctx),
        vec![unit(
            "ds_1",
            &[("t_order", "t_order_1"), ("t_order_item", "t_order_item_1")]
        )]
    );
}

#[test]
fn test_broadcast_table_decorated_in_sharding_route() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_config")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(3i64)));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(
        units(&ctx),
        vec![unit("ds_1", &[("t_order", "t_order_1"), ("t_config", "t_config")])]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Broadcast and unicast
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_broadcast_completeness() {
    let rule = rule();
    let ddl = BoundStatement::new(StatementKind::Ddl(DdlKind::CreateTable), "")
        .with_tables(vec![TableRef::new("t_config")]);
    let ctx = route(&rule, ddl, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::TableBroadcast));
    assert_eq!(ctx.actual_data_source_names(), rule.data_source_names());
    assert_eq!(ctx.len(), rule.data_source_names().len());

    let tcl = BoundStatement::new(StatementKind::Tcl, "COMMIT");
    let ctx = route(&rule, tcl, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::DatabaseBroadcast));
    assert_eq!(ctx.actual_data_source_names(), rule.data_source_names());
    assert_eq!(ctx.len(), 2);
}

#[test]
fn test_ddl_on_sharding_table_hits_every_node() {
    let rule = rule();
    let ddl = BoundStatement::new(StatementKind::Ddl(DdlKind::AlterTable), "")
        .with_tables(vec![TableRef::new("t_user")]);
    let ctx = route(&rule, ddl, vec![]).unwrap();
    assert_eq!(ctx.len(), 6);
    assert_eq!(ctx.actual_table_names("ds_1", "t_user"), vec!["t_user_0", "t_user_1", "t_user_2"]);
}

#[test]
fn test_broadcast_dml_goes_everywhere_query_goes_once() {
    let rule = rule();
    let update = BoundStatement::new(StatementKind::Update, "")
        .with_tables(vec![TableRef::new("t_config")]);
    let ctx = route(&rule, update, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::DatabaseBroadcast));
    assert_eq!(
        units(&ctx),
        vec![
            unit("ds_0", &[("t_config", "t_config")]),
            unit("ds_1", &[("t_config", "t_config")]),
        ]
    );

    let ctx = route(&rule, select(vec![TableRef::new("t_config")]), vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Unicast));
    assert_eq!(units(&ctx), vec![unit("ds_0", &[("t_config", "t_config")])]);
}

#[test]
fn test_use_is_ignored() {
    let rule = rule();
    let ctx = route(
        &rule,
        BoundStatement::new(StatementKind::Dal(tessera_sql::DalKind::Use), "USE db"),
        vec![],
    )
    .unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Ignore));
    assert!(ctx.is_empty());
}

#[test]
fn test_always_false_update_is_unicast() {
    let rule = rule();
    let statement = BoundStatement::new(StatementKind::Update, "")
        .with_tables(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::And(vec![
            BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)),
            BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(2i64)),
        ]));
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Unicast));
    assert_eq!(units(&ctx), vec![unit("ds_0", &[("t_order", "t_order_0")])]);
}

#[test]
fn test_mixed_type_values_do_not_make_delete_always_false() {
    let rule = rule();
    for bound in [Datum::Text("5".into()), Datum::Float64(5.0)] {
        let statement = BoundStatement::new(StatementKind::Delete, "")
            .with_tables(vec![TableRef::new("t_order")])
            .with_where(BoundExpr::And(vec![
                BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(5i64)),
                BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(0)),
            ]));
        let ctx = route(&rule, statement, vec![bound.clone()]).unwrap();
        assert_eq!(ctx.engine(), Some(RouteEngineKind::Standard), "bound {bound}");
        assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
    }
}

#[test]
fn test_mixed_type_range_keeps_precise_value() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order")]).with_where(BoundExpr::And(vec![
        BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::param(0)),
        BoundExpr::compare(BoundExpr::col("order_id"), CompareOp::Gt, BoundExpr::lit(10i64)),
    ]));
    let ctx = route(&rule, statement, vec![Datum::Text("3".into())]).unwrap();
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
}

// ═══════════════════════════════════════════════════════════════════════════
// Cartesian
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_cartesian_sizing() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_user")]);
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Complex));
    // 4 t_order units x 6 t_user units, half of the pairs co-located.
    assert!(ctx.len() <= 4 * 6);
    assert_eq!(ctx.len(), 12);
    assert_eq!(ctx.discarded_combinations(), 12);
    for u in ctx.units() {
        assert!(u.actual_table("t_order").is_some());
        assert!(u.actual_table("t_user").is_some());
    }
}

#[test]
fn test_cartesian_narrowed_by_conditions() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_user")]).with_where(
        BoundExpr::And(vec![
            BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)),
            BoundExpr::eq(BoundExpr::col("user_id"), BoundExpr::lit(5i64)),
        ]),
    );
    let ctx = route(&rule, statement, vec![]).unwrap();
    assert_eq!(
        units(&ctx),
        vec![unit("ds_1", &[("t_order", "t_order_1"), ("t_user", "t_user_2")])]
    );
    assert_eq!(ctx.discarded_combinations(), 0);
}

#[test]
fn test_cartesian_reject_policy() {
    let rule = rule();
    let router = ShardingRouter::new(RouterConfig {
        cartesian_policy: CartesianPolicy::Reject,
        ..RouterConfig::default()
    });
    let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_user")]);
    let err = route_with(&router, &rule, statement, vec![], None).unwrap_err();
    assert!(matches!(err, TesseraError::Route(RouteError::CrossDataSourceJoin { .. })));
    assert!(err.is_unsupported());
}

#[test]
fn test_cartesian_without_common_data_source_fails() {
    let rule = rule();
    let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_user")]).with_where(
        BoundExpr::And(vec![
            BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)),
            BoundExpr::eq(BoundExpr::col("user_id"), BoundExpr::lit(4i64)),
        ]),
    );
    let err = route(&rule, statement, vec![]).unwrap_err();
    assert!(matches!(err, TesseraError::Route(RouteError::CrossDataSourceJoin { .. })));
}

// ═══════════════════════════════════════════════════════════════════════════
// INSERT
// ═══════════════════════════════════════════════════════════════════════════

fn insert(table: &str, columns: &[&str], rows: Vec<Vec<BoundExpr>>) -> BoundStatement {
    BoundStatement::new(StatementKind::Insert, "")
        .with_tables(vec![TableRef::new(table)])
        .with_insert(InsertClause {
            table: table.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows,
        })
}

#[test]
fn test_insert_rows_routed_per_row() {
    let rule = rule();
    let statement = insert(
        "t_order",
        &["order_id", "user_id"],
        vec![
            vec![BoundExpr::param(0), BoundExpr::param(1)],
            vec![BoundExpr::param(2), BoundExpr::param(3)],
        ],
    );
    let params = vec![Datum::Int64(1), Datum::Int64(10), Datum::Int64(2), Datum::Int64(20)];
    let ctx = route(&rule, statement, params).unwrap();
    assert_eq!(ctx.len(), 2);
    let per_row: Vec<String> = ctx
        .original_data_nodes()
        .iter()
        .map(|nodes| nodes[0].to_string())
        .collect();
    assert_eq!(per_row, vec!["ds_1.t_order_1", "ds_0.t_order_0"]);
}

#[test]
fn test_insert_uses_generated_keys() {
    let rule = rule();
    let statement = insert(
        "t_order",
        &["user_id"],
        vec![vec![BoundExpr::lit(1i64)], vec![BoundExpr::lit(2i64)]],
    );
    let ctx = route(&rule, statement, vec![]).unwrap();
    // counter starts at 100
    assert_eq!(
        units(&ctx),
        vec![
            unit("ds_0", &[("t_order", "t_order_0")]),
            unit("ds_1", &[("t_order", "t_order_1")]),
        ]
    );
}

#[test]
fn test_insert_row_without_sharding_value_rejected() {
    let rule = rule();
    let statement = insert("t_user", &["name"], vec![vec![BoundExpr::lit("bob")]]);
    let err = route(&rule, statement, vec![]).unwrap_err();
    assert!(matches!(err, TesseraError::Route(RouteError::UnsupportedStatement(_))));
}

#[test]
fn test_hinted_insert_routes_each_row() {
    let rule = rule();
    let mut hint = HintContext::new();
    hint.add_database_value("t_order", 0i64)
        .add_table_value("t_order", 1i64);
    let statement = insert(
        "t_order",
        &["order_id", "status"],
        vec![
            vec![BoundExpr::param(0), BoundExpr::param(1)],
            vec![BoundExpr::param(2), BoundExpr::param(3)],
        ],
    );
    let params = vec![Datum::Int64(2), "a".into(), Datum::Int64(4), "b".into()];
    let ctx = route_with(&ShardingRouter::default(), &rule, statement, params, Some(&hint))
        .unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Hint));
    assert_eq!(units(&ctx), vec![unit("ds_0", &[("t_order", "t_order_1")])]);
    let per_row: Vec<Vec<String>> = ctx
        .original_data_nodes()
        .iter()
        .map(|nodes| nodes.iter().map(ToString::to_string).collect())
        .collect();
    assert_eq!(
        per_row,
        vec![vec!["ds_0.t_order_1".to_string()], vec!["ds_0.t_order_1".to_string()]]
    );
}

#[test]
fn test_insert_under_multi_valued_hint_rejected() {
    let rule = rule();
    let mut hint = HintContext::new();
    hint.add_database_value("t_order", 0i64)
        .add_table_value("t_order", 0i64)
        .add_table_value("t_order", 1i64);
    let statement = insert(
        "t_order",
        &["order_id", "status"],
        vec![
            vec![BoundExpr::param(0), BoundExpr::param(1)],
            vec![BoundExpr::param(2), BoundExpr::param(3)],
        ],
    );
    let params = vec![Datum::Int64(2), "a".into(), Datum::Int64(4), "b".into()];
    let err = route_with(&ShardingRouter::default(), &rule, statement, params, Some(&hint))
        .unwrap_err();
    assert!(matches!(err, TesseraError::Route(RouteError::UnsupportedStatement(_))));
    assert!(err.is_unsupported());
}

// ═══════════════════════════════════════════════════════════════════════════
// UPDATE consistency
// ═══════════════════════════════════════════════════════════════════════════

fn update_order(set: BoundExpr, where_value: i64) -> BoundStatement {
    BoundStatement::new(StatementKind::Update, "")
        .with_tables(vec![TableRef::new("t_order")])
        .with_assignments(vec![Assignment {
            column: ColumnRef::new("order_id"),
            value: set,
        }])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(where_value)))
}

#[test]
fn test_sharding_key_update_across_shards_rejected() {
    let rule = rule();
    let err = route(&rule, update_order(BoundExpr::lit(6i64), 5), vec![]).unwrap_err();
    match err {
        TesseraError::Route(RouteError::ShardingKeyUpdate { table, column }) => {
            assert_eq!(table, "t_order");
            assert_eq!(column, "order_id");
        }
        other => panic!("expected sharding key update error, got {other}"),
    }
}

#[test]
fn test_sharding_key_update_within_shard_allowed() {
    let rule = rule();
    let ctx = route(&rule, update_order(BoundExpr::lit(7i64), 5), vec![]).unwrap();
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
}

#[test]
fn test_sharding_key_update_unknown_value_skips_check() {
    let rule = rule();
    let ctx = route(&rule, update_order(BoundExpr::param(4), 5), vec![]).unwrap();
    assert_eq!(ctx.len(), 1);
}

#[test]
fn test_sharding_key_update_check_can_be_disabled() {
    let rule = rule();
    let router = ShardingRouter::new(RouterConfig {
        check_sharding_key_update: false,
        ..RouterConfig::default()
    });
    let ctx = route_with(&router, &rule, update_order(BoundExpr::lit(6i64), 5), vec![], None)
        .unwrap();
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
}

#[test]
fn test_sharding_key_update_under_hint_follows_hint() {
    let rule = rule();
    let mut hint = HintContext::new();
    hint.add_database_value("t_order", 1i64)
        .add_table_value("t_order", 1i64);
    let ctx = route_with(
        &ShardingRouter::default(),
        &rule,
        update_order(BoundExpr::lit(6i64), 5),
        vec![],
        Some(&hint),
    )
    .unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Hint));
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_order", "t_order_1")])]);
}

fn update_order_and_user(set_user_id: i64) -> BoundStatement {
    BoundStatement::new(StatementKind::Update, "")
        .with_tables(vec![TableRef::new("t_order"), TableRef::new("t_user")])
        .with_assignments(vec![Assignment {
            column: ColumnRef::new("user_id"),
            value: BoundExpr::lit(set_user_id),
        }])
        .with_where(BoundExpr::And(vec![
            BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(1i64)),
            BoundExpr::eq(BoundExpr::col("user_id"), BoundExpr::lit(5i64)),
        ]))
}

#[test]
fn test_sharding_key_update_checked_on_complex_route() {
    let rule = rule();
    // user_id 5 lives in ds_1.t_user_2; 3 would move it to t_user_0
    let err = route(&rule, update_order_and_user(3), vec![]).unwrap_err();
    match err {
        TesseraError::Route(RouteError::ShardingKeyUpdate { table, column }) => {
            assert_eq!(table, "t_user");
            assert_eq!(column, "user_id");
        }
        other => panic!("expected sharding key update error, got {other}"),
    }

    let ctx = route(&rule, update_order_and_user(11), vec![]).unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Complex));
    assert_eq!(
        units(&ctx),
        vec![unit("ds_1", &[("t_order", "t_order_1"), ("t_user", "t_user_2")])]
    );
}

// ═══════════════════════════════════════════════════════════════════════════
// Hints
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_hint_routes_hint_strategy_table() {
    let rule = rule();
    let mut hint = HintContext::new();
    hint.add_database_value("t_hinted", 1i64)
        .add_table_value("t_hinted", 0i64);
    let ctx = route_with(
        &ShardingRouter::default(),
        &rule,
        select(vec![TableRef::new("t_hinted")]),
        vec![],
        Some(&hint),
    )
    .unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::Hint));
    assert_eq!(units(&ctx), vec![unit("ds_1", &[("t_hinted", "t_hinted_0")])]);
}

#[test]
fn test_hint_overrides_sql_conditions() {
    let rule = rule();
    let mut hint = HintContext::new();
    hint.add_database_value("t_order", 0i64)
        .add_table_value("t_order", 0i64);
    let statement = select(vec![TableRef::new("t_order")])
        .with_where(BoundExpr::eq(BoundExpr::col("order_id"), BoundExpr::lit(5i64)));
    let ctx = route_with(&ShardingRouter::default(), &rule, statement, vec![], Some(&hint))
        .unwrap();
    assert_eq!(units(&ctx), vec![unit("ds_0", &[("t_order", "t_order_0")])]);
}

#[test]
fn test_database_only_hint() {
    let rule = rule();
    let hint = HintContext::database_only("DS_1");
    let ctx = route_with(
        &ShardingRouter::default(),
        &rule,
        select(vec![TableRef::new("t_order")]),
        vec![],
        Some(&hint),
    )
    .unwrap();
    assert_eq!(ctx.engine(), Some(RouteEngineKind::DatabaseHint));
    assert_eq!(ctx.actual_data_source_names(), vec!["ds_1"]);

    let missing = HintContext::database_only("ds_9");
    let err = route_with(
        &ShardingRouter::default(),
        &rule,
        select(vec![TableRef::new("t_order")]),
        vec![],
        Some(&missing),
    )
    .unwrap_err();
    assert!(matches!(err, TesseraError::Route(RouteError::NoDataNode { .. })));
}

// ═══════════════════════════════════════════════════════════════════════════
// Determinism
// ═══════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn routing_is_deterministic(
        order_ids in proptest::collection::vec(0i64..1_000, 1..6),
        user_id in 0i64..100,
    ) {
        let rule = rule();
        let statement = select(vec![TableRef::new("t_order"), TableRef::new("t_user")]).with_where(
            BoundExpr::And(vec![
                BoundExpr::in_list(
                    BoundExpr::col("order_id"),
                    order_ids.iter().map(|v| BoundExpr::lit(*v)).collect(),
                ),
                BoundExpr::eq(BoundExpr::col("user_id"), BoundExpr::lit(user_id)),
            ]),
        );
        let first = route(&rule, statement.clone(), vec![]);
        let second = route(&rule, statement, vec![]);
        match (first, second) {
            (Ok(a), Ok(b)) => {
                prop_assert!(a.same_route(&b));
                prop_assert_eq!(
                    serde_json::to_string(&a).unwrap(),
                    serde_json::to_string(&b).unwrap()
                );
            }
            (Err(a), Err(b)) => prop_assert_eq!(a.to_string(), b.to_string()),
            _ => prop_assert!(false, "routing outcome changed between runs"),
        }
    }
}
