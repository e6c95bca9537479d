use std::fmt::Write;

use tessera_kernel::ExecutionPlan;
use tessera_rule::ShardingRule;

/// One line per configured object, in declaration order.
pub fn format_rule_summary(rule: &ShardingRule) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "data sources: {}", rule.data_source_names().join(", "));
    for table in rule.table_rules() {
        let _ = writeln!(
            out,
            "table {}: {} data nodes on {}",
            table.logic_table(),
            table.actual_data_nodes().len(),
            table.actual_data_source_names().join(", ")
        );
    }
    for group in rule.binding_groups() {
        let _ = writeln!(out, "binding: {}", group.tables().join(", "));
    }
    let broadcast: Vec<&str> = rule.broadcast_tables().collect();
    if !broadcast.is_empty() {
        let _ = writeln!(out, "broadcast: {}", broadcast.join(", "));
    }
    out
}

pub fn format_plan_text(plan: &ExecutionPlan) -> String {
    let mut out = String::new();
    let engine = plan.engine().map(|k| k.name()).unwrap_or("none");
    let _ = writeln!(out, "engine: {engine} (rule version {})", plan.rule_version);
    if plan.route_context.discarded_combinations() > 0 {
        let _ = writeln!(
            out,
            "discarded cartesian combinations: {}",
            plan.route_context.discarded_combinations()
        );
    }
    if let Some(keys) = &plan.generated_keys {
        let values: Vec<String> = keys.values.iter().map(ToString::to_string).collect();
        let _ = writeln!(out, "generated {}: {}", keys.column, values.join(", "));
    }
    let _ = writeln!(out, "units: {}", plan.units.len());
    for unit in &plan.units {
        let _ = write!(out, "  [{}] {}", unit.data_source, unit.sql);
        if !unit.parameters.is_empty() {
            let params: Vec<String> = unit.parameters.iter().map(ToString::to_string).collect();
            let _ = write!(out, "  -- params: [{}]", params.join(", "));
        }
        out.push('\n');
    }
    out
}
