//! Binding table groups: logic tables sharded identically row for row.

use tessera_common::error::{ConfigError, TesseraError, TesseraResult};

use crate::table_rule::TableRule;

/// One binding group, tables in declaration order (lower-cased).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTableGroup {
    tables: Vec<String>,
}

impl BindingTableGroup {
    pub(crate) fn new(tables: Vec<String>) -> Self {
        Self { tables }
    }

    pub fn tables(&self) -> &[String] {
        &self.tables
    }

    pub fn contains(&self, logic_table: &str) -> bool {
        self.tables.iter().any(|t| t.eq_ignore_ascii_case(logic_table))
    }

    fn describe(&self) -> String {
        self.tables.join(",")
    }

    /// Check that every member has the layout of the first member: same data
    /// source sequence, same table count per data source, and the same
    /// suffix at every ordinal.
    pub(crate) fn validate<'a>(
        &self,
        find: impl Fn(&str) -> Option<&'a TableRule>,
    ) -> TesseraResult<()> {
        let mismatch = |table: &str, reason: String| -> TesseraError {
            ConfigError::BindingMismatch {
                group: self.describe(),
                table: table.to_string(),
                reason,
            }
            .into()
        };
        let mut rules = Vec::with_capacity(self.tables.len());
        for name in &self.tables {
            let rule = find(name)
                .ok_or_else(|| mismatch(name, "not a configured sharding table".into()))?;
            rules.push(rule);
        }
        let Some((primary, others)) = rules.split_first() else {
            return Ok(());
        };
        let primary_sources = primary.actual_data_source_names();
        for other in others {
            let sources = other.actual_data_source_names();
            if sources != primary_sources {
                return Err(mismatch(
                    other.logic_table(),
                    format!(
                        "data sources {:?} differ from {:?} of {}",
                        sources,
                        primary_sources,
                        primary.logic_table()
                    ),
                ));
            }
            for ds in &primary_sources {
                let expected = primary.actual_table_names(ds);
                let actual = other.actual_table_names(ds);
                if expected.len() != actual.len() {
                    return Err(mismatch(
                        other.logic_table(),
                        format!(
                            "{} actual tables on {ds}, expected {}",
                            actual.len(),
                            expected.len()
                        ),
                    ));
                }
                for (i, (e, a)) in expected.iter().zip(actual.iter()).enumerate() {
                    let es = primary.actual_table_suffix(e);
                    let as_ = other.actual_table_suffix(a);
                    if es != as_ {
                        return Err(mismatch(
                            other.logic_table(),
                            format!(
                                "suffix '{as_}' of {ds}.{a} at position {i} does not match '{es}' of {ds}.{e}"
                            ),
                        ));
                    }
                }
            }
        }
        Ok(())
    }

    /// Actual table of `other` at the ordinal `primary_actual` occupies on
    /// `data_source` in `primary`. Layouts were validated at load time.
    pub(crate) fn binding_actual_table(
        primary: &TableRule,
        other: &TableRule,
        data_source: &str,
        primary_actual: &str,
    ) -> Option<String> {
        let index = primary.find_actual_table_index(data_source, primary_actual)?;
        other
            .actual_table_at(data_source, index)
            .map(str::to_string)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data_node::DataNode;
    use crate::inline::expand;

    fn rule(name: &str, expr: &str) -> TableRule {
        let nodes = expand(expr)
            .unwrap()
            .iter()
            .map(|s| DataNode::parse(s).unwrap())
            .collect();
        TableRule::new(name, nodes)
    }

    #[test]
    fn test_valid_group() {
        let a = rule("t_order", "ds_${0..1}.t_order_${0..1}");
        let b = rule("t_order_item", "ds_${0..1}.t_order_item_${0..1}");
        let g = BindingTableGroup::new(vec!["t_order".into(), "t_order_item".into()]);
        let find = |n: &str| [&a, &b].into_iter().find(|r| r.logic_table() == n);
        assert!(g.validate(find).is_ok());
        assert_eq!(
            BindingTableGroup::binding_actual_table(&a, &b, "ds_1", "t_order_1"),
            Some("t_order_item_1".into())
        );
    }

    #[test]
    fn test_count_mismatch() {
        let a = rule("t_order", "ds_${0..1}.t_order_${0..1}");
        let b = rule("t_order_item", "ds_${0..1}.t_order_item_${0..2}");
        let g = BindingTableGroup::new(vec!["t_order".into(), "t_order_item".into()]);
        let find = |n: &str| [&a, &b].into_iter().find(|r| r.logic_table() == n);
        let e = g.validate(find).unwrap_err();
        assert!(e.is_configuration());
        assert!(e.to_string().contains("3 actual tables on ds_0"));
    }

    #[test]
    fn test_order_mismatch() {
        let a = rule("t_order", "ds_${0..1}.t_order_${0..1}");
        let b = rule("t_order_item", "ds_${0..1}.t_order_item_${[1, 0]}");
        let g = BindingTableGroup::new(vec!["t_order".into(), "t_order_item".into()]);
        let find = |n: &str| [&a, &b].into_iter().find(|r| r.logic_table() == n);
        assert!(g.validate(find).unwrap_err().to_string().contains("suffix"));
    }

    #[test]
    fn test_data_source_mismatch_and_unknown_table() {
        let a = rule("t_order", "ds_${0..1}.t_order_${0..1}");
        let b = rule("t_order_item", "ds_${[1, 0]}.t_order_item_${0..1}");
        let g = BindingTableGroup::new(vec!["t_order".into(), "t_order_item".into()]);
        let find = |n: &str| [&a, &b].into_iter().find(|r| r.logic_table() == n);
        assert!(g.validate(find).is_err());

        let g = BindingTableGroup::new(vec!["t_order".into(), "t_missing".into()]);
        let find = |n: &str| [&a].into_iter().find(|r| r.logic_table() == n);
        assert!(g.validate(find).unwrap_err().is_configuration());
    }
}
