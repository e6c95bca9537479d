//! The immutable sharding rule of one schema.
//!
//! A `ShardingRule` is built once (via [`ShardingRuleBuilder`] or
//! [`crate::config::ShardingRuleConfig::build`]) and only read afterwards.
//! All table lookups are case-insensitive.

use indexmap::{IndexMap, IndexSet};
use tessera_common::error::{ConfigError, TesseraError, TesseraResult};

use crate::binding::BindingTableGroup;
use crate::strategy::ShardingStrategy;
use crate::table_rule::TableRule;

#[derive(Debug, Clone)]
pub struct ShardingRule {
    data_source_names: Vec<String>,
    table_rules: IndexMap<String, TableRule>,
    binding_groups: Vec<BindingTableGroup>,
    broadcast_tables: IndexSet<String>,
    default_database_strategy: ShardingStrategy,
    default_table_strategy: ShardingStrategy,
}

fn key(name: &str) -> String {
    name.to_ascii_lowercase()
}

impl ShardingRule {
    pub fn builder<I, S>(data_sources: I) -> ShardingRuleBuilder
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ShardingRuleBuilder::new(data_sources)
    }

    pub fn find_table_rule(&self, logic_table: &str) -> Option<&TableRule> {
        self.table_rules.get(&key(logic_table))
    }

    pub fn table_rules(&self) -> impl Iterator<Item = &TableRule> {
        self.table_rules.values()
    }

    /// The table rule owning `actual_table` on any data source.
    pub fn find_table_rule_by_actual_table(&self, actual_table: &str) -> Option<&TableRule> {
        self.table_rules.values().find(|r| r.is_existed(actual_table))
    }

    pub fn is_sharding_table(&self, logic_table: &str) -> bool {
        self.table_rules.contains_key(&key(logic_table))
    }

    pub fn is_broadcast_table(&self, logic_table: &str) -> bool {
        self.broadcast_tables.contains(&key(logic_table))
    }

    pub fn broadcast_tables(&self) -> impl Iterator<Item = &str> {
        self.broadcast_tables.iter().map(String::as_str)
    }

    /// False for an empty slice.
    pub fn is_all_broadcast_tables<S: AsRef<str>>(&self, logic_tables: &[S]) -> bool {
        !logic_tables.is_empty() && logic_tables.iter().all(|t| self.is_broadcast_table(t.as_ref()))
    }

    pub fn binding_groups(&self) -> &[BindingTableGroup] {
        &self.binding_groups
    }

    pub fn find_binding_group(&self, logic_table: &str) -> Option<&BindingTableGroup> {
        self.binding_groups.iter().find(|g| g.contains(logic_table))
    }

    /// True iff some binding group contains every name. False for an empty
    /// slice or when any name is not a sharding table.
    pub fn is_all_binding_tables<S: AsRef<str>>(&self, logic_tables: &[S]) -> bool {
        let Some(first) = logic_tables.first() else {
            return false;
        };
        if !logic_tables.iter().all(|t| self.is_sharding_table(t.as_ref())) {
            return false;
        }
        match self.find_binding_group(first.as_ref()) {
            Some(group) => logic_tables.iter().all(|t| group.contains(t.as_ref())),
            None => false,
        }
    }

    /// Configured data sources in declaration order.
    pub fn data_source_names(&self) -> &[String] {
        &self.data_source_names
    }

    /// Given the actual table chosen for `primary_logic` on `data_source`,
    /// derive the actual table of every other bound table by ordinal.
    ///
    /// Binding layouts are validated when the rule is built, so a failed
    /// derivation here means the caller passed tables outside the group.
    pub fn logic_and_actual_tables_from_binding_table<S: AsRef<str>>(
        &self,
        data_source: &str,
        primary_logic: &str,
        primary_actual: &str,
        other_logic_tables: &[S],
    ) -> TesseraResult<IndexMap<String, String>> {
        let derivation_error = |table: &str| {
            TesseraError::internal_bug(
                "E-ROUTE-001",
                format!("cannot derive binding actual table for {table}"),
                format!("data_source={data_source} primary={primary_logic}.{primary_actual}"),
            )
        };
        let group = self
            .find_binding_group(primary_logic)
            .ok_or_else(|| derivation_error(primary_logic))?;
        let primary = self
            .find_table_rule(primary_logic)
            .ok_or_else(|| derivation_error(primary_logic))?;
        let mut result = IndexMap::with_capacity(other_logic_tables.len());
        for other in other_logic_tables {
            let other = other.as_ref();
            if other.eq_ignore_ascii_case(primary_logic) {
                continue;
            }
            let other_rule = self
                .find_table_rule(other)
                .filter(|_| group.contains(other))
                .ok_or_else(|| derivation_error(other))?;
            let actual = BindingTableGroup::binding_actual_table(
                primary,
                other_rule,
                data_source,
                primary_actual,
            )
            .ok_or_else(|| derivation_error(other))?;
            result.insert(other_rule.logic_table().to_string(), actual);
        }
        Ok(result)
    }

    /// The table's own database strategy, else the default.
    pub fn database_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule
            .own_database_strategy()
            .unwrap_or(&self.default_database_strategy)
    }

    /// The table's own table strategy, else the default.
    pub fn table_strategy<'a>(&'a self, table_rule: &'a TableRule) -> &'a ShardingStrategy {
        table_rule
            .own_table_strategy()
            .unwrap_or(&self.default_table_strategy)
    }

    /// `column` as spelled in the strategy of `logic_table` that uses it,
    /// database strategy first.
    pub fn find_sharding_column(&self, column: &str, logic_table: &str) -> Option<String> {
        let rule = self.find_table_rule(logic_table)?;
        [self.database_strategy(rule), self.table_strategy(rule)]
            .into_iter()
            .flat_map(|s| s.sharding_columns())
            .find(|c| c.eq_ignore_ascii_case(column))
            .map(str::to_string)
    }

    pub fn is_sharding_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_sharding_column(column, logic_table).is_some()
    }

    pub fn is_generate_key_column(&self, column: &str, logic_table: &str) -> bool {
        self.find_table_rule(logic_table)
            .and_then(TableRule::generate_key_column)
            .is_some_and(|c| c.eq_ignore_ascii_case(column))
    }

    /// The configured sharding tables among `logic_tables`, in input order.
    /// Broadcast tables are excluded.
    pub fn sharding_logic_table_names<S: AsRef<str>>(&self, logic_tables: &[S]) -> Vec<String> {
        logic_tables
            .iter()
            .map(|t| t.as_ref())
            .filter(|t| self.is_sharding_table(t) && !self.is_broadcast_table(t))
            .map(str::to_string)
            .collect()
    }

    /// True when the configured tables among `logic_tables` all live on one
    /// and the same data source.
    pub fn is_all_tables_in_same_data_source<S: AsRef<str>>(&self, logic_tables: &[S]) -> bool {
        let sources: IndexSet<String> = logic_tables
            .iter()
            .filter_map(|t| self.find_table_rule(t.as_ref()))
            .flat_map(|r| r.actual_data_source_names())
            .collect();
        sources.len() == 1
    }
}

/// Collects the parts of a rule and validates them together.
#[derive(Debug)]
pub struct ShardingRuleBuilder {
    data_source_names: Vec<String>,
    table_rules: Vec<TableRule>,
    binding_groups: Vec<Vec<String>>,
    broadcast_tables: Vec<String>,
    default_database_strategy: ShardingStrategy,
    default_table_strategy: ShardingStrategy,
}

impl ShardingRuleBuilder {
    fn new<I, S>(data_sources: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            data_source_names: data_sources.into_iter().map(Into::into).collect(),
            table_rules: Vec::new(),
            binding_groups: Vec::new(),
            broadcast_tables: Vec::new(),
            default_database_strategy: ShardingStrategy::None,
            default_table_strategy: ShardingStrategy::None,
        }
    }

    pub fn table(mut self, rule: TableRule) -> Self {
        self.table_rules.push(rule);
        self
    }

    pub fn binding_group<I, S>(mut self, tables: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binding_groups
            .push(tables.into_iter().map(Into::into).collect());
        self
    }

    pub fn broadcast_table(mut self, table: impl Into<String>) -> Self {
        self.broadcast_tables.push(table.into());
        self
    }

    pub fn default_database_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_database_strategy = strategy;
        self
    }

    pub fn default_table_strategy(mut self, strategy: ShardingStrategy) -> Self {
        self.default_table_strategy = strategy;
        self
    }

    pub fn build(self) -> TesseraResult<ShardingRule> {
        if self.data_source_names.is_empty() {
            return Err(ConfigError::NoDataSource.into());
        }
        let mut table_rules: IndexMap<String, TableRule> = IndexMap::new();
        for rule in self.table_rules {
            for node in rule.actual_data_nodes() {
                if !self.data_source_names.contains(&node.data_source) {
                    return Err(ConfigError::UnknownDataSource {
                        data_source: node.data_source.clone(),
                        table: rule.logic_table().to_string(),
                    }
                    .into());
                }
            }
            if rule.actual_data_nodes().is_empty() {
                return Err(ConfigError::InvalidDataNode(format!(
                    "table {} has no actual data nodes",
                    rule.logic_table()
                ))
                .into());
            }
            let k = key(rule.logic_table());
            if table_rules.contains_key(&k) {
                return Err(ConfigError::DuplicateTable(rule.logic_table().to_string()).into());
            }
            table_rules.insert(k, rule);
        }

        let mut binding_groups = Vec::with_capacity(self.binding_groups.len());
        for tables in self.binding_groups {
            let group = BindingTableGroup::new(tables.iter().map(|t| key(t)).collect());
            group.validate(|name| table_rules.get(name))?;
            binding_groups.push(group);
        }
        for (i, group) in binding_groups.iter().enumerate() {
            for other in &binding_groups[i + 1..] {
                if let Some(shared) = group.tables().iter().find(|t| other.contains(t)) {
                    return Err(ConfigError::BindingMismatch {
                        group: other.tables().join(","),
                        table: shared.clone(),
                        reason: "table belongs to more than one binding group".into(),
                    }
                    .into());
                }
            }
        }

        let broadcast_tables = self.broadcast_tables.iter().map(|t| key(t)).collect();
        Ok(ShardingRule {
            data_source_names: self.data_source_names,
            table_rules,
            binding_groups,
            broadcast_tables,
            default_database_strategy: self.default_database_strategy,
            default_table_strategy: self.default_table_strategy,
        })
    }
}
