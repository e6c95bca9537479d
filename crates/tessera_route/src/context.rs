//! Route context: the physical targets of one statement.

use std::hash::{Hash, Hasher};

use indexmap::IndexSet;
use serde::Serialize;
use tessera_rule::DataNode;

use crate::engine::RouteEngineKind;

/// Logic name to actual name, for a data source or a table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RouteMapper {
    pub logic_name: String,
    pub actual_name: String,
}

impl RouteMapper {
    pub fn new(logic_name: impl Into<String>, actual_name: impl Into<String>) -> Self {
        Self {
            logic_name: logic_name.into(),
            actual_name: actual_name.into(),
        }
    }

    pub fn identity(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            logic_name: name.clone(),
            actual_name: name,
        }
    }
}

/// One physical execution target.
///
/// Two units are equal when their data source mapper and their *set* of
/// table mappers are equal; use [`RouteUnit::same_route`] for the
/// order-sensitive comparison.
#[derive(Debug, Clone, Serialize)]
pub struct RouteUnit {
    pub data_source_mapper: RouteMapper,
    pub table_mappers: Vec<RouteMapper>,
}

impl RouteUnit {
    pub fn new(data_source_mapper: RouteMapper, table_mappers: Vec<RouteMapper>) -> Self {
        Self {
            data_source_mapper,
            table_mappers,
        }
    }

    /// Unit on `data_source` with no table mappers.
    pub fn database(data_source: &str) -> Self {
        Self::new(RouteMapper::identity(data_source), Vec::new())
    }

    pub fn data_source(&self) -> &str {
        &self.data_source_mapper.actual_name
    }

    pub fn find_table_mapper(&self, logic_table: &str) -> Option<&RouteMapper> {
        self.table_mappers
            .iter()
            .find(|m| m.logic_name.eq_ignore_ascii_case(logic_table))
    }

    /// Actual name of `logic_table` in this unit.
    pub fn actual_table(&self, logic_table: &str) -> Option<&str> {
        self.find_table_mapper(logic_table)
            .map(|m| m.actual_name.as_str())
    }

    pub fn logic_table_names(&self) -> Vec<&str> {
        self.table_mappers
            .iter()
            .map(|m| m.logic_name.as_str())
            .collect()
    }

    /// Identical data source mapper and identical table mapper sequence.
    pub fn same_route(&self, other: &RouteUnit) -> bool {
        self.data_source_mapper == other.data_source_mapper
            && self.table_mappers == other.table_mappers
    }

    fn sorted_mappers(&self) -> Vec<&RouteMapper> {
        let mut mappers: Vec<&RouteMapper> = self.table_mappers.iter().collect();
        mappers.sort();
        mappers.dedup();
        mappers
    }
}

impl PartialEq for RouteUnit {
    fn eq(&self, other: &Self) -> bool {
        self.data_source_mapper == other.data_source_mapper
            && self.sorted_mappers() == other.sorted_mappers()
    }
}

impl Eq for RouteUnit {}

impl Hash for RouteUnit {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.data_source_mapper.hash(state);
        self.sorted_mappers().hash(state);
    }
}

/// Every unit one statement executes on, plus routing audit data.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RouteContext {
    engine: Option<RouteEngineKind>,
    units: IndexSet<RouteUnit>,
    /// Data nodes consulted per sharding condition (per VALUES row for an
    /// INSERT), parallel to the statement's conditions.
    original_data_nodes: Vec<Vec<DataNode>>,
    /// Cartesian combinations dropped because their tables landed on
    /// different data sources.
    discarded_combinations: usize,
}

impl RouteContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn engine(&self) -> Option<RouteEngineKind> {
        self.engine
    }

    pub(crate) fn set_engine(&mut self, engine: RouteEngineKind) {
        self.engine = Some(engine);
    }

    /// Add `unit` unless an equal unit exists. Returns whether it was added.
    pub fn add_unit(&mut self, unit: RouteUnit) -> bool {
        self.units.insert(unit)
    }

    pub fn units(&self) -> impl ExactSizeIterator<Item = &RouteUnit> {
        self.units.iter()
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Data sources of all units, in unit order, without duplicates.
    pub fn actual_data_source_names(&self) -> Vec<String> {
        let names: IndexSet<&str> = self.units.iter().map(RouteUnit::data_source).collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn units_on(&self, data_source: &str) -> impl Iterator<Item = &RouteUnit> + '_ {
        let data_source = data_source.to_string();
        self.units
            .iter()
            .filter(move |u| u.data_source() == data_source)
    }

    /// Actual tables of `logic_table` across every unit on `data_source`.
    pub fn actual_table_names(&self, data_source: &str, logic_table: &str) -> Vec<String> {
        let names: IndexSet<&str> = self
            .units_on(data_source)
            .filter_map(|u| u.actual_table(logic_table))
            .collect();
        names.into_iter().map(str::to_string).collect()
    }

    pub fn original_data_nodes(&self) -> &[Vec<DataNode>] {
        &self.original_data_nodes
    }

    pub(crate) fn set_original_data_nodes(&mut self, nodes: Vec<Vec<DataNode>>) {
        self.original_data_nodes = nodes;
    }

    pub fn discarded_combinations(&self) -> usize {
        self.discarded_combinations
    }

    pub(crate) fn set_discarded_combinations(&mut self, count: usize) {
        self.discarded_combinations = count;
    }

    /// Unit-by-unit structural equality, in iteration order.
    pub fn same_route(&self, other: &RouteContext) -> bool {
        self.units.len() == other.units.len()
            && self
                .units
                .iter()
                .zip(other.units.iter())
                .all(|(a, b)| a.same_route(b))
    }

    /// Give every unit an identity mapper for each of `tables` it does not
    /// map yet.
    pub(crate) fn decorate_identity(&mut self, tables: &[String]) {
        if tables.is_empty() {
            return;
        }
        let units = std::mem::take(&mut self.units);
        for mut unit in units {
            for table in tables {
                if unit.find_table_mapper(table).is_none() {
                    unit.table_mappers.push(RouteMapper::identity(table.clone()));
                }
            }
            self.units.insert(unit);
        }
    }
}

impl Extend<RouteUnit> for RouteContext {
    fn extend<I: IntoIterator<Item = RouteUnit>>(&mut self, iter: I) {
        for unit in iter {
            self.add_unit(unit);
        }
    }
}

impl FromIterator<RouteUnit> for RouteContext {
    fn from_iter<I: IntoIterator<Item = RouteUnit>>(iter: I) -> Self {
        let mut ctx = RouteContext::new();
        ctx.extend(iter);
        ctx
    }
}
