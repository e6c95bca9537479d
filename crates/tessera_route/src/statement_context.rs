use serde::Serialize;
use tessera_common::datum::Datum;
use tessera_rule::ShardingRule;
use tessera_sql::BoundStatement;

/// Keys generated for an INSERT that omits its generated key column, one
/// per VALUES row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeneratedKeys {
    pub logic_table: String,
    pub column: String,
    pub values: Vec<Datum>,
}

/// A bound statement with its parameters, prepared once against a rule
/// snapshot and shared by routing and rewriting.
#[derive(Debug, Clone)]
pub struct StatementContext {
    statement: BoundStatement,
    parameters: Vec<Datum>,
    table_names: Vec<String>,
    generated_keys: Option<GeneratedKeys>,
}

impl StatementContext {
    pub fn new(statement: BoundStatement, parameters: Vec<Datum>, rule: &ShardingRule) -> Self {
        let generated_keys = generate_keys(&statement, rule);
        let table_names = statement.table_names();
        Self {
            statement,
            parameters,
            table_names,
            generated_keys,
        }
    }

    pub fn statement(&self) -> &BoundStatement {
        &self.statement
    }

    pub fn parameters(&self) -> &[Datum] {
        &self.parameters
    }

    pub fn parameter(&self, index: usize) -> Option<&Datum> {
        self.parameters.get(index)
    }

    /// Distinct logic tables in order of first appearance.
    pub fn table_names(&self) -> &[String] {
        &self.table_names
    }

    pub fn generated_keys(&self) -> Option<&GeneratedKeys> {
        self.generated_keys.as_ref()
    }
}

fn generate_keys(statement: &BoundStatement, rule: &ShardingRule) -> Option<GeneratedKeys> {
    let insert = statement.insert.as_ref()?;
    let spec = rule.find_table_rule(&insert.table)?.key_generate()?;
    if insert.column_index(&spec.column).is_some() {
        return None;
    }
    let values: Vec<Datum> = insert
        .rows
        .iter()
        .map(|_| spec.generator.next_key())
        .collect();
    tracing::debug!(
        table = %insert.table,
        column = %spec.column,
        rows = values.len(),
        generator = spec.generator.type_name(),
        "generated keys for insert"
    );
    Some(GeneratedKeys {
        logic_table: insert.table.clone(),
        column: spec.column.clone(),
        values,
    })
}
