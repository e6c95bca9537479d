use serde::{Deserialize, Serialize};

use crate::expr::{BoundExpr, ColumnRef};
use crate::token::SqlToken;

/// Statement category as classified by the binder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatementKind {
    Select,
    Insert,
    Update,
    Delete,
    Ddl(DdlKind),
    Dal(DalKind),
    /// GRANT / REVOKE / CREATE USER ...
    Dcl,
    /// BEGIN / COMMIT / ROLLBACK / SAVEPOINT ...
    Tcl,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlKind {
    CreateTable,
    AlterTable,
    DropTable,
    TruncateTable,
    CreateIndex,
    DropIndex,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DalKind {
    Use,
    Set,
    ShowDatabases,
    ShowTables,
    Describe,
    Other,
}

impl StatementKind {
    pub fn is_dml(&self) -> bool {
        matches!(
            self,
            StatementKind::Insert | StatementKind::Update | StatementKind::Delete
        )
    }

    pub fn is_query(&self) -> bool {
        matches!(self, StatementKind::Select)
    }

    pub fn name(&self) -> &'static str {
        match self {
            StatementKind::Select => "select",
            StatementKind::Insert => "insert",
            StatementKind::Update => "update",
            StatementKind::Delete => "delete",
            StatementKind::Ddl(_) => "ddl",
            StatementKind::Dal(_) => "dal",
            StatementKind::Dcl => "dcl",
            StatementKind::Tcl => "tcl",
        }
    }
}

/// Table referenced by a statement, in order of appearance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableRef {
    pub name: String,
    #[serde(default)]
    pub alias: Option<String>,
}

impl TableRef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
        }
    }

    pub fn aliased(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: Some(alias.into()),
        }
    }
}

/// `column = value` from an UPDATE SET clause.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub column: ColumnRef,
    pub value: BoundExpr,
}

/// INSERT target plus VALUES rows. Each row is parallel to `columns`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertClause {
    pub table: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<BoundExpr>>,
}

impl InsertClause {
    pub fn column_index(&self, column: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(column))
    }

    /// Parameter ordinals used by `row`, in order.
    pub fn row_param_indexes(&self, row: usize) -> Vec<usize> {
        self.rows
            .get(row)
            .map(|values| values.iter().flat_map(|v| v.param_indexes()).collect())
            .unwrap_or_default()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaginationValue {
    Literal(i64),
    Param(usize),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default)]
    pub offset: Option<PaginationValue>,
    #[serde(default)]
    pub row_count: Option<PaginationValue>,
}

/// Query shape facts the rewriter needs for pagination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectClause {
    #[serde(default)]
    pub pagination: Option<Pagination>,
    #[serde(default)]
    pub has_aggregation: bool,
    #[serde(default)]
    pub group_by_differs_from_order_by: bool,
}

/// A statement after binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundStatement {
    pub sql: String,
    pub kind: StatementKind,
    #[serde(default)]
    pub tables: Vec<TableRef>,
    #[serde(default)]
    pub where_clause: Option<BoundExpr>,
    #[serde(default)]
    pub assignments: Vec<Assignment>,
    #[serde(default)]
    pub insert: Option<InsertClause>,
    #[serde(default)]
    pub select: Option<SelectClause>,
    #[serde(default)]
    pub tokens: Vec<SqlToken>,
}

impl BoundStatement {
    pub fn new(kind: StatementKind, sql: impl Into<String>) -> Self {
        Self {
            sql: sql.into(),
            kind,
            tables: Vec::new(),
            where_clause: None,
            assignments: Vec::new(),
            insert: None,
            select: None,
            tokens: Vec::new(),
        }
    }

    pub fn with_tables(mut self, tables: Vec<TableRef>) -> Self {
        self.tables = tables;
        self
    }

    pub fn with_where(mut self, predicate: BoundExpr) -> Self {
        self.where_clause = Some(predicate);
        self
    }

    pub fn with_assignments(mut self, assignments: Vec<Assignment>) -> Self {
        self.assignments = assignments;
        self
    }

    pub fn with_insert(mut self, insert: InsertClause) -> Self {
        self.insert = Some(insert);
        self
    }

    pub fn with_select(mut self, select: SelectClause) -> Self {
        self.select = Some(select);
        self
    }

    pub fn with_tokens(mut self, tokens: Vec<SqlToken>) -> Self {
        self.tokens = tokens;
        self
    }

    /// Distinct logic table names in order of first appearance.
    pub fn table_names(&self) -> Vec<String> {
        let mut names: Vec<String> = Vec::with_capacity(self.tables.len());
        for t in &self.tables {
            if !names.iter().any(|n| n.eq_ignore_ascii_case(&t.name)) {
                names.push(t.name.clone());
            }
        }
        names
    }

    /// Resolve a column owner (alias or table name) to the table name.
    pub fn resolve_owner(&self, owner: &str) -> Option<&str> {
        self.tables
            .iter()
            .find(|t| {
                t.alias
                    .as_deref()
                    .is_some_and(|a| a.eq_ignore_ascii_case(owner))
            })
            .or_else(|| {
                self.tables
                    .iter()
                    .find(|t| t.name.eq_ignore_ascii_case(owner))
            })
            .map(|t| t.name.as_str())
    }

    pub fn pagination(&self) -> Option<&Pagination> {
        self.select.as_ref().and_then(|s| s.pagination.as_ref())
    }
}
