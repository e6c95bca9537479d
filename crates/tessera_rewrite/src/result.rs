use serde::Serialize;
use tessera_common::datum::Datum;
use tessera_route::RouteUnit;

/// Physical SQL plus the parameters it binds, in marker order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlRewriteUnit {
    pub sql: String,
    pub parameters: Vec<Datum>,
}

impl SqlRewriteUnit {
    pub fn new(sql: impl Into<String>, parameters: Vec<Datum>) -> Self {
        Self {
            sql: sql.into(),
            parameters,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SqlRewriteResult {
    /// The statement was not routed; it runs unchanged.
    Generic(SqlRewriteUnit),
    /// One rewritten statement per route unit, in route order.
    Routed(Vec<(RouteUnit, SqlRewriteUnit)>),
}

impl SqlRewriteResult {
    pub fn len(&self) -> usize {
        match self {
            SqlRewriteResult::Generic(_) => 1,
            SqlRewriteResult::Routed(units) => units.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_generic(&self) -> bool {
        matches!(self, SqlRewriteResult::Generic(_))
    }

    /// Every rewritten statement with the unit it targets (none when
    /// generic).
    pub fn units(&self) -> Vec<(Option<&RouteUnit>, &SqlRewriteUnit)> {
        match self {
            SqlRewriteResult::Generic(unit) => vec![(None, unit)],
            SqlRewriteResult::Routed(units) => units.iter().map(|(r, u)| (Some(r), u)).collect(),
        }
    }

    /// The rewritten statement for the unit on `data_source` mapping
    /// `logic_table` to `actual_table`.
    pub fn find(
        &self,
        data_source: &str,
        logic_table: &str,
        actual_table: &str,
    ) -> Option<&SqlRewriteUnit> {
        let SqlRewriteResult::Routed(units) = self else {
            return None;
        };
        units
            .iter()
            .find(|(r, _)| {
                r.data_source() == data_source && r.actual_table(logic_table) == Some(actual_table)
            })
            .map(|(_, u)| u)
    }
}
