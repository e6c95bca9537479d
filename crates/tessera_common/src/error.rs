use thiserror::Error;

/// Convenience alias for `Result<T, TesseraError>`.
pub type TesseraResult<T> = Result<T, TesseraError>;

/// Error classification for caller decisions.
///
/// - `Configuration`: bad rule document; the load or reload is rejected
/// - `Unsupported`: the statement cannot be routed; it is rejected, never executed
/// - `Transient`: metadata fetch failure, cancellation, timeout; the caller MAY retry
/// - `InternalBug`: router and rewriter disagree; triggers alert + diagnostic dump
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Unsupported,
    Transient,
    InternalBug,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Configuration => "configuration",
            ErrorKind::Unsupported => "unsupported",
            ErrorKind::Transient => "transient",
            ErrorKind::InternalBug => "internal_bug",
        }
    }
}

/// Top-level error type that all crate-specific errors convert into.
#[derive(Error, Debug)]
pub enum TesseraError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Route error: {0}")]
    Route(#[from] RouteError),

    #[error("Rewrite error: {0}")]
    Rewrite(#[from] RewriteError),

    #[error("Metadata error: {0}")]
    Metadata(#[from] MetadataError),

    #[error("Internal error: {0}")]
    Internal(String),

    /// Internal bug: should never occur in production.
    /// Always carries a unique `error_code` and `debug_context` for post-mortem.
    #[error("InternalBug [{error_code}]: {message} | context: {debug_context}")]
    InternalBug {
        error_code: &'static str,
        message: String,
        debug_context: String,
    },
}

/// Rule document / props errors. Raised at load time only.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Undefined sharding algorithm '{name}' referenced by {referenced_by}")]
    UndefinedAlgorithm { name: String, referenced_by: String },

    #[error("Undefined key generator '{name}' referenced by {referenced_by}")]
    UndefinedKeyGenerator { name: String, referenced_by: String },

    #[error("Invalid sharding algorithm '{name}': {reason}")]
    InvalidAlgorithm { name: String, reason: String },

    #[error("Invalid inline expression '{expression}': {reason}")]
    InvalidInlineExpression { expression: String, reason: String },

    #[error("Invalid data node '{0}': expected <data_source>.<table>")]
    InvalidDataNode(String),

    #[error("Unknown data source '{data_source}' in table {table}")]
    UnknownDataSource { data_source: String, table: String },

    #[error("Duplicate table rule '{0}'")]
    DuplicateTable(String),

    #[error("Binding group [{group}] mismatch on table {table}: {reason}")]
    BindingMismatch {
        group: String,
        table: String,
        reason: String,
    },

    #[error("Invalid strategy for table {table}: {reason}")]
    InvalidStrategy { table: String, reason: String },

    #[error("No data source configured")]
    NoDataSource,
}

/// Routing errors. Every variant rejects the statement.
#[derive(Error, Debug)]
pub enum RouteError {
    #[error("Sharding column '{column}' of table {table} cannot be updated to a value that moves the row to another shard")]
    ShardingKeyUpdate { table: String, column: String },

    #[error("Cross data source join is not supported: {detail}")]
    CrossDataSourceJoin { detail: String },

    #[error("No data node of table {table} matches sharding value {value}")]
    NoDataNode { table: String, value: String },

    #[error("Range query is not supported by sharding algorithm {algorithm}")]
    UnsupportedRange { algorithm: String },

    #[error("Sharding algorithm {algorithm} cannot shard value {value}: {reason}")]
    InvalidShardingValue {
        algorithm: String,
        value: String,
        reason: String,
    },

    #[error("Hint value is required for table {0}")]
    MissingHint(String),

    #[error("Unsupported statement: {0}")]
    UnsupportedStatement(String),
}

/// Rewrite errors caused by statement input (not by router disagreement).
#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("Pagination parameter ${index} must be a non-negative integer, got {value}")]
    InvalidPaginationValue { index: usize, value: String },

    #[error("Unsupported rewrite: {0}")]
    Unsupported(String),
}

/// Metadata loading errors.
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Fetch of {table} from data source {data_source} failed: {reason}")]
    Fetch {
        data_source: String,
        table: String,
        reason: String,
    },

    #[error("Metadata load cancelled")]
    Cancelled,

    #[error("Metadata load timed out after {0}ms")]
    Timeout(u64),

    #[error("Table {table} missing from data source {data_source}")]
    TableMissing { data_source: String, table: String },

    #[error("Metadata worker panicked: {0}")]
    WorkerPanicked(String),
}

// ── TesseraError classification & helpers ────────────────────────────────────

impl TesseraError {
    /// Classify this error for caller decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            TesseraError::Config(_) => ErrorKind::Configuration,

            TesseraError::Route(_) => ErrorKind::Unsupported,
            TesseraError::Rewrite(_) => ErrorKind::Unsupported,

            TesseraError::Metadata(MetadataError::Fetch { .. }) => ErrorKind::Transient,
            TesseraError::Metadata(MetadataError::Cancelled) => ErrorKind::Transient,
            TesseraError::Metadata(MetadataError::Timeout(_)) => ErrorKind::Transient,
            TesseraError::Metadata(MetadataError::TableMissing { .. }) => {
                ErrorKind::Configuration
            }

            TesseraError::Metadata(MetadataError::WorkerPanicked(_)) => ErrorKind::InternalBug,
            TesseraError::InternalBug { .. } => ErrorKind::InternalBug,
            TesseraError::Internal(_) => ErrorKind::InternalBug,
        }
    }

    /// Returns true if this is a rule/props load failure.
    pub fn is_configuration(&self) -> bool {
        matches!(self.kind(), ErrorKind::Configuration)
    }

    /// Returns true if the statement was rejected without being executed.
    pub fn is_unsupported(&self) -> bool {
        matches!(self.kind(), ErrorKind::Unsupported)
    }

    /// Returns true if the operation may succeed when retried.
    pub fn is_transient(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    /// Returns true if this is an internal bug that should never occur.
    pub fn is_internal_bug(&self) -> bool {
        matches!(self.kind(), ErrorKind::InternalBug)
    }

    /// SQLSTATE a front end reports for this error.
    pub fn sqlstate(&self) -> &'static str {
        match self {
            TesseraError::Route(RouteError::ShardingKeyUpdate { .. }) => "0A000", // feature_not_supported
            TesseraError::Route(RouteError::CrossDataSourceJoin { .. }) => "0A000",
            TesseraError::Route(RouteError::UnsupportedRange { .. }) => "0A000",
            TesseraError::Route(RouteError::UnsupportedStatement(_)) => "0A000",
            TesseraError::Route(RouteError::NoDataNode { .. }) => "22023", // invalid_parameter_value
            TesseraError::Route(RouteError::InvalidShardingValue { .. }) => "22023",
            TesseraError::Route(RouteError::MissingHint(_)) => "22023",
            TesseraError::Rewrite(RewriteError::InvalidPaginationValue { .. }) => "22023",
            TesseraError::Rewrite(RewriteError::Unsupported(_)) => "0A000",
            TesseraError::Config(_) => "F0000", // config_file_error
            TesseraError::Metadata(MetadataError::Cancelled) => "57014", // query_canceled
            TesseraError::Metadata(MetadataError::Timeout(_)) => "57014",
            TesseraError::Metadata(_) => "58000", // system_error
            TesseraError::InternalBug { .. } => "XX000", // internal_error
            TesseraError::Internal(_) => "XX000",
        }
    }

    /// Construct an internal bug error with error code and context.
    pub fn internal_bug(
        error_code: &'static str,
        message: impl Into<String>,
        debug_context: impl Into<String>,
    ) -> Self {
        TesseraError::InternalBug {
            error_code,
            message: message.into(),
            debug_context: debug_context.into(),
        }
    }

    /// Add context string to an error, **preserving error classification**.
    ///
    /// Sub-enum variants keep their variant and are wrapped only when they
    /// carry free text; `InternalBug` gets the context prepended to its
    /// message. `Internal` gets it prepended to the string.
    pub fn with_context(self, ctx: impl Into<String>) -> Self {
        let ctx = ctx.into();
        match self {
            TesseraError::Internal(msg) => TesseraError::Internal(format!("{ctx}: {msg}")),
            TesseraError::InternalBug {
                error_code,
                message,
                debug_context,
            } => TesseraError::InternalBug {
                error_code,
                message: format!("{ctx}: {message}"),
                debug_context,
            },
            TesseraError::Config(ConfigError::Parse(msg)) => {
                TesseraError::Config(ConfigError::Parse(format!("{ctx}: {msg}")))
            }
            TesseraError::Route(RouteError::UnsupportedStatement(msg)) => {
                TesseraError::Route(RouteError::UnsupportedStatement(format!("{ctx}: {msg}")))
            }
            TesseraError::Metadata(MetadataError::Fetch {
                data_source,
                table,
                reason,
            }) => TesseraError::Metadata(MetadataError::Fetch {
                data_source,
                table,
                reason: format!("{ctx}: {reason}"),
            }),
            other => other,
        }
    }

    /// Emit a structured log entry for InternalBug errors.
    /// Must be called for every fatal error before returning it to the caller.
    pub fn log_if_fatal(&self) {
        if let TesseraError::InternalBug {
            error_code,
            message,
            debug_context,
        } = self
        {
            tracing::error!(
                error_code = error_code,
                error_category = "Fatal",
                component = self.affected_component(),
                sqlstate = self.sqlstate(),
                debug_context = debug_context.as_str(),
                "FATAL [{}]: {} | context: {}",
                error_code,
                message,
                debug_context
            );
        }
    }

    fn affected_component(&self) -> &'static str {
        match self {
            TesseraError::Config(_) => "rule",
            TesseraError::Route(_) => "route",
            TesseraError::Rewrite(_) => "rewrite",
            TesseraError::Metadata(_) => "metadata",
            TesseraError::InternalBug { error_code, .. } => {
                if error_code.starts_with("E-REWRITE") {
                    "rewrite"
                } else if error_code.starts_with("E-ROUTE") {
                    "route"
                } else {
                    "internal"
                }
            }
            TesseraError::Internal(_) => "internal",
        }
    }
}

/// Bail with an unsupported-statement error.
/// Usage: `bail_unsupported!("multi-statement {}", sql)`
#[macro_export]
macro_rules! bail_unsupported {
    ($msg:expr) => {
        return Err($crate::error::TesseraError::Route(
            $crate::error::RouteError::UnsupportedStatement(format!("{}", $msg))
        ))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::TesseraError::Route(
            $crate::error::RouteError::UnsupportedStatement(format!($fmt, $($arg)*))
        ))
    };
}

/// Bail with a rule-document parse error.
/// Usage: `bail_config!("props {} must be an integer", key)`
#[macro_export]
macro_rules! bail_config {
    ($msg:expr) => {
        return Err($crate::error::TesseraError::Config(
            $crate::error::ConfigError::Parse(format!("{}", $msg))
        ))
    };
    ($fmt:expr, $($arg:tt)*) => {
        return Err($crate::error::TesseraError::Config(
            $crate::error::ConfigError::Parse(format!($fmt, $($arg)*))
        ))
    };
}

/// Add context to a Result, preserving error classification.
/// Usage: `ShardingRuleConfig::from_toml_str(&text).ctx("rule.toml")?`
pub trait ErrorContext<T> {
    fn ctx(self, context: &str) -> Result<T, TesseraError>;
    fn ctx_with(self, f: impl FnOnce() -> String) -> Result<T, TesseraError>;
}

impl<T, E: Into<TesseraError>> ErrorContext<T> for Result<T, E> {
    fn ctx(self, context: &str) -> Result<T, TesseraError> {
        self.map_err(|e| e.into().with_context(context))
    }
    fn ctx_with(self, f: impl FnOnce() -> String) -> Result<T, TesseraError> {
        self.map_err(|e| e.into().with_context(f()))
    }
}
