use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Statement binding error: {0}")]
    Binding(String),

    #[error("Sharding strategy of table {table} has no sharding column")]
    MissingShardingColumn { table: String },

    #[error("Sharding algorithm {name} is not configured (referenced by table {table})")]
    AlgorithmNotFound { name: String, table: String },

    #[error("Unknown sharding algorithm type: {algorithm_type}")]
    UnknownAlgorithmType { algorithm_type: String },

    #[error("Invalid property {key} for {owner}: {reason}")]
    InvalidProperty {
        owner: String,
        key: String,
        reason: String,
    },

    #[error("Inline expression error in '{expression}': {reason}")]
    InlineExpression { expression: String, reason: String },

    #[error(
        "Sharding algorithm {algorithm} routed {table}.{column} = {value} to {target}, \
         which is not in available targets {available:?}"
    )]
    TargetNotAvailable {
        algorithm: String,
        table: String,
        column: String,
        value: String,
        target: String,
        available: Vec<String>,
    },

    #[error("Sharding algorithm {algorithm} cannot route {table}.{column}: {reason}")]
    AlgorithmFailed {
        algorithm: String,
        table: String,
        column: String,
        reason: String,
    },

    #[error("Unsupported sharding value for {table}.{column}: {value}")]
    InvalidShardingValue {
        table: String,
        column: String,
        value: String,
    },

    #[error(
        "Actual data node {data_source}.{table} is not configured for logic table {logic_table}"
    )]
    DataNodeNotFound {
        logic_table: String,
        data_source: String,
        table: String,
    },

    #[error("No route unit produced for statement on tables {tables:?}")]
    Unroutable { tables: Vec<String> },

    #[error("Unsupported statement: {reason}")]
    UnsupportedStatement { reason: String },

    #[error("Parameter index {index} out of range ({count} parameters)")]
    ParameterIndexOutOfRange { index: usize, count: usize },

    #[error("Invalid pagination value: {0}")]
    InvalidPagination(String),

    #[error("Encryptor {name} failed: {reason}")]
    Encrypt { name: String, reason: String },

    #[error(
        "SQL tokens overlap: [{first_start}, {first_stop}] and [{second_start}, {second_stop}]"
    )]
    TokenOverlap {
        first_start: usize,
        first_stop: usize,
        second_start: usize,
        second_stop: usize,
    },

    #[error("SQL token [{start}, {stop}] is outside SQL of length {len}")]
    TokenOutOfBounds { start: usize, stop: usize, len: usize },
}

/// Coarse classification used by callers to decide how an error is surfaced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Rule-build time, fatal for the configuration.
    Configuration,
    /// Per-query, user visible.
    Routing,
    /// Per-query, no route unit.
    Unroutable,
    /// Defect in a token generator or rewriter.
    Internal,
}

impl Error {
    pub fn error_code(&self) -> i32 {
        match self {
            Error::Io(_) => -1,
            Error::Serialization(_) => -2,
            Error::Config(_) => -3,
            Error::Binding(_) => -9,
            Error::MissingShardingColumn { .. } => -4,
            Error::AlgorithmNotFound { .. } => -5,
            Error::UnknownAlgorithmType { .. } => -6,
            Error::InvalidProperty { .. } => -7,
            Error::InlineExpression { .. } => -8,
            Error::TargetNotAvailable { .. } => -20,
            Error::AlgorithmFailed { .. } => -21,
            Error::InvalidShardingValue { .. } => -22,
            Error::DataNodeNotFound { .. } => -23,
            Error::Unroutable { .. } => -24,
            Error::UnsupportedStatement { .. } => -25,
            Error::ParameterIndexOutOfRange { .. } => -26,
            Error::InvalidPagination(_) => -27,
            Error::Encrypt { .. } => -28,
            Error::TokenOverlap { .. } => -40,
            Error::TokenOutOfBounds { .. } => -41,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Io(_)
            | Error::Serialization(_)
            | Error::Config(_)
            | Error::MissingShardingColumn { .. }
            | Error::AlgorithmNotFound { .. }
            | Error::UnknownAlgorithmType { .. }
            | Error::InvalidProperty { .. }
            | Error::InlineExpression { .. } => ErrorKind::Configuration,
            Error::Unroutable { .. } => ErrorKind::Unroutable,
            Error::Binding(_) => ErrorKind::Internal,
            Error::TokenOverlap { .. } | Error::TokenOutOfBounds { .. } => ErrorKind::Internal,
            _ => ErrorKind::Routing,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.kind() == ErrorKind::Internal
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        let overlap = Error::TokenOverlap {
            first_start: 0,
            first_stop: 5,
            second_start: 3,
            second_stop: 8,
        };
        assert!(overlap.is_internal());
        assert_eq!(overlap.error_code(), -40);

        let unroutable = Error::Unroutable {
            tables: vec!["t_order".to_string()],
        };
        assert_eq!(unroutable.kind(), ErrorKind::Unroutable);

        let config = Error::MissingShardingColumn {
            table: "t_order".to_string(),
        };
        assert_eq!(config.kind(), ErrorKind::Configuration);
    }

    #[test]
    fn test_target_not_available_message_carries_payload() {
        let err = Error::TargetNotAvailable {
            algorithm: "MOD".to_string(),
            table: "t_order".to_string(),
            column: "order_id".to_string(),
            value: "7".to_string(),
            target: "t_order_7".to_string(),
            available: vec!["t_order_0".to_string(), "t_order_1".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("t_order.order_id = 7"));
        assert!(message.contains("t_order_7"));
        assert!(message.contains("t_order_1"));
        assert_eq!(err.kind(), ErrorKind::Routing);
    }
}
