pub mod config;
pub mod datanode;
pub mod error;
pub mod features;
pub mod kernel;
pub mod logging;
pub mod metrics;
pub mod names;
pub mod rewrite;
pub mod route;
pub mod rule;
pub mod sharding;
pub mod statement;
pub mod value;

#[cfg(test)]
mod test_support;

pub use config::{ConfigurationProperties, RuleConfiguration};
pub use datanode::DataNode;
pub use error::{Error, ErrorKind, Result};
pub use kernel::{ExecutionContext, ExecutionUnit, Kernel, QueryContext};
pub use rewrite::{SqlRewriteEngine, SqlRewriteResult, SqlRewriteUnit};
pub use route::{RouteCategory, RouteContext, RouteMapper, RouteUnit, Router};
pub use rule::RuleSet;
pub use sharding::{AlgorithmRegistry, ShardingAlgorithm};
pub use statement::{Arg, StatementBuilder, StatementContext, StatementKind};
pub use value::Value;
