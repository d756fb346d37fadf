//! Per-unit SQL and parameter rewriting.
//!
//! Decorators register token generators and parameter rewriters on a
//! [`SqlRewriteContext`]; the engine generates the tokens once and assembles
//! one [`SqlRewriteUnit`] per route unit.

pub mod context;
pub mod decorator;
pub mod engine;
pub mod pagination;
pub mod parameter;
pub mod token;

pub use context::{GenerateContext, ParameterRewriter, SqlRewriteContext, SqlTokenGenerator};
pub use engine::{assemble, SqlRewriteEngine, SqlRewriteResult, SqlRewriteUnit};
pub use parameter::ParameterBuilder;
pub use token::{SqlToken, TokenKind};
