//! Typed SQL operation trees, rewrite plugins and multi-dialect compilation.

pub mod ast;
pub mod config;
pub mod db;
pub mod error;

pub use error::{DriverError, QueryError, Result};
