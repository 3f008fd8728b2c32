//! Auto Advisor MCP Server Library
//!
//! A Model Context Protocol (MCP) server over a table of vehicle sale records.
//! Provides tools for filtering, ranking, and averaging listings, and for
//! estimating a sale price with a linear model fitted on the same table.

pub mod cars;
pub mod config;
pub mod error;
pub mod mcp;

pub use config::Config;
pub use error::{AdvisorError, Result};
