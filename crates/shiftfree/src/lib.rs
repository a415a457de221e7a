//! Multi-tenant leave management core.
//!
//! The [`leave`] module carries the auto-approval bot, the request lifecycle with its
//! balance ledger, and the periodic sweep that settles requests still waiting on a verdict.

pub mod config;
pub mod error;
pub mod leave;
pub mod telemetry;
