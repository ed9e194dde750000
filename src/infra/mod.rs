//! Infrastructure adapters and runtime bootstrap.

pub mod batch;
pub mod browser;
pub mod ephemeral;
pub mod error;
pub mod function;
pub mod http;
pub mod site;
pub mod telemetry;
