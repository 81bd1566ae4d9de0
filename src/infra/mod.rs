//! Infrastructure adapters and runtime bootstrap.

pub mod error;
pub mod http;
pub mod media;
pub mod telemetry;
pub mod tryton;
