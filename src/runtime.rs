//! Runtime glue shared by every worker: tracing setup and cycle counters.

pub mod telemetry;
