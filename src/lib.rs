//! Signalform – SignalFlow programs and SignalFx resources as Rust values
//!
//! This crate provides:
//! - A typed SignalFlow expression tree that renders to program text
//! - Chart, dashboard, dashboard group and detector definitions validated at
//!   construction
//! - Idempotent create/update/read/delete reconciliation against the REST API
//! - A CLI surface (`cli` feature) for programs that declare resources
//!
//! ```
//! use signalform::charts::Chart;
//! use signalform::flow::{Aggregation, Program, data};
//! use signalform::{Client, MemoryTransport, Syncable};
//!
//! let chart = Chart::time_series()
//!     .with_name("CPU")?
//!     .with_program(Program::new([data("cpu.utilization").mean(Aggregation::all()).publish("A")])?)?;
//!
//! let api = MemoryTransport::new();
//! let client = Client::new(api.clone(), "token")?;
//! client.create(&chart, Default::default())?;
//! assert_eq!(api.entities("chart")[0]["name"], "CPU");
//! # Ok::<(), signalform::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Chart definitions and their typed options
pub mod charts;
/// Client configuration from defaults, file and environment
pub mod config;
/// Dashboards, dashboard groups, filters and event overlays
pub mod dashboards;
/// Detectors and their alert rules
pub mod detectors;
/// Error types shared across the crate
pub mod error;
/// SignalFlow expression tree and program rendering
pub mod flow;
/// Resource identity and the reconciliation engine
pub mod resources;
/// HTTP and in-memory access to the REST API
pub mod transport;

/// Command-line surface for resource definitions
#[cfg(feature = "cli")]
pub mod cli;

// Re-export key types for convenience
pub use charts::Chart;
pub use config::ClientConfig;
pub use dashboards::{Dashboard, DashboardGroup};
pub use detectors::Detector;
pub use error::{Error, Result};
pub use flow::Program;
pub use resources::{ActionFlags, Client, Overrides, Syncable};
pub use transport::{HttpTransport, MemoryTransport};

/// Current version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
