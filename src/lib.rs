//! # grblevel
//!
//! A Grbl streaming controller for CNC machines: a flow-controlled serial
//! protocol engine, a G-code modal-state virtual machine, a Delaunay-mesh
//! bed-levelling pipeline, transport adapters for direct serial and the
//! SPJS websocket bridge, a probe/grid-probe/tool-change orchestrator, and
//! an HTTP facade over all of it.
//!
//! ## Architecture
//!
//! grblevel is organized as a workspace with multiple crates:
//!
//! 1. **grblevel-core** - G-code parsing, the modal-state VM, and error types
//! 2. **grblevel-mesh** - Delaunay triangulation and the mesh leveller
//! 3. **grblevel-comm** - flow-controlled connection handling, serial and SPJS adapters
//! 4. **grblevel-orchestrator** - probe, grid-probe, tool-change and mesh-level sequences
//! 5. **grblevel-http** - the HTTP facade
//! 6. **grblevel** - the daemon binary that wires the above together

#![allow(dead_code)]

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build date (set at compile time)
pub const BUILD_DATE: &str = env!("BUILD_DATE");

/// Initialize logging with the default configuration
///
/// Sets up structured logging with:
/// - Console output with pretty formatting
/// - RUST_LOG environment variable support
/// - UTF timestamps
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::fmt;
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let env_filter = EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into());

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(true)
        .with_level(true)
        .with_thread_ids(true)
        .with_thread_names(true)
        .with_line_number(true)
        .pretty();

    tracing_subscriber::registry().with(env_filter).with(fmt_layer).init();

    Ok(())
}
