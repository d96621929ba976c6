//! The machine orchestrator (C9): probe, grid-probe and tool-change
//! sequences, the hold protocol, and mesh-levelled program playback, all
//! driven over a [`grblevel_comm::adapter::MachineAdapter`].

pub mod bedmap;
pub mod hold;
pub mod level;
pub mod orchestrator;
pub mod probe;
pub mod probe_grid;
pub mod tool_change;

pub use bedmap::BedMap;
pub use orchestrator::Orchestrator;
pub use probe::ProbeOptions;
pub use probe_grid::ProbeGridOptions;
pub use tool_change::ToolChangeOptions;
