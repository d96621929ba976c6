//! The transport-agnostic contract an orchestrator drives a controller
//! through, implemented by [`crate::serial_adapter::SerialAdapter`] and
//! [`crate::spjs_adapter::SpjsAdapter`].
//!
//! Grounded on the teacher's `ControllerTrait` (`firmware/grbl/controller.rs`)
//! narrowed to the operations `SPEC_FULL.md`'s orchestrator actually needs,
//! and on `core/event.rs`'s `broadcast`-channel subscription pattern for the
//! state-change stream.

use async_trait::async_trait;
use grblevel_core::error::Error;
use tokio::sync::broadcast;

use crate::status::{MachineState, ProbeResult};

#[async_trait]
pub trait MachineAdapter: Send + Sync {
    /// Atomically returns and clears the accumulated probe results.
    async fn drain_probes(&self) -> Vec<ProbeResult>;

    /// Clears accumulated probe results without returning them.
    async fn reset_probes(&self);

    /// A receiver over every `<Status|...>` update observed from now on.
    fn state_events(&self) -> broadcast::Receiver<MachineState>;

    /// The most recently observed machine state.
    async fn current_state(&self) -> MachineState;

    /// Sends a single byte bypassing buffer accounting (realtime commands).
    async fn write_byte(&self, b: u8) -> Result<(), Error>;

    /// Sends `bytes` through the character-counting protocol, waiting for
    /// the final line's acknowledgment.
    async fn write(&self, bytes: &[u8]) -> Result<u64, Error>;

    /// Streams a reader through the character-counting protocol, waiting
    /// for the final line's acknowledgment. Returns the byte count sent.
    async fn write_from(&self, reader: Box<dyn std::io::Read + Send>) -> Result<u64, Error>;
}
