//! The machine orchestrator: wires a [`MachineAdapter`] to the higher-level
//! probe, grid-probe, tool-change and mesh-level sequences.

use std::sync::Arc;

use grblevel_comm::adapter::MachineAdapter;
use grblevel_comm::status::{MachineState, Status};
use grblevel_core::block::Block;
use grblevel_core::buffer::Buffer;
use grblevel_core::error::{Error, StatePrecondition};
use grblevel_core::point::Point;
use grblevel_core::reader::BlocksReader;
use grblevel_core::word::Word;
use tokio::sync::broadcast;

use crate::hold::{HoldChannel, HOLD_CLEARED};

pub struct Orchestrator<A: MachineAdapter> {
    pub(crate) adapter: Arc<A>,
    pub(crate) hold: HoldChannel,
}

impl<A: MachineAdapter> Orchestrator<A> {
    pub fn new(adapter: Arc<A>) -> Self {
        Self { adapter, hold: HoldChannel::new() }
    }

    pub fn hold_messages(&self) -> broadcast::Receiver<String> {
        self.hold.subscribe()
    }

    /// A receiver over every machine-state update observed from now on,
    /// for the HTTP facade's `/events/state` SSE stream.
    pub fn state_events(&self) -> broadcast::Receiver<MachineState> {
        self.adapter.state_events()
    }

    pub async fn current_state(&self) -> MachineState {
        self.adapter.current_state().await
    }

    /// Publishes `message`, sends `M0` and waits for its ack, then publishes
    /// the "cleared" sentinel. The controller itself blocks on `M0` until
    /// the operator sends a cycle-start `~`.
    pub(crate) async fn hold(&self, message: &str) -> Result<(), Error> {
        self.hold.publish(message);
        let result = self.adapter.write(b"M0\n").await;
        self.hold.publish(HOLD_CLEARED);
        result.map(|_| ())
    }

    pub(crate) async fn require_idle(&self) -> Result<MachineState, Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }
        Ok(state)
    }

    pub(crate) async fn require_idle_or_holding(&self) -> Result<MachineState, Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle && state.status != Status::Hold(0) {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }
        Ok(state)
    }

    /// Renders `blocks` through a text buffer and streams it to the device,
    /// waiting for the final line's acknowledgment.
    pub(crate) async fn run_blocks(&self, blocks: Vec<Block>) -> Result<(), Error> {
        let reader = BlocksReader::new(blocks);
        let buf = Buffer::new(reader);
        self.adapter
            .write_from(Box::new(buf) as Box<dyn std::io::Read + Send>)
            .await
            .map(|_| ())
    }
}

/// Lifts to `travel_z` (machine Z), rapids over to `pos`'s XY, then plunges
/// to `pos.z`, all in machine coordinates (`G53`). Shared by tool-change's
/// travel-to-probe and travel-to-change-position moves.
pub(crate) fn go_to(travel_z: f64, pos: Point) -> Vec<Block> {
    vec![
        Block::new(vec![Word::new(b'G', 53.0), Word::new(b'G', 0.0), Word::new(b'Z', travel_z)]),
        Block::new(vec![
            Word::new(b'G', 53.0),
            Word::new(b'G', 0.0),
            Word::new(b'X', pos.x),
            Word::new(b'Y', pos.y),
        ]),
        Block::new(vec![Word::new(b'G', 53.0), Word::new(b'G', 0.0), Word::new(b'Z', pos.z)]),
    ]
}
