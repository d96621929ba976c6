//! Tool-change sequence with automatic Z-offset compensation (C9's
//! `ToolChange`).
//!
//! Grounded on `original_source/machine/toolchange.go`: probe the outgoing
//! tool (unless its position is already known), move to the change
//! position and hold for the physical swap, probe the incoming tool zeroed
//! against the outgoing tool's work Z, then apply the resulting Z delta to
//! the stored machine position before returning to it.

use grblevel_comm::adapter::MachineAdapter;
use grblevel_comm::status::Status;
use grblevel_core::error::{Error, ProbeInvalid, StatePrecondition};
use grblevel_core::point::Point;

use crate::orchestrator::{go_to, Orchestrator};
use crate::probe::ProbeOptions;

#[derive(Debug, Clone, Copy)]
pub struct ToolChangeOptions {
    pub change_pos: Point,
    pub probe_pos: Point,
    pub feed_rate: f64,
    pub max_travel: f64,
    pub travel_height: f64,
    /// The outgoing tool's machine Z, if already known from a prior call.
    pub last_tool_pos: Option<Point>,
}

impl<A: MachineAdapter> Orchestrator<A> {
    pub async fn tool_change(&self, opt: ToolChangeOptions) -> Result<(), Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }

        let mut last_tool_pos = opt.last_tool_pos;
        if last_tool_pos.is_none() {
            let p = self.tool_probe(&opt, false, 0.0).await?;
            last_tool_pos = Some(p);
            self.hold("Probe complete, remove Z-Probe.").await?;
        }
        let last_tool_pos = last_tool_pos.expect("set above");

        self.run_blocks(go_to(opt.travel_height, opt.change_pos)).await?;
        self.hold("Perform tool change.").await?;

        let last_tool_wpos = last_tool_pos - state.wco;
        let new_tool_pos = self.tool_probe(&opt, true, last_tool_wpos.z).await?;

        let diff = last_tool_pos.z - new_tool_pos.z;
        let mut resume_pos = state.mpos;
        resume_pos.z -= diff;
        tracing::info!(diff, "adjusting Z-offset after tool change");

        self.hold("Probe complete, remove Z-Probe.").await?;

        self.run_blocks(go_to(opt.travel_height, resume_pos)).await?;
        Ok(())
    }

    async fn tool_probe(&self, opt: &ToolChangeOptions, zero: bool, offset: f64) -> Result<Point, Error> {
        self.run_blocks(go_to(opt.travel_height, opt.probe_pos)).await?;

        let result = self
            .probe_z(&ProbeOptions {
                wait: true,
                max_travel: opt.max_travel,
                feed_rate: opt.feed_rate,
                zero_z_axis: zero,
                offset,
            })
            .await?;

        if !result.valid {
            return Err(Error::from(ProbeInvalid));
        }
        Ok(result.point)
    }
}
