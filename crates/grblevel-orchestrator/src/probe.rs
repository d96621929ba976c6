//! Straight Z-probe sequence (C9's `ProbeZ`).
//!
//! Grounded on `original_source/machine/probe.go`; the non-zeroing `G92`
//! emission bug noted in the spec's known hazards (`probe.go`'s
//! `probeCommand` only appends it when `zero` is true, which this mirrors
//! exactly — some variants in the wild omit that guard).

use grblevel_comm::adapter::MachineAdapter;
use grblevel_comm::status::{ProbeResult, Status};
use grblevel_core::block::Block;
use grblevel_core::error::{Error, NoProbeData, StatePrecondition};
use grblevel_core::point::Point;
use grblevel_core::word::Word;

use crate::orchestrator::Orchestrator;

#[derive(Debug, Clone, Copy)]
pub struct ProbeOptions {
    pub zero_z_axis: bool,
    /// The Z value to zero to when `zero_z_axis` is set.
    pub offset: f64,
    pub feed_rate: f64,
    pub max_travel: f64,
    /// Enter a hold ("Attach Z-Probe to spindle.") before probing.
    pub wait: bool,
}

impl ProbeOptions {
    fn probe_command(&self, zero: bool, lift: f64) -> Vec<Block> {
        let mut blocks = vec![Block::new(vec![
            Word::new(b'G', 91.0),
            Word::new(b'G', 38.2),
            Word::new(b'Z', self.max_travel),
            Word::new(b'F', self.feed_rate),
        ])];
        if zero {
            blocks.push(Block::new(vec![Word::new(b'G', 92.0), Word::new(b'Z', self.offset)]));
        }
        blocks.push(Block::new(vec![
            Word::new(b'G', 53.0),
            Word::new(b'G', 0.0),
            Word::new(b'Z', lift),
        ]));
        blocks
    }

    pub(crate) fn generate(&self, mpos: Point) -> Vec<Block> {
        self.probe_command(self.zero_z_axis, mpos.z)
    }

    /// Crate-visible access to the raw probe command, for callers (the
    /// probe-grid and tool-change sequences) composing it with other moves.
    pub(crate) fn probe_command_pub(&self, zero: bool, lift: f64) -> Vec<Block> {
        self.probe_command(zero, lift)
    }
}

impl<A: MachineAdapter> Orchestrator<A> {
    /// Performs a straight Z-probe from the current location.
    pub async fn probe_z(&self, opt: &ProbeOptions) -> Result<ProbeResult, Error> {
        if opt.wait {
            self.hold("Attach Z-Probe to spindle.").await?;
        }

        let state = self.current_state().await;
        if state.status != Status::Idle && state.status != Status::Hold(0) {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }

        self.adapter.reset_probes().await;
        self.run_blocks(opt.generate(state.mpos)).await?;

        let probes = self.adapter.drain_probes().await;
        probes.into_iter().next().ok_or_else(|| Error::from(NoProbeData))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_zeroing_probe_omits_g92() {
        let opt = ProbeOptions { zero_z_axis: false, offset: 0.0, feed_rate: 10.0, max_travel: -25.0, wait: false };
        let blocks = opt.generate(Point::new(1.0, 2.0, -5.0));
        assert_eq!(blocks.len(), 2);
        assert!(blocks.iter().all(|b| b.arg(b'G') != Some(92.0)));
    }

    #[test]
    fn zeroing_probe_includes_g92_with_offset() {
        let opt = ProbeOptions { zero_z_axis: true, offset: -1.5, feed_rate: 10.0, max_travel: -25.0, wait: false };
        let blocks = opt.generate(Point::new(1.0, 2.0, -5.0));
        assert_eq!(blocks.len(), 3);
        assert_eq!(blocks[1].arg(b'G'), Some(92.0));
        assert_eq!(blocks[1].arg(b'Z'), Some(-1.5));
    }
}
