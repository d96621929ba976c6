//! Grid-pattern Z-probe sequence (C9's `ProbeZGrid`), used to capture a bed
//! map for later mesh levelling.
//!
//! Grounded on `original_source/machine/probegrid.go`: a 5-point "quick"
//! corner+center pass establishes a safe lift height, then a serpentine
//! fine pass probes every node of the requested granularity.

use grblevel_comm::adapter::MachineAdapter;
use grblevel_comm::status::{ProbeResult, Status};
use grblevel_core::block::Block;
use grblevel_core::error::{Error, NoProbeData, StatePrecondition};
use grblevel_core::point::Point;
use grblevel_core::word::Word;

use crate::orchestrator::Orchestrator;
use crate::probe::ProbeOptions;

#[derive(Debug, Clone, Copy)]
pub struct ProbeGridOptions {
    pub probe: ProbeOptions,
    pub distance_x: f64,
    pub distance_y: f64,
    pub granularity: f64,
}

fn rapid_machine_xyz(x: Option<f64>, y: Option<f64>, z: Option<f64>) -> Block {
    let mut words = vec![Word::new(b'G', 53.0), Word::new(b'G', 0.0)];
    if let Some(x) = x {
        words.push(Word::new(b'X', x));
    }
    if let Some(y) = y {
        words.push(Word::new(b'Y', y));
    }
    if let Some(z) = z {
        words.push(Word::new(b'Z', z));
    }
    Block::new(words)
}

impl ProbeGridOptions {
    fn generate_grid_quick(&self, mpos: Point) -> Vec<Block> {
        let mut blocks = self.probe.probe_command_pub(self.probe.zero_z_axis, mpos.z);

        let mut probe_at = |blocks: &mut Vec<Block>, x: f64, y: f64| {
            blocks.push(rapid_machine_xyz(Some(mpos.x + x), Some(mpos.y + y), None));
            blocks.extend(self.probe.probe_command_pub(false, mpos.z));
        };

        probe_at(&mut blocks, 0.0, self.distance_y);
        probe_at(&mut blocks, self.distance_x / 2.0, self.distance_y / 2.0);
        probe_at(&mut blocks, self.distance_x, 0.0);
        probe_at(&mut blocks, self.distance_x, self.distance_y);

        blocks.push(rapid_machine_xyz(Some(mpos.x), Some(mpos.y), None));
        blocks
    }

    fn generate_grid_sequence(&self, mpos: Point, z_height: f64) -> Vec<Block> {
        let xy_dist = (self.granularity * self.granularity / 2.0).sqrt();
        let x_count = (self.distance_x / xy_dist).ceil() as u32;
        let y_count = (self.distance_y / xy_dist).ceil() as u32;

        // The fine pass lifts to z_height (above mpos.z) before probing, so
        // the relative G38.2 travel has to grow by the same amount or the
        // probe undershoots/overshoots the surface from its elevated start.
        let mut probe = self.probe;
        probe.max_travel -= mpos.z - z_height;

        let mut blocks = vec![rapid_machine_xyz(None, None, Some(z_height))];

        for y in 0..=y_count {
            for x in 0..=x_count {
                let mut x_val = self.distance_x / x_count as f64 * x as f64;
                if y % 2 != 0 {
                    x_val = self.distance_x - x_val;
                }
                let y_val = self.distance_y / y_count as f64 * y as f64;
                blocks.push(rapid_machine_xyz(Some(mpos.x + x_val), Some(mpos.y + y_val), None));
                blocks.extend(probe.probe_command_pub(false, z_height));
            }
        }

        blocks.push(rapid_machine_xyz(None, None, Some(mpos.z)));
        blocks.push(rapid_machine_xyz(Some(mpos.x), Some(mpos.y), None));
        blocks
    }
}

impl<A: MachineAdapter> Orchestrator<A> {
    /// Performs a grid of straight Z-probes, returning the 5-point "quick"
    /// probes followed by the fine serpentine pass.
    pub async fn probe_z_grid(&self, opt: &ProbeGridOptions) -> Result<Vec<ProbeResult>, Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }

        self.adapter.reset_probes().await;
        self.run_blocks(opt.generate_grid_quick(state.mpos)).await?;

        let start_probes = self.adapter.drain_probes().await;
        if start_probes.is_empty() {
            return Err(Error::from(NoProbeData));
        }

        let max_z = start_probes.iter().map(|p| p.point.z).fold(f64::NEG_INFINITY, f64::max) + 0.2;

        self.run_blocks(opt.generate_grid_sequence(state.mpos, max_z)).await?;
        let fine_probes = self.adapter.drain_probes().await;

        Ok(start_probes.into_iter().chain(fine_probes).collect())
    }
}
