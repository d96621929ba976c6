//! Lazy Block→Block transformation: splits long XY moves into sub-moves
//! bounded by a granularity, then injects a Z compensation derived from a
//! `ZOffsetter`.

use std::collections::VecDeque;

use grblevel_core::block::Block;
use grblevel_core::error::{Error, ValidateError};
use grblevel_core::point::Point;
use grblevel_core::reader::GcodeReader;
use grblevel_core::vm::Vm;

/// Consulted by the leveller for a Z offset at a given machine XY. A no-op
/// offsetter (returning `(false, 0.0)` everywhere) is used when no bed map
/// is configured.
pub trait ZOffsetter {
    fn offset_z(&self, x: f64, y: f64) -> (bool, f64);
}

pub struct NoOffset;

impl ZOffsetter for NoOffset {
    fn offset_z(&self, _x: f64, _y: f64) -> (bool, f64) {
        (false, 0.0)
    }
}

pub struct MeshLeveller<R, Z> {
    granularity: f64,
    offsetter: Z,

    buf: VecDeque<Block>,

    split_vm: Vm,
    level_vm: Vm,

    upstream: R,
}

impl<R: GcodeReader, Z: ZOffsetter> MeshLeveller<R, Z> {
    pub fn new(upstream: R, offsetter: Z, granularity: f64, mpos: Point, wco: Point) -> Self {
        let mut split_vm = Vm::new();
        let mut level_vm = Vm::new();
        split_vm.set_mpos(mpos);
        level_vm.set_mpos(mpos);
        split_vm.set_wco(wco);
        level_vm.set_wco(wco);

        Self {
            granularity,
            offsetter,
            buf: VecDeque::new(),
            split_vm,
            level_vm,
            upstream,
        }
    }

    /// Dequeues a pending split sub-move, or pulls and (if needed) splits
    /// the next upstream block.
    fn next_split(&mut self) -> Result<Option<Block>, Error> {
        if let Some(b) = self.buf.pop_front() {
            return Ok(Some(b));
        }

        let block = match self.upstream.read()? {
            Some(b) => b,
            None => return Ok(None),
        };

        let old = self.split_vm.wpos();
        self.split_vm
            .run(&block)
            .map_err(|e: ValidateError| Error::Validate(e))?;
        let new = self.split_vm.wpos();

        if old == new {
            return Ok(Some(block));
        }

        let dist = old.distance_xy(new.x, new.y);
        if dist <= self.granularity {
            return Ok(Some(block));
        }

        let n = (dist / self.granularity).ceil() as usize;
        let delta = (new - old) / n as f64;

        if self.split_vm.is_relative_motion() {
            let mut sub = block.clone();
            sub.set_arg(b'X', delta.x);
            sub.set_arg(b'Y', delta.y);
            sub.set_arg(b'Z', delta.z);
            for _ in 0..n {
                self.buf.push_back(sub.clone());
            }
        } else {
            for i in 1..=n {
                let mut sub = block.clone();
                let p = old + delta * i as f64;
                sub.set_arg(b'X', p.x);
                sub.set_arg(b'Y', p.y);
                sub.set_arg(b'Z', p.z);
                self.buf.push_back(sub);
            }
        }

        Ok(self.buf.pop_front())
    }
}

impl<R: GcodeReader, Z: ZOffsetter> GcodeReader for MeshLeveller<R, Z> {
    // next_split()/level_vm.run() can only fail on a ValidateError for a
    // block this leveller itself produced by splitting; upstream parse
    // errors flow straight through unchanged.
    fn read(&mut self) -> Result<Option<Block>, grblevel_core::error::ParseError> {
        let block = match self.next_split() {
            Ok(b) => b,
            Err(Error::Parse(e)) => return Err(e),
            Err(_) => {
                // A ValidateError on an already-executing stream has no
                // ParseError representation; surface it as a malformed
                // frame so callers still see a reader-shaped error.
                return Err(grblevel_core::error::ParseError::MalformedFrame(
                    "block rejected by mesh leveller's VM".to_string(),
                ));
            }
        };

        let block = match block {
            Some(b) => b,
            None => return Ok(None),
        };

        let old_wpos = self.level_vm.wpos();
        let old_mpos = self.level_vm.mpos();
        if self.level_vm.run(&block).is_err() {
            return Err(grblevel_core::error::ParseError::MalformedFrame(
                "block rejected by mesh leveller's VM".to_string(),
            ));
        }
        let new_wpos = self.level_vm.wpos();
        let new_mpos = self.level_vm.mpos();

        if old_wpos == new_wpos {
            return Ok(Some(block));
        }

        // The offsetter is built over probe points in machine coordinates,
        // so the lookup uses mpos even though the block's own Z fallback
        // below is expressed in work coordinates.
        let (old_found, old_offset) = self.offsetter.offset_z(old_mpos.x, old_mpos.y);
        if !old_found {
            return Ok(Some(block));
        }
        let (new_found, new_offset) = self.offsetter.offset_z(new_mpos.x, new_mpos.y);
        if !new_found || old_offset == new_offset {
            return Ok(Some(block));
        }

        let mut out = block.clone();
        let cmd_z = out.arg(b'Z');
        let delta = new_offset - old_offset;
        match cmd_z {
            Some(z) => out.set_arg(b'Z', z + delta),
            None => {
                let base = if self.level_vm.is_relative_motion() { 0.0 } else { old_wpos.z };
                out.0.push(grblevel_core::word::Word::new(b'Z', base + delta));
            }
        }

        Ok(Some(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblevel_core::point::Point;
    use grblevel_core::reader::BlocksReader;

    use crate::mesh::Mesh;

    #[test]
    fn pass_through_when_no_xy_motion() {
        let upstream = BlocksReader::new(vec![grblevel_core::parser::parse("G91 Z1\n")
            .unwrap()
            .remove(0)]);
        let mut lvl = MeshLeveller::new(upstream, NoOffset, 1.0, Point::default(), Point::default());
        let out = lvl.read().unwrap().unwrap();
        assert_eq!(out.arg(b'Z'), Some(1.0));
        assert_eq!(out.arg(b'X'), None);
    }

    #[test]
    fn pass_through_when_offsetter_has_no_data() {
        let upstream = BlocksReader::new(vec![grblevel_core::parser::parse("G91 G0 X3\n")
            .unwrap()
            .remove(0)]);
        let mut lvl = MeshLeveller::new(upstream, NoOffset, 10.0, Point::default(), Point::default());
        let out = lvl.read().unwrap().unwrap();
        assert_eq!(out.arg(b'X'), Some(3.0));
        assert_eq!(out.arg(b'Z'), None);
        assert!(lvl.read().unwrap().is_none());
    }

    #[test]
    fn splits_and_levels_per_the_canonical_scenario() {
        let points = vec![
            Point::new(-700.0, -450.0, -80.0),
            Point::new(-700.0, -550.0, -80.0),
            Point::new(-600.0, -450.0, -50.0),
            Point::new(-600.0, -550.0, -50.0),
        ];
        let mesh = Mesh::new(&points).unwrap();

        let upstream = BlocksReader::new(vec![grblevel_core::parser::parse("G91 G0 X3\n")
            .unwrap()
            .remove(0)]);
        let mpos = Point::new(-650.0, -500.0, -60.0);
        let wco = Point::new(-600.0, -750.0, -1.0);
        let mut lvl = MeshLeveller::new(upstream, mesh, 1.0, mpos, wco);

        for _ in 0..3 {
            let out = lvl.read().unwrap().unwrap();
            assert_eq!(out.arg(b'G'), Some(91.0));
            assert_eq!(out.arg(b'X'), Some(1.0));
            assert!((out.arg(b'Z').unwrap() - 0.3).abs() < 1e-6);
        }
        assert!(lvl.read().unwrap().is_none());
    }
}
