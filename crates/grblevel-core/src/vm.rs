//! The G-code virtual machine: modal state plus machine/work coordinate
//! resolution for a stream of validated blocks.

use crate::block::Block;
use crate::error::ValidateError;
use crate::modal_group::{self, ModalGroup};
use crate::point::Point;
use crate::word::Word;

const G53: Word = Word { letter: b'G', arg: 53.0 };

fn supported(w: Word) -> bool {
    if w.is_axis() {
        return true;
    }
    match w.letter {
        b'G' => matches!(w.arg, 0.0 | 1.0 | 91.0 | 90.0 | 20.0 | 21.0 | 94.0),
        b'F' => true,
        b'M' => matches!(w.arg, 3.0 | 5.0),
        _ => false,
    }
}

/// Overwrites only the axes named in `args`, scaling each argument by
/// `mul`; axes not mentioned keep `base`'s value.
fn apply(base: Point, args: &Block, mul: f64) -> Point {
    let mut p = base;
    for w in &args.0 {
        match w.letter {
            b'X' => p.x = w.arg * mul,
            b'Y' => p.y = w.arg * mul,
            b'Z' => p.z = w.arg * mul,
            _ => {}
        }
    }
    p
}

#[derive(Debug, Clone, Copy)]
pub struct Vm {
    pos: Point,
    wco: Point,
    modal: [f64; modal_group::COUNT],
    feed: f64,
}

impl Default for Vm {
    fn default() -> Self {
        let mut modal = [0.0; modal_group::COUNT];
        modal[ModalGroup::Motion.index().unwrap()] = 0.0;
        modal[ModalGroup::CoordinateSystem.index().unwrap()] = 54.0;
        modal[ModalGroup::PlaneSelection.index().unwrap()] = 17.0;
        modal[ModalGroup::DistanceMode.index().unwrap()] = 90.0;
        modal[ModalGroup::ArcDistanceMode.index().unwrap()] = 91.1;
        modal[ModalGroup::FeedRateMode.index().unwrap()] = 94.0;
        modal[ModalGroup::Units.index().unwrap()] = 21.0;
        modal[ModalGroup::CutterCompensationMode.index().unwrap()] = 40.0;
        modal[ModalGroup::ToolLength.index().unwrap()] = 49.0;
        modal[ModalGroup::Stopping.index().unwrap()] = 0.0;
        modal[ModalGroup::Spindle.index().unwrap()] = 5.0;
        modal[ModalGroup::Coolant.index().unwrap()] = 9.0;

        Self { pos: Point::default(), wco: Point::default(), modal, feed: 0.0 }
    }
}

impl Vm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_inches(&self) -> bool {
        self.modal[ModalGroup::Units.index().unwrap()] == 20.0
    }

    pub fn is_relative_motion(&self) -> bool {
        self.modal[ModalGroup::DistanceMode.index().unwrap()] == 91.0
    }

    pub fn mpos(&self) -> Point {
        self.pos
    }

    pub fn set_mpos(&mut self, p: Point) {
        self.pos = p;
    }

    pub fn wco(&self) -> Point {
        self.wco
    }

    pub fn set_wco(&mut self, p: Point) {
        self.wco = p;
    }

    pub fn wpos(&self) -> Point {
        self.pos - self.wco
    }

    pub fn feed(&self) -> f64 {
        self.feed
    }

    /// Validates and executes `block` against the current modal state,
    /// leaving state untouched on any failure.
    pub fn run(&mut self, block: &Block) -> Result<(), ValidateError> {
        block.validate()?;

        let mut machine_coords = false;
        for w in &block.0 {
            if !supported(*w) {
                tracing::warn!(word = %w, "rejected unsupported modal code");
                return Err(ValidateError::UnsupportedCode);
            }
            if *w == G53 {
                machine_coords = true;
            }
        }

        // Modal update happens after the support check so a rejected block
        // never partially mutates state.
        let mut modal = self.modal;
        for w in &block.0 {
            if let Some(idx) = w.modal_group().index() {
                if w.modal_group() != ModalGroup::NonModal {
                    modal[idx] = w.arg;
                }
            }
            if w.letter == b'F' {
                self.feed = w.arg;
            }
        }
        self.modal = modal;

        let args = block.args();
        if args.0.is_empty() {
            return Ok(());
        }

        let mul = if self.is_inches() { 2.54 } else { 1.0 };

        if self.is_relative_motion() {
            self.pos = self.pos + apply(Point::default(), &args, mul);
        } else if machine_coords {
            self.pos = apply(self.pos, &args, 1.0);
        } else {
            self.pos = apply(self.wpos(), &args, mul) + self.wco;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(words: &[(u8, f64)]) -> Block {
        Block::new(words.iter().map(|&(l, a)| Word::new(l, a)).collect())
    }

    #[test]
    fn defaults_match_grbl() {
        let vm = Vm::new();
        assert!(!vm.is_inches());
        assert!(!vm.is_relative_motion());
        assert_eq!(vm.mpos(), Point::default());
    }

    #[test]
    fn relative_move_is_independent_of_prior_position() {
        let mut vm = Vm::new();
        vm.run(&block(&[(b'G', 91.0)])).unwrap();
        vm.set_mpos(Point::new(100.0, 100.0, 0.0));
        vm.run(&block(&[(b'G', 0.0), (b'X', 3.0), (b'F', 500.0)])).unwrap();
        assert_eq!(vm.mpos(), Point::new(103.0, 100.0, 0.0));
    }

    #[test]
    fn absolute_move_resolves_through_work_offset() {
        let mut vm = Vm::new();
        vm.set_wco(Point::new(10.0, 0.0, 0.0));
        vm.run(&block(&[(b'G', 90.0), (b'G', 0.0), (b'X', 5.0)])).unwrap();
        assert_eq!(vm.mpos(), Point::new(15.0, 0.0, 0.0));
    }

    #[test]
    fn g53_move_ignores_work_offset_and_units() {
        let mut vm = Vm::new();
        vm.set_wco(Point::new(10.0, 0.0, 0.0));
        vm.run(&block(&[(b'G', 20.0)])).unwrap();
        vm.run(&block(&[(b'G', 53.0), (b'G', 0.0), (b'X', 5.0)])).unwrap();
        assert_eq!(vm.mpos(), Point::new(5.0, 0.0, 0.0));
    }

    #[test]
    fn unsupported_code_is_rejected_and_state_is_unchanged() {
        let mut vm = Vm::new();
        let before = vm.mpos();
        let err = vm.run(&block(&[(b'G', 2.0), (b'X', 1.0)])).unwrap_err();
        assert_eq!(err, ValidateError::UnsupportedCode);
        assert_eq!(vm.mpos(), before);
    }

    #[test]
    fn inches_convert_to_millimetres() {
        let mut vm = Vm::new();
        vm.run(&block(&[(b'G', 20.0)])).unwrap();
        vm.run(&block(&[(b'G', 91.0), (b'X', 1.0)])).unwrap();
        assert!((vm.mpos().x - 2.54).abs() < 1e-9);
    }
}
