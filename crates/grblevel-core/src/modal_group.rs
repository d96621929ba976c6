//! G-code modal groups: the families of words that conflict when two of
//! them appear in the same block (e.g. two motion codes, or two plane
//! selections). Mirrors the 21-way grouping in LinuxCNC's G-code spec.

/// One modal group, or `None` for words that aren't a modal command at all
/// (axis words, `F`-less parameters, comments already stripped).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModalGroup {
    None,
    NonModal,
    Motion,
    Polar,
    PlaneSelection,
    DistanceMode,
    ArcDistanceMode,
    FeedRateMode,
    Units,
    CutterCompensationMode,
    ToolLength,
    CannedCyclesMode,
    CoordinateSystem,
    ControlMode,
    SpindleMode,
    LatheDiameterMode,
    Stopping,
    ToolChange,
    Spindle,
    Coolant,
    Override,
    FeedRate,
}

/// Number of distinct groups, sized to back a VM's modal-state array.
pub const COUNT: usize = 21;

impl ModalGroup {
    /// Index into a `[T; COUNT]` modal-state array, `None` excluded.
    pub fn index(self) -> Option<usize> {
        use ModalGroup::*;
        Some(match self {
            None => return Option::None,
            NonModal => 0,
            Motion => 1,
            Polar => 2,
            PlaneSelection => 3,
            DistanceMode => 4,
            ArcDistanceMode => 5,
            FeedRateMode => 6,
            Units => 7,
            CutterCompensationMode => 8,
            ToolLength => 9,
            CannedCyclesMode => 10,
            CoordinateSystem => 11,
            ControlMode => 12,
            SpindleMode => 13,
            LatheDiameterMode => 14,
            Stopping => 15,
            ToolChange => 16,
            Spindle => 17,
            Coolant => 18,
            Override => 19,
            FeedRate => 20,
        })
    }

    /// The modal group a `(letter, arg)` word belongs to, per the G-code
    /// standard's group table.
    pub fn of(letter: u8, arg: f64) -> ModalGroup {
        use ModalGroup::*;
        match letter {
            b'G' => match arg {
                4.0 | 10.0 | 28.0 | 30.0 | 53.0 | 92.0 | 92.1 | 92.2 | 92.3 => NonModal,
                0.0 | 1.0 | 2.0 | 3.0 | 33.0 | 38.2 | 38.3 | 38.4 | 38.5 | 73.0 | 76.0 | 80.0
                | 81.0 | 82.0 | 83.0 | 84.0 | 85.0 | 86.0 | 87.0 | 88.0 | 89.0 => Motion,
                15.0 | 16.0 => Polar,
                17.0 | 18.0 | 19.0 | 17.1 | 18.1 | 19.1 => PlaneSelection,
                90.0 | 91.0 => DistanceMode,
                90.1 | 91.1 => ArcDistanceMode,
                93.0 | 94.0 | 95.0 => FeedRateMode,
                20.0 | 21.0 => Units,
                40.0 | 41.0 | 41.1 | 42.0 | 42.1 => CutterCompensationMode,
                43.0 | 43.1 | 49.0 | 98.0 | 99.0 => ToolLength,
                54.0 | 55.0 | 56.0 | 57.0 | 58.0 | 59.0 | 59.1 | 59.2 | 59.3 => CoordinateSystem,
                61.0 | 61.1 | 64.0 => ControlMode,
                96.0 | 97.0 => SpindleMode,
                7.0 | 8.0 => LatheDiameterMode,
                _ => None,
            },
            b'M' => match arg {
                0.0 | 1.0 | 2.0 | 30.0 | 60.0 => Stopping,
                6.0 | 61.0 => ToolChange,
                3.0 | 4.0 | 5.0 => Spindle,
                7.0 | 8.0 | 9.0 => Coolant,
                48.0 | 49.0 | 50.0 | 51.0 | 52.0 | 53.0 => Override,
                _ => None,
            },
            b'F' => FeedRate,
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn g0_is_motion() {
        assert_eq!(ModalGroup::of(b'G', 0.0), ModalGroup::Motion);
    }

    #[test]
    fn g92_is_non_modal() {
        assert_eq!(ModalGroup::of(b'G', 92.0), ModalGroup::NonModal);
    }

    #[test]
    fn axis_letters_have_no_group() {
        assert_eq!(ModalGroup::of(b'X', 10.0), ModalGroup::None);
    }

    #[test]
    fn every_non_none_group_has_an_index() {
        use ModalGroup::*;
        for g in [
            NonModal, Motion, Polar, PlaneSelection, DistanceMode, ArcDistanceMode,
            FeedRateMode, Units, CutterCompensationMode, ToolLength, CannedCyclesMode,
            CoordinateSystem, ControlMode, SpindleMode, LatheDiameterMode, Stopping,
            ToolChange, Spindle, Coolant, Override, FeedRate,
        ] {
            assert!(g.index().is_some());
        }
        assert_eq!(None.index(), Option::None);
    }
}
