//! Parsing for Grbl's two asynchronous report frames: `<Status|...>` (sent
//! in reply to a `?` realtime poll) and `[PRB:...]` (sent after a G38.x
//! probe move completes).
//!
//! Grounded on the teacher's `firmware/grbl/status_parser.rs` field-by-field
//! `Key:Value` splitting, narrowed to the two keys the spec recognises
//! (`MPos`, `WCO`) and generalized from `Option<String>` fields to the
//! shared `grblevel_core::Point`.

use grblevel_core::point::Point;
use serde::{Deserialize, Serialize};

/// Everything the adapter tracks about the controller between polls.
/// `wco` is carried forward from the last report that included it, since
/// Grbl only emits it periodically, not on every status line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MachineState {
    pub status: Status,
    pub mpos: Point,
    pub wco: Point,
}

impl Default for MachineState {
    fn default() -> Self {
        Self { status: Status::Unknown, mpos: Point::default(), wco: Point::default() }
    }
}

/// `Hold`/`Door` carry Grbl's numeric suffix: for `Hold`, `0` means the
/// deceleration has completed and a resume/new command is safe, `1` means
/// the machine is still decelerating. Orchestrator preconditions that
/// accept "holding" specifically require `Hold(0)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Idle,
    Run,
    Hold(u8),
    Jog,
    Alarm,
    Door(u8),
    Check,
    Home,
    Sleep,
    Unknown,
}

impl From<&str> for Status {
    fn from(s: &str) -> Self {
        match s {
            "Idle" => Status::Idle,
            "Run" => Status::Run,
            "Hold" => Status::Hold(0),
            "Jog" => Status::Jog,
            "Alarm" => Status::Alarm,
            "Door" => Status::Door(0),
            "Check" => Status::Check,
            "Home" => Status::Home,
            "Sleep" => Status::Sleep,
            _ if s.starts_with("Hold:") => {
                s[5..].parse().map(Status::Hold).unwrap_or(Status::Hold(0))
            }
            _ if s.starts_with("Door:") => {
                s[5..].parse().map(Status::Door).unwrap_or(Status::Door(0))
            }
            _ => Status::Unknown,
        }
    }
}

/// A `[PRB:x,y,z:flag]` frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub point: Point,
    pub valid: bool,
}

/// A partial update extracted from one `<Status|...>` frame. Fields the
/// frame didn't carry are `None` and should be left unchanged by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct StatusUpdate {
    pub status: Option<Status>,
    pub mpos: Option<Point>,
    pub wco: Option<Point>,
}

/// Parses `<Status|MPos:x,y,z|WCO:x,y,z|...>`. Splits on `|`; the first
/// field is the status word, subsequent fields are `Key:Value`. Unknown
/// keys (`Buf`, `Ov`, `FS`, ...) are ignored.
pub fn parse_status(line: &str) -> Option<StatusUpdate> {
    let inner = line.strip_prefix('<')?.strip_suffix('>')?;
    let mut fields = inner.split('|');
    let status = Status::from(fields.next()?);

    let mut update = StatusUpdate { status: Some(status), mpos: None, wco: None };
    for field in fields {
        if let Some(rest) = field.strip_prefix("MPos:") {
            update.mpos = parse_xyz(rest);
        } else if let Some(rest) = field.strip_prefix("WCO:") {
            update.wco = parse_xyz(rest);
        }
    }
    Some(update)
}

/// Parses `[PRB:x,y,z:flag]`.
pub fn parse_probe(line: &str) -> Option<ProbeResult> {
    let inner = line.strip_prefix("[PRB:")?.strip_suffix(']')?;
    let (coords, flag) = inner.rsplit_once(':')?;
    let point = parse_xyz(coords)?;
    let valid = flag.trim() == "1";
    Some(ProbeResult { point, valid })
}

fn parse_xyz(s: &str) -> Option<Point> {
    let mut parts = s.split(',');
    let x: f64 = parts.next()?.trim().parse().ok()?;
    let y: f64 = parts.next()?.trim().parse().ok()?;
    let z: f64 = parts.next()?.trim().parse().ok()?;
    Some(Point::new(x, y, z))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_status_and_position_fields() {
        let u = parse_status("<Idle|MPos:-10.000,-20.000,-5.000|WCO:-1.000,-2.000,-3.000|FS:0,0>").unwrap();
        assert_eq!(u.status, Some(Status::Idle));
        assert_eq!(u.mpos, Some(Point::new(-10.0, -20.0, -5.0)));
        assert_eq!(u.wco, Some(Point::new(-1.0, -2.0, -3.0)));
    }

    #[test]
    fn missing_wco_leaves_it_none() {
        let u = parse_status("<Run|MPos:1.0,2.0,3.0>").unwrap();
        assert_eq!(u.status, Some(Status::Run));
        assert_eq!(u.mpos, Some(Point::new(1.0, 2.0, 3.0)));
        assert_eq!(u.wco, None);
    }

    #[test]
    fn unknown_status_word_falls_back() {
        let u = parse_status("<SomeNewState|MPos:0,0,0>").unwrap();
        assert_eq!(u.status, Some(Status::Unknown));
    }

    #[test]
    fn parses_valid_probe_frame() {
        let p = parse_probe("[PRB:-10.000,-20.000,-5.250:1]").unwrap();
        assert!(p.valid);
        assert_eq!(p.point, Point::new(-10.0, -20.0, -5.25));
    }

    #[test]
    fn parses_invalid_probe_frame() {
        let p = parse_probe("[PRB:0.000,0.000,0.000:0]").unwrap();
        assert!(!p.valid);
    }

    #[test]
    fn non_frame_lines_do_not_parse() {
        assert!(parse_status("ok").is_none());
        assert!(parse_probe("ok").is_none());
    }
}
