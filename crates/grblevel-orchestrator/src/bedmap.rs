//! Bed-map persistence: the probe points captured by [`crate::probe_grid`]
//! are the sole on-disk artifact this system keeps, a single JSON document
//! loaded back for [`Orchestrator::read_from_level`].
//!
//! Grounded on the teacher's `TemplatePersistence` (`gcodekit5-designer`'s
//! `templates.rs`): `serde_json::to_string_pretty` to a path, `fs::write`,
//! and a missing-file-is-empty load instead of a hard error.

use grblevel_core::point::Point;
use serde::{Deserialize, Serialize};

use grblevel_core::error::Error;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BedMap {
    pub points: Vec<Point>,
}

impl BedMap {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    /// Loads a bed map from `path`; a missing file yields an empty map
    /// rather than an error, matching the teacher's template persistence.
    pub fn load(path: &std::path::Path) -> Result<BedMap, Error> {
        if !path.exists() {
            return Ok(BedMap::default());
        }
        let content = std::fs::read_to_string(path).map_err(Error::Io)?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Parse(grblevel_core::error::ParseError::MalformedFrame(e.to_string())))
    }

    pub fn save(&self, path: &std::path::Path) -> Result<(), Error> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| Error::Parse(grblevel_core::error::ParseError::MalformedFrame(e.to_string())))?;
        std::fs::write(path, json).map_err(Error::Io)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bedmap.json");
        let loaded = BedMap::load(&path).unwrap();
        assert!(loaded.points.is_empty());
    }

    #[test]
    fn round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bedmap.json");
        let map = BedMap::new(vec![Point::new(1.0, 2.0, 3.0), Point::new(4.0, 5.0, 6.0)]);
        map.save(&path).unwrap();
        let loaded = BedMap::load(&path).unwrap();
        assert_eq!(loaded.points, map.points);
    }
}
