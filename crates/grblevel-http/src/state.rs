//! Shared application state: the orchestrator handle and the bed-map data
//! directory root.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use grblevel_comm::adapter::MachineAdapter;
use grblevel_orchestrator::Orchestrator;

pub struct AppState<A: MachineAdapter> {
    pub orchestrator: Arc<Orchestrator<A>>,
    pub data_dir: PathBuf,
}

impl<A: MachineAdapter> Clone for AppState<A> {
    fn clone(&self) -> Self {
        Self { orchestrator: self.orchestrator.clone(), data_dir: self.data_dir.clone() }
    }
}

impl<A: MachineAdapter> AppState<A> {
    pub fn new(orchestrator: Arc<Orchestrator<A>>, data_dir: PathBuf) -> Self {
        Self { orchestrator, data_dir }
    }

    /// Resolves a caller-supplied `path` against `data_dir`, rejecting any
    /// component that would escape it (`..`, absolute paths).
    pub fn safe_path(&self, path: &str) -> Option<PathBuf> {
        let mut resolved = self.data_dir.clone();
        for component in Path::new(path).components() {
            match component {
                std::path::Component::Normal(part) => resolved.push(part),
                std::path::Component::CurDir => {}
                _ => return None,
            }
        }
        Some(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblevel_comm::status::MachineState;
    use tokio::sync::broadcast;

    struct NoopAdapter;

    #[async_trait::async_trait]
    impl MachineAdapter for NoopAdapter {
        async fn drain_probes(&self) -> Vec<grblevel_comm::status::ProbeResult> {
            Vec::new()
        }
        async fn reset_probes(&self) {}
        fn state_events(&self) -> broadcast::Receiver<MachineState> {
            broadcast::channel(1).1
        }
        async fn current_state(&self) -> MachineState {
            MachineState::default()
        }
        async fn write_byte(&self, _b: u8) -> Result<(), grblevel_core::error::Error> {
            Ok(())
        }
        async fn write(&self, _bytes: &[u8]) -> Result<u64, grblevel_core::error::Error> {
            Ok(0)
        }
        async fn write_from(
            &self,
            _reader: Box<dyn std::io::Read + Send>,
        ) -> Result<u64, grblevel_core::error::Error> {
            Ok(0)
        }
    }

    fn state() -> AppState<NoopAdapter> {
        AppState::new(Arc::new(Orchestrator::new(Arc::new(NoopAdapter))), PathBuf::from("/data"))
    }

    #[test]
    fn resolves_a_plain_relative_path() {
        let s = state();
        assert_eq!(s.safe_path("bedmap.json"), Some(PathBuf::from("/data/bedmap.json")));
    }

    #[test]
    fn rejects_parent_directory_escape() {
        let s = state();
        assert_eq!(s.safe_path("../etc/passwd"), None);
    }

    #[test]
    fn rejects_absolute_paths() {
        let s = state();
        assert_eq!(s.safe_path("/etc/passwd"), None);
    }
}
