//! `GET/PUT/DELETE /data/:path` — bed-map JSON file storage, a single
//! directory root with `AppState::safe_path`'s traversal guard standing in
//! for the teacher's `safePath`.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use grblevel_comm::adapter::MachineAdapter;

use crate::state::AppState;

fn resolve<A: MachineAdapter>(state: &AppState<A>, path: &str) -> Result<std::path::PathBuf, StatusCode> {
    state.safe_path(path).ok_or(StatusCode::BAD_REQUEST)
}

pub async fn get_file<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Path(path): Path<String>,
) -> Result<String, StatusCode> {
    let resolved = resolve(&state, &path)?;
    std::fs::read_to_string(&resolved).map_err(|_| StatusCode::NOT_FOUND)
}

pub async fn put_file<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Path(path): Path<String>,
    body: String,
) -> Result<StatusCode, StatusCode> {
    let resolved = resolve(&state, &path)?;
    if let Some(parent) = resolved.parent() {
        std::fs::create_dir_all(parent).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    }
    std::fs::write(&resolved, body).map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)?;
    Ok(StatusCode::NO_CONTENT)
}

pub async fn delete_file<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Path(path): Path<String>,
) -> Result<StatusCode, StatusCode> {
    let resolved = resolve(&state, &path)?;
    match std::fs::remove_file(&resolved) {
        Ok(()) => Ok(StatusCode::NO_CONTENT),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(StatusCode::NO_CONTENT),
        Err(_) => Err(StatusCode::INTERNAL_SERVER_ERROR),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblevel_comm::status::MachineState;
    use grblevel_orchestrator::Orchestrator;
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

    #[tokio::test]
    async fn round_trips_a_file_through_put_get_delete() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(Orchestrator::new(Arc::new(NoopAdapter))),
            dir.path().to_path_buf(),
        ));

        put_file(State(state.clone()), Path("bed.json".to_string()), "{}".to_string())
            .await
            .unwrap();
        let content = get_file(State(state.clone()), Path("bed.json".to_string())).await.unwrap();
        assert_eq!(content, "{}");

        delete_file(State(state.clone()), Path("bed.json".to_string())).await.unwrap();
        assert_eq!(
            get_file(State(state), Path("bed.json".to_string())).await.unwrap_err(),
            StatusCode::NOT_FOUND
        );
    }

    #[tokio::test]
    async fn rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let state = Arc::new(AppState::new(
            Arc::new(Orchestrator::new(Arc::new(NoopAdapter))),
            dir.path().to_path_buf(),
        ));
        let err = get_file(State(state), Path("../secret".to_string())).await.unwrap_err();
        assert_eq!(err, StatusCode::BAD_REQUEST);
    }
}
