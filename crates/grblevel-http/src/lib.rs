//! HTTP facade (C10): thin request → orchestrator dispatch, bed-map file
//! storage, and state/hold server-sent-event streams. Out-of-core per
//! `spec.md` §1, but implemented all the same as the ambient outer surface
//! the orchestrator needs *some* caller for (`SPEC_FULL.md` §0/§6).
//!
//! Grounded on `original_source/cmd/gcnc/api.go`'s route table, expressed
//! with `axum` the way the example pack's `regatta-backend` wires a
//! `Router` over `State` + `tower_http`'s CORS layer.

pub mod data;
pub mod error;
pub mod events;
pub mod probe;
pub mod run;
pub mod state;

use std::path::PathBuf;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use grblevel_comm::adapter::MachineAdapter;
use grblevel_orchestrator::Orchestrator;
use tower_http::cors::{Any, CorsLayer};

pub use state::AppState;

/// Builds the full route table over `orchestrator`, rooting bed-map file
/// storage at `data_dir`.
pub fn router<A: MachineAdapter + 'static>(orchestrator: Arc<Orchestrator<A>>, data_dir: PathBuf) -> Router {
    let state = Arc::new(AppState::new(orchestrator, data_dir));

    Router::new()
        .route("/api/run", post(run::run::<A>))
        .route("/api/probe", post(probe::probe::<A>))
        .route("/api/tool/change", post(probe::tool_change::<A>))
        .route(
            "/data/*path",
            get(data::get_file::<A>).put(data::put_file::<A>).delete(data::delete_file::<A>),
        )
        .route("/events/state", get(events::state_stream::<A>))
        .route("/events/hold", get(events::hold_stream::<A>))
        .layer(CorsLayer::new().allow_origin(Any))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use grblevel_comm::status::MachineState;
    use tokio::sync::broadcast;
    use tower::ServiceExt;

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
    async fn run_rejects_when_machine_not_idle() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Arc::new(Orchestrator::new(Arc::new(NoopAdapter)));
        let app = router(orchestrator, dir.path().to_path_buf());

        let resp = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/run")
                    .body(Body::from("G1 X1\n"))
                    .unwrap(),
            )
            .await
            .unwrap();

        // NoopAdapter's default MachineState::status is Status::Unknown, not
        // Idle, so the orchestrator's precondition rejects the request.
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    }
}
