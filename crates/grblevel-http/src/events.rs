//! `GET /events/state` and `GET /events/hold` — server-sent-event streams
//! of machine-state snapshots and hold prompts, fed from the orchestrator's
//! broadcast channels.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::State;
use axum::response::sse::{Event, Sse};
use futures_util::Stream;
use grblevel_comm::adapter::MachineAdapter;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt as _;

use crate::state::AppState;

pub async fn state_stream<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.state_events();
    let stream = BroadcastStream::new(rx).filter_map(|item| {
        let snapshot = item.ok()?;
        let json = serde_json::to_string(&snapshot).ok()?;
        Some(Ok(Event::default().data(json)))
    });
    Sse::new(stream)
}

pub async fn hold_stream<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let rx = state.orchestrator.hold_messages();
    let stream = BroadcastStream::new(rx).filter_map(|item| {
        let message = item.ok()?;
        Some(Ok(Event::default().data(message)))
    });
    Sse::new(stream)
}
