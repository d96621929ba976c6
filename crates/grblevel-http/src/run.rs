//! `POST /api/run?gridLevel=<g>` — streams a raw G-code body to the
//! controller, optionally wrapped in the mesh leveller when `gridLevel`
//! names a loaded bed map.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use grblevel_comm::adapter::MachineAdapter;
use grblevel_orchestrator::BedMap;
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_GRANULARITY: f64 = 1.0;

#[derive(Deserialize)]
pub struct RunQuery {
    #[serde(rename = "gridLevel")]
    grid_level: Option<String>,
    granularity: Option<f64>,
}

pub async fn run<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Query(query): Query<RunQuery>,
    body: String,
) -> Result<Json<serde_json::Value>, ApiError> {
    let written = match query.grid_level {
        Some(name) => {
            let path = state
                .safe_path(&format!("{name}.json"))
                .ok_or_else(|| {
                    ApiError(grblevel_core::error::Error::Parse(
                        grblevel_core::error::ParseError::InvalidWord(name.clone()),
                    ))
                })?;
            let bed_map = BedMap::load(&path)?;
            let granularity = query.granularity.unwrap_or(DEFAULT_GRANULARITY);
            state
                .orchestrator
                .read_from_level(std::io::Cursor::new(body.into_bytes()), granularity, &bed_map.points)
                .await?
        }
        None => {
            state
                .orchestrator
                .run_program(std::io::Cursor::new(body.into_bytes()))
                .await?
        }
    };

    Ok(Json(json!({ "bytesWritten": written })))
}
