//! `POST /api/probe?grid=0|1` and `POST /api/tool/change` — dispatch a
//! JSON body onto the orchestrator's probe / grid-probe / tool-change
//! sequences.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use grblevel_comm::adapter::MachineAdapter;
use grblevel_core::point::Point;
use grblevel_orchestrator::{BedMap, ProbeGridOptions, ProbeOptions, ToolChangeOptions};
use serde::Deserialize;
use serde_json::json;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ProbeQuery {
    grid: Option<u8>,
}

#[derive(Deserialize)]
pub struct ProbeBody {
    #[serde(default)]
    zero_z_axis: bool,
    #[serde(default)]
    offset: f64,
    feed_rate: f64,
    max_travel: f64,
    #[serde(default)]
    wait: bool,
    #[serde(default)]
    distance_x: f64,
    #[serde(default)]
    distance_y: f64,
    #[serde(default)]
    granularity: f64,
    /// When grid probing, the resulting points are persisted under this
    /// name for later `/api/run?gridLevel=` calls.
    save_as: Option<String>,
}

impl ProbeBody {
    fn probe_options(&self) -> ProbeOptions {
        ProbeOptions {
            zero_z_axis: self.zero_z_axis,
            offset: self.offset,
            feed_rate: self.feed_rate,
            max_travel: self.max_travel,
            wait: self.wait,
        }
    }
}

pub async fn probe<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Query(query): Query<ProbeQuery>,
    Json(body): Json<ProbeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    if query.grid.unwrap_or(0) == 1 {
        let opt = ProbeGridOptions {
            probe: body.probe_options(),
            distance_x: body.distance_x,
            distance_y: body.distance_y,
            granularity: body.granularity,
        };
        let results = state.orchestrator.probe_z_grid(&opt).await?;

        if let Some(name) = &body.save_as {
            let points: Vec<Point> = results.iter().map(|p| p.point).collect();
            if let Some(path) = state.safe_path(&format!("{name}.json")) {
                BedMap::new(points).save(&path)?;
            }
        }

        Ok(Json(json!({ "probes": results })))
    } else {
        let result = state.orchestrator.probe_z(&body.probe_options()).await?;
        Ok(Json(json!({ "probe": result })))
    }
}

#[derive(Deserialize)]
pub struct ToolChangeBody {
    change_pos: Point,
    probe_pos: Point,
    feed_rate: f64,
    max_travel: f64,
    travel_height: f64,
    #[serde(default)]
    last_tool_pos: Option<Point>,
}

pub async fn tool_change<A: MachineAdapter + 'static>(
    State(state): State<Arc<AppState<A>>>,
    Json(body): Json<ToolChangeBody>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let opt = ToolChangeOptions {
        change_pos: body.change_pos,
        probe_pos: body.probe_pos,
        feed_rate: body.feed_rate,
        max_travel: body.max_travel,
        travel_height: body.travel_height,
        last_tool_pos: body.last_tool_pos,
    };
    state.orchestrator.tool_change(opt).await?;
    Ok(Json(json!({ "ok": true })))
}
