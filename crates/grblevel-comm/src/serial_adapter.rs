//! Direct-serial [`MachineAdapter`]: a USB/RS-232 link to the controller,
//! polled with `?` every 500ms and triaged through [`crate::status`].
//!
//! Grounded on the teacher's `communication/serial.rs` port-opening idiom
//! (tightened here onto `tokio_serial::SerialStream` so the port speaks
//! directly to [`crate::conn::Connection`]'s async transport bound) and on
//! `firmware/grbl/controller.rs`'s spawned polling-loop task.

use std::time::Duration;

use async_trait::async_trait;
use grblevel_core::error::Error;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, warn};

use crate::adapter::MachineAdapter;
use crate::conn::Connection;
use crate::status::{parse_probe, parse_status, MachineState, ProbeResult};

const POLL_INTERVAL: Duration = Duration::from_millis(500);
const STATE_EVENTS_CAPACITY: usize = 64;

pub struct SerialAdapter {
    conn: Connection,
    state: std::sync::Arc<parking_lot::RwLock<MachineState>>,
    probes: std::sync::Arc<parking_lot::RwLock<Vec<ProbeResult>>>,
    events_tx: broadcast::Sender<MachineState>,
    poll_task: JoinHandle<()>,
    route_task: JoinHandle<()>,
}

impl SerialAdapter {
    /// Opens `path` at `baud` and starts the read-routing and `?`-polling
    /// background tasks.
    pub fn open(path: &str, baud: u32) -> Result<Self, Error> {
        let port = tokio_serial::new(path, baud)
            .timeout(Duration::from_millis(10))
            .open_native_async()
            .map_err(|e| Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))?;
        let (read_half, write_half) = tokio::io::split(port);
        let conn = Connection::new(read_half, write_half);

        let state = std::sync::Arc::new(parking_lot::RwLock::new(MachineState::default()));
        let probes = std::sync::Arc::new(parking_lot::RwLock::new(Vec::new()));
        let (events_tx, _) = broadcast::channel(STATE_EVENTS_CAPACITY);

        let route_task = tokio::spawn(route_loop(conn.clone(), state.clone(), probes.clone(), events_tx.clone()));
        let poll_task = tokio::spawn(poll_loop(conn.clone()));

        Ok(Self { conn, state, probes, events_tx, poll_task, route_task })
    }
}

impl Drop for SerialAdapter {
    fn drop(&mut self) {
        self.poll_task.abort();
        self.route_task.abort();
    }
}

async fn poll_loop(conn: Connection) {
    let mut ticker = tokio::time::interval(POLL_INTERVAL);
    loop {
        ticker.tick().await;
        if conn.write_byte(b'?').await.is_err() {
            warn!("serial adapter: poll write failed, stopping poller");
            return;
        }
    }
}

async fn route_loop(
    conn: Connection,
    state: std::sync::Arc<parking_lot::RwLock<MachineState>>,
    probes: std::sync::Arc<parking_lot::RwLock<Vec<ProbeResult>>>,
    events_tx: broadcast::Sender<MachineState>,
) {
    loop {
        let line = match conn.read().await {
            Ok(l) => l,
            Err(_) => return,
        };
        let text = String::from_utf8_lossy(&line);

        if let Some(update) = parse_status(&text) {
            let mut s = state.write();
            if let Some(st) = update.status {
                s.status = st;
            }
            if let Some(mpos) = update.mpos {
                s.mpos = mpos;
            }
            if let Some(wco) = update.wco {
                s.wco = wco;
            }
            let snapshot = *s;
            drop(s);
            let _ = events_tx.send(snapshot);
        } else if let Some(probe) = parse_probe(&text) {
            debug!(?probe, "probe frame received");
            probes.write().push(probe);
        }
    }
}

#[async_trait]
impl MachineAdapter for SerialAdapter {
    async fn drain_probes(&self) -> Vec<ProbeResult> {
        std::mem::take(&mut *self.probes.write())
    }

    async fn reset_probes(&self) {
        self.probes.write().clear();
    }

    fn state_events(&self) -> broadcast::Receiver<MachineState> {
        self.events_tx.subscribe()
    }

    async fn current_state(&self) -> MachineState {
        *self.state.read()
    }

    async fn write_byte(&self, b: u8) -> Result<(), Error> {
        self.conn.write_byte(b).await
    }

    async fn write(&self, bytes: &[u8]) -> Result<u64, Error> {
        self.conn.write(bytes).await
    }

    async fn write_from(&self, reader: Box<dyn std::io::Read + Send>) -> Result<u64, Error> {
        self.conn.write_from(reader).await
    }
}
