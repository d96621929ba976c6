//! Byte-level streaming to a Grbl controller with buffer accounting, ack
//! correlation and reset handling (the character-counting protocol).
//!
//! Grounded on the Go `machine/grbl/conn.go` state machine, recast as a
//! single task owning the mutable buffer-accounting state and driven by
//! channels — the "central loop" idiom kept from `grbl/controller.rs`,
//! generalized from GRBL's fixed command set to arbitrary line streams.

use std::collections::VecDeque;
use std::sync::Arc;

use grblevel_core::error::{Error, GrblAckError, GrblReset, TransportClosed};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

/// Remote device's fixed receive buffer, per Grbl's default `RX_BUFFER_SIZE`.
pub const DEVICE_BUFFER_SIZE: usize = 128;

enum ActorMsg {
    Line(Vec<u8>),
    InboundClosed,
    Reserve { len: usize, resp: oneshot::Sender<Result<u64, Error>> },
    WaitLine { id: u64, resp: oneshot::Sender<Result<(), Error>> },
    Close,
}

struct PendingReserve {
    len: usize,
    resp: oneshot::Sender<Result<u64, Error>>,
}

struct PendingWait {
    id: u64,
    first_error: Option<GrblAckError>,
    resp: oneshot::Sender<Result<(), Error>>,
}

/// A connected Grbl controller's character-counting line protocol.
///
/// Clone is cheap: the `Connection` is a handle onto the actor task plus
/// the shared transport write half.
#[derive(Clone)]
pub struct Connection {
    actor_tx: mpsc::Sender<ActorMsg>,
    write_lock: Arc<Mutex<()>>,
    transport_write: Arc<Mutex<Box<dyn AsyncWrite + Unpin + Send>>>,
    app_rx: Arc<Mutex<mpsc::Receiver<Vec<u8>>>>,
    actor_task: Arc<JoinHandle<()>>,
    inbound_task: Arc<JoinHandle<()>>,
}

impl Connection {
    /// Spawns the inbound-reader and central-loop tasks over `read`/`write`.
    pub fn new<R, W>(read: R, write: W) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let (actor_tx, actor_rx) = mpsc::channel(256);
        let (app_tx, app_rx) = mpsc::channel(256);

        let inbound_tx = actor_tx.clone();
        let inbound_task = tokio::spawn(inbound_loop(read, inbound_tx));
        let actor_task = tokio::spawn(actor_loop(actor_rx, app_tx));

        Self {
            actor_tx,
            write_lock: Arc::new(Mutex::new(())),
            transport_write: Arc::new(Mutex::new(Box::new(write))),
            app_rx: Arc::new(Mutex::new(app_rx)),
            actor_task: Arc::new(actor_task),
            inbound_task: Arc::new(inbound_task),
        }
    }

    /// Streams `reader` to the device, splitting at `\n` (terminator
    /// retained), blocking until the last written line is acknowledged.
    /// Serialises concurrent callers so line segmentation never interleaves.
    pub async fn write_from<R: std::io::Read>(&self, mut reader: R) -> Result<u64, Error> {
        let _guard = self.write_lock.lock().await;

        let mut total = 0u64;
        let mut line = Vec::new();
        let mut last_id = None;
        let mut byte = [0u8; 1];

        loop {
            let n = reader.read(&mut byte).map_err(grblevel_core::error::Error::Io)?;
            if n == 0 {
                break;
            }
            line.push(byte[0]);
            total += 1;
            if byte[0] == b'\n' {
                last_id = Some(self.write_line(&line).await?);
                line.clear();
            }
        }
        if !line.is_empty() {
            last_id = Some(self.write_line(&line).await?);
        }

        if let Some(id) = last_id {
            self.wait_for_line(id).await?;
        }
        Ok(total)
    }

    /// Equivalent to `write_from` over an in-memory byte slice.
    pub async fn write(&self, bytes: &[u8]) -> Result<u64, Error> {
        self.write_from(std::io::Cursor::new(bytes.to_vec())).await
    }

    /// Sends a single byte bypassing buffer accounting, for realtime
    /// commands (`?`, `!`, `~`, `^X`). Does not wait for an ack.
    pub async fn write_byte(&self, b: u8) -> Result<(), Error> {
        let mut w = self.transport_write.lock().await;
        w.write_all(&[b]).await.map_err(grblevel_core::error::Error::Io)?;
        w.flush().await.map_err(grblevel_core::error::Error::Io)?;
        Ok(())
    }

    /// The next inbound line that isn't an ack, error or reset banner.
    pub async fn read(&self) -> Result<Vec<u8>, Error> {
        let mut rx = self.app_rx.lock().await;
        rx.recv().await.ok_or(Error::TransportClosed(TransportClosed))
    }

    /// Cancels all pending waiters with "closed pipe" and shuts the
    /// underlying transport down.
    pub async fn close(&self) {
        let _ = self.actor_tx.send(ActorMsg::Close).await;
        let mut w = self.transport_write.lock().await;
        let _ = w.shutdown().await;
    }

    async fn write_line(&self, line: &[u8]) -> Result<u64, Error> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.actor_tx
            .send(ActorMsg::Reserve { len: line.len(), resp: resp_tx })
            .await
            .map_err(|_| Error::TransportClosed(TransportClosed))?;
        let id = resp_rx
            .await
            .map_err(|_| Error::TransportClosed(TransportClosed))??;

        let mut w = self.transport_write.lock().await;
        w.write_all(line).await.map_err(grblevel_core::error::Error::Io)?;
        w.flush().await.map_err(grblevel_core::error::Error::Io)?;
        Ok(id)
    }

    async fn wait_for_line(&self, id: u64) -> Result<(), Error> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.actor_tx
            .send(ActorMsg::WaitLine { id, resp: resp_tx })
            .await
            .map_err(|_| Error::TransportClosed(TransportClosed))?;
        resp_rx.await.map_err(|_| Error::TransportClosed(TransportClosed))?
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        // Only the last handle tears the tasks down; Arc keeps earlier
        // clones from aborting work still in flight elsewhere.
        if Arc::strong_count(&self.actor_task) == 1 {
            self.actor_task.abort();
        }
        if Arc::strong_count(&self.inbound_task) == 1 {
            self.inbound_task.abort();
        }
    }
}

async fn inbound_loop<R: AsyncRead + Unpin>(read: R, tx: mpsc::Sender<ActorMsg>) {
    let mut reader = BufReader::new(read);
    let mut line = Vec::new();
    let mut byte = [0u8; 1];
    loop {
        match reader.read_exact(&mut byte).await {
            Ok(_) => {
                if byte[0] == b'\n' {
                    let received = std::mem::take(&mut line);
                    if tx.send(ActorMsg::Line(received)).await.is_err() {
                        return;
                    }
                } else {
                    line.push(byte[0]);
                }
            }
            Err(_) => {
                let _ = tx.send(ActorMsg::InboundClosed).await;
                return;
            }
        }
    }
}

async fn actor_loop(mut rx: mpsc::Receiver<ActorMsg>, app_tx: mpsc::Sender<Vec<u8>>) {
    let mut device_buf_used: usize = 0;
    let mut line_sizes: VecDeque<usize> = VecDeque::new();
    let mut wrote_lines: u64 = 0;
    let mut read_lines: u64 = 0;

    let mut pending_reserve: Option<PendingReserve> = None;
    let mut pending_wait: Option<PendingWait> = None;

    fn try_grant(
        device_buf_used: &mut usize,
        line_sizes: &mut VecDeque<usize>,
        wrote_lines: &mut u64,
        pending_reserve: &mut Option<PendingReserve>,
    ) {
        if let Some(req) = pending_reserve.take() {
            if *device_buf_used + req.len <= DEVICE_BUFFER_SIZE {
                line_sizes.push_back(req.len);
                *device_buf_used += req.len;
                *wrote_lines += 1;
                let _ = req.resp.send(Ok(*wrote_lines));
            } else {
                *pending_reserve = Some(req);
            }
        }
    }

    fn on_ack(
        ack_err: Option<GrblAckError>,
        device_buf_used: &mut usize,
        line_sizes: &mut VecDeque<usize>,
        read_lines: &mut u64,
        wrote_lines: &mut u64,
        pending_reserve: &mut Option<PendingReserve>,
        pending_wait: &mut Option<PendingWait>,
    ) {
        if let Some(len) = line_sizes.pop_front() {
            *device_buf_used = device_buf_used.saturating_sub(len);
        }
        *read_lines += 1;

        if let Some(w) = pending_wait.as_mut() {
            if w.first_error.is_none() {
                w.first_error = ack_err;
            }
            if *read_lines >= w.id {
                let w = pending_wait.take().unwrap();
                let result = match w.first_error {
                    Some(e) => Err(Error::GrblAck(e)),
                    None => Ok(()),
                };
                let _ = w.resp.send(result);
            }
        }

        try_grant(device_buf_used, line_sizes, wrote_lines, pending_reserve);
    }

    fn on_reset(
        device_buf_used: &mut usize,
        line_sizes: &mut VecDeque<usize>,
        read_lines: &mut u64,
        wrote_lines: &u64,
        pending_reserve: &mut Option<PendingReserve>,
        pending_wait: &mut Option<PendingWait>,
    ) {
        *device_buf_used = 0;
        line_sizes.clear();
        *read_lines = *wrote_lines;
        if let Some(req) = pending_reserve.take() {
            let _ = req.resp.send(Err(Error::GrblReset(GrblReset)));
        }
        if let Some(w) = pending_wait.take() {
            let _ = w.resp.send(Err(Error::GrblReset(GrblReset)));
        }
    }

    while let Some(msg) = rx.recv().await {
        match msg {
            ActorMsg::Line(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                if text == "ok" {
                    debug!("grbl ack: ok");
                    on_ack(
                        None,
                        &mut device_buf_used,
                        &mut line_sizes,
                        &mut read_lines,
                        &mut wrote_lines,
                        &mut pending_reserve,
                        &mut pending_wait,
                    );
                } else if let Some(rest) = text.strip_prefix("error:") {
                    let code: u32 = rest.trim().parse().unwrap_or(0);
                    warn!(code, "grbl error ack");
                    on_ack(
                        Some(GrblAckError(code)),
                        &mut device_buf_used,
                        &mut line_sizes,
                        &mut read_lines,
                        &mut wrote_lines,
                        &mut pending_reserve,
                        &mut pending_wait,
                    );
                } else if text.starts_with("Grbl") {
                    warn!("grbl reset banner observed");
                    on_reset(
                        &mut device_buf_used,
                        &mut line_sizes,
                        &mut read_lines,
                        &wrote_lines,
                        &mut pending_reserve,
                        &mut pending_wait,
                    );
                } else {
                    if app_tx.send(bytes).await.is_err() {
                        return;
                    }
                }
            }
            ActorMsg::InboundClosed => {
                if let Some(req) = pending_reserve.take() {
                    let _ = req.resp.send(Err(Error::TransportClosed(TransportClosed)));
                }
                if let Some(w) = pending_wait.take() {
                    let _ = w.resp.send(Err(Error::TransportClosed(TransportClosed)));
                }
                return;
            }
            ActorMsg::Reserve { len, resp } => {
                pending_reserve = Some(PendingReserve { len, resp });
                try_grant(&mut device_buf_used, &mut line_sizes, &mut wrote_lines, &mut pending_reserve);
            }
            ActorMsg::WaitLine { id, resp } => {
                if read_lines >= id {
                    let _ = resp.send(Ok(()));
                } else {
                    pending_wait = Some(PendingWait { id, first_error: None, resp });
                }
            }
            ActorMsg::Close => {
                if let Some(req) = pending_reserve.take() {
                    let _ = req.resp.send(Err(Error::TransportClosed(TransportClosed)));
                }
                if let Some(w) = pending_wait.take() {
                    let _ = w.resp.send(Err(Error::TransportClosed(TransportClosed)));
                }
                return;
            }
        }
    }
    error!("connection actor channel closed without an explicit shutdown");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt as _, AsyncWriteExt as _};

    /// Scenario 6: 10 lines totalling 130 bytes (over the 128-byte device
    /// buffer), one `ok` per line with a 10ms delay; writer completes only
    /// after the 10th `ok`; buffer usage never exceeds 128.
    #[tokio::test]
    async fn flow_control_never_exceeds_device_buffer() {
        let (host_read, mut device_write) = tokio::io::duplex(4096);
        let (mut device_read, host_write) = tokio::io::duplex(4096);
        let conn = Connection::new(host_read, host_write);

        let device = tokio::spawn(async move {
            let mut buf = [0u8; 4096];
            let mut acked = 0;
            while acked < 10 {
                let n = device_read.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                // one `ok` per received line
                for _ in buf[..n].iter().filter(|&&b| b == b'\n') {
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    device_write.write_all(b"ok\n").await.unwrap();
                    acked += 1;
                }
            }
        });

        // each line is 13 bytes ("G1X0Y0Z0F100\n"); 10 of them total 130
        // bytes, over the 128-byte device buffer, so the writer is forced
        // to block mid-stream waiting for credit back from an `ok`.
        let lines: String = (0..10).map(|i| format!("G1X{i}Y0Z0F100\n")).collect();
        let written = conn.write(lines.as_bytes()).await.unwrap();
        assert_eq!(written as usize, lines.len());

        device.await.unwrap();
    }

    #[tokio::test]
    async fn reset_banner_fails_writer_and_clears_buffer() {
        let (host_read, mut device_write) = tokio::io::duplex(4096);
        let (mut device_read, host_write) = tokio::io::duplex(4096);
        let conn = Connection::new(host_read, host_write);

        // Start a write and let it reserve buffer credit and register its
        // wait-for-ack before the reset banner arrives.
        let writer_conn = conn.clone();
        let writer = tokio::spawn(async move { writer_conn.write(b"G1X1\n").await });
        tokio::time::sleep(Duration::from_millis(20)).await;

        device_write.write_all(b"Grbl 1.1h\n").await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(200), writer)
            .await
            .expect("writer should be failed by the reset banner, not left hanging")
            .unwrap();
        assert!(
            matches!(result, Err(Error::GrblReset(_))),
            "expected a grbl-reset error, got {result:?}"
        );

        // Bookkeeping must be zeroed by the reset: a fresh line is granted
        // buffer credit immediately and only waits on the device's `ok`,
        // rather than hanging on stale credit left over from the aborted
        // write above.
        let device = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = device_read.read(&mut buf).await.unwrap();
            assert!(n > 0);
            device_write.write_all(b"ok\n").await.unwrap();
        });
        let written = tokio::time::timeout(Duration::from_millis(200), conn.write(b"G1X2\n"))
            .await
            .expect("post-reset write should not hang on stale buffer credit")
            .unwrap();
        assert_eq!(written as usize, b"G1X2\n".len());
        device.await.unwrap();
    }
}
