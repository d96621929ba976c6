//! `ReadFromLevel`: runs a raw G-code program through the mesh leveller
//! against a previously captured bed map, then streams the result to the
//! device.

use std::io::BufReader;

use grblevel_comm::adapter::MachineAdapter;
use grblevel_comm::status::Status;
use grblevel_core::buffer::Buffer;
use grblevel_core::error::{Error, StatePrecondition};
use grblevel_core::parser::Parser;
use grblevel_core::point::Point;
use grblevel_mesh::{Mesh, MeshLeveller};

use crate::orchestrator::Orchestrator;

impl<A: MachineAdapter> Orchestrator<A> {
    /// Parses a raw G-code program and streams it straight to the device,
    /// with no mesh-levelling stage. Used by the HTTP facade's `/api/run`
    /// when the caller doesn't name a loaded bed map.
    pub async fn run_program<R: std::io::Read + Send + 'static>(&self, reader: R) -> Result<u64, Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }

        let parser = Parser::new(BufReader::new(reader));
        let buffer = Buffer::new(parser);
        self.adapter
            .write_from(Box::new(buffer) as Box<dyn std::io::Read + Send>)
            .await
    }

    /// Triangulates `points` into a [`Mesh`], wraps `reader` with a G-code
    /// parser, the mesh leveller, and a text buffer, and streams the
    /// result to the device via the adapter's `write_from`.
    pub async fn read_from_level<R: std::io::Read + Send + 'static>(
        &self,
        reader: R,
        granularity: f64,
        points: &[Point],
    ) -> Result<u64, Error> {
        let state = self.current_state().await;
        if state.status != Status::Idle {
            return Err(StatePrecondition("machine not idle".to_string()).into());
        }

        let mesh = Mesh::new(points).map_err(|e| {
            Error::Parse(grblevel_core::error::ParseError::MalformedFrame(e.to_string()))
        })?;
        let parser = Parser::new(BufReader::new(reader));
        let leveller = MeshLeveller::new(parser, mesh, granularity, state.mpos, state.wco);
        let buffer = Buffer::new(leveller);

        self.adapter
            .write_from(Box::new(buffer) as Box<dyn std::io::Read + Send>)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use grblevel_comm::status::MachineState;
    use std::sync::Arc;
    use tokio::sync::broadcast;

    struct MockAdapter {
        written: std::sync::Mutex<Vec<u8>>,
    }

    #[async_trait::async_trait]
    impl MachineAdapter for MockAdapter {
        async fn drain_probes(&self) -> Vec<grblevel_comm::status::ProbeResult> {
            Vec::new()
        }
        async fn reset_probes(&self) {}
        fn state_events(&self) -> broadcast::Receiver<MachineState> {
            broadcast::channel(1).1
        }
        async fn current_state(&self) -> MachineState {
            MachineState { status: Status::Idle, ..MachineState::default() }
        }
        async fn write_byte(&self, _b: u8) -> Result<(), Error> {
            Ok(())
        }
        async fn write(&self, bytes: &[u8]) -> Result<u64, Error> {
            self.written.lock().unwrap().extend_from_slice(bytes);
            Ok(1)
        }
        async fn write_from(&self, mut reader: Box<dyn std::io::Read + Send>) -> Result<u64, Error> {
            let mut buf = Vec::new();
            std::io::Read::read_to_end(&mut reader, &mut buf).map_err(Error::Io)?;
            let n = buf.len() as u64;
            self.written.lock().unwrap().extend(buf);
            Ok(n)
        }
    }

    #[tokio::test]
    async fn streams_a_levelled_program_without_a_bed_map() {
        let adapter = Arc::new(MockAdapter { written: std::sync::Mutex::new(Vec::new()) });
        let orch = Orchestrator::new(adapter.clone());
        let points = vec![Point::new(0.0, 0.0, 0.0), Point::new(10.0, 0.0, 0.0), Point::new(0.0, 10.0, 0.0)];
        let n = orch.read_from_level(std::io::Cursor::new(b"G1 X1\n".to_vec()), 5.0, &points).await.unwrap();
        assert!(n > 0);
        let written = adapter.written.lock().unwrap();
        assert!(String::from_utf8_lossy(&written).contains("G1X1"));
    }
}
