//! Adapts a `GcodeReader` into a byte-oriented `std::io::Read` source, for
//! feeding text straight into the controller connection (C7).
//!
//! The teacher's Go ancestor conflates a stored `err` field with the error
//! returned from the read call that set it, which silently swallows EOF on
//! some paths; this keeps a single explicit state instead of two error
//! slots that can disagree.

use std::collections::VecDeque;
use std::io;

use crate::error::ParseError;
use crate::reader::GcodeReader;

enum State {
    Reading,
    Eof,
}

pub struct Buffer<R> {
    inner: R,
    pending: VecDeque<u8>,
    state: State,
}

impl<R: GcodeReader> Buffer<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            pending: VecDeque::new(),
            state: State::Reading,
        }
    }

    /// Bytes already rendered and not yet consumed by `read`.
    pub fn buffered(&self) -> &VecDeque<u8> {
        &self.pending
    }

    fn fill(&mut self, want: usize) -> Result<(), ParseError> {
        while matches!(self.state, State::Reading) && self.pending.len() < want {
            match self.inner.read()? {
                Some(block) => {
                    self.pending.extend(format!("{block}\n").into_bytes());
                }
                None => self.state = State::Eof,
            }
        }
        Ok(())
    }
}

impl<R: GcodeReader> io::Read for Buffer<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.fill(buf.len())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().expect("checked len above");
        }
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::Block;
    use crate::reader::BlocksReader;
    use crate::word::Word;
    use std::io::Read;

    #[test]
    fn reads_rendered_blocks_then_signals_eof() {
        let b1 = Block::new(vec![Word::new(b'G', 1.0), Word::new(b'G', 2.0)]);
        let b2 = Block::new(vec![Word::new(b'M', 2.0)]);
        let mut buffer = Buffer::new(BlocksReader::new(vec![b1, b2]));

        let mut out = [0u8; 10];
        let n = buffer.read(&mut out).unwrap();
        assert_eq!(&out[..n], b"G1G2\nM2\n");

        let n2 = buffer.read(&mut out).unwrap();
        assert_eq!(n2, 0);
    }
}
