//! The `GcodeReader` contract: a pull-based source of `Block`s, consumed by
//! the mesh leveller (C6) and the text buffer (this module's `Buffer`).

use crate::block::Block;
use crate::error::ParseError;

/// A stream of blocks. `Ok(None)` signals end of stream; callers must not
/// call `read` again afterwards.
pub trait GcodeReader {
    fn read(&mut self) -> Result<Option<Block>, ParseError>;
}

/// Wraps an in-memory list of already-parsed blocks as a `GcodeReader`,
/// e.g. for feeding synthetic probe/tool-change sequences to the leveller.
pub struct BlocksReader {
    blocks: Vec<Block>,
    n: usize,
}

impl BlocksReader {
    pub fn new(blocks: Vec<Block>) -> Self {
        Self { blocks, n: 0 }
    }
}

impl GcodeReader for BlocksReader {
    fn read(&mut self) -> Result<Option<Block>, ParseError> {
        if self.n == self.blocks.len() {
            return Ok(None);
        }
        let block = self.blocks[self.n].clone();
        self.n += 1;
        Ok(Some(block))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::word::Word;

    #[test]
    fn blocks_reader_yields_in_order_then_eof() {
        let b1 = Block::new(vec![Word::new(b'G', 1.0)]);
        let b2 = Block::new(vec![Word::new(b'M', 2.0)]);
        let mut r = BlocksReader::new(vec![b1.clone(), b2.clone()]);
        assert_eq!(r.read().unwrap(), Some(b1));
        assert_eq!(r.read().unwrap(), Some(b2));
        assert_eq!(r.read().unwrap(), None);
    }
}
