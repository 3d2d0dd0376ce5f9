use std::io::Write;
use std::num::NonZeroUsize;

use lj_io::LineSource;
use lj_runtime::Strategy;

use crate::hash::{index_lines, probe_pass};
use crate::{Halt, JoinContext, JoinStrategy};

/// Bounded-memory hash join. File 1 is consumed forward-only in `chunks`
/// byte-sized slices; each slice is indexed on its own and file 2 is
/// re-streamed from its start against it.
///
/// Output is every match for chunk 1 in file 2 order, then every match for
/// chunk 2, and so on. Missing mode is likewise decided per chunk: a file 2
/// line is emitted once for each chunk that lacks its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkedHashJoin {
    chunks: NonZeroUsize,
}

impl ChunkedHashJoin {
    #[must_use]
    pub fn new(chunks: NonZeroUsize) -> Self {
        Self { chunks }
    }

    #[must_use]
    pub fn chunks(&self) -> NonZeroUsize {
        self.chunks
    }
}

/// `ceil(total_bytes / chunks)`.
#[must_use]
pub fn chunk_budget(total_bytes: u64, chunks: NonZeroUsize) -> u64 {
    total_bytes.div_ceil(chunks.get() as u64)
}

impl JoinStrategy for ChunkedHashJoin {
    fn kind(&self) -> Strategy {
        Strategy::Chunked {
            chunks: self.chunks,
        }
    }

    fn execute<S1, S2, W, D>(
        &self,
        file1: &mut S1,
        file2: &mut S2,
        ctx: &mut JoinContext<'_, W, D>,
    ) -> Result<(), Halt>
    where
        S1: LineSource,
        S2: LineSource,
        W: Write,
        D: Write,
    {
        let name = file1.name().to_owned();
        let chunks = self.chunks.get();
        let budget = chunk_budget(file1.byte_len()?, self.chunks);

        for chunk in 0..chunks {
            // The last chunk takes whatever the byte budget left behind.
            let limit = if chunk + 1 == chunks { u64::MAX } else { budget };

            #[cfg(feature = "tracing")]
            tracing::debug!(chunk, chunks, budget, "indexing chunk");

            let index = index_lines(&mut file1.bounded(limit), &name, ctx)?;
            file2.rewind()?;
            probe_pass(&index, file2, ctx, chunk == 0)?;
        }
        Ok(())
    }
}
