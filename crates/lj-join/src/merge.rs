use std::cmp::Ordering;
use std::io::Write;

use lj_io::LineSource;
use lj_record::KeyedRecord;
use lj_runtime::Strategy;

use crate::{Halt, JoinContext, JoinStrategy, Side};

/// Zig-zag join over inputs already sorted ascending by key (ordinal string
/// order). File 1 drives: each step takes its next key group, then advances
/// file 2 to the group with the same key. Only one group per side is held.
///
/// Unsorted input is not detected. A file 2 key that sorts below the current
/// file 1 key is skipped, so out-of-order lines lose their matches instead of
/// failing the run. File 2 lines left after file 1 ends are never read.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SortedMergeJoin;

impl JoinStrategy for SortedMergeJoin {
    fn kind(&self) -> Strategy {
        Strategy::SortedMerge
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
        let mut left = MergeCursor::new(file1, Side::First);
        let mut right = MergeCursor::new(file2, Side::Second);
        ctx.report.file2_passes = 1;

        while let Some(first_group) = left.next_group(ctx)? {
            let key = first_group[0].key();
            let second_group = right.seek_group(key, ctx)?;
            for second in &second_group {
                ctx.emit_matches(first_group.iter().map(KeyedRecord::record), second.record())?;
            }
        }
        Ok(())
    }
}

/// Forward-only cursor with one record of lookahead.
struct MergeCursor<'s, S> {
    source: &'s mut S,
    name: String,
    side: Side,
    lookahead: Option<KeyedRecord>,
    eof: bool,
}

impl<'s, S: LineSource> MergeCursor<'s, S> {
    fn new(source: &'s mut S, side: Side) -> Self {
        let name = source.name().to_owned();
        Self {
            source,
            name,
            side,
            lookahead: None,
            eof: false,
        }
    }

    /// Stashed lookahead first, else the next line that has a key.
    fn next_keyed<W: Write, D: Write>(
        &mut self,
        ctx: &mut JoinContext<'_, W, D>,
    ) -> Result<Option<KeyedRecord>, Halt> {
        if let Some(record) = self.lookahead.take() {
            return Ok(Some(record));
        }
        while !self.eof {
            ctx.checkpoint()?;
            let Some(line) = self.source.next_line()? else {
                self.eof = true;
                break;
            };
            ctx.count_line(self.side);
            if let Some(keyed) = ctx.keyed(&self.name, self.side, line, true) {
                return Ok(Some(keyed));
            }
        }
        Ok(None)
    }

    /// Self-seeded group: the next record plus every following record with
    /// the same key. The first differing record becomes the lookahead.
    fn next_group<W: Write, D: Write>(
        &mut self,
        ctx: &mut JoinContext<'_, W, D>,
    ) -> Result<Option<Vec<KeyedRecord>>, Halt> {
        let Some(seed) = self.next_keyed(ctx)? else {
            return Ok(None);
        };
        let mut group = vec![seed];
        while let Some(next) = self.next_keyed(ctx)? {
            if next.key() == group[0].key() {
                group.push(next);
            } else {
                self.lookahead = Some(next);
                break;
            }
        }
        Ok(Some(group))
    }

    /// Group matching `key`, skipping anything that sorts below it. Stops at
    /// the first record whose key sorts above `key`, keeping it as lookahead.
    fn seek_group<W: Write, D: Write>(
        &mut self,
        key: &[u8],
        ctx: &mut JoinContext<'_, W, D>,
    ) -> Result<Vec<KeyedRecord>, Halt> {
        let mut group = Vec::new();
        while let Some(next) = self.next_keyed(ctx)? {
            match next.key().cmp(key) {
                Ordering::Less => {}
                Ordering::Equal => group.push(next),
                Ordering::Greater => {
                    self.lookahead = Some(next);
                    break;
                }
            }
        }
        Ok(group)
    }
}
