use std::io::Write;

use lj_io::{Bounded, LineSource};
use lj_runtime::Strategy;

use crate::{Halt, JoinContext, JoinIndex, JoinStrategy, Side};

/// Default strategy: index all of file 1, then stream file 2 once.
/// Memory is proportional to file 1.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HashJoin;

impl JoinStrategy for HashJoin {
    fn kind(&self) -> Strategy {
        Strategy::Hash
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
        let index = index_lines(&mut file1.bounded(u64::MAX), &name, ctx)?;
        probe_pass(&index, file2, ctx, true)
    }
}

/// Builds an index over every line `lines` yields.
pub(crate) fn index_lines<S, W, D>(
    lines: &mut Bounded<'_, S>,
    source_name: &str,
    ctx: &mut JoinContext<'_, W, D>,
) -> Result<JoinIndex, Halt>
where
    S: LineSource,
    W: Write,
    D: Write,
{
    let mut index = JoinIndex::new();
    loop {
        ctx.checkpoint()?;
        let Some(line) = lines.next_line()? else {
            break;
        };
        ctx.count_line(Side::First);
        if let Some(keyed) = ctx.keyed(source_name, Side::First, line, true) {
            index.insert(keyed);
        }
    }
    ctx.report.indexed_records += index.record_count() as u64;

    #[cfg(feature = "tracing")]
    tracing::debug!(
        source = source_name,
        keys = index.key_count(),
        records = index.record_count(),
        bytes = lines.consumed(),
        "join index built"
    );

    Ok(index)
}

/// Streams `file2` from its current position against `index`. Short lines
/// are only reported when `diagnose` is set, so a re-scan stays quiet.
pub(crate) fn probe_pass<S, W, D>(
    index: &JoinIndex,
    file2: &mut S,
    ctx: &mut JoinContext<'_, W, D>,
    diagnose: bool,
) -> Result<(), Halt>
where
    S: LineSource,
    W: Write,
    D: Write,
{
    let name = file2.name().to_owned();
    let missing_mode = ctx.config.missing_mode;
    ctx.report.file2_passes += 1;
    loop {
        ctx.checkpoint()?;
        let Some(line) = file2.next_line()? else {
            break;
        };
        ctx.count_line(Side::Second);
        let Some(second) = ctx.keyed(&name, Side::Second, line, diagnose) else {
            continue;
        };

        if missing_mode {
            if !index.contains_key(second.key()) {
                ctx.emit_missing(second.record())?;
            }
            continue;
        }
        // A miss is ordinary join behavior: no output, no diagnostic.
        if let Some(group) = index.get(second.key()) {
            ctx.emit_matches(group, second.record())?;
        }
    }
    Ok(())
}
