//! Batched application of a per-line function over a buffer range
//!
//! Lines are read one batch at a time with a single bulk read. Replacement
//! lines collect into a pending run that is written back with one bulk write.
//! A deletion writes the run together with the deleted line, so the buffer
//! shrinks by one and every later read and write shifts up accordingly.

use rhai::Dynamic;
use tracing::debug;

use super::BridgeError;
use crate::host::{Host, HostError};

/// What the per-line function asked for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Replace(String),
    Delete,
    /// Neither text nor unit; carries the type found
    InvalidReturn(String),
}

impl LineOutcome {
    pub fn from_dynamic(value: Dynamic) -> Self {
        let value = value.flatten();
        if value.is_unit() {
            LineOutcome::Delete
        } else if value.is_string() {
            LineOutcome::Replace(value.into_string().unwrap_or_default())
        } else {
            LineOutcome::InvalidReturn(value.type_name().to_string())
        }
    }
}

/// A 0-based, end-exclusive line range
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Convert the host's 1-based inclusive `start..=stop`
    pub fn from_one_based(start: i64, stop: i64) -> Result<Self, BridgeError> {
        if start < 1 || stop < start - 1 {
            return Err(BridgeError::InvalidArguments(format!(
                "invalid line range {},{}",
                start, stop
            )));
        }
        Ok(Self {
            start: (start - 1) as usize,
            end: stop as usize,
        })
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ApplyStats {
    /// Lines the function returned a valid outcome for
    pub lines: usize,
    pub replaced: usize,
    pub deleted: usize,
    pub reads: usize,
    pub writes: usize,
}

/// Replacement lines waiting to be written at `start`
struct PendingRun {
    start: usize,
    lines: Vec<String>,
}

impl PendingRun {
    fn flush(&mut self, host: &dyn Host, stats: &mut ApplyStats) -> Result<(), HostError> {
        if self.lines.is_empty() {
            return Ok(());
        }
        let count = self.lines.len();
        host.set_lines(self.start, self.start + count, std::mem::take(&mut self.lines))?;
        stats.writes += 1;
        self.start += count;
        Ok(())
    }

    /// Write the run and drop the line right after it in one call
    fn flush_deleting_next(
        &mut self,
        host: &dyn Host,
        stats: &mut ApplyStats,
    ) -> Result<(), HostError> {
        let count = self.lines.len();
        host.set_lines(
            self.start,
            self.start + count + 1,
            std::mem::take(&mut self.lines),
        )?;
        stats.writes += 1;
        self.start += count;
        Ok(())
    }
}

/// Apply `f` to every line of `range`
///
/// `f` gets each line and its original 1-based number. An invalid outcome or
/// an error from `f` stops the batch: the lines before it are written, the
/// rest of the range is left alone, and the error is returned.
pub fn apply_batched<F>(
    host: &dyn Host,
    range: LineRange,
    batch_size: usize,
    mut f: F,
) -> Result<ApplyStats, BridgeError>
where
    F: FnMut(String, usize) -> Result<LineOutcome, BridgeError>,
{
    let batch_size = batch_size.max(1);
    let mut stats = ApplyStats::default();

    let mut batch_start = range.start;
    while batch_start < range.end {
        let batch_end = (batch_start + batch_size).min(range.end);
        let shift = stats.deleted;

        let lines = host.get_lines(batch_start - shift, batch_end - shift)?;
        stats.reads += 1;

        let mut run = PendingRun {
            start: batch_start - shift,
            lines: Vec::new(),
        };
        let mut failure = None;

        for (offset, line) in lines.into_iter().enumerate() {
            let linenr = batch_start + offset + 1;
            match f(line, linenr) {
                Ok(LineOutcome::Replace(text)) => {
                    run.lines.push(text);
                    stats.replaced += 1;
                }
                Ok(LineOutcome::Delete) => {
                    run.flush_deleting_next(host, &mut stats)?;
                    stats.deleted += 1;
                }
                Ok(LineOutcome::InvalidReturn(found)) => {
                    failure = Some(BridgeError::InvalidReturn { line: linenr, found });
                    break;
                }
                Err(e) => {
                    failure = Some(e);
                    break;
                }
            }
            stats.lines += 1;
        }

        run.flush(host, &mut stats)?;
        if let Some(e) = failure {
            return Err(e);
        }

        debug!(
            target: "bridge",
            "Applied lines {}..{} ({} deleted so far)",
            batch_start + 1,
            batch_end,
            stats.deleted
        );
        batch_start = batch_end;
    }

    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::MemoryHost;

    fn lines(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("l{}", i)).collect()
    }

    fn mark(line: String, linenr: usize) -> Result<LineOutcome, BridgeError> {
        Ok(LineOutcome::Replace(format!("{}#{}", line, linenr)))
    }

    #[test]
    fn touches_only_the_range() {
        let host = MemoryHost::with_lines(&lines(6));
        let range = LineRange::from_one_based(2, 4).unwrap();
        apply_batched(&host, range, 5000, mark).unwrap();
        assert_eq!(
            host.buffer_lines(),
            vec!["l1", "l2#2", "l3#3", "l4#4", "l5", "l6"]
        );
    }

    #[test]
    fn line_numbers_ignore_batch_boundaries() {
        let host = MemoryHost::with_lines(&lines(10));
        let mut seen = Vec::new();
        apply_batched(&host, LineRange { start: 0, end: 10 }, 3, |line, nr| {
            seen.push(nr);
            mark(line, nr)
        })
        .unwrap();
        assert_eq!(seen, (1..=10).collect::<Vec<_>>());
    }

    #[test]
    fn batching_is_not_observable() {
        let range = LineRange { start: 1, end: 12 };
        let transform = |line: String, nr: usize| {
            if nr % 4 == 0 {
                Ok(LineOutcome::Delete)
            } else {
                mark(line, nr)
            }
        };

        let one = MemoryHost::with_lines(&lines(13));
        apply_batched(&one, range, 1, transform).unwrap();
        for batch_size in [2, 3, 5, 11, 5000] {
            let host = MemoryHost::with_lines(&lines(13));
            apply_batched(&host, range, batch_size, transform).unwrap();
            assert_eq!(host.buffer_lines(), one.buffer_lines(), "batch size {}", batch_size);
        }
    }

    #[test]
    fn one_read_per_batch_and_coalesced_writes() {
        let host = MemoryHost::with_lines(&lines(10));
        let stats = apply_batched(&host, LineRange { start: 0, end: 10 }, 4, mark).unwrap();
        // batches of 4, 4, 2, each written back in one call
        assert_eq!(host.io_counts(), (3, 3));
        assert_eq!(stats.reads, 3);
        assert_eq!(stats.writes, 3);
        assert_eq!(stats.replaced, 10);
    }

    #[test]
    fn deletion_removes_exactly_one_line() {
        let host = MemoryHost::with_lines(&lines(5));
        let stats = apply_batched(&host, LineRange { start: 0, end: 5 }, 5000, |line, nr| {
            if nr == 3 {
                Ok(LineOutcome::Delete)
            } else {
                Ok(LineOutcome::Replace(line))
            }
        })
        .unwrap();
        assert_eq!(host.buffer_lines(), vec!["l1", "l2", "l4", "l5"]);
        assert_eq!(stats.deleted, 1);
        // run + deleted line, then the tail
        assert_eq!(stats.writes, 2);
    }

    #[test]
    fn deletions_across_batches_shift_later_reads() {
        let host = MemoryHost::with_lines(&lines(6));
        apply_batched(&host, LineRange { start: 0, end: 6 }, 2, |line, nr| {
            if nr % 2 == 1 {
                Ok(LineOutcome::Delete)
            } else {
                mark(line, nr)
            }
        })
        .unwrap();
        assert_eq!(host.buffer_lines(), vec!["l2#2", "l4#4", "l6#6"]);
    }

    #[test]
    fn invalid_return_stops_mid_batch() {
        let host = MemoryHost::with_lines(&lines(7));
        let err = apply_batched(&host, LineRange { start: 0, end: 7 }, 3, |line, nr| {
            if nr == 5 {
                Ok(LineOutcome::InvalidReturn("i64".to_string()))
            } else {
                mark(line, nr)
            }
        })
        .unwrap_err();

        assert!(matches!(err, BridgeError::InvalidReturn { line: 5, ref found } if found == "i64"));
        // first batch applied, second up to line 4, third untouched
        assert_eq!(
            host.buffer_lines(),
            vec!["l1#1", "l2#2", "l3#3", "l4#4", "l5", "l6", "l7"]
        );
    }

    #[test]
    fn function_errors_flush_earlier_lines() {
        let host = MemoryHost::with_lines(&lines(3));
        let err = apply_batched(&host, LineRange { start: 0, end: 3 }, 5000, |line, nr| {
            if nr == 2 {
                Err(BridgeError::InvalidArguments("boom".to_string()))
            } else {
                mark(line, nr)
            }
        })
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidArguments(_)));
        assert_eq!(host.buffer_lines(), vec!["l1#1", "l2", "l3"]);
    }

    #[test]
    fn empty_range_does_nothing() {
        let host = MemoryHost::with_lines(&lines(2));
        let range = LineRange::from_one_based(2, 1).unwrap();
        assert!(range.is_empty());
        let stats = apply_batched(&host, range, 10, mark).unwrap();
        assert_eq!(stats, ApplyStats::default());
        assert_eq!(host.io_counts(), (0, 0));
    }

    #[test]
    fn invalid_ranges_are_rejected() {
        assert!(LineRange::from_one_based(0, 3).is_err());
        assert!(LineRange::from_one_based(4, 2).is_err());
        assert_eq!(LineRange::from_one_based(3, 5).unwrap().len(), 3);
    }

    #[test]
    fn outcomes_from_script_values() {
        assert_eq!(
            LineOutcome::from_dynamic(Dynamic::from("x".to_string())),
            LineOutcome::Replace("x".to_string())
        );
        assert_eq!(LineOutcome::from_dynamic(Dynamic::UNIT), LineOutcome::Delete);
        assert!(matches!(
            LineOutcome::from_dynamic(Dynamic::from(3_i64)),
            LineOutcome::InvalidReturn(_)
        ));
    }
}
