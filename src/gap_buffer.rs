use std::fmt;

use crate::char_source::CharSource;
use crate::config::BufferConfig;
use crate::error::{BufferError, Result};
use crate::marks::{EditSpan, MarkId, MarkRegistry};
use crate::range::{Range, TextRange};

/// Above this slide distance a gap move is logged at `trace` level — the
/// gap-move routine is the hot path worth instrumenting first when
/// diagnosing pathological edit patterns.
const SLIDE_LOG_THRESHOLD: usize = 4096;

/// The capability every edit-tracking buffer in this crate exposes: a gap
/// buffer's own read/write/mark operations, generalized so [`crate::storage`]
/// can be written once against either the plain engine or the replaying one.
pub trait TextBuffer {
    fn length(&self) -> usize;
    fn get(&self, index: usize) -> Result<char>;
    fn get_chars(&self, src_begin: usize, src_end: usize, dest: &mut [char], dest_begin: usize) -> Result<()>;
    fn replace(&mut self, range: TextRange, source: &dyn CharSource, source_range: TextRange) -> Result<EditSpan>;

    fn mark_range(&mut self, range: Range, mark: MarkId) -> Result<()>;
    fn unmark(&mut self, mark: MarkId);
    fn range_for_mark(&self, mark: MarkId) -> Result<Range>;
    fn marks_intersecting(&self, query: Range) -> Vec<(MarkId, Range)>;
}

/// Copy-on-write forking, abstracted so the snapshot layer can write its
/// write-resolution path once against either a plain [`GapBuffer`] (full
/// copy) or a [`crate::replaying::ReplayingGapBuffer`] (copy, with replay when
/// the lineage allows it).
pub trait ForkableBuffer: TextBuffer + Sized {
    fn fork_from(&mut self, source: &Self) -> Result<()>;
}

impl ForkableBuffer for GapBuffer {
    fn fork_from(&mut self, source: &GapBuffer) -> Result<()> {
        self.replace(TextRange::Unspecified, source, TextRange::Unspecified)?;
        Ok(())
    }
}

/// The fundamental editable sequence: a flat `char` array with a movable gap
/// of unused cells, plus the mark registry it owns — a buffer exclusively
/// owns its character array, gap indices, and mark registry.
#[derive(Clone)]
pub struct GapBuffer {
    buf: Vec<char>,
    gap: Range,
    config: BufferConfig,
    marks: MarkRegistry,
}

impl Default for GapBuffer {
    fn default() -> Self {
        GapBuffer::new()
    }
}

impl GapBuffer {
    pub fn new() -> Self {
        GapBuffer::with_config(BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Self {
        GapBuffer {
            buf: Vec::new(),
            gap: Range::ZERO,
            config,
            marks: MarkRegistry::new(),
        }
    }

    pub fn config(&self) -> BufferConfig {
        self.config
    }

    #[inline(always)]
    fn logical_to_physical(&self, index: usize) -> usize {
        if index < self.gap.start {
            index
        } else {
            index + self.gap.len()
        }
    }

    fn grow(&mut self, start: usize, end: usize, ins_len: usize) -> Result<()> {
        let len = self.length();
        let tail_len = len - end;
        let old_capacity = self.buf.len();
        let min_capacity = len - (end - start) + ins_len + self.config.minimum_gap_length * 2;
        let new_capacity = old_capacity
            .saturating_mul(self.config.growth_factor)
            .max(min_capacity)
            .max(self.config.minimum_gap_length * 2);

        let mut new_buf = vec!['\0'; new_capacity];
        self.get_chars(0, start, &mut new_buf, 0)?;
        self.get_chars(end, len, &mut new_buf, new_capacity - tail_len)?;

        log::trace!(
            "gap buffer reallocating: capacity {} -> {} (length {})",
            old_capacity,
            new_capacity,
            len
        );

        self.buf = new_buf;
        self.gap = Range {
            start,
            end: new_capacity - tail_len,
        };
        Ok(())
    }

    /// Slides the gap so that `gap.start == to`, moving only the cells between
    /// the gap's old position and `to`.
    fn slide_gap_to(&mut self, to: usize) {
        if self.gap.start == to {
            return;
        }
        if self.gap.is_empty() {
            self.gap.start = to;
            self.gap.end = to;
            return;
        }

        let distance = if to < self.gap.start {
            let count = self.gap.start - to;
            self.buf.copy_within(to..self.gap.start, self.gap.end - count);
            self.gap.start -= count;
            self.gap.end -= count;
            count
        } else {
            let count = to - self.gap.start;
            self.buf.copy_within(self.gap.end..self.gap.end + count, self.gap.start);
            self.gap.start += count;
            self.gap.end += count;
            count
        };

        if distance > SLIDE_LOG_THRESHOLD {
            log::trace!("gap buffer sliding gap by {} cells to reach {}", distance, to);
        }
    }
}

impl TextBuffer for GapBuffer {
    fn length(&self) -> usize {
        self.buf.len() - self.gap.len()
    }

    fn get(&self, index: usize) -> Result<char> {
        Range::new(index, index + 1).validate(self.length())?;
        Ok(self.buf[self.logical_to_physical(index)])
    }

    fn get_chars(&self, src_begin: usize, src_end: usize, dest: &mut [char], dest_begin: usize) -> Result<()> {
        let range = Range::new(src_begin, src_end);
        range.validate(self.length())?;
        let len = range.len();
        let fits = match dest_begin.checked_add(len) {
            Some(end) => end <= dest.len(),
            None => false,
        };
        if !fits {
            return Err(BufferError::InvalidDestination {
                dest_len: dest.len(),
                dest_begin,
                required: len,
            });
        }
        if len == 0 {
            return Ok(());
        }

        if src_end <= self.gap.start {
            dest[dest_begin..dest_begin + len].copy_from_slice(&self.buf[src_begin..src_end]);
        } else if src_begin >= self.gap.start {
            let offset = self.gap.len();
            dest[dest_begin..dest_begin + len]
                .copy_from_slice(&self.buf[src_begin + offset..src_end + offset]);
        } else {
            let first_len = self.gap.start - src_begin;
            dest[dest_begin..dest_begin + first_len].copy_from_slice(&self.buf[src_begin..self.gap.start]);
            dest[dest_begin + first_len..dest_begin + len]
                .copy_from_slice(&self.buf[self.gap.end..self.gap.end + (len - first_len)]);
        }
        Ok(())
    }

    fn replace(&mut self, range: TextRange, source: &dyn CharSource, source_range: TextRange) -> Result<EditSpan> {
        let len = self.length();
        let range = range.resolve(len);
        range.validate(len)?;

        let source_range = source_range.resolve(source.source_len());
        source_range.validate(source.source_len())?;

        let start = range.start;
        let end = range.end;
        let del_len = range.len();
        let ins_len = source_range.len();

        if del_len == 0 && ins_len == 0 {
            return Ok(EditSpan {
                start,
                deleted: 0,
                inserted: 0,
            });
        }

        let projected = self.gap.len() as i64 + del_len as i64 - ins_len as i64;
        if projected < self.config.minimum_gap_length as i64 {
            self.grow(start, end, ins_len)?;
        } else {
            self.slide_gap_to(start);
            self.gap.end += del_len;
        }

        if ins_len > 0 {
            let gap_start = self.gap.start;
            source.write_into(source_range, &mut self.buf, gap_start)?;
            self.gap.start += ins_len;
        }

        let span = EditSpan {
            start,
            deleted: del_len,
            inserted: ins_len,
        };
        self.marks.update_for_edit(span);
        Ok(span)
    }

    fn mark_range(&mut self, range: Range, mark: MarkId) -> Result<()> {
        self.marks.mark_range(range, mark)
    }

    fn unmark(&mut self, mark: MarkId) {
        self.marks.unmark(mark)
    }

    fn range_for_mark(&self, mark: MarkId) -> Result<Range> {
        self.marks.range_for(mark)
    }

    fn marks_intersecting(&self, query: Range) -> Vec<(MarkId, Range)> {
        self.marks.intersecting(query).collect()
    }
}

impl fmt::Display for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.length();
        let mut out = String::with_capacity(len);
        if len > 0 {
            let mut chars = vec!['\0'; len];
            self.get_chars(0, len, &mut chars, 0).map_err(|_| fmt::Error)?;
            out.extend(chars);
        }
        write!(f, "{}", out)
    }
}

impl fmt::Debug for GapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GapBuffer")
            .field("length", &self.length())
            .field("capacity", &self.buf.len())
            .field("gap", &(self.gap.start..self.gap.end))
            .field("marks", &self.marks.len())
            .finish()
    }
}
