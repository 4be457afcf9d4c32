use std::fmt;

use crate::char_source::CharSource;
use crate::config::BufferConfig;
use crate::error::Result;
use crate::gap_buffer::{GapBuffer, TextBuffer};
use crate::marks::{self, MarkId};
use crate::range::{Range, TextRange};

/// The single logical facade over a buffer: `length`, `get`, `getChars`,
/// `replace`, and the mark operations, with no ambient transaction context.
/// Reaches for [`crate::snapshot::SnapshotAwareStorage`] instead when
/// multi-version read/write contexts are needed.
#[derive(Clone, Default)]
pub struct TextStorage<B = GapBuffer> {
    buffer: B,
}

impl TextStorage<GapBuffer> {
    pub fn new() -> Self {
        TextStorage { buffer: GapBuffer::new() }
    }

    pub fn with_config(config: BufferConfig) -> Self {
        TextStorage {
            buffer: GapBuffer::with_config(config),
        }
    }
}

impl<B: TextBuffer> TextStorage<B> {
    pub fn from_buffer(buffer: B) -> Self {
        TextStorage { buffer }
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn length(&self) -> usize {
        self.buffer.length()
    }

    pub fn get(&self, index: usize, source_mark: Option<MarkId>) -> Result<char> {
        let absolute = self.resolve_point(index, source_mark)?;
        self.buffer.get(absolute)
    }

    pub fn get_chars(
        &self,
        src_begin: usize,
        src_end: usize,
        dest: &mut [char],
        dest_begin: usize,
        source_mark: Option<MarkId>,
    ) -> Result<()> {
        let range = self.resolve_range((src_begin, src_end).into(), source_mark)?;
        self.buffer.get_chars(range.start, range.end, dest, dest_begin)
    }

    pub fn replace(
        &mut self,
        range: impl Into<TextRange>,
        source: &dyn CharSource,
        source_range: impl Into<TextRange>,
        source_mark: Option<MarkId>,
    ) -> Result<()> {
        let range = self.resolve_range(range.into(), source_mark)?;
        self.buffer.replace(TextRange::Range(range), source, source_range.into())?;
        Ok(())
    }

    pub fn replace_char(&mut self, range: impl Into<TextRange>, value: char, source_mark: Option<MarkId>) -> Result<()> {
        self.replace(range, &value, Range::new(0, 1), source_mark)
    }

    pub fn mark_range(&mut self, range: impl Into<TextRange>, new_mark: MarkId, source_mark: Option<MarkId>) -> Result<()> {
        let absolute = self.resolve_range(range.into(), source_mark)?;
        self.buffer.mark_range(absolute, new_mark)
    }

    pub fn unmark(&mut self, mark: MarkId) {
        self.buffer.unmark(mark)
    }

    pub fn range_for_mark(&self, mark: MarkId, source_mark: Option<MarkId>) -> Result<Range> {
        let absolute = self.buffer.range_for_mark(mark)?;
        self.shift_back(absolute, source_mark)
    }

    pub fn marks_intersecting<T, F>(&self, range: impl Into<TextRange>, source_mark: Option<MarkId>, mut predicate: F) -> Result<Vec<T>>
    where
        F: FnMut(MarkId, Range) -> Option<T>,
    {
        let absolute = self.resolve_range(range.into(), source_mark)?;
        Ok(self
            .buffer
            .marks_intersecting(absolute)
            .into_iter()
            .filter_map(|(id, r)| predicate(id, r))
            .collect())
    }

    fn resolve_point(&self, index: usize, source_mark: Option<MarkId>) -> Result<usize> {
        let range = self.resolve_range(Range::new(index, index + 1).into(), source_mark)?;
        Ok(range.start)
    }

    fn resolve_range(&self, range: TextRange, source_mark: Option<MarkId>) -> Result<Range> {
        marks::resolve_against_source(range, source_mark, self.buffer.length(), |mark| {
            self.buffer.range_for_mark(mark)
        })
    }

    fn shift_back(&self, r: Range, source_mark: Option<MarkId>) -> Result<Range> {
        marks::shift_back(r, source_mark, |mark| self.buffer.range_for_mark(mark))
    }
}

impl<B: TextBuffer> fmt::Display for TextStorage<B>
where
    B: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TextStorage(\"{}\")", self.buffer)
    }
}

impl<B: TextBuffer> fmt::Debug for TextStorage<B>
where
    B: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TextStorage").field("buffer", &self.buffer).finish()
    }
}
