use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::char_source::CharSource;
use crate::config::BufferConfig;
use crate::error::Result;
use crate::gap_buffer::{ForkableBuffer, GapBuffer, TextBuffer};
use crate::marks::{EditSpan, MarkId};
use crate::range::{Range, TextRange};

/// Identifies a [`ReplayingGapBuffer`] for the purposes of the "did this
/// buffer's diff window originate from exactly this object" identity check
/// in [`ReplayingGapBuffer::sync_to`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BufferId(u64);

static NEXT_BUFFER_ID: AtomicU64 = AtomicU64::new(0);

impl BufferId {
    fn new() -> Self {
        BufferId(NEXT_BUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A compacted record of the edits applied to a [`ReplayingGapBuffer`] since
/// its last `sync_to`. `source_range`, when present, names the range in the
/// buffer identified by `source_id` that, if replaced by `result_range`
/// characters of this buffer, reproduces every edit tracked since the sync.
#[derive(Clone, Debug)]
struct DiffWindow {
    source_range: Option<Range>,
    result_range: Range,
    source_id: Option<BufferId>,
    valid: bool,
}

impl Default for DiffWindow {
    fn default() -> Self {
        DiffWindow {
            source_range: None,
            result_range: Range::ZERO,
            source_id: None,
            valid: true,
        }
    }
}

/// A gap buffer augmented with a single pending diff window, so that forking
/// a fresh copy-on-write buffer from the same lineage can replay a short edit
/// sequence instead of copying the whole content again.
#[derive(Clone)]
pub struct ReplayingGapBuffer {
    id: BufferId,
    inner: GapBuffer,
    window: DiffWindow,
}

impl Default for ReplayingGapBuffer {
    fn default() -> Self {
        ReplayingGapBuffer::new()
    }
}

impl ReplayingGapBuffer {
    pub fn new() -> Self {
        ReplayingGapBuffer::with_config(BufferConfig::default())
    }

    pub fn with_config(config: BufferConfig) -> Self {
        ReplayingGapBuffer {
            id: BufferId::new(),
            inner: GapBuffer::with_config(config),
            window: DiffWindow::default(),
        }
    }

    pub fn id(&self) -> BufferId {
        self.id
    }

    /// Whether a replayable diff window is currently pending.
    pub fn has_pending_window(&self) -> bool {
        self.window.valid && self.window.source_range.is_some()
    }

    fn track_edit(&mut self, span: EditSpan) {
        if !self.window.valid {
            return;
        }
        let edit_range = span.deleted_range();
        let ins_len = span.inserted as i64;
        let del_len = edit_range.len() as i64;

        match self.window.source_range {
            None => {
                self.window.source_range = Some(edit_range);
                self.window.result_range = Range::new(edit_range.start, edit_range.start + span.inserted);
            }
            Some(mut source) => {
                let result = self.window.result_range;
                if edit_range.start == result.end {
                    // Strict append adjacent to the running window.
                    let new_source_end = edit_range.end as i64 - result.len() as i64 + source.len() as i64;
                    if new_source_end < source.start as i64 {
                        self.window.valid = false;
                        return;
                    }
                    source.end = new_source_end as usize;
                    self.window.source_range = Some(source);
                    self.window.result_range = Range::new(result.start, edit_range.start + span.inserted);
                } else if edit_range.end == result.start {
                    // Strict prepend.
                    source.start = edit_range.start;
                    self.window.source_range = Some(source);
                    let new_result_end = result.end as i64 + ins_len - del_len;
                    self.window.result_range = Range::new(edit_range.start, new_result_end as usize);
                } else {
                    // Gap or overlap with the window: abandon it until the next sync.
                    self.window.valid = false;
                }
            }
        }
    }

    /// Replaces this buffer's contents with `source`'s. If `source`'s own
    /// pending window was recorded against this exact buffer (i.e. `source`
    /// was last forked from `self`), replays that compacted diff instead of
    /// copying `source`'s full content.
    pub fn sync_to(&mut self, source: &ReplayingGapBuffer) -> Result<()> {
        let replayable = source.window.valid && source.window.source_id == Some(self.id);

        if replayable {
            if let Some(source_range) = source.window.source_range {
                self.inner
                    .replace(TextRange::Range(source_range), source, TextRange::Range(source.window.result_range))?;
            }
            // No edits at all since the last sync: source already equals self.
        } else {
            self.inner
                .replace(TextRange::Unspecified, source, TextRange::Unspecified)?;
        }

        self.window = DiffWindow {
            source_range: None,
            result_range: Range::ZERO,
            source_id: Some(source.id),
            valid: true,
        };
        Ok(())
    }
}

impl TextBuffer for ReplayingGapBuffer {
    fn length(&self) -> usize {
        self.inner.length()
    }

    fn get(&self, index: usize) -> Result<char> {
        self.inner.get(index)
    }

    fn get_chars(&self, src_begin: usize, src_end: usize, dest: &mut [char], dest_begin: usize) -> Result<()> {
        self.inner.get_chars(src_begin, src_end, dest, dest_begin)
    }

    fn replace(&mut self, range: TextRange, source: &dyn CharSource, source_range: TextRange) -> Result<EditSpan> {
        let span = self.inner.replace(range, source, source_range)?;
        self.track_edit(span);
        Ok(span)
    }

    fn mark_range(&mut self, range: Range, mark: MarkId) -> Result<()> {
        self.inner.mark_range(range, mark)
    }

    fn unmark(&mut self, mark: MarkId) {
        self.inner.unmark(mark)
    }

    fn range_for_mark(&self, mark: MarkId) -> Result<Range> {
        self.inner.range_for_mark(mark)
    }

    fn marks_intersecting(&self, query: Range) -> Vec<(MarkId, Range)> {
        self.inner.marks_intersecting(query)
    }
}

impl CharSource for ReplayingGapBuffer {
    fn source_len(&self) -> usize {
        self.inner.length()
    }

    fn write_into(&self, subrange: Range, dest: &mut [char], dest_begin: usize) -> Result<()> {
        self.inner.get_chars(subrange.start, subrange.end, dest, dest_begin)
    }
}

impl ForkableBuffer for ReplayingGapBuffer {
    fn fork_from(&mut self, source: &ReplayingGapBuffer) -> Result<()> {
        self.sync_to(source)
    }
}

impl fmt::Display for ReplayingGapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.inner)
    }
}

impl fmt::Debug for ReplayingGapBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReplayingGapBuffer")
            .field("id", &self.id)
            .field("inner", &self.inner)
            .field("has_pending_window", &self.has_pending_window())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seeded(contents: &str) -> ReplayingGapBuffer {
        let mut b = ReplayingGapBuffer::new();
        b.replace(TextRange::Unspecified, contents, TextRange::Unspecified).unwrap();
        // A freshly-seeded buffer is not itself the product of a sync; clear the
        // window so tests start from "no edits yet" as a fork target would.
        b.window = DiffWindow::default();
        b
    }

    fn contents(b: &ReplayingGapBuffer) -> String {
        let len = b.length();
        let mut chars = vec!['\0'; len];
        b.get_chars(0, len, &mut chars, 0).unwrap();
        chars.into_iter().collect()
    }

    #[test]
    fn first_fork_copies_full_content() {
        let source = seeded("foobar");
        let mut target = ReplayingGapBuffer::new();
        target.sync_to(&source).unwrap();
        assert_eq!(contents(&target), "foobar");
    }

    #[test]
    fn append_edits_extend_one_window() {
        let mut b = seeded("foobar");
        b.replace(Range::new(6, 6).into(), "baz", TextRange::Unspecified).unwrap();
        assert!(b.has_pending_window());
        b.replace(Range::new(9, 9).into(), "!", TextRange::Unspecified).unwrap();
        assert!(b.has_pending_window(), "adjacent appends should stay merged into one window");
        assert_eq!(contents(&b), "foobarbaz!");
    }

    #[test]
    fn disjoint_edits_invalidate_the_window() {
        let mut b = seeded("foobarbaz");
        b.replace(Range::new(0, 3).into(), "XXX", TextRange::Unspecified).unwrap();
        assert!(b.has_pending_window());
        b.replace(Range::new(6, 9).into(), "YYY", TextRange::Unspecified).unwrap();
        assert!(!b.has_pending_window(), "a second, disjoint edit must abandon the window");
    }

    #[test]
    fn refork_into_the_same_lineage_replays_instead_of_copying() {
        let mut parent = seeded("foobar");
        let mut child = ReplayingGapBuffer::new();
        child.sync_to(&parent).unwrap();
        assert_eq!(contents(&child), "foobar");

        child.replace(Range::new(1, 5).into(), "baz", TextRange::Unspecified).unwrap();
        assert_eq!(contents(&child), "fbazr");
        assert!(child.has_pending_window());

        // parent re-syncs from child: child's window source_id points back at
        // parent's id, so this should replay rather than full-copy.
        parent.sync_to(&child).unwrap();
        assert_eq!(contents(&parent), "fbazr");
    }

    #[test]
    fn sync_resets_window_to_no_edits_yet() {
        let mut a = seeded("abc");
        let mut b = ReplayingGapBuffer::new();
        b.sync_to(&a).unwrap();
        assert!(!b.has_pending_window());
        a.replace(Range::new(0, 0).into(), "Z", TextRange::Unspecified).unwrap();
        assert_ne!(contents(&a), contents(&b));
    }
}
