use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::{BufferError, Result};
use crate::range::{Range, TextRange};

/// An opaque mark identity.
///
/// Identity is handle equality of a monotonically increasing counter, never a
/// hash or comparison of anything the caller associates with the mark.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MarkId(u64);

static NEXT_MARK_ID: AtomicU64 = AtomicU64::new(0);

impl MarkId {
    pub fn new() -> Self {
        MarkId(NEXT_MARK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for MarkId {
    fn default() -> Self {
        MarkId::new()
    }
}

/// The net effect of one `replace` call, in absolute buffer coordinates: a
/// deletion of `[start, start + deleted)` followed by an insertion of `inserted`
/// characters at `start`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EditSpan {
    pub start: usize,
    pub deleted: usize,
    pub inserted: usize,
}

impl EditSpan {
    #[inline(always)]
    pub fn deleted_range(&self) -> Range {
        Range {
            start: self.start,
            end: self.start + self.deleted,
        }
    }

    #[inline(always)]
    pub fn net_shift(&self) -> i64 {
        self.inserted as i64 - self.deleted as i64
    }
}

fn shift_by(x: usize, delta: i64) -> usize {
    if delta >= 0 {
        x + delta as usize
    } else {
        x - (-delta) as usize
    }
}

/// Applies the update-policy-on-edit rules to a single mark range.
pub(crate) fn apply_edit_to_range(r: Range, span: EditSpan) -> Range {
    let s = span.start;
    let e = span.start + span.deleted;
    let shift = span.net_shift();
    let ms = r.start;
    let me = r.end;

    if me <= s {
        // Entirely before the edit.
        r
    } else if ms >= e {
        // Entirely after the edit: shift both endpoints.
        Range {
            start: shift_by(ms, shift),
            end: shift_by(me, shift),
        }
    } else if s <= ms && me <= e {
        // Strictly inside the deleted span: collapse to the edit point, growing
        // into at most the inserted text (sticky-outside leaves room for a
        // future explicit unmark rather than auto-removing the mark).
        let collapsed_len = span.inserted.min(me - ms);
        Range {
            start: s,
            end: s + collapsed_len,
        }
    } else if ms < s {
        if me <= e {
            // Overlaps the start of the edit only: the mark's tail is deleted,
            // and sticky-outside means the insertion does not grow it back.
            Range { start: ms, end: s }
        } else {
            // Contains the edit entirely: both endpoints survive, the end shifts.
            Range {
                start: ms,
                end: shift_by(me, shift),
            }
        }
    } else {
        // ms >= s && me > e: overlaps the end of the edit only. The mark's
        // start is pushed past the inserted text (sticky-outside), its end
        // shifts by the net amount.
        debug_assert!(me > e);
        Range {
            start: s + span.inserted,
            end: shift_by(me, shift),
        }
    }
}

/// Side-table mapping opaque mark identities to their live absolute range.
///
/// Kept as a flat association list: editor-scale mark counts (tens to low
/// thousands) favor a cache-friendly linear scan over the bookkeeping of a
/// balanced interval tree, and no ordering is ever observed by callers.
#[derive(Clone, Debug, Default)]
pub struct MarkRegistry {
    marks: Vec<(MarkId, Range)>,
}

impl MarkRegistry {
    pub fn new() -> Self {
        MarkRegistry { marks: Vec::new() }
    }

    pub fn mark_range(&mut self, range: Range, mark: MarkId) -> Result<()> {
        if self.marks.iter().any(|(m, _)| *m == mark) {
            return Err(BufferError::DuplicateMark(mark));
        }
        self.marks.push((mark, range));
        Ok(())
    }

    pub fn unmark(&mut self, mark: MarkId) {
        self.marks.retain(|(m, _)| *m != mark);
    }

    pub fn range_for(&self, mark: MarkId) -> Result<Range> {
        self.marks
            .iter()
            .find(|(m, _)| *m == mark)
            .map(|(_, r)| *r)
            .ok_or(BufferError::UnknownMark(mark))
    }

    /// Enumerates marks whose absolute range intersects `query`, in
    /// registration order. An empty `query` matches marks whose range contains
    /// the point (`start <= point <= end`).
    pub fn intersecting(&self, query: Range) -> impl Iterator<Item = (MarkId, Range)> + '_ {
        let point_query = query.is_empty().then_some(query.start);
        self.marks
            .iter()
            .filter(move |(_, r)| match point_query {
                Some(point) => r.contains_point(point),
                None => r.intersects(query),
            })
            .map(|(id, r)| (*id, *r))
    }

    pub fn update_for_edit(&mut self, span: EditSpan) {
        for (_, r) in self.marks.iter_mut() {
            *r = apply_edit_to_range(*r, span);
        }
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// Resolves a query/edit range against an optional source mark: if
/// `source_mark` names a mark with absolute range `(s, e)`, an input `(a, b)`
/// is interpreted as `(s+a, s+b)`, and `Unspecified` resolves to `(s, e)`
/// instead of the whole buffer.
///
/// `range_for` looks up a mark's current absolute range; callers pass in
/// whatever owns the registry (a [`MarkRegistry`] directly, or a buffer
/// that delegates to one) rather than this function taking one concretely,
/// so both the registry's own call sites and [`crate::storage::TextStorage`]
/// (generic over the buffer kind) can share the same coordinate math.
pub(crate) fn resolve_against_source(
    range: TextRange,
    source_mark: Option<MarkId>,
    full_len: usize,
    range_for: impl FnOnce(MarkId) -> Result<Range>,
) -> Result<Range> {
    match source_mark {
        None => Ok(range.resolve(full_len)),
        Some(mark) => {
            let base = range_for(mark)?;
            Ok(match range {
                TextRange::Unspecified => base,
                TextRange::Range(r) => Range {
                    start: base.start + r.start,
                    end: base.start + r.end,
                },
            })
        }
    }
}

/// Shifts a returned absolute range back into `source_mark`-relative
/// coordinates, i.e. subtracts the mark's start. A no-op if `source_mark` is
/// `None`.
pub(crate) fn shift_back(
    r: Range,
    source_mark: Option<MarkId>,
    range_for: impl FnOnce(MarkId) -> Result<Range>,
) -> Result<Range> {
    match source_mark {
        None => Ok(r),
        Some(mark) => {
            let base = range_for(mark)?;
            Ok(Range {
                start: r.start - base.start,
                end: r.end - base.start,
            })
        }
    }
}
