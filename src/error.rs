use crate::marks::MarkId;
use crate::range::Range;

/// Errors surfaced by the storage core.
///
/// Every fallible operation reports one of these at the call site and leaves the
/// buffer in its pre-call state; nothing here is ever swallowed.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum BufferError {
    #[error("range {range:?} is invalid for a buffer of length {length}")]
    InvalidRange { range: Range, length: usize },

    #[error(
        "destination of length {dest_len} at offset {dest_begin} cannot hold {required} characters"
    )]
    InvalidDestination {
        dest_len: usize,
        dest_begin: usize,
        required: usize,
    },

    #[error("no mark registered for {0:?}")]
    UnknownMark(MarkId),

    #[error("mark {0:?} is already registered")]
    DuplicateMark(MarkId),

    /// Reserved for a buffer kind with no mark registry at all. Every buffer
    /// this crate ships ([`crate::GapBuffer`], [`crate::ReplayingGapBuffer`])
    /// owns one unconditionally, so this variant is currently unreachable;
    /// it exists for a future no-registry buffer to return from its mark
    /// operations instead of silently no-oping.
    #[error("this buffer does not maintain a mark registry")]
    MarksUnsupported,

    /// Reserved for an allocator-reported failure growing the backing array.
    /// `Vec`'s own allocator aborts the process on exhaustion rather than
    /// returning an error, so nothing in this crate constructs this variant
    /// today; it stands ready for a fallible-allocation backing store.
    #[error("allocation failed while growing the buffer")]
    AllocationFailure,
}

pub type Result<T> = std::result::Result<T, BufferError>;
