//! A gap-buffer text storage core: an editable in-memory sequence of `char`s
//! with O(1) amortized localized edits, mark tracking across edits, and an
//! optional multi-version snapshot layer for transactional reads/writes.
//!
//! No Unicode grapheme/word/line semantics — this crate treats text as a flat
//! sequence of `char` code units. No persistence, no undo/redo.

mod char_source;
mod config;
mod error;
mod gap_buffer;
mod marks;
mod pool;
mod range;
mod replaying;
mod snapshot;
mod storage;

pub use char_source::CharSource;
pub use config::BufferConfig;
pub use error::{BufferError, Result};
pub use gap_buffer::{ForkableBuffer, GapBuffer, TextBuffer};
pub use marks::MarkId;
pub use pool::{Pool, SingleSlotPool, UnpooledPool};
pub use range::{Range, TextRange};
pub use replaying::{BufferId, ReplayingGapBuffer};
pub use snapshot::{Context, Generation, Snapshot, SnapshotAwareStorage, SnapshotManager};
pub use storage::TextStorage;

#[cfg(test)]
mod integration_tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::{Rng, SeedableRng};
    use rstest::rstest;

    /// Surfaces `log::trace!`/`debug!` diagnostics (gap slides, reallocations,
    /// pool contention, snapshot apply/discard) under `RUST_LOG=trace cargo test`.
    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn storage_of(s: &str) -> TextStorage {
        let mut storage = TextStorage::new();
        storage.replace(TextRange::Unspecified, s, TextRange::Unspecified, None).unwrap();
        storage
    }

    #[rstest]
    #[case::empty_to_single_char("", (0, 0), "a", "a")]
    #[case::replace_middle_range("foobar", (1, 5), "baz", "fbazr")]
    #[case::insert_at_midpoint("foobar", (3, 3), "baz", "foobazbar")]
    #[case::append_at_end("foobar", (6, 6), "baz", "foobarbaz")]
    fn end_to_end_scenarios(#[case] initial: &str, #[case] range: (usize, usize), #[case] text: &str, #[case] expected: &str) {
        let mut storage = storage_of(initial);
        let len = text.chars().count();
        storage.replace(range, text, (0, len), None).unwrap();
        assert_eq!(storage.to_string(), format!("TextStorage(\"{}\")", expected));
    }

    #[test]
    fn appending_one_char_at_a_time_builds_the_alphabet() {
        let mut storage = TextStorage::new();
        for c in 'a'..='z' {
            let len = storage.length();
            storage.replace_char((len, len), c, None).unwrap();
        }
        assert_eq!(storage.to_string(), "TextStorage(\"abcdefghijklmnopqrstuvwxyz\")");
    }

    /// A seeded randomized sequence of chunk inserts and removals must leave
    /// the storage's contents identical to a reference `String` fed the same
    /// edits at every step.
    #[test]
    fn randomized_edits_match_a_string_oracle_seed_zero() {
        init_logging();
        let mut rng = SmallRng::seed_from_u64(0);
        let mut storage = TextStorage::new();
        let mut oracle = String::new();
        let alphabet: Vec<char> = ('a'..='z').collect();

        for _ in 0..500 {
            let oracle_len = oracle.chars().count();
            let do_insert = oracle_len == 0 || rng.gen_bool(0.7);

            if do_insert {
                let chunk: String = (0..10).map(|_| alphabet[rng.gen_range(0..alphabet.len())]).collect();
                let at = rng.gen_range(0..=oracle_len);
                let chunk_len = chunk.chars().count();
                storage.replace((at, at), chunk.as_str(), (0, chunk_len), None).unwrap();
                oracle.insert_str(byte_offset(&oracle, at), &chunk);
            } else {
                let start = rng.gen_range(0..oracle_len);
                let remove_len = rng.gen_range(1..=(oracle_len - start).min(10));
                let end = start + remove_len;
                storage.replace((start, end), "", (0, 0), None).unwrap();
                let b_start = byte_offset(&oracle, start);
                let b_end = byte_offset(&oracle, end);
                oracle.replace_range(b_start..b_end, "");
            }

            assert_eq!(storage.to_string(), format!("TextStorage(\"{}\")", oracle));
        }
    }

    fn byte_offset(s: &str, char_index: usize) -> usize {
        s.char_indices().nth(char_index).map(|(i, _)| i).unwrap_or(s.len())
    }

    #[test]
    fn snapshot_scenario_apply_and_discard() {
        let mut storage: SnapshotAwareStorage<GapBuffer> = SnapshotAwareStorage::new();
        let mut manager = SnapshotManager::new();
        storage
            .resolve_writable(&manager, &Context::Root)
            .unwrap()
            .replace(TextRange::Unspecified, "foobar", TextRange::Unspecified)
            .unwrap();

        let tx = manager.begin(Context::Root, true);
        let ctx = Context::Transaction(tx);
        storage
            .resolve_writable(&manager, &ctx)
            .unwrap()
            .replace((1, 5).into(), "baz", (0, 3).into())
            .unwrap();

        assert_eq!(storage.resolve_readable(&manager, &Context::Root).to_string(), "foobar");
        storage.discard(tx);
        manager.retire(tx);
        assert_eq!(storage.resolve_readable(&manager, &Context::Root).to_string(), "foobar");

        let tx2 = manager.begin(Context::Root, true);
        let ctx2 = Context::Transaction(tx2);
        storage
            .resolve_writable(&manager, &ctx2)
            .unwrap()
            .replace((1, 5).into(), "baz", (0, 3).into())
            .unwrap();
        storage.apply(tx2);
        manager.retire(tx2);
        assert_eq!(storage.resolve_readable(&manager, &Context::Root).to_string(), "fbazr");
    }

    #[test]
    fn replaying_buffer_reforks_by_replay_after_a_localized_edit() {
        let mut parent = ReplayingGapBuffer::new();
        parent.replace(TextRange::Unspecified, "foobar", TextRange::Unspecified).unwrap();

        let mut child = ReplayingGapBuffer::new();
        child.fork_from(&parent).unwrap();
        child.replace((1, 5).into(), "baz", TextRange::Unspecified).unwrap();

        parent.fork_from(&child).unwrap();
        assert_eq!(parent.to_string(), "fbazr");
    }
}
