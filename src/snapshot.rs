use std::collections::HashMap;

use crate::error::Result;
use crate::gap_buffer::ForkableBuffer;
use crate::pool::{Pool, UnpooledPool};

/// A monotonically increasing transaction identity. Generation `0` is
/// reserved for the implicit root context (no transaction open).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Generation(u64);

impl Generation {
    pub const ROOT: Generation = Generation(0);
}

/// A live or applied/discarded transaction handle, returned by
/// [`SnapshotManager::begin`]. Consumed by exactly one of a storage's
/// `apply`/`discard`, followed by [`SnapshotManager::retire`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Snapshot {
    generation: Generation,
    parent: Generation,
    mutable: bool,
}

impl Snapshot {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn is_mutable(&self) -> bool {
        self.mutable
    }
}

/// The context under which a read or write is resolved: either the implicit
/// root (no transaction open) or a specific, possibly-nested transaction.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Context {
    Root,
    Transaction(Snapshot),
}

impl Context {
    fn generation(&self) -> Generation {
        match self {
            Context::Root => Generation::ROOT,
            Context::Transaction(s) => s.generation,
        }
    }
}

impl From<Snapshot> for Context {
    fn from(s: Snapshot) -> Self {
        Context::Transaction(s)
    }
}

/// Owns the generation counter and the parent-of relationship between live
/// transactions. This is the minimal standalone MVCC manager the
/// snapshot-aware storage below depends on: it does not itself hold buffers,
/// records, or pools — those belong to each [`SnapshotAwareStorage`] that is
/// touched under a transaction.
#[derive(Debug, Default)]
pub struct SnapshotManager {
    next_generation: u64,
    parents: HashMap<Generation, Generation>,
}

impl SnapshotManager {
    pub fn new() -> Self {
        SnapshotManager {
            next_generation: 1,
            parents: HashMap::new(),
        }
    }

    /// Opens a new transaction nested under `parent`. `mutable` transactions
    /// may call `resolve_writable`; read-only ones may only read.
    pub fn begin(&mut self, parent: Context, mutable: bool) -> Snapshot {
        let parent_gen = parent.generation();
        let generation = Generation(self.next_generation);
        self.next_generation += 1;
        self.parents.insert(generation, parent_gen);
        Snapshot {
            generation,
            parent: parent_gen,
            mutable,
        }
    }

    /// The generation this transaction is nested directly under, walking past
    /// generations this manager has already retired (treated as root).
    pub fn parent_of(&self, generation: Generation) -> Generation {
        if generation == Generation::ROOT {
            return Generation::ROOT;
        }
        self.parents.get(&generation).copied().unwrap_or(Generation::ROOT)
    }

    /// Frees the bookkeeping for a transaction that every touched storage has
    /// already been told to `apply` or `discard`. Idempotent.
    pub fn retire(&mut self, tx: Snapshot) {
        self.parents.remove(&tx.generation);
    }
}

struct VersionRecord<B> {
    buffer: Option<B>,
    private_copy: bool,
}

impl<B> VersionRecord<B> {
    fn empty() -> Self {
        VersionRecord {
            buffer: None,
            private_copy: false,
        }
    }
}

/// Wraps a buffer behind a generation-indexed chain of version records
/// integrated with [`SnapshotManager`]. A flat `Vec` indexed by a
/// `Generation -> usize` map stands in for a pointer-chasing linked list of
/// records — safe Rust has no cheap shared-ownership back-pointer chain, and
/// the flat representation is both simpler and friendlier to the allocator.
pub struct SnapshotAwareStorage<B, P = UnpooledPool>
where
    P: Pool<B>,
{
    chain: Vec<VersionRecord<B>>,
    index_of: HashMap<Generation, usize>,
    pool: P,
}

impl<B: Default, P: Pool<B> + Default> Default for SnapshotAwareStorage<B, P> {
    fn default() -> Self {
        SnapshotAwareStorage {
            chain: vec![VersionRecord::empty()],
            index_of: HashMap::new(),
            pool: P::default(),
        }
    }
}

impl<B: Default, P: Pool<B> + Default> SnapshotAwareStorage<B, P> {
    pub fn new() -> Self {
        Self::default()
    }
}

impl<B, P: Pool<B>> SnapshotAwareStorage<B, P> {
    pub fn with_pool(pool: P) -> Self {
        SnapshotAwareStorage {
            chain: vec![VersionRecord::empty()],
            index_of: HashMap::new(),
            pool,
        }
    }

    fn nearest_existing_index(&self, manager: &SnapshotManager, generation: Generation) -> usize {
        let mut g = generation;
        loop {
            if g == Generation::ROOT {
                return 0;
            }
            if let Some(&idx) = self.index_of.get(&g) {
                return idx;
            }
            g = manager.parent_of(g);
        }
    }

    fn ensure_buffer(&mut self, idx: usize) -> &B
    where
        B: Default,
    {
        if self.chain[idx].buffer.is_none() {
            self.chain[idx].buffer = Some(self.pool.acquire().unwrap_or_default());
            self.chain[idx].private_copy = true;
        }
        self.chain[idx].buffer.as_ref().unwrap()
    }

    /// Resolves the record appropriate for reading under `ctx`, falling
    /// through to the nearest ancestor generation that has its own record.
    pub fn resolve_readable(&mut self, manager: &SnapshotManager, ctx: &Context) -> &B
    where
        B: Default,
    {
        let idx = self.nearest_existing_index(manager, ctx.generation());
        self.ensure_buffer(idx)
    }

    /// Resolves the record visible to `ctx` for writing, forking a private
    /// copy from the nearest ancestor's buffer if `ctx`'s own record is not
    /// already one.
    pub fn resolve_writable(&mut self, manager: &SnapshotManager, ctx: &Context) -> Result<&mut B>
    where
        B: Default + ForkableBuffer,
    {
        let generation = ctx.generation();

        if generation == Generation::ROOT {
            return Ok(self.ensure_buffer_mut(0));
        }

        if let Some(&idx) = self.index_of.get(&generation) {
            if self.chain[idx].private_copy {
                return Ok(self.chain[idx].buffer.as_mut().unwrap());
            }
        }

        let predecessor_gen = manager.parent_of(generation);
        let predecessor_idx = self.nearest_existing_index(manager, predecessor_gen);
        self.ensure_buffer(predecessor_idx);

        let mut fresh = self.pool.acquire().unwrap_or_default();
        {
            let predecessor_buf = self.chain[predecessor_idx].buffer.as_ref().unwrap();
            fresh.fork_from(predecessor_buf)?;
        }

        let idx = match self.index_of.get(&generation) {
            Some(&idx) => {
                self.chain[idx].buffer = Some(fresh);
                self.chain[idx].private_copy = true;
                idx
            }
            None => {
                let idx = self.chain.len();
                self.chain.push(VersionRecord {
                    buffer: Some(fresh),
                    private_copy: true,
                });
                self.index_of.insert(generation, idx);
                idx
            }
        };
        Ok(self.chain[idx].buffer.as_mut().unwrap())
    }

    fn ensure_buffer_mut(&mut self, idx: usize) -> &mut B
    where
        B: Default,
    {
        if self.chain[idx].buffer.is_none() {
            self.chain[idx].buffer = Some(self.pool.acquire().unwrap_or_default());
            self.chain[idx].private_copy = true;
        }
        self.chain[idx].buffer.as_mut().unwrap()
    }

    /// Commits `tx`'s record into the record visible at `tx`'s parent
    /// generation: the parent's old buffer (if any) is released to the pool,
    /// the child's buffer is adopted by move, and the parent is marked shared
    /// again (a future write there forks anew).
    pub fn apply(&mut self, tx: Snapshot) {
        let Some(child_idx) = self.index_of.remove(&tx.generation) else {
            return;
        };
        let child_buffer = self.chain[child_idx].buffer.take();
        let Some(child_buffer) = child_buffer else {
            return;
        };

        let target_idx = if tx.parent == Generation::ROOT {
            0
        } else {
            *self.index_of.entry(tx.parent).or_insert_with(|| {
                self.chain.push(VersionRecord::empty());
                self.chain.len() - 1
            })
        };

        if let Some(old) = self.chain[target_idx].buffer.take() {
            self.pool.release(old);
        }
        self.chain[target_idx].buffer = Some(child_buffer);
        self.chain[target_idx].private_copy = false;

        log::debug!(
            "snapshot generation {:?} applied into generation {:?}",
            tx.generation,
            tx.parent
        );
    }

    /// Drops `tx`'s record without committing it; its private buffer, if any,
    /// returns to the pool.
    pub fn discard(&mut self, tx: Snapshot) {
        if let Some(idx) = self.index_of.remove(&tx.generation) {
            if let Some(buf) = self.chain[idx].buffer.take() {
                self.pool.release(buf);
            }
        }
        log::debug!("snapshot generation {:?} discarded", tx.generation);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_source::CharSource;
    use crate::gap_buffer::{GapBuffer, TextBuffer};
    use crate::range::TextRange;

    fn contents(b: &GapBuffer) -> String {
        b.to_string()
    }

    #[test]
    fn root_context_reads_and_writes_the_shared_buffer() {
        let mut storage: SnapshotAwareStorage<GapBuffer> = SnapshotAwareStorage::new();
        let manager = SnapshotManager::new();
        storage
            .resolve_writable(&manager, &Context::Root)
            .unwrap()
            .replace(TextRange::Unspecified, "foobar", TextRange::Unspecified)
            .unwrap();
        assert_eq!(contents(storage.resolve_readable(&manager, &Context::Root)), "foobar");
    }

    #[test]
    fn mutable_transaction_is_invisible_until_applied() {
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

        assert_eq!(contents(storage.resolve_readable(&manager, &ctx)), "fbazr");
        assert_eq!(contents(storage.resolve_readable(&manager, &Context::Root)), "foobar");

        storage.apply(tx);
        manager.retire(tx);
        assert_eq!(contents(storage.resolve_readable(&manager, &Context::Root)), "fbazr");
    }

    #[test]
    fn discarding_a_transaction_leaves_the_parent_untouched() {
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

        storage.discard(tx);
        manager.retire(tx);
        assert_eq!(contents(storage.resolve_readable(&manager, &Context::Root)), "foobar");
    }

    #[test]
    fn nested_contexts_see_ancestors_but_not_siblings() {
        let mut storage: SnapshotAwareStorage<GapBuffer> = SnapshotAwareStorage::new();
        let mut manager = SnapshotManager::new();
        storage
            .resolve_writable(&manager, &Context::Root)
            .unwrap()
            .replace(TextRange::Unspecified, "foobar", TextRange::Unspecified)
            .unwrap();

        let parent_tx = manager.begin(Context::Root, true);
        let parent_ctx = Context::Transaction(parent_tx);
        storage
            .resolve_writable(&manager, &parent_ctx)
            .unwrap()
            .replace((0, 3).into(), "FOO", TextRange::Unspecified)
            .unwrap();

        let child_a = manager.begin(parent_ctx, true);
        let ctx_a = Context::Transaction(child_a);
        storage
            .resolve_writable(&manager, &ctx_a)
            .unwrap()
            .replace((3, 6).into(), "BAR", TextRange::Unspecified)
            .unwrap();

        let child_b = manager.begin(parent_ctx, true);
        let ctx_b = Context::Transaction(child_b);

        assert_eq!(contents(storage.resolve_readable(&manager, &ctx_a)), "FOOBAR");
        assert_eq!(contents(storage.resolve_readable(&manager, &ctx_b)), "FOObar");
        assert_eq!(contents(storage.resolve_readable(&manager, &parent_ctx)), "FOObar");
    }
}
