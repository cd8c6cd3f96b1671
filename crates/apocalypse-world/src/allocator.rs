//! Pooled entity records.
//!
//! Every tick rebuilds the whole next generation, so a large share of all
//! entity records is created and dropped per tick. [`EntityAllocator`] keeps
//! released records on one free list per [`EntityKind`] and hands them back
//! out instead of going to the global allocator. Each free list sits behind
//! its own mutex; hot loops go through a [`LocalPool`], which moves records
//! to and from the shared lists in batches.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use apocalypse_types::{Entity, EntityKind};

/// Records moved between a [`LocalPool`] and the shared free lists at once.
pub const BATCH: usize = 64;

/// Lifetime counters of an allocator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorCounters {
    /// Records created with a fresh heap allocation.
    pub fresh: u64,
    /// Records served from a free list.
    pub recycled: u64,
}

/// Per-kind pools of reusable entity records.
#[derive(Debug, Default)]
pub struct EntityAllocator {
    free: [Mutex<Vec<Box<Entity>>>; 3],
    fresh: AtomicU64,
    recycled: AtomicU64,
}

impl EntityAllocator {
    /// Create an allocator with empty pools.
    pub fn new() -> Self {
        Self::default()
    }

    fn list(&self, kind: EntityKind) -> std::sync::MutexGuard<'_, Vec<Box<Entity>>> {
        let slot = match kind {
            EntityKind::Human => &self.free[0],
            EntityKind::Infected => &self.free[1],
            EntityKind::Zombie => &self.free[2],
        };
        slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store `entity` in a pooled record, or a fresh one if the pool for its
    /// kind is empty.
    pub fn allocate(&self, entity: Entity) -> Box<Entity> {
        let reused = self.list(entity.kind()).pop();
        self.fill(reused, entity)
    }

    fn fill(&self, reused: Option<Box<Entity>>, entity: Entity) -> Box<Entity> {
        if let Some(mut record) = reused {
            self.recycled.fetch_add(1, Ordering::Relaxed);
            *record = entity;
            record
        } else {
            self.fresh.fetch_add(1, Ordering::Relaxed);
            Box::new(entity)
        }
    }

    /// Return a record to the pool of its current kind.
    pub fn release(&self, record: Box<Entity>) {
        self.list(record.kind()).push(record);
    }

    /// Return many records at once, taking each pool lock once per kind.
    pub fn release_many(&self, records: impl IntoIterator<Item = Box<Entity>>) {
        let mut sorted: [Vec<Box<Entity>>; 3] = Default::default();
        for record in records {
            if let Some(bucket) = sorted.get_mut(record.kind().index()) {
                bucket.push(record);
            }
        }
        for (kind, bucket) in EntityKind::ALL.into_iter().zip(sorted) {
            if !bucket.is_empty() {
                self.list(kind).extend(bucket);
            }
        }
    }

    /// Drop every pooled record, giving the memory back to the system.
    pub fn release_all(&self) {
        for kind in EntityKind::ALL {
            let mut list = self.list(kind);
            list.clear();
            list.shrink_to_fit();
        }
    }

    /// Number of records currently pooled for `kind`.
    pub fn pooled(&self, kind: EntityKind) -> usize {
        self.list(kind).len()
    }

    /// Lifetime counters.
    pub fn counters(&self) -> AllocatorCounters {
        AllocatorCounters {
            fresh: self.fresh.load(Ordering::Relaxed),
            recycled: self.recycled.load(Ordering::Relaxed),
        }
    }

    /// A worker-local cache in front of this allocator.
    pub fn local(&self) -> LocalPool<'_> {
        LocalPool {
            shared: self,
            cache: Default::default(),
            released: Vec::new(),
        }
    }

    fn take_batch(&self, kind: EntityKind, into: &mut Vec<Box<Entity>>) {
        let mut list = self.list(kind);
        let keep = list.len().saturating_sub(BATCH);
        into.extend(list.drain(keep..));
    }
}

/// A worker-private front end to an [`EntityAllocator`].
///
/// Allocation refills from the shared list [`BATCH`] records at a time;
/// released records are buffered and flushed in batches. Everything still
/// buffered is flushed on drop.
#[derive(Debug)]
pub struct LocalPool<'a> {
    shared: &'a EntityAllocator,
    cache: [Vec<Box<Entity>>; 3],
    released: Vec<Box<Entity>>,
}

impl LocalPool<'_> {
    /// Store `entity` in a pooled record.
    pub fn allocate(&mut self, entity: Entity) -> Box<Entity> {
        let kind = entity.kind();
        let Some(cache) = self.cache.get_mut(kind.index()) else {
            return self.shared.allocate(entity);
        };
        if cache.is_empty() {
            self.shared.take_batch(kind, cache);
        }
        let reused = cache.pop();
        self.shared.fill(reused, entity)
    }

    /// Hand a record back.
    pub fn release(&mut self, record: Box<Entity>) {
        self.released.push(record);
        if self.released.len() >= BATCH {
            self.flush();
        }
    }

    /// Push every buffered record back to the shared pools.
    pub fn flush(&mut self) {
        let released = std::mem::take(&mut self.released);
        let cached = self.cache.iter_mut().flat_map(std::mem::take);
        self.shared.release_many(released.into_iter().chain(cached));
    }
}

impl Drop for LocalPool<'_> {
    fn drop(&mut self) {
        self.flush();
    }
}

#[cfg(test)]
mod tests {
    use apocalypse_types::Bearing;

    use super::*;

    fn zombie(tick: i64) -> Entity {
        Entity::Zombie {
            became_zombie: tick,
            bearing: Bearing::ZERO,
        }
    }

    #[test]
    fn released_records_are_reused() {
        let allocator = EntityAllocator::new();
        let record = allocator.allocate(zombie(1));
        allocator.release(record);
        assert_eq!(allocator.pooled(EntityKind::Zombie), 1);

        let again = allocator.allocate(zombie(2));
        assert_eq!(*again, zombie(2));
        assert_eq!(allocator.pooled(EntityKind::Zombie), 0);
        assert_eq!(
            allocator.counters(),
            AllocatorCounters {
                fresh: 1,
                recycled: 1
            }
        );
    }

    #[test]
    fn pools_are_per_kind() {
        let allocator = EntityAllocator::new();
        allocator.release(allocator.allocate(zombie(0)));
        assert_eq!(allocator.pooled(EntityKind::Human), 0);
        assert_eq!(allocator.pooled(EntityKind::Zombie), 1);
    }

    #[test]
    fn release_all_empties_pools() {
        let allocator = EntityAllocator::new();
        allocator.release_many((0..10).map(|t| Box::new(zombie(t))));
        assert_eq!(allocator.pooled(EntityKind::Zombie), 10);
        allocator.release_all();
        assert_eq!(allocator.pooled(EntityKind::Zombie), 0);
    }

    #[test]
    fn local_pool_flushes_on_drop() {
        let allocator = EntityAllocator::new();
        {
            let mut pool = allocator.local();
            for t in 0..10 {
                let record = pool.allocate(zombie(t));
                pool.release(record);
            }
        }
        assert!(allocator.pooled(EntityKind::Zombie) >= 1);
        let counters = allocator.counters();
        assert_eq!(counters.fresh + counters.recycled, 10);
    }

    #[test]
    fn local_pool_refills_in_batches() {
        let allocator = EntityAllocator::new();
        allocator.release_many((0..100).map(|t| Box::new(zombie(t))));
        let mut pool = allocator.local();
        let record = pool.allocate(zombie(7));
        assert_eq!(*record, zombie(7));
        assert_eq!(allocator.pooled(EntityKind::Zombie), 100 - BATCH);
        pool.release(record);
        drop(pool);
        assert_eq!(allocator.pooled(EntityKind::Zombie), 100);
    }
}
