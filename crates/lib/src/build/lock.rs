//! Per-artifact mutual exclusion.
//!
//! Concurrent builds of the same artifact id serialize on one async mutex;
//! builds of different ids never contend. Entries are created on first use and
//! dropped once nobody holds or waits on them.
//!
//! Clones of an entry are only taken while the table is locked, and an entry
//! is removed only when the table's own reference is the last one. A waiter
//! therefore always queues on the same mutex as the current holder; at worst an
//! abandoned wait leaves an idle entry behind until the next release of that id.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::trace;

type Entry = Arc<AsyncMutex<()>>;
type Table = Mutex<HashMap<String, Entry>>;

#[derive(Debug, Default)]
pub struct ArtifactLocks {
  table: Arc<Table>,
}

impl ArtifactLocks {
  pub fn new() -> Self {
    Self::default()
  }

  /// Wait for exclusive access to `id`.
  ///
  /// The returned guard releases the lock when dropped. Dropping this future
  /// while it waits abandons the wait and leaves the table consistent.
  pub async fn acquire(&self, id: &str) -> ArtifactLock {
    let mut waiter = Waiter {
      table: Arc::clone(&self.table),
      id: id.to_string(),
      entry: None,
    };

    let entry = {
      let mut table = lock_table(&self.table);
      let entry = table.entry(id.to_string()).or_default();
      Arc::clone(entry)
    };
    waiter.entry = Some(Arc::clone(&entry));

    let guard = entry.lock_owned().await;
    trace!(id, "artifact lock acquired");

    ArtifactLock {
      guard: Some(guard),
      waiter,
    }
  }

  /// Number of ids currently held or waited on.
  pub fn active(&self) -> usize {
    lock_table(&self.table).len()
  }
}

/// Exclusive access to one artifact id, released on drop.
#[derive(Debug)]
pub struct ArtifactLock {
  guard: Option<OwnedMutexGuard<()>>,
  waiter: Waiter,
}

impl ArtifactLock {
  pub fn id(&self) -> &str {
    &self.waiter.id
  }
}

impl Drop for ArtifactLock {
  fn drop(&mut self) {
    let table = Arc::clone(&self.waiter.table);
    let mut table = lock_table(&table);
    // Unlock while the table is held so the release and the cleanup below
    // look like one step to anyone else.
    drop(self.guard.take());
    self.waiter.release(&mut table);
    trace!(id = %self.waiter.id, "artifact lock released");
  }
}

/// A reference to a table entry, held from lookup until release.
#[derive(Debug)]
struct Waiter {
  table: Arc<Table>,
  id: String,
  entry: Option<Entry>,
}

impl Waiter {
  fn release(&mut self, table: &mut HashMap<String, Entry>) {
    let Some(entry) = self.entry.take() else {
      return;
    };
    drop(entry);

    if let Some(current) = table.get(&self.id)
      && Arc::strong_count(current) == 1
    {
      table.remove(&self.id);
    }
  }
}

impl Drop for Waiter {
  fn drop(&mut self) {
    if self.entry.is_none() {
      return;
    }
    let table = Arc::clone(&self.table);
    let mut table = lock_table(&table);
    self.release(&mut table);
  }
}

fn lock_table(table: &Table) -> MutexGuard<'_, HashMap<String, Entry>> {
  table.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::time::Duration;

  #[tokio::test]
  async fn entry_is_removed_after_release() {
    let locks = ArtifactLocks::new();
    {
      let lock = locks.acquire("a").await;
      assert_eq!(lock.id(), "a");
      assert_eq!(locks.active(), 1);
    }
    assert_eq!(locks.active(), 0);
  }

  #[tokio::test]
  async fn same_id_is_exclusive() {
    let locks = Arc::new(ArtifactLocks::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let mut tasks = Vec::new();
    for _ in 0..16 {
      let locks = Arc::clone(&locks);
      let inside = Arc::clone(&inside);
      let max_inside = Arc::clone(&max_inside);
      tasks.push(tokio::spawn(async move {
        let _lock = locks.acquire("same").await;
        let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
        max_inside.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(2)).await;
        inside.fetch_sub(1, Ordering::SeqCst);
      }));
    }
    for task in tasks {
      task.await.unwrap();
    }

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(locks.active(), 0);
  }

  #[tokio::test]
  async fn different_ids_do_not_block() {
    let locks = ArtifactLocks::new();
    let _a = locks.acquire("a").await;

    let b = tokio::time::timeout(Duration::from_millis(100), locks.acquire("b")).await;
    assert!(b.is_ok(), "lock on another id must not wait");
    assert_eq!(locks.active(), 2);
  }

  #[tokio::test]
  async fn abandoned_wait_keeps_table_consistent() {
    let locks = ArtifactLocks::new();
    let held = locks.acquire("a").await;

    let waited = tokio::time::timeout(Duration::from_millis(20), locks.acquire("a")).await;
    assert!(waited.is_err(), "second acquire should still be waiting");
    assert_eq!(locks.active(), 1);

    drop(held);
    assert_eq!(locks.active(), 0);

    let again = tokio::time::timeout(Duration::from_millis(100), locks.acquire("a")).await;
    assert!(again.is_ok());
  }

  #[tokio::test]
  async fn waiter_keeps_entry_alive_across_release() {
    let locks = Arc::new(ArtifactLocks::new());
    let held = locks.acquire("a").await;

    let waiting = {
      let locks = Arc::clone(&locks);
      tokio::spawn(async move {
        let lock = locks.acquire("a").await;
        lock.id().to_string()
      })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    drop(held);
    // The waiter still references the entry, so it must not have been removed.
    let id = waiting.await.unwrap();
    assert_eq!(id, "a");
    assert_eq!(locks.active(), 0);
  }
}
