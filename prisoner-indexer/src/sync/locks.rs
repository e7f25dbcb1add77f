//! Per-prisoner mutual exclusion.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use tokio::sync::Mutex;

/// Async locks keyed by prisoner number.
///
/// Work for one prisoner runs one at a time; work for different prisoners runs
/// in parallel. Entries are dropped once nobody holds or waits on them.
#[derive(Default)]
pub struct EntityLocks {
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl EntityLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `work` while holding the lock for `key`.
    pub async fn run<F, T>(&self, key: &str, work: F) -> T
    where
        F: Future<Output = T>,
    {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(key.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = lock.lock().await;
            work.await
        };

        let mut locks = self.locks.lock().await;
        // one reference in the map, one here
        if Arc::strong_count(&lock) == 2 {
            locks.remove(key);
        }
        result
    }

    /// Run `work` while holding the locks for every key in `keys`.
    ///
    /// Keys are taken in sorted order, so two callers with overlapping keys
    /// cannot wait on each other.
    pub async fn run_all<F, T>(&self, keys: &[String], work: F) -> T
    where
        F: Future<Output = T>,
    {
        let mut keys: Vec<&str> = keys.iter().map(String::as_str).collect();
        keys.sort_unstable();
        keys.dedup();

        let held: Vec<(&str, Arc<Mutex<()>>)> = {
            let mut locks = self.locks.lock().await;
            keys.into_iter()
                .map(|key| {
                    let lock = locks
                        .entry(key.to_string())
                        .or_insert_with(|| Arc::new(Mutex::new(())))
                        .clone();
                    (key, lock)
                })
                .collect()
        };

        let result = {
            let mut guards = Vec::with_capacity(held.len());
            for (_, lock) in &held {
                guards.push(lock.lock().await);
            }
            work.await
        };

        let mut locks = self.locks.lock().await;
        for (key, lock) in &held {
            if Arc::strong_count(lock) == 2 {
                locks.remove(*key);
            }
        }
        result
    }

    /// Number of keys currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_key_is_serialised() {
        let locks = Arc::new(EntityLocks::new());
        let running = Arc::new(AtomicUsize::new(0));
        let max_running = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..5)
            .map(|_| {
                let locks = locks.clone();
                let running = running.clone();
                let max_running = max_running.clone();
                tokio::spawn(async move {
                    locks
                        .run("A1234AA", async {
                            let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                            max_running.fetch_max(now, Ordering::SeqCst);
                            tokio::time::sleep(Duration::from_millis(5)).await;
                            running.fetch_sub(1, Ordering::SeqCst);
                        })
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(max_running.load(Ordering::SeqCst), 1);
        assert!(locks.is_empty().await);
    }

    #[tokio::test]
    async fn test_different_keys_run_in_parallel() {
        let locks = Arc::new(EntityLocks::new());
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();

        let waiting = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.run("A1111AA", async { rx.await.is_ok() }).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        // would deadlock if keys shared a lock
        locks
            .run("B2222BB", async {
                tx.send(()).unwrap();
            })
            .await;

        assert!(waiting.await.unwrap());
    }

    #[tokio::test]
    async fn test_run_all_waits_for_every_key() {
        let locks = Arc::new(EntityLocks::new());
        let (release, held) = tokio::sync::oneshot::channel::<()>();

        let holder = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.run("B2222BB", async { held.await.is_ok() }).await })
        };
        tokio::time::sleep(Duration::from_millis(5)).await;

        let keys = vec!["C3333CC".to_string(), "B2222BB".to_string(), "C3333CC".to_string()];
        let batch = {
            let locks = locks.clone();
            tokio::spawn(async move { locks.run_all(&keys, async { "written" }).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!batch.is_finished());

        release.send(()).unwrap();

        assert!(holder.await.unwrap());
        assert_eq!(batch.await.unwrap(), "written");
        assert!(locks.is_empty().await);
    }
}
