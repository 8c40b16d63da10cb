use bytes::Bytes;
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Response bodies keyed by URL. Recent bodies live in memory; bodies stored
/// with [`ResponseCache::insert_persistent`] are also written to disk.
#[derive(Clone)]
pub struct ResponseCache {
    inner: Arc<RwLock<ResponseCacheInner>>,
}

struct ResponseCacheInner {
    entries: HashMap<String, Bytes>,
    access_order: Vec<String>,
    capacity: usize,
    cache_dir: PathBuf,
    max_disk_bytes: u64,
}

impl ResponseCache {
    pub fn new(cache_dir: PathBuf, capacity: usize, max_disk_mb: u64) -> Self {
        if let Err(e) = fs::create_dir_all(&cache_dir) {
            log::warn!("failed to create cache directory {}: {}", cache_dir.display(), e);
        }

        Self {
            inner: Arc::new(RwLock::new(ResponseCacheInner {
                entries: HashMap::new(),
                access_order: Vec::new(),
                capacity: capacity.max(1),
                cache_dir,
                max_disk_bytes: max_disk_mb * 1024 * 1024,
            })),
        }
    }

    pub async fn get(&self, url: &str) -> Option<Bytes> {
        let mut inner = self.inner.write().await;

        if let Some(body) = inner.entries.get(url).cloned() {
            inner.touch(url);
            return Some(body);
        }

        let body = inner.load_from_disk(url)?;
        inner.insert_memory(url.to_string(), body.clone());
        Some(body)
    }

    pub async fn insert(&self, url: String, body: Bytes) {
        let mut inner = self.inner.write().await;
        inner.insert_memory(url, body);
    }

    pub async fn insert_persistent(&self, url: String, body: Bytes) {
        let mut inner = self.inner.write().await;
        inner.save_to_disk(&url, &body);
        inner.insert_memory(url, body);
    }

    /// Drops `url` from memory and disk. Returns whether anything was removed.
    pub async fn invalidate(&self, url: &str) -> bool {
        let mut inner = self.inner.write().await;
        let in_memory = inner.entries.remove(url).is_some();
        inner.access_order.retain(|k| k != url);
        let on_disk = fs::remove_file(inner.url_to_filename(url)).is_ok();
        in_memory || on_disk
    }
}

impl ResponseCacheInner {
    fn touch(&mut self, url: &str) {
        self.access_order.retain(|k| k != url);
        self.access_order.push(url.to_string());
    }

    fn insert_memory(&mut self, url: String, body: Bytes) {
        if !self.entries.contains_key(&url) && self.entries.len() >= self.capacity {
            if let Some(oldest) = self.access_order.first().cloned() {
                self.entries.remove(&oldest);
                self.access_order.remove(0);
            }
        }

        self.touch(&url);
        self.entries.insert(url, body);
    }

    fn url_to_filename(&self, url: &str) -> PathBuf {
        self.cache_dir.join(format!("{:016x}", fnv1a_hash(url)))
    }

    fn load_from_disk(&self, url: &str) -> Option<Bytes> {
        fs::read(self.url_to_filename(url)).ok().map(Bytes::from)
    }

    fn save_to_disk(&self, url: &str, body: &Bytes) {
        self.cleanup_old_files();

        let path = self.url_to_filename(url);
        if let Err(e) = fs::write(&path, body) {
            log::warn!("failed to write cache file {}: {}", path.display(), e);
        }
    }

    /// Once the directory grows past the cap, removes the oldest files until
    /// usage is at or under 80% of it.
    fn cleanup_old_files(&self) {
        let entries: Vec<_> = fs::read_dir(&self.cache_dir)
            .ok()
            .map(|rd| {
                rd.filter_map(|e| e.ok())
                    .filter_map(|e| {
                        let meta = e.metadata().ok()?;
                        let modified = meta.modified().ok()?;
                        Some((e.path(), meta.len(), modified))
                    })
                    .collect()
            })
            .unwrap_or_default();

        let total_size: u64 = entries.iter().map(|(_, size, _)| size).sum();
        if total_size <= self.max_disk_bytes {
            return;
        }

        let mut entries = entries;
        entries.sort_by_key(|(_, _, modified)| *modified);

        let target = self.max_disk_bytes * 80 / 100;
        let mut current_size = total_size;
        for (path, size, _) in entries {
            if current_size <= target {
                break;
            }
            if fs::remove_file(&path).is_ok() {
                log::debug!("evicted {} from disk cache", path.display());
                current_size -= size;
            }
        }
    }
}

/// 64-bit FNV-1a. Cache file names must stay the same across builds.
fn fnv1a_hash(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in s.bytes() {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

#[cfg(test)]
impl ResponseCache {
    async fn contains(&self, url: &str) -> bool {
        let inner = self.inner.read().await;
        inner.entries.contains_key(url) || inner.url_to_filename(url).exists()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache(capacity: usize) -> (tempfile::TempDir, ResponseCache) {
        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf(), capacity, 1);
        (dir, cache)
    }

    #[test]
    fn test_file_names_are_stable() {
        assert_eq!(fnv1a_hash(""), 0xcbf2_9ce4_8422_2325);
        assert_eq!(fnv1a_hash("a"), 0xaf63_dc4c_8601_ec8c);

        let dir = tempfile::tempdir().unwrap();
        let cache = ResponseCache::new(dir.path().to_path_buf(), 1, 1);
        let inner = cache.inner.try_read().unwrap();
        assert_eq!(
            inner.url_to_filename("a"),
            dir.path().join("af63dc4c8601ec8c")
        );
    }

    #[tokio::test]
    async fn test_memory_hit() {
        let (_dir, cache) = cache(4);
        cache.insert("a".into(), Bytes::from_static(b"one")).await;
        assert_eq!(cache.get("a").await, Some(Bytes::from_static(b"one")));
        assert_eq!(cache.get("b").await, None);
    }

    #[tokio::test]
    async fn test_least_recently_used_is_evicted() {
        let (_dir, cache) = cache(2);
        cache.insert("a".into(), Bytes::from_static(b"1")).await;
        cache.insert("b".into(), Bytes::from_static(b"2")).await;
        // touching "a" makes "b" the oldest
        cache.get("a").await;
        cache.insert("c".into(), Bytes::from_static(b"3")).await;

        assert!(cache.contains("a").await);
        assert!(!cache.contains("b").await);
        assert!(cache.contains("c").await);
    }

    #[tokio::test]
    async fn test_reinsert_does_not_evict() {
        let (_dir, cache) = cache(2);
        cache.insert("a".into(), Bytes::from_static(b"1")).await;
        cache.insert("b".into(), Bytes::from_static(b"2")).await;
        cache.insert("b".into(), Bytes::from_static(b"22")).await;

        assert!(cache.contains("a").await);
        assert_eq!(cache.get("b").await, Some(Bytes::from_static(b"22")));
    }

    #[tokio::test]
    async fn test_persistent_entries_survive_memory_eviction() {
        let (_dir, cache) = cache(1);
        cache
            .insert_persistent("poster".into(), Bytes::from_static(b"jpeg"))
            .await;
        cache.insert("other".into(), Bytes::from_static(b"x")).await;

        assert_eq!(cache.get("poster").await, Some(Bytes::from_static(b"jpeg")));
    }

    #[tokio::test]
    async fn test_invalidate_removes_both_layers() {
        let (_dir, cache) = cache(4);
        cache
            .insert_persistent("page1".into(), Bytes::from_static(b"{}"))
            .await;

        assert!(cache.invalidate("page1").await);
        assert!(!cache.contains("page1").await);
        assert!(!cache.invalidate("page1").await);
    }

    #[tokio::test]
    async fn test_disk_cap_evicts_old_files() {
        let (dir, cache) = cache(1);
        let big = Bytes::from(vec![0u8; 700 * 1024]);
        cache.insert_persistent("first".into(), big.clone()).await;
        cache.insert_persistent("second".into(), big.clone()).await;
        // the third write sees 1.4MB on disk, over the 1MB cap
        cache.insert_persistent("third".into(), big).await;

        let files = fs::read_dir(dir.path()).unwrap().count();
        assert!(files < 3);
        assert!(cache.contains("third").await);
    }
}
