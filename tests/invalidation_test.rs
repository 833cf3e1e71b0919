//! End-to-end invalidation tests.
//!
//! Content writes go through `ContentRepository` with a `CacheObserver`, reads
//! go through `CacheService::remember`, and every test checks that the next
//! read after a write sees the write.

use forge_cache::backend::{CacheBackend, InMemoryBackend};
use forge_cache::model::{ForumThread, Mod, ModCategory, ModComment, NewsArticle};
use forge_cache::{
    CacheObserver, CacheService, ContentRepository, EntityKind, Error, Result, TagRegistry,
    TagSet,
};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

fn setup() -> (
    CacheService<InMemoryBackend>,
    ContentRepository<CacheObserver<InMemoryBackend>>,
) {
    let _ = env_logger::builder().is_test(true).try_init();
    let cache = CacheService::new(InMemoryBackend::new());
    let repo = ContentRepository::new(CacheObserver::new(cache.clone()));
    (cache, repo)
}

fn a_mod(id: u64, title: &str) -> Mod {
    Mod {
        id,
        title: title.to_string(),
        owner_id: Some(7),
        category_ids: vec![],
    }
}

/// Remember a string, counting producer runs.
async fn remember_counted<B: CacheBackend>(
    cache: &CacheService<B>,
    key: &str,
    tags: &TagSet,
    value: &str,
    calls: &AtomicUsize,
) -> String {
    cache
        .remember(key, None, tags, || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(value.to_string())
        })
        .await
        .expect("remember failed")
}

/// Test 1: Mod update invalidates its listing
///
/// - First read computes, second read hits
/// - Saving mod 42 makes the next read recompute
#[tokio::test]
async fn test_mod_update_refreshes_listing() {
    let (cache, repo) = setup();
    let calls = AtomicUsize::new(0);
    let tags = TagRegistry::mods([42]);

    repo.save(a_mod(42, "Old title")).await.unwrap();

    assert_eq!(
        remember_counted(&cache, "mods:list", &tags, "initial", &calls).await,
        "initial"
    );
    assert_eq!(
        remember_counted(&cache, "mods:list", &tags, "ignored", &calls).await,
        "initial"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    repo.save(a_mod(42, "New title")).await.unwrap();

    assert_eq!(
        remember_counted(&cache, "mods:list", &tags, "fresh", &calls).await,
        "fresh"
    );
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Test 2: Deleting a comment flushes the parent mod's cached views
#[tokio::test]
async fn test_comment_delete_flushes_parent_mod() {
    let (cache, repo) = setup();

    repo.save(ModComment {
        id: 9,
        mod_id: Some(42),
        user_id: Some(3),
        body: "Works great".into(),
    })
    .await
    .unwrap();

    cache
        .put("mod:42:page", &"page", None, &TagRegistry::mods([42]))
        .await
        .unwrap();
    cache
        .put(
            "mod:42:comments",
            &vec![9u64],
            None,
            &TagRegistry::mod_comments([42]),
        )
        .await
        .unwrap();
    cache
        .put("comment:9", &"Works great", None, &TagRegistry::comments([9]))
        .await
        .unwrap();

    repo.delete::<ModComment>(9).await.unwrap();

    assert_eq!(cache.get::<String>("mod:42:page").await.unwrap(), None);
    assert_eq!(cache.get::<Vec<u64>>("mod:42:comments").await.unwrap(), None);
    assert_eq!(cache.get::<String>("comment:9").await.unwrap(), None);
    assert!(repo.is_trashed(EntityKind::ModComment, 9));
}

/// Test 3: Restore invalidates like save
#[tokio::test]
async fn test_restore_flushes_again() {
    let (cache, repo) = setup();
    repo.save(ForumThread {
        id: 5,
        forum_id: Some(2),
        user_id: None,
        title: "Load order help".into(),
    })
    .await
    .unwrap();
    repo.delete::<ForumThread>(5).await.unwrap();

    cache
        .put("forum:2:threads", &0u32, None, &TagRegistry::forums([2]))
        .await
        .unwrap();
    repo.restore::<ForumThread>(5).await.unwrap();

    assert_eq!(cache.get::<u32>("forum:2:threads").await.unwrap(), None);
}

/// Test 4: Writes leave unrelated entries alone
///
/// - Forum activity must not touch the home feed
/// - News activity must not touch thread listings
#[tokio::test]
async fn test_unrelated_entries_survive() {
    let (cache, repo) = setup();

    cache
        .put("home:feed", &"feed", None, &TagRegistry::home())
        .await
        .unwrap();
    cache
        .put("threads:all", &"threads", None, &TagRegistry::threads([1]))
        .await
        .unwrap();

    repo.save(ForumThread {
        id: 2,
        forum_id: None,
        user_id: None,
        title: "Off topic".into(),
    })
    .await
    .unwrap();

    assert_eq!(
        cache.get::<String>("home:feed").await.unwrap().as_deref(),
        Some("feed")
    );
    assert_eq!(cache.get::<String>("threads:all").await.unwrap(), None);

    cache
        .put("threads:all", &"threads", None, &TagRegistry::threads([1]))
        .await
        .unwrap();
    repo.save(NewsArticle {
        id: 1,
        user_id: None,
        title: "Site update".into(),
    })
    .await
    .unwrap();

    assert_eq!(cache.get::<String>("home:feed").await.unwrap(), None);
    assert_eq!(
        cache.get::<String>("threads:all").await.unwrap().as_deref(),
        Some("threads")
    );
}

/// Test 5: Category rename reaches the parent category and mod listings
#[tokio::test]
async fn test_category_save_flushes_parent_and_mod_listings() {
    let (cache, repo) = setup();

    cache
        .put("category:1:children", &"list", None, &TagRegistry::categories([1]))
        .await
        .unwrap();
    cache
        .put("mods:all", &"all", None, &["mods:all"].into_iter().collect())
        .await
        .unwrap();

    repo.save(ModCategory {
        id: 4,
        name: "Weather".into(),
        parent_id: Some(1),
    })
    .await
    .unwrap();

    assert_eq!(cache.get::<String>("category:1:children").await.unwrap(), None);
    assert_eq!(cache.get::<String>("mods:all").await.unwrap(), None);
}

/// Test 6: Flushing is idempotent
#[tokio::test]
async fn test_flush_idempotent() {
    let (cache, _repo) = setup();
    let tags = TagRegistry::mods([1]);

    cache.flush_tags(&tags).await.unwrap();
    cache.flush_tags(&tags).await.unwrap();
    cache.flush_tags(&TagSet::new()).await.unwrap();
    cache
        .flush_tags(&TagRegistry::news([12345]))
        .await
        .unwrap();

    let value: u32 = cache
        .remember("mod:1:downloads", None, &tags, || async { Ok(10) })
        .await
        .unwrap();
    assert_eq!(value, 10);
    assert_eq!(cache.get::<u32>("mod:1:downloads").await.unwrap(), Some(10));
}

/// Test 7: TTL expiry without any write
#[tokio::test]
async fn test_ttl_expiry() {
    let (cache, _repo) = setup();
    let calls = AtomicUsize::new(0);

    for _ in 0..2 {
        let _: u32 = cache
            .remember(
                "stats:online",
                Some(Duration::from_millis(50)),
                &TagSet::new(),
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                },
            )
            .await
            .unwrap();
    }
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    tokio::time::sleep(Duration::from_millis(100)).await;

    let _: u32 = cache
        .remember(
            "stats:online",
            Some(Duration::from_millis(50)),
            &TagSet::new(),
            || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            },
        )
        .await
        .unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

/// Backend that fails every call while `down` is set.
#[derive(Clone, Default)]
struct FlakyBackend {
    inner: InMemoryBackend,
    down: Arc<AtomicBool>,
}

impl FlakyBackend {
    fn check(&self) -> Result<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(Error::BackendError("connection refused".into()))
        } else {
            Ok(())
        }
    }
}

impl CacheBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<()> {
        self.check()?;
        self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn version(&self, key: &str) -> Result<String> {
        self.check()?;
        self.inner.version(key).await
    }

    async fn rotate_version(&self, key: &str) -> Result<String> {
        self.check()?;
        self.inner.rotate_version(key).await
    }
}

/// Test 8: An unreachable cache fails the write loudly, but the write stays
#[tokio::test]
async fn test_backend_outage_surfaces_on_write() {
    let backend = FlakyBackend::default();
    let cache = CacheService::new(backend.clone());
    let repo = ContentRepository::new(CacheObserver::new(cache.clone()));

    backend.down.store(true, Ordering::SeqCst);
    let result = repo.save(a_mod(42, "Saved during outage")).await;
    assert!(matches!(result, Err(Error::BackendError(_))));
    assert_eq!(
        repo.find::<Mod>(42).map(|m| m.title),
        Some("Saved during outage".to_string())
    );

    let read: Result<String> = cache
        .remember("mods:list", None, &TagRegistry::mods([42]), || async {
            Ok("unused".to_string())
        })
        .await;
    assert!(matches!(read, Err(Error::BackendError(_))));

    backend.down.store(false, Ordering::SeqCst);
    repo.save(a_mod(42, "Saved after recovery")).await.unwrap();
}

/// Test 9: Concurrent readers and writers
///
/// After all writers finish, a read reflects the last write.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reads_and_writes() {
    let cache = CacheService::new(InMemoryBackend::new());
    let repo = Arc::new(ContentRepository::new(CacheObserver::new(cache.clone())));
    let mut handles = vec![];

    for i in 0..8u64 {
        let cache = cache.clone();
        let repo = repo.clone();
        handles.push(tokio::spawn(async move {
            let tags = TagRegistry::mods([i % 2]);
            let key = format!("mod:{}:title", i % 2);
            let _: String = cache
                .remember(&key, None, &tags, || async move { Ok(format!("reader {}", i)) })
                .await
                .expect("remember failed");
            repo.save(a_mod(i % 2, &format!("writer {}", i)))
                .await
                .expect("save failed");
        }));
    }
    for handle in handles {
        handle.await.expect("Task failed");
    }

    let title: String = cache
        .remember("mod:0:title", None, &TagRegistry::mods([0]), || async {
            Ok("after writes".to_string())
        })
        .await
        .unwrap();
    assert_eq!(title, "after writes");
}

/// Test 10: Moving a row to a new owner or parent flushes the old one's views
#[tokio::test]
async fn test_relation_change_flushes_former_owner_and_parent() {
    let (cache, repo) = setup();
    repo.save(a_mod(1, "Weather Pack")).await.unwrap();
    cache
        .put("user:7:mods", &vec![1u64], None, &TagRegistry::users([7]))
        .await
        .unwrap();

    let mut moved = a_mod(1, "Weather Pack");
    moved.owner_id = Some(8);
    repo.save(moved).await.unwrap();
    assert_eq!(cache.get::<Vec<u64>>("user:7:mods").await.unwrap(), None);

    let comment = ModComment {
        id: 5,
        mod_id: Some(1),
        user_id: Some(3),
        body: "needs a config option".into(),
    };
    repo.save(comment.clone()).await.unwrap();
    cache
        .put(
            "mod:1:comment-count",
            &1u32,
            None,
            &TagRegistry::mod_comments([1]),
        )
        .await
        .unwrap();

    repo.save(ModComment {
        mod_id: Some(2),
        ..comment
    })
    .await
    .unwrap();
    assert_eq!(cache.get::<u32>("mod:1:comment-count").await.unwrap(), None);
}
