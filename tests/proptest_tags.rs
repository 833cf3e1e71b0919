//! Property-based tests for tag derivation and flushing.
//!
//! # Properties Tested
//!
//! 1. **Set semantics**: tag derivation ignores id order and duplicates
//! 2. **Union**: tags for many ids equal the union of tags for each id
//! 3. **Identity**: every model's tags contain its own identity tag
//! 4. **Flush precision**: a flush evicts exactly the entries sharing a tag

use forge_cache::backend::InMemoryBackend;
use forge_cache::model::{Mod, ModComment};
use forge_cache::{CacheService, CacheTagged, EntityKind, TagRegistry, TagSet};
use proptest::prelude::*;

// ============================================================================
// Strategies
// ============================================================================

fn arb_kind() -> impl Strategy<Value = EntityKind> {
    prop_oneof![
        Just(EntityKind::Mod),
        Just(EntityKind::ModCategory),
        Just(EntityKind::ModComment),
        Just(EntityKind::ForumThread),
        Just(EntityKind::NewsArticle),
        Just(EntityKind::Forum),
        Just(EntityKind::User),
    ]
}

fn arb_ids() -> impl Strategy<Value = Vec<u64>> {
    prop::collection::vec(0u64..50, 0..8)
}

fn arb_mod() -> impl Strategy<Value = Mod> {
    (
        any::<u64>(),
        ".{0,20}",
        prop::option::of(any::<u64>()),
        prop::collection::vec(any::<u64>(), 0..4),
    )
        .prop_map(|(id, title, owner_id, category_ids)| Mod {
            id,
            title,
            owner_id,
            category_ids,
        })
}

fn arb_comment() -> impl Strategy<Value = ModComment> {
    (
        any::<u64>(),
        prop::option::of(any::<u64>()),
        prop::option::of(any::<u64>()),
    )
        .prop_map(|(id, mod_id, user_id)| ModComment {
            id,
            mod_id,
            user_id,
            body: String::new(),
        })
}

// ============================================================================
// Properties 1-3: Derivation
// ============================================================================

proptest! {
    /// Property: reversing or duplicating ids does not change the tags
    #[test]
    fn prop_tags_ignore_order_and_duplicates(kind in arb_kind(), ids in arb_ids()) {
        let forward = TagRegistry::tags_for(kind, ids.clone());
        let reversed = TagRegistry::tags_for(kind, ids.iter().rev().copied());
        let doubled = TagRegistry::tags_for(kind, ids.iter().chain(ids.iter()).copied());

        prop_assert_eq!(&forward, &reversed);
        prop_assert_eq!(&forward, &doubled);
    }

    /// Property: tags_for(a ++ b) == tags_for(a) ∪ tags_for(b)
    #[test]
    fn prop_tags_distribute_over_union(kind in arb_kind(), a in arb_ids(), b in arb_ids()) {
        let combined = TagRegistry::tags_for(kind, a.iter().chain(b.iter()).copied());
        let unioned = TagRegistry::tags_for(kind, a).union(TagRegistry::tags_for(kind, b));

        prop_assert_eq!(combined, unioned);
    }

    /// Property: no ids, no tags
    #[test]
    fn prop_empty_input_yields_nothing(kind in arb_kind()) {
        prop_assert!(TagRegistry::tags_for(kind, Vec::new()).is_empty());
    }

    /// Property: a mod's tags contain its identity and every category's
    #[test]
    fn prop_mod_tags_cover_relations(m in arb_mod()) {
        let tags = m.cache_tags();
        let identity = TagRegistry::identity(EntityKind::Mod, m.id);
        prop_assert!(tags.contains(identity.as_str()));
        prop_assert!(TagRegistry::categories(m.category_ids.clone()).is_subset(&tags));
        prop_assert!(TagRegistry::users(m.owner_id).is_subset(&tags));
    }

    /// Property: a comment's tags cover its parent mod whenever it has one
    #[test]
    fn prop_comment_tags_cover_parent(c in arb_comment()) {
        let tags = c.cache_tags();
        prop_assert!(tags.contains(TagRegistry::identity(EntityKind::ModComment, c.id).as_str()));
        prop_assert!(TagRegistry::mods(c.mod_id).is_subset(&tags));
        prop_assert!(TagRegistry::mod_comments(c.mod_id).is_subset(&tags));
    }
}

// ============================================================================
// Property 4: Flush precision
// ============================================================================

fn tag_pool() -> Vec<&'static str> {
    vec!["mod:1", "mod:2", "category:1", "user:1", "home", "threads:all"]
}

fn arb_tag_set() -> impl Strategy<Value = TagSet> {
    prop::sample::subsequence(tag_pool(), 0..=3).prop_map(|tags| tags.into_iter().collect())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: after flushing F, an entry survives iff its tags miss F
    #[test]
    fn prop_flush_evicts_exactly_intersecting_entries(
        entries in prop::collection::vec(arb_tag_set(), 1..6),
        flushed in arb_tag_set(),
    ) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .expect("Failed to create runtime");

        rt.block_on(async {
            let cache = CacheService::new(InMemoryBackend::new());

            for (i, tags) in entries.iter().enumerate() {
                cache
                    .put(&format!("entry:{}", i), &(i as u32), None, tags)
                    .await
                    .expect("put failed");
            }

            cache.flush_tags(&flushed).await.expect("flush failed");

            for (i, tags) in entries.iter().enumerate() {
                let survived = cache
                    .get::<u32>(&format!("entry:{}", i))
                    .await
                    .expect("get failed")
                    .is_some();
                let intersects = tags.iter().any(|t| flushed.contains(t.as_str()));
                prop_assert_eq!(survived, !intersects, "entry {} tags [{}]", i, tags);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }
}
