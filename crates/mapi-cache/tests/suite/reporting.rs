use super::fake_db::FakeDatabase;
use super::{manager, stats_for};
use mapi_cache::CacheManager;
use mapi_config::{CacheConfig, CacheSizes, ServerConfig};
use mapi_core::object_type::MAPI_FOLDER;
use mapi_core::{PropTag, PropValue};

#[test]
fn stats_cover_every_cache() {
    let cache = manager(&FakeDatabase::new());
    let names: Vec<String> = cache.stats().into_iter().map(|stats| stats.name).collect();
    assert_eq!(
        names,
        [
            "hierarchy",
            "store",
            "acl",
            "quota",
            "quota_default",
            "user_object",
            "user_extern",
            "user_details",
            "server",
            "cell",
            "index_prop",
            "index_object",
            "index_excluded",
        ]
    );
}

#[test]
fn report_serialises_cache_and_query_counters() {
    let db = FakeDatabase::new();
    db.add_object(42, Some(7), 3, 0, MAPI_FOLDER);
    let cache = manager(&db);
    cache.get_object(42).unwrap();
    cache.get_object(42).unwrap();
    let _ = cache.get_acls(42);

    let report = serde_json::to_value(cache.report()).unwrap();
    let hierarchy = report["caches"]
        .as_array()
        .unwrap()
        .iter()
        .find(|stats| stats["name"] == "hierarchy")
        .unwrap();
    assert_eq!(hierarchy["hits"], 1);
    assert_eq!(hierarchy["requests"], 2);
    assert_eq!(hierarchy["maxSize"], 1 << 20);

    assert_eq!(report["queries"]["operations"]["hierarchy"]["queryCount"], 1);
    assert_eq!(report["queries"]["operations"]["acl"]["emptyCount"], 1);
    assert_eq!(report["queries"]["totals"]["queryCount"], 2);
}

#[test]
fn shrinking_sizes_evicts_immediately() {
    let cache = manager(&FakeDatabase::new());
    for id in 1..=100 {
        cache
            .set_property(id, PropTag::SOURCE_KEY, &PropValue::Binary(vec![0; 1024]))
            .unwrap();
    }
    let before = stats_for(&cache, "cell");
    assert_eq!(before.items, 100);

    let mut sizes = CacheSizes::uniform(1 << 20);
    sizes.cell.max_size = 16 * 1024;
    cache.apply_sizes(&sizes);

    let after = stats_for(&cache, "cell");
    assert!(after.size <= 16 * 1024);
    assert!(after.items < 100 && after.items > 0);
    assert_eq!(after.max_size, 16 * 1024);
    // Oldest insertions go first.
    assert!(cache.get_property(100, PropTag::SOURCE_KEY, false).is_ok());
    assert!(cache.get_property(1, PropTag::SOURCE_KEY, false).is_err());
}

#[test]
fn manager_builds_from_configuration() {
    let config = ServerConfig::load_from_str(
        "[cache]\ncell_size = \"8M\"\nquota_size = \"64K\"\nquota_lifetime = 5\n",
    )
    .unwrap();
    assert_eq!(
        config.cache,
        CacheConfig {
            cell_size: mapi_config::ByteSize(8 << 20),
            quota_size: mapi_config::ByteSize(64 << 10),
            quota_lifetime: 5,
            ..CacheConfig::default()
        }
    );

    let sizes = config.cache.resolve(None);
    let cache = CacheManager::new(&sizes, FakeDatabase::new().factory());
    assert_eq!(stats_for(&cache, "cell").max_size, 8 << 20);
    assert_eq!(stats_for(&cache, "hierarchy").max_size, (8 << 20) / 16);
    assert_eq!(stats_for(&cache, "index_prop").max_size, (8 << 20) / 8);
    assert_eq!(stats_for(&cache, "quota").max_size, 64 << 10);
}
