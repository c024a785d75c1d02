use super::fake_db::FakeDatabase;
use super::stats_for;
use mapi_cache::{CacheManager, ChangeEvent};
use mapi_config::CacheSizes;
use mapi_core::object_type::MAPI_FOLDER;
use mapi_core::{PropTag, PropValue};
use std::sync::Arc;
use std::thread;

#[test]
fn concurrent_readers_and_invalidators() {
    let db = FakeDatabase::new();
    for id in 1..=64 {
        db.add_object(id, Some(1_000), 3, 0, MAPI_FOLDER);
    }
    let cache = Arc::new(CacheManager::new(
        &CacheSizes::uniform(1 << 20),
        db.factory(),
    ));

    let handles: Vec<_> = (0..8u32)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for round in 0..200u32 {
                    let id = (worker * 7 + round) % 64 + 1;
                    let entry = cache.get_object(id).expect("object exists");
                    assert_eq!(entry.parent, 1_000);

                    cache
                        .set_property(id, PropTag::CONTENT_UNREAD, &PropValue::Long(0))
                        .expect("set property");
                    cache.update_numeric(id, PropTag::CONTENT_UNREAD, 1);

                    if round % 10 == 0 {
                        cache.update(ChangeEvent::Modified, id);
                    }
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let hierarchy = stats_for(&cache, "hierarchy");
    assert_eq!(hierarchy.requests, 8 * 200);
    assert!(hierarchy.items <= 64);
    assert!(db.queries("hierarchy") >= 64);
}

#[test]
fn concurrent_index_writers_keep_the_mapping_one_to_one() {
    let cache = Arc::new(CacheManager::new(
        &CacheSizes::uniform(1 << 20),
        FakeDatabase::new().factory(),
    ));

    let handles: Vec<_> = (0..4u8)
        .map(|worker| {
            let cache = cache.clone();
            thread::spawn(move || {
                for round in 0..100u8 {
                    let entry_id = [0, 0, 0, 0, worker, round];
                    cache
                        .set_object_entry_id(u32::from(round % 10) + 1, &entry_id)
                        .expect("add mapping");
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }

    let forward = stats_for(&cache, "index_prop").items;
    let reverse = stats_for(&cache, "index_object").items;
    assert_eq!(forward, reverse);
    assert!(reverse <= 10);
    for id in 1..=10 {
        let entry_id = cache.get_entry_id_from_object(id).expect("mapping present");
        assert_eq!(cache.get_object_from_entry_id(&entry_id), Ok(id));
    }
}
