use super::fake_db::FakeDatabase;
use super::manager;
use mapi_cache::{CacheManager, IndexObjectKey, IndexValueKey, PurgeFlags};
use mapi_core::object_type::MAPI_FOLDER;
use mapi_core::{
    AclEntry, Guid, ObjectClass, PropTag, PropValue, QuotaEntry, ServerDetails, StoreType,
    UserDetails, UserObject,
};
use std::collections::BTreeMap;

fn populated() -> CacheManager {
    let cache = manager(&FakeDatabase::new());
    cache.set_object(5, 1, 3, 0, MAPI_FOLDER).unwrap();
    cache
        .set_store(5, 1, Guid([2; 16]), StoreType::Public)
        .unwrap();
    cache
        .set_acls(
            5,
            &[AclEntry {
                principal: 3,
                right_type: 1,
                mask: 1,
            }],
        )
        .unwrap();
    cache.set_quota(3, false, QuotaEntry::default()).unwrap();
    cache.set_quota(3, true, QuotaEntry::default()).unwrap();
    cache
        .add_user_object(
            3,
            &UserObject {
                class: ObjectClass::ACTIVE_USER,
                company: 1,
                external_id: b"ext-3".to_vec(),
                signature: String::new(),
            },
        )
        .unwrap();
    cache.set_user_details(3, &UserDetails::default()).unwrap();
    cache
        .set_server_details("node1", &ServerDetails::default())
        .unwrap();
    cache
        .set_property(5, PropTag::SUBJECT, &PropValue::String("s".into()))
        .unwrap();
    cache
        .add_index(
            IndexObjectKey::new(5, PropTag::SOURCE_KEY),
            &IndexValueKey::new(PropTag::SOURCE_KEY, vec![1; 22]),
        )
        .unwrap();
    cache.set_excluded_index_properties([PropTag::SUBJECT]);
    cache
}

fn item_counts(cache: &CacheManager) -> BTreeMap<String, usize> {
    cache
        .stats()
        .into_iter()
        .map(|stats| (stats.name, stats.items))
        .collect()
}

#[test]
fn each_flag_clears_only_its_cache() {
    let targets = [
        (PurgeFlags::QUOTA, "quota"),
        (PurgeFlags::QUOTA_DEFAULT, "quota_default"),
        (PurgeFlags::OBJECTS, "hierarchy"),
        (PurgeFlags::STORES, "store"),
        (PurgeFlags::ACLS, "acl"),
        (PurgeFlags::CELL, "cell"),
        (PurgeFlags::INDEX_OBJECT, "index_prop"),
        (PurgeFlags::INDEX_PROPERTY, "index_object"),
        (PurgeFlags::INDEXED_PROPERTIES, "index_excluded"),
        (PurgeFlags::USER_OBJECT, "user_object"),
        (PurgeFlags::EXTERN_ID, "user_extern"),
        (PurgeFlags::USER_DETAILS, "user_details"),
        (PurgeFlags::SERVER, "server"),
    ];

    for (flag, target) in targets {
        let cache = populated();
        let before = item_counts(&cache);
        assert!(before.values().all(|items| *items == 1), "{before:?}");

        cache.purge(flag);

        for (name, items) in item_counts(&cache) {
            let expected = if name == target { 0 } else { before[&name] };
            assert_eq!(items, expected, "purging {flag:?} changed `{name}`");
        }
    }
}

#[test]
fn purge_all_empties_everything_but_keeps_counters() {
    let cache = populated();
    cache.get_object(5).unwrap();
    cache.purge(PurgeFlags::ALL);

    for stats in cache.stats() {
        assert_eq!(stats.items, 0, "{} not purged", stats.name);
        assert_eq!(stats.size, 0, "{} still accounts bytes", stats.name);
    }
    let hierarchy = cache
        .stats()
        .into_iter()
        .find(|stats| stats.name == "hierarchy")
        .unwrap();
    assert_eq!(hierarchy.hits, 1);
}
