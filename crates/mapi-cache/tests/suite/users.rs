use super::fake_db::FakeDatabase;
use super::{manager, stats_for};
use mapi_cache::CacheError;
use mapi_core::{ExternalId, ObjectClass, QuotaEntry, ServerDetails, UserDetails, UserObject};

fn user(external: &str) -> UserObject {
    UserObject {
        class: ObjectClass::ACTIVE_USER,
        company: 1,
        external_id: external.as_bytes().to_vec(),
        signature: "sig".to_string(),
    }
}

#[test]
fn update_user_clears_both_directions() {
    let db = FakeDatabase::new();
    let cache = manager(&db);
    cache.add_user_object(5, &user("ext-5")).unwrap();

    let external = ExternalId::new(ObjectClass::ACTIVE_USER, "ext-5");
    assert_eq!(cache.get_user_by_external_id(&external).unwrap().id, 5);
    assert_eq!(cache.get_user_object(5).unwrap(), user("ext-5"));
    assert_eq!(db.total_queries(), 0);

    let mut details = UserDetails::default();
    details.set_prop("fullname", "User Five");
    cache.set_user_details(5, &details).unwrap();
    cache.set_quota(5, false, QuotaEntry::default()).unwrap();
    cache.set_quota(5, true, QuotaEntry::default()).unwrap();

    cache.update_user(5);

    for name in ["user_object", "user_extern", "user_details", "quota", "quota_default"] {
        assert_eq!(stats_for(&cache, name).items, 0, "{name} still holds user 5");
    }
    assert_eq!(cache.get_user_by_external_id(&external), Err(CacheError::NotFound));
    assert_eq!(db.queries("users"), 1);
}

#[test]
fn user_objects_read_through() {
    let db = FakeDatabase::new();
    db.add_user(9, ObjectClass::ACTIVE_USER, b"ext-9", 2);
    let cache = manager(&db);

    let object = cache.get_user_object(9).unwrap();
    assert_eq!(object.external_id, b"ext-9");
    assert_eq!(object.company, 2);
    assert_eq!(object.signature, "sig-9");

    // Both directions were populated by the one query.
    let identity = cache
        .get_user_by_external_id(&ExternalId::new(ObjectClass::ACTIVE_USER, "ext-9"))
        .unwrap();
    assert_eq!(identity.id, 9);
    assert_eq!(db.queries("users"), 1);

    assert!(matches!(
        cache.get_user_object(0),
        Err(CacheError::InvalidParameter { .. })
    ));
    assert_eq!(cache.get_user_object(404), Err(CacheError::NotFound));
}

#[test]
fn wildcard_identities_are_never_cached() {
    let cache = manager(&FakeDatabase::new());
    let mut incomplete = user("ext-1");
    incomplete.class = ObjectClass::USER;

    assert!(matches!(
        cache.add_user_object(1, &incomplete),
        Err(CacheError::InvalidParameter { .. })
    ));
    assert_eq!(stats_for(&cache, "user_object").items, 0);
    assert_eq!(stats_for(&cache, "user_extern").items, 0);
}

#[test]
fn wildcard_lookup_bypasses_the_cache() {
    let db = FakeDatabase::new();
    db.add_user(7, ObjectClass::ACTIVE_USER, b"ext-7", 1);
    let cache = manager(&db);

    let wildcard = ExternalId::new(ObjectClass::USER, "ext-7");
    assert_eq!(cache.get_user_by_external_id(&wildcard).unwrap().id, 7);
    assert_eq!(cache.get_user_by_external_id(&wildcard).unwrap().id, 7);
    assert_eq!(db.queries("users"), 2);

    let concrete = ExternalId::new(ObjectClass::ACTIVE_USER, "ext-7");
    assert_eq!(cache.get_user_by_external_id(&concrete).unwrap().id, 7);
    assert_eq!(db.queries("users"), 2);

    let wrong_type = ExternalId::new(ObjectClass::DISTLIST, "ext-7");
    assert_eq!(
        cache.get_user_by_external_id(&wrong_type),
        Err(CacheError::NotFound)
    );
}

#[test]
fn batch_resolution_uses_one_query() {
    let db = FakeDatabase::new();
    db.add_user(2, ObjectClass::ACTIVE_USER, b"ext-2", 1);
    db.add_user(3, ObjectClass::DISTLIST_GROUP, b"ext-3", 1);
    let cache = manager(&db);
    cache.add_user_object(1, &user("ext-1")).unwrap();

    let wanted = [
        ExternalId::new(ObjectClass::ACTIVE_USER, "ext-1"),
        ExternalId::new(ObjectClass::ACTIVE_USER, "ext-2"),
        ExternalId::new(ObjectClass::DISTLIST, "ext-3"),
        ExternalId::new(ObjectClass::ACTIVE_USER, "nobody"),
    ];
    let found = cache.get_users_by_external_ids(&wanted).unwrap();

    assert_eq!(found.len(), 3);
    assert_eq!(found[&wanted[0]].id, 1);
    assert_eq!(found[&wanted[1]].id, 2);
    assert_eq!(found[&wanted[2]].id, 3);
    assert!(!found.contains_key(&wanted[3]));
    assert_eq!(db.queries("users"), 1);

    // ext-3 was cached under its concrete class.
    let concrete = ExternalId::new(ObjectClass::DISTLIST_GROUP, "ext-3");
    assert_eq!(cache.get_user_by_external_id(&concrete).unwrap().id, 3);
    assert_eq!(db.queries("users"), 1);
}

#[test]
fn user_details_are_lookup_only() {
    let db = FakeDatabase::new();
    let cache = manager(&db);
    assert_eq!(cache.get_user_details(5), Err(CacheError::NotFound));
    assert!(matches!(
        cache.get_user_details(0),
        Err(CacheError::InvalidParameter { .. })
    ));

    let mut details = UserDetails::default();
    details.set_prop("email", "five@example.org");
    cache.set_user_details(5, &details).unwrap();

    let mut copy = cache.get_user_details(5).unwrap();
    copy.set_prop("email", "changed@example.org");
    assert_eq!(
        cache.get_user_details(5).unwrap().prop("email"),
        Some("five@example.org")
    );
    assert_eq!(db.total_queries(), 0);
}

#[test]
fn server_names_are_case_insensitive() {
    let cache = manager(&FakeDatabase::new());
    let details = ServerDetails {
        host_address: "10.0.0.2".to_string(),
        http_path: "http://node2:236/".to_string(),
        ..ServerDetails::default()
    };
    cache.set_server_details("Node2", &details).unwrap();

    assert_eq!(cache.get_server_details("NODE2"), Ok(details));
    assert_eq!(cache.get_server_details("node3"), Err(CacheError::NotFound));
}
