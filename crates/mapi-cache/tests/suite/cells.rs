use super::fake_db::FakeDatabase;
use super::{manager, stats_for};
use mapi_cache::CacheError;
use mapi_core::{PropTag, PropValue, PropertyValue, TABLE_CAP_BINARY};

#[test]
fn string_variants_share_one_slot() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::SUBJECT_A, &PropValue::String("hello".into()))
        .unwrap();

    let wide = cache.get_property(1, PropTag::SUBJECT, false).unwrap();
    assert_eq!(wide.tag, PropTag::SUBJECT);
    assert_eq!(wide.value, PropValue::String("hello".into()));

    let narrow = cache.get_property(1, PropTag::SUBJECT_A, false).unwrap();
    assert_eq!(narrow.tag, PropTag::SUBJECT_A);
    assert_eq!(stats_for(&cache, "cell").items, 1);
}

#[test]
fn incomplete_cells_do_not_answer_for_missing_tags() {
    let cache = manager(&FakeDatabase::new());
    assert_eq!(
        cache.get_property(1, PropTag::SUBJECT, false),
        Err(CacheError::NotFound)
    );

    cache
        .set_property(1, PropTag::MESSAGE_FLAGS, &PropValue::Long(1))
        .unwrap();
    assert!(!cache.is_complete(1));
    assert_eq!(
        cache.get_property(1, PropTag::SUBJECT, false),
        Err(CacheError::NotFound)
    );
}

#[test]
fn complete_cells_answer_absence() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::MESSAGE_FLAGS, &PropValue::Long(1))
        .unwrap();
    cache.mark_complete(1).unwrap();
    assert!(cache.is_complete(1));

    let missing = cache.get_property(1, PropTag::SUBJECT, false).unwrap();
    assert!(missing.is_not_found());
    assert_eq!(missing.tag.id(), PropTag::SUBJECT.id());

    // Computed properties are never known to the cell, complete or not.
    assert_eq!(
        cache.get_property(1, PropTag::ENTRYID, false),
        Err(CacheError::NotFound)
    );

    // Marking an uncached object creates an empty, complete cell.
    cache.mark_complete(2).unwrap();
    assert_eq!(
        cache.get_property(2, PropTag::SUBJECT, false),
        Ok(PropertyValue::not_found(PropTag::SUBJECT))
    );
}

#[test]
fn computed_properties_are_never_stored() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::ENTRYID, &PropValue::Binary(vec![1, 2, 3]))
        .unwrap();
    assert_eq!(stats_for(&cache, "cell").items, 0);
}

#[test]
fn reads_can_be_truncated() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::SOURCE_KEY, &PropValue::Binary(vec![7; 1024]))
        .unwrap();

    let full = cache.get_property(1, PropTag::SOURCE_KEY, false).unwrap();
    assert_eq!(full.value, PropValue::Binary(vec![7; 1024]));
    let short = cache.get_property(1, PropTag::SOURCE_KEY, true).unwrap();
    assert_eq!(short.value, PropValue::Binary(vec![7; TABLE_CAP_BINARY]));
}

#[test]
fn cell_size_follows_payload() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::MESSAGE_FLAGS, &PropValue::Long(1))
        .unwrap();
    let small = stats_for(&cache, "cell").size;

    cache
        .set_property(1, PropTag::SOURCE_KEY, &PropValue::Binary(vec![0; 4096]))
        .unwrap();
    let large = stats_for(&cache, "cell").size;
    assert!(large >= small + 4096);

    cache
        .set_property(1, PropTag::SOURCE_KEY, &PropValue::Binary(vec![0; 16]))
        .unwrap();
    let shrunk = stats_for(&cache, "cell").size;
    assert_eq!(large - shrunk, 4096 - 16);

    cache.remove_cell(1);
    assert_eq!(stats_for(&cache, "cell").size, 0);
}

#[test]
fn numeric_updates_mutate_in_place() {
    let cache = manager(&FakeDatabase::new());
    cache
        .set_property(1, PropTag::CONTENT_UNREAD, &PropValue::Long(5))
        .unwrap();

    assert!(cache.update_numeric(1, PropTag::CONTENT_UNREAD, 1));
    assert!(cache.update_numeric(1, PropTag::CONTENT_UNREAD, -10));
    assert_eq!(
        cache
            .get_property(1, PropTag::CONTENT_UNREAD, false)
            .unwrap()
            .value,
        PropValue::Long(-4)
    );

    cache
        .set_property(1, PropTag::MESSAGE_FLAGS, &PropValue::Long(0b1010))
        .unwrap();
    assert!(cache.update_numeric_masked(1, PropTag::MESSAGE_FLAGS, 0b0011, 0b0001));
    assert_eq!(
        cache
            .get_property(1, PropTag::MESSAGE_FLAGS, false)
            .unwrap()
            .value,
        PropValue::Long(0b1001)
    );
}

#[test]
fn numeric_updates_ignore_what_they_cannot_change() {
    let cache = manager(&FakeDatabase::new());
    assert!(!cache.update_numeric(1, PropTag::CONTENT_UNREAD, 1));

    cache
        .set_property(1, PropTag::SUBJECT, &PropValue::String("x".into()))
        .unwrap();
    assert!(!cache.update_numeric(1, PropTag::SUBJECT, 1));
    assert!(!cache.update_numeric(1, PropTag::CONTENT_UNREAD, 1));
}
