use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use loaddata::datastore::{Datastore, Entity};
use loaddata::deserialize::{DeserializeOptions, deserialize};
use loaddata::key::Key;
use loaddata::model::{FieldValue, Model, ModelBuilder};
use loaddata::persist::{PersistenceMode, SqliteDatastore};
use loaddata::record::{EncodedValue, Record};
use loaddata::registry::{ModelRegistry, Registry};
use loaddata::serialize::{serialize, serialize_model};
use loaddata::settings::LoadContext;
use tempfile::tempdir;

fn library() -> Registry {
    let mut registry = Registry::new();
    registry
        .register(ModelBuilder::new("library", "Author").string("name", true).build().unwrap())
        .unwrap();
    registry
        .register(
            ModelBuilder::new("library", "Book")
                .string("title", true)
                .date("published", false)
                .datetime("catalogued", false)
                .float("price", false)
                .reference("author", Some("Author"), false)
                .build()
                .unwrap(),
        )
        .unwrap();
    registry
}

fn fixture() -> Vec<Record> {
    vec![
        Record::new("library.Author", r#"Author:"jdoe""#).with_field("name", "J. Doe"),
        Record::new("library.Book", r#"Author:"jdoe"/Book:42"#)
            .with_field("title", "Numbered")
            .with_field("price", 9.5)
            .with_field("catalogued", "2020-01-02T03:04:05.250"),
        Record::new("library.Book", r#"Author:"jdoe"/Book:"moby-dick""#)
            .with_field("title", "Moby Dick")
            .with_field("published", "1851-10-18")
            .with_field("author", EncodedValue::List(vec!["Author".into(), "jdoe".into()])),
    ]
}

fn load(store: &SqliteDatastore, registry: &Registry, records: Vec<Record>) -> usize {
    let mut saved = 0;
    for object in deserialize(records, registry, store, &LoadContext::default(), &DeserializeOptions::default()).unwrap() {
        object.unwrap().save(store).unwrap();
        saved += 1;
    }
    saved
}

fn dump(store: &SqliteDatastore, registry: &Registry) -> Vec<Record> {
    let models: Vec<Model> = store
        .scan()
        .unwrap()
        .into_iter()
        .map(|entity| Model::from_entity(registry.resolve_kind(entity.kind()).unwrap(), entity).unwrap())
        .collect();
    serialize(&models)
}

#[test]
fn in_memory_mode_allows_basic_operations() {
    let store = SqliteDatastore::new(PersistenceMode::InMemory).expect("store");
    let key = Key::named("Author", "jdoe", None).unwrap();
    assert!(store.get(&key).unwrap().is_none());
    let mut properties = BTreeMap::new();
    properties.insert("name".to_string(), FieldValue::Text("J. Doe".to_string()));
    store.put(Entity::new(key.clone(), properties.clone())).unwrap();
    // puts replace
    store.put(Entity::new(key.clone(), properties.clone())).unwrap();
    assert_eq!(store.count().unwrap(), 1);
    assert_eq!(store.get(&key).unwrap(), Some(Entity::new(key, properties)));
    assert_eq!(store.flush().unwrap(), 1);
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn file_mode_persists_across_connections() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("library.datastore.sqlite").to_string_lossy().into_owned();
    let registry = library();
    {
        let store = SqliteDatastore::new(PersistenceMode::File(path.clone())).expect("store");
        assert_eq!(load(&store, &registry, fixture()), 3);
    }
    let store = SqliteDatastore::new(PersistenceMode::File(path)).expect("store");
    assert_eq!(store.count().unwrap(), 3);
    let book = store
        .get(&r#"Author:"jdoe"/Book:"moby-dick""#.parse().unwrap())
        .unwrap()
        .expect("book");
    assert_eq!(
        book.get("published"),
        Some(&FieldValue::Date(NaiveDate::from_ymd_opt(1851, 10, 18).unwrap()))
    );
    assert_eq!(
        book.get("author").and_then(|v| v.as_key()),
        Some(&Key::named("Author", "jdoe", None).unwrap())
    );
}

#[test]
fn scan_lists_ancestors_first() {
    let store = SqliteDatastore::new(PersistenceMode::InMemory).unwrap();
    let registry = library();
    load(&store, &registry, fixture());
    let keys: Vec<String> = store.scan().unwrap().iter().map(|e| e.key().to_string()).collect();
    assert_eq!(
        keys,
        vec![
            r#"Author:"jdoe""#.to_string(),
            r#"Author:"jdoe"/Book:42"#.to_string(),
            r#"Author:"jdoe"/Book:"moby-dick""#.to_string(),
        ]
    );
}

#[test]
fn dump_then_load_reproduces_entities() {
    let registry = library();
    let source = SqliteDatastore::new(PersistenceMode::InMemory).unwrap();
    load(&source, &registry, fixture());
    let records = dump(&source, &registry);
    assert_eq!(records.len(), 3);

    let book = &records[2];
    assert_eq!(book.model, "library.Book");
    assert_eq!(book.fields["author"], EncodedValue::List(vec!["Author".into(), "jdoe".into()]));
    assert_eq!(book.fields["published"], EncodedValue::from("1851-10-18"));
    assert_eq!(records[1].fields["catalogued"], EncodedValue::from("2020-01-02 03:04:05.250"));

    // through JSON, as a fixture file would carry them
    let json = serde_json::to_string(&records).unwrap();
    let reread: Vec<Record> = serde_json::from_str(&json).unwrap();

    let target = SqliteDatastore::new(PersistenceMode::InMemory).unwrap();
    assert_eq!(load(&target, &registry, reread), 3);
    assert_eq!(source.scan().unwrap(), target.scan().unwrap());
}

#[test]
fn serialized_numeric_keys_survive() {
    let registry = library();
    let descriptor = registry.resolve("library.Book").unwrap();
    let author = Key::named("Author", "jdoe", None).unwrap();
    let mut fields = BTreeMap::new();
    fields.insert("title".to_string(), FieldValue::Text("T".to_string()));
    fields.insert(
        "author".to_string(),
        FieldValue::Reference(author.clone()),
    );
    let model = Model::new(Arc::clone(&descriptor), Key::numeric("Book", 7, Some(&author)).unwrap(), fields).unwrap();
    let record = serialize_model(&model);
    assert_eq!(record.pk, r#"Author:"jdoe"/Book:7"#);
    assert_eq!(record.fields["title"], EncodedValue::from("T"));
}
