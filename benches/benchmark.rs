use std::hint::black_box;

use criterion::{criterion_group, criterion_main, Criterion};

use loaddata::codec::KeyCodec;
use loaddata::datastore::{Datastore, Entity, MemoryDatastore};
use loaddata::deserialize::{deserialize, DeserializeOptions};
use loaddata::key::{Key, PathToken};
use loaddata::model::ModelBuilder;
use loaddata::record::{EncodedValue, Record};
use loaddata::registry::Registry;
use loaddata::settings::LoadContext;

pub fn criterion_benchmark(c: &mut Criterion) {
    let codec = KeyCodec::default();
    let native = r#"Library:"central"/Author:"jdoe"/Book:42"#;
    c.bench_function("parse native key", |b| b.iter(|| codec.parse(black_box(native))));

    let tokens: Vec<PathToken> = vec!["Library".into(), "central".into(), "Author".into(), "jdoe".into()];
    c.bench_function("from_path", |b| b.iter(|| codec.from_path(black_box(&tokens))));

    let expression = "db.Key.from_path(u'Library', u'central', u'Author', u'jdoe', _app=u'library')";
    c.bench_function("parse path expression", |b| {
        b.iter(|| codec.parse_path_expr(black_box(expression)))
    });

    let mut registry = Registry::new();
    registry
        .register(ModelBuilder::new("library", "Author").build().unwrap())
        .unwrap();
    registry
        .register(
            ModelBuilder::new("library", "Book")
                .string("title", true)
                .integer("pages", false)
                .reference("author", Some("Author"), true)
                .build()
                .unwrap(),
        )
        .unwrap();
    let store = MemoryDatastore::new();
    let author = Key::named("Author", "jdoe", None).unwrap();
    store.put(Entity::new(author, Default::default())).unwrap();
    let records: Vec<Record> = (1..=1000)
        .map(|n| {
            Record::new("library.Book", format!(r#"Author:"jdoe"/Book:"b{}""#, n))
                .with_field("title", format!("Volume {}", n))
                .with_field("pages", n as i64)
                .with_field("author", vec![EncodedValue::from("Author"), EncodedValue::from("jdoe")])
        })
        .collect();
    let context = LoadContext::default();
    let options = DeserializeOptions::default();
    c.bench_function("deserialize 1k records", |b| {
        b.iter(|| {
            deserialize(records.clone(), &registry, &store, &context, &options)
                .unwrap()
                .filter(|object| object.is_ok())
                .count()
        })
    });
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
