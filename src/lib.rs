//! Loaddata – reconstructs hierarchical datastore entities from portable
//! fixture dumps.
//!
//! A fixture is a sequence of *records*, each naming a model, carrying the
//! textual form of the entity's primary key and mapping field names to
//! encoded values:
//! * A [`key::Key`] is a root-to-leaf path of `(kind, id or name)` elements.
//! * A [`record::Record`] is the transport form of one model instance.
//! * A [`model::ModelDescriptor`] describes the typed fields of one kind.
//! * A [`model::Model`] is an instance of a descriptor, ready to be saved.
//!
//! ## Modules
//! * [`key`] – Keys, path elements and their two textual renderings.
//! * [`codec`] – The key codec: native key text, flattened paths and path
//!   expressions, decoded through a restricted grammar (`keytext.pest`).
//! * [`record`] – Records, encoded values and fixture readers.
//! * [`model`] – Field descriptors, typed values, model instances and the
//!   [`model::Persistable`] capability.
//! * [`registry`] – Resolution of record model labels to descriptors.
//! * [`deserialize`] – The lazy record deserializer.
//! * [`serialize`] – Models back to records.
//! * [`datastore`] – The datastore seam and an in-memory store.
//! * [`persist`] – SQLite-backed datastore.
//! * [`settings`] – Configuration and the load context.
//! * [`commands`] – Load, dump and flush, as run by the `loaddata` tool.
//!
//! ## Loading
//! The [`deserialize::Deserializer`] is an iterator. Every pull handles
//! exactly one record and yields either a save-deferred object or the error
//! that record produced; an error does not end the sequence, so the caller
//! decides whether to stop or to skip the record and keep pulling.
//! Entities whose key has a parent are only accepted once the parent exists
//! in the datastore, so fixtures list ancestors first.
//!
//! ## Quick Start
//! ```
//! use loaddata::datastore::{Datastore, MemoryDatastore};
//! use loaddata::deserialize::{deserialize, DeserializeOptions};
//! use loaddata::model::ModelBuilder;
//! use loaddata::record::Record;
//! use loaddata::registry::Registry;
//! use loaddata::settings::LoadContext;
//!
//! let mut registry = Registry::new();
//! registry
//!     .register(ModelBuilder::new("library", "Author").string("name", true).build().unwrap())
//!     .unwrap();
//! let store = MemoryDatastore::new();
//! let records = vec![Record::new("library.Author", r#"Author:"jdoe""#).with_field("name", "J. Doe")];
//! let context = LoadContext::default();
//! let options = DeserializeOptions::default();
//! for object in deserialize(records, &registry, &store, &context, &options).unwrap() {
//!     object.unwrap().save(&store).unwrap();
//! }
//! assert_eq!(store.scan().unwrap().len(), 1);
//! ```

pub mod charset;
pub mod codec;
pub mod commands;
pub mod datastore;
pub mod deserialize;
pub mod error;
pub mod key;
pub mod model;
pub mod persist;
pub mod record;
pub mod registry;
pub mod serialize;
pub mod settings;

pub use error::{LoaddataError, Result};
