//! Record deserializer: turns records into save-ready model instances.
//!
//! [`Deserializer`] is a pull-based iterator. Each call to `next` takes one
//! record from the underlying sequence and either yields a
//! [`DeserializedObject`] or the error that record produced. Nothing is read
//! ahead, so the caller stops a load simply by not pulling any more, and
//! skips a bad record by pulling again after its error.
//!
//! For each record the deserializer
//! 1. resolves the model label through the [`ModelRegistry`],
//! 2. parses the primary key and, if it has a parent, checks that the parent
//!    exists in the [`Datastore`],
//! 3. resolves reference fields to named keys and coerces scalar fields,
//! 4. builds the [`Model`] and wraps it for saving.
use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::charset::Charset;
use crate::codec::{classify_reference_encoding, KeyCodec, ReferenceEncoding};
use crate::datastore::Datastore;
use crate::error::{LoaddataError, Result};
use crate::key::{Key, PathToken};
use crate::model::{FieldDescriptor, FieldKind, FieldValue, Model, ModelDescriptor, Persistable};
use crate::record::{EncodedValue, Record, RecordItem, TaggedReference};
use crate::registry::ModelRegistry;
use crate::settings::LoadContext;

/// Per-call options.
#[derive(Clone, Debug, Default)]
pub struct DeserializeOptions {
    /// Charset for byte-string values, overriding the context's default.
    pub encoding: Option<String>,
}

/// A deserialized instance that has not been written yet.
#[derive(Debug)]
pub struct DeserializedObject<P: Persistable = Model> {
    object: P,
}

impl<P: Persistable> DeserializedObject<P> {
    pub fn new(object: P) -> Self {
        Self { object }
    }
    pub fn object(&self) -> &P {
        &self.object
    }
    pub fn into_inner(self) -> P {
        self.object
    }
    /// Writes the instance straight to the store. Pre-save hooks do not run:
    /// the values come from a dump and are stored exactly as they were.
    pub fn save(&mut self, store: &dyn Datastore) -> Result<Key> {
        let key = self.object.put(store)?;
        self.object.release_scaffolding();
        Ok(key)
    }
}

pub struct Deserializer<'a, I> {
    records: I,
    registry: &'a dyn ModelRegistry,
    store: &'a dyn Datastore,
    codec: KeyCodec,
    charset: Charset,
    position: usize,
}

impl<'a, I> Deserializer<'a, I>
where
    I: Iterator,
    I::Item: RecordItem,
{
    pub fn new<R>(
        records: R,
        registry: &'a dyn ModelRegistry,
        store: &'a dyn Datastore,
        context: &LoadContext,
        options: &DeserializeOptions,
    ) -> Result<Self>
    where
        R: IntoIterator<IntoIter = I, Item = I::Item>,
    {
        let charset = match &options.encoding {
            Some(encoding) => encoding.parse()?,
            None => context.default_charset,
        };
        Ok(Self {
            records: records.into_iter(),
            registry,
            store,
            codec: KeyCodec::new(context.app_id.clone()),
            charset,
            position: 0,
        })
    }

    /// Number of records pulled so far.
    pub fn position(&self) -> usize {
        self.position
    }

    fn build(&self, record: Record) -> Result<DeserializedObject> {
        let descriptor = self
            .registry
            .resolve(&record.model)
            .ok_or_else(|| LoaddataError::UnknownModel(record.model.clone()))?;
        let key = self.codec.parse(&record.pk)?;
        if key.kind() != descriptor.kind() {
            return Err(LoaddataError::Deserialization(format!(
                "Cannot load entity '{}' as a {}",
                key,
                descriptor.label()
            )));
        }
        let parent = match key.parent() {
            Some(parent_key) => Some(self.store.get(&parent_key)?.ok_or_else(|| {
                LoaddataError::Deserialization(format!(
                    "Cannot load entity '{}'. Parent '{}' cannot be found",
                    key, parent_key
                ))
            })?),
            None => None,
        };
        let fields = self.build_fields(&descriptor, record.fields)?;
        let mut model = Model::new(Arc::clone(&descriptor), key, fields)?;
        if let Some(parent) = parent {
            model = model.with_parent(parent);
        }
        Ok(DeserializedObject::new(model))
    }

    fn build_fields(
        &self,
        descriptor: &ModelDescriptor,
        encoded: BTreeMap<String, EncodedValue>,
    ) -> Result<BTreeMap<String, FieldValue>> {
        let mut fields = BTreeMap::new();
        for (name, value) in encoded {
            let field = self
                .registry
                .field_descriptors(descriptor)
                .iter()
                .find(|f| f.name() == name)
                .ok_or_else(|| LoaddataError::UnknownField {
                    model: descriptor.label(),
                    field: name.clone(),
                })?;
            let value = self.normalize_text(field, value)?;
            let value = match field.kind() {
                FieldKind::Reference => self.resolve_reference(field, value)?,
                FieldKind::Scalar => field.coerce(value)?,
            };
            fields.insert(name, value);
        }
        Ok(fields)
    }

    // byte strings become text in the configured charset
    fn normalize_text(&self, field: &FieldDescriptor, value: EncodedValue) -> Result<EncodedValue> {
        match value {
            EncodedValue::Bytes(bytes) => self.charset.decode(&bytes).map(EncodedValue::Text).map_err(|e| {
                LoaddataError::field(field.name(), format!("cannot decode as {}: {}", self.charset, e))
            }),
            other => Ok(other),
        }
    }

    fn resolve_reference(&self, field: &FieldDescriptor, value: EncodedValue) -> Result<FieldValue> {
        let key = match &value {
            EncodedValue::Null => return field.null(),
            EncodedValue::List(items) => self.codec.from_path(&path_tokens(items)?)?,
            EncodedValue::Text(text) => match classify_reference_encoding(text) {
                ReferenceEncoding::PathExpr => self.codec.parse_path_expr(text)?,
                ReferenceEncoding::BareKey => self.codec.parse(text)?,
            },
            EncodedValue::Reference(TaggedReference::Path(items)) => self.codec.from_path(&path_tokens(items)?)?,
            EncodedValue::Reference(TaggedReference::PathExpr(text)) => self.codec.parse_path_expr(text)?,
            EncodedValue::Reference(TaggedReference::Key(text)) => self.codec.parse(text)?,
            other => {
                return Err(LoaddataError::Deserialization(format!(
                    "Invalid reference value: '{}'",
                    other
                )));
            }
        };
        if !key.is_named() {
            return Err(LoaddataError::Deserialization(format!(
                "Cannot load Reference with unnamed key: '{}'",
                value
            )));
        }
        let value = FieldValue::Reference(key);
        field.check(&value)?;
        Ok(value)
    }
}

fn path_tokens(items: &[EncodedValue]) -> Result<Vec<PathToken>> {
    items
        .iter()
        .map(|item| match item {
            EncodedValue::Text(text) => Ok(PathToken::Text(text.clone())),
            EncodedValue::Int(i) => Ok(PathToken::Integer(*i)),
            other => Err(LoaddataError::MalformedKey(format!(
                "path elements must be strings or integers, found {}",
                other
            ))),
        })
        .collect()
}

impl<I> Iterator for Deserializer<'_, I>
where
    I: Iterator,
    I::Item: RecordItem,
{
    type Item = Result<DeserializedObject>;

    fn next(&mut self) -> Option<Self::Item> {
        let item = self.records.next()?;
        self.position += 1;
        let position = self.position;
        let result = item.into_record().and_then(|record| {
            let model = record.model.clone();
            let pk = record.pk.clone();
            self.build(record).inspect_err(|e| {
                warn!(position, %model, %pk, error = %e, "record rejected");
            })
        });
        if let Ok(object) = &result {
            debug!(position, key = %object.object().key(), "deserialized record");
        }
        Some(result)
    }
}

/// Deserializes `records` lazily; see [`Deserializer`].
pub fn deserialize<'a, R>(
    records: R,
    registry: &'a dyn ModelRegistry,
    store: &'a dyn Datastore,
    context: &LoadContext,
    options: &DeserializeOptions,
) -> Result<Deserializer<'a, R::IntoIter>>
where
    R: IntoIterator,
    R::Item: RecordItem,
{
    Deserializer::new(records, registry, store, context, options)
}
