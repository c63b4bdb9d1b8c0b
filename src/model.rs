//! Model descriptors, field values and model instances.
//!
//! A [`ModelDescriptor`] describes one kind of entity: its application label,
//! its kind and its typed fields. A [`Model`] is an instance of a descriptor,
//! identified by a [`Key`] and holding one [`FieldValue`] per field.
//!
//! Persistence goes through the [`Persistable`] capability rather than
//! through any particular model type.
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::datastore::{Datastore, Entity};
use crate::error::{LoaddataError, Result};
use crate::key::{Key, PathElement, IdOrName};
use crate::record::EncodedValue;

/// Longest value a (non text) string field accepts, in bytes.
pub const MAX_STRING_BYTES: usize = 500;

const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];
pub(crate) const DATETIME_OUTPUT_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
pub(crate) const DATE_FORMAT: &str = "%Y-%m-%d";

// ------------- Fields -------------
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FieldKind {
    Scalar,
    Reference,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FieldType {
    String {
        #[serde(default)]
        multiline: bool,
    },
    Text,
    Integer,
    Float,
    Boolean,
    DateTime {
        #[serde(default)]
        auto_now: bool,
        #[serde(default)]
        auto_now_add: bool,
    },
    Date,
    Reference {
        #[serde(default)]
        target: Option<String>,
    },
}

impl FieldType {
    pub fn kind(&self) -> FieldKind {
        match self {
            FieldType::Reference { .. } => FieldKind::Reference,
            _ => FieldKind::Scalar,
        }
    }
    pub fn name(&self) -> &'static str {
        match self {
            FieldType::String { .. } => "string",
            FieldType::Text => "text",
            FieldType::Integer => "integer",
            FieldType::Float => "float",
            FieldType::Boolean => "boolean",
            FieldType::DateTime { .. } => "datetime",
            FieldType::Date => "date",
            FieldType::Reference { .. } => "reference",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldDescriptor {
    name: String,
    #[serde(flatten)]
    field_type: FieldType,
    #[serde(default)]
    required: bool,
}

impl FieldDescriptor {
    pub fn new(name: impl Into<String>, field_type: FieldType, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type,
            required,
        }
    }
    pub fn name(&self) -> &str {
        &self.name
    }
    pub fn field_type(&self) -> &FieldType {
        &self.field_type
    }
    pub fn kind(&self) -> FieldKind {
        self.field_type.kind()
    }
    pub fn is_required(&self) -> bool {
        self.required
    }
    fn is_automatic(&self) -> bool {
        matches!(
            self.field_type,
            FieldType::DateTime { auto_now: true, .. } | FieldType::DateTime { auto_now_add: true, .. }
        )
    }
    fn invalid(&self, message: impl Into<String>) -> LoaddataError {
        LoaddataError::field(&self.name, message)
    }

    /// The value stored for an explicit null.
    pub fn null(&self) -> Result<FieldValue> {
        if self.required {
            Err(self.invalid("this field is required"))
        } else {
            Ok(FieldValue::Null)
        }
    }

    /// Coerces a decoded scalar value to this field's type.
    ///
    /// Reference fields are not coerced here; their keys are resolved by the
    /// deserializer through the key codec.
    pub fn coerce(&self, value: EncodedValue) -> Result<FieldValue> {
        if value == EncodedValue::Null {
            return self.null();
        }
        let coerced = match (&self.field_type, value) {
            (FieldType::String { multiline }, EncodedValue::Text(text)) => {
                if !multiline && text.contains('\n') {
                    return Err(self.invalid("a single line string may not contain newlines"));
                }
                if text.len() > MAX_STRING_BYTES {
                    return Err(self.invalid(format!(
                        "string is {} bytes long, at most {} are allowed",
                        text.len(),
                        MAX_STRING_BYTES
                    )));
                }
                FieldValue::Text(text)
            }
            (FieldType::Text, EncodedValue::Text(text)) => FieldValue::Text(text),
            (FieldType::Integer, EncodedValue::Int(i)) => FieldValue::Integer(i),
            (FieldType::Float, EncodedValue::Float(f)) => FieldValue::Float(f),
            (FieldType::Float, EncodedValue::Int(i)) => FieldValue::Float(i as f64),
            (FieldType::Boolean, EncodedValue::Bool(b)) => FieldValue::Boolean(b),
            (FieldType::DateTime { .. }, EncodedValue::Text(text)) => FieldValue::DateTime(
                parse_datetime(&text).ok_or_else(|| self.invalid(format!("'{}' is not a datetime", text)))?,
            ),
            (FieldType::Date, EncodedValue::Text(text)) => FieldValue::Date(
                NaiveDate::parse_from_str(&text, DATE_FORMAT)
                    .map_err(|e| self.invalid(format!("'{}' is not a date: {}", text, e)))?,
            ),
            (FieldType::Reference { .. }, _) => {
                return Err(self.invalid("reference values are resolved as keys, not coerced"));
            }
            (field_type, other) => {
                return Err(self.invalid(format!("expected {}, found {}", field_type.name(), other)));
            }
        };
        Ok(coerced)
    }

    /// Checks that an already typed value fits this field.
    pub fn check(&self, value: &FieldValue) -> Result<()> {
        match (&self.field_type, value) {
            (_, FieldValue::Null) => self.null().map(|_| ()),
            (FieldType::String { multiline }, FieldValue::Text(text)) => {
                if !multiline && text.contains('\n') {
                    Err(self.invalid("a single line string may not contain newlines"))
                } else if text.len() > MAX_STRING_BYTES {
                    Err(self.invalid(format!("string is longer than {} bytes", MAX_STRING_BYTES)))
                } else {
                    Ok(())
                }
            }
            (FieldType::Text, FieldValue::Text(_))
            | (FieldType::Integer, FieldValue::Integer(_))
            | (FieldType::Float, FieldValue::Float(_))
            | (FieldType::Boolean, FieldValue::Boolean(_))
            | (FieldType::DateTime { .. }, FieldValue::DateTime(_))
            | (FieldType::Date, FieldValue::Date(_)) => Ok(()),
            (FieldType::Reference { target }, FieldValue::Reference(key)) => match target {
                Some(target) if target != key.kind() => Err(self.invalid(format!(
                    "expected a reference to {}, found {}",
                    target, key
                ))),
                _ => Ok(()),
            },
            (field_type, other) => Err(self.invalid(format!(
                "expected {}, found {}",
                field_type.name(),
                other.type_name()
            ))),
        }
    }
}

fn parse_datetime(text: &str) -> Option<NaiveDateTime> {
    DATETIME_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
}

// ------------- FieldValue -------------
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum FieldValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    Text(String),
    DateTime(NaiveDateTime),
    Date(NaiveDate),
    Reference(Key),
}

impl FieldValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::Null => "null",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Text(_) => "text",
            FieldValue::DateTime(_) => "datetime",
            FieldValue::Date(_) => "date",
            FieldValue::Reference(_) => "reference",
        }
    }
    pub fn as_key(&self) -> Option<&Key> {
        match self {
            FieldValue::Reference(key) => Some(key),
            _ => None,
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FieldValue::Null => write!(f, "null"),
            FieldValue::Boolean(b) => write!(f, "{}", b),
            FieldValue::Integer(i) => write!(f, "{}", i),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Text(s) => write!(f, "{:?}", s),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_OUTPUT_FORMAT)),
            FieldValue::Date(d) => write!(f, "{}", d.format(DATE_FORMAT)),
            FieldValue::Reference(key) => write!(f, "{}", key),
        }
    }
}

// ------------- ModelDescriptor -------------
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    app_label: String,
    kind: String,
    fields: Vec<FieldDescriptor>,
}

impl ModelDescriptor {
    /// `app_label.Kind`, the label records use to name their model.
    pub fn label(&self) -> String {
        format!("{}.{}", self.app_label, self.kind)
    }
    pub fn app_label(&self) -> &str {
        &self.app_label
    }
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn fields(&self) -> &[FieldDescriptor] {
        &self.fields
    }
    pub fn field(&self, name: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|f| f.name == name)
    }
    /// Checks a descriptor that did not come out of a [`ModelBuilder`].
    pub fn validated(self) -> Result<Self> {
        let mut builder = ModelBuilder::new(self.app_label, self.kind);
        builder.fields = self.fields;
        builder.build()
    }
}

/// A helper to build model descriptors.
pub struct ModelBuilder {
    app_label: String,
    kind: String,
    fields: Vec<FieldDescriptor>,
}

impl ModelBuilder {
    pub fn new(app_label: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            app_label: app_label.into(),
            kind: kind.into(),
            fields: vec![],
        }
    }
    pub fn field(mut self, field: FieldDescriptor) -> Self {
        self.fields.push(field);
        self
    }
    pub fn string(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::String { multiline: false }, required))
    }
    pub fn text(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::Text, required))
    }
    pub fn integer(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::Integer, required))
    }
    pub fn float(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::Float, required))
    }
    pub fn boolean(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::Boolean, required))
    }
    pub fn datetime(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldType::DateTime { auto_now: false, auto_now_add: false },
            required,
        ))
    }
    pub fn date(self, name: &str, required: bool) -> Self {
        self.field(FieldDescriptor::new(name, FieldType::Date, required))
    }
    pub fn reference(self, name: &str, target: Option<&str>, required: bool) -> Self {
        self.field(FieldDescriptor::new(
            name,
            FieldType::Reference { target: target.map(str::to_string) },
            required,
        ))
    }

    pub fn build(self) -> Result<ModelDescriptor> {
        if self.app_label.is_empty() {
            return Err(LoaddataError::Schema(format!("model {} has no app label", self.kind)));
        }
        // the kind has to be usable in a key
        PathElement::new(self.kind.clone(), IdOrName::Id(1))
            .map_err(|e| LoaddataError::Schema(e.to_string()))?;
        for (i, field) in self.fields.iter().enumerate() {
            if field.name.is_empty() {
                return Err(LoaddataError::Schema(format!("model {} has a field without a name", self.kind)));
            }
            if self.fields[..i].iter().any(|f| f.name == field.name) {
                return Err(LoaddataError::Schema(format!(
                    "model {} declares field '{}' twice",
                    self.kind, field.name
                )));
            }
        }
        Ok(ModelDescriptor {
            app_label: self.app_label,
            kind: self.kind,
            fields: self.fields,
        })
    }
}

// ------------- Persistable -------------
/// What a model instance must offer to be written to a datastore.
pub trait Persistable {
    fn key(&self) -> &Key;
    fn validate(&self) -> Result<()>;
    /// Creation-time hooks, run by [`Persistable::save`] only.
    fn pre_save(&mut self) {}
    /// Writes the instance as it is, without running any hooks.
    fn put(&self, store: &dyn Datastore) -> Result<Key>;
    /// Drops state that only mattered while the instance was being assembled.
    fn release_scaffolding(&mut self) {}
    fn save(&mut self, store: &dyn Datastore) -> Result<Key> {
        self.pre_save();
        self.validate()?;
        let key = self.put(store)?;
        self.release_scaffolding();
        Ok(key)
    }
}

// ------------- Model -------------
#[derive(Clone, Debug)]
pub struct Model {
    descriptor: Arc<ModelDescriptor>,
    key: Key,
    fields: BTreeMap<String, FieldValue>,
    // the ancestor entity fetched while deserializing, kept until saved
    parent: Option<Entity>,
}

impl Model {
    pub fn new(descriptor: Arc<ModelDescriptor>, key: Key, fields: BTreeMap<String, FieldValue>) -> Result<Self> {
        if key.kind() != descriptor.kind() {
            return Err(LoaddataError::Deserialization(format!(
                "key {} is not of kind {}",
                key,
                descriptor.kind()
            )));
        }
        for (name, value) in fields.iter() {
            let field = descriptor.field(name).ok_or_else(|| LoaddataError::UnknownField {
                model: descriptor.label(),
                field: name.clone(),
            })?;
            field.check(value)?;
        }
        for field in descriptor.fields().iter().filter(|f| f.required && !f.is_automatic()) {
            if !fields.contains_key(&field.name) {
                return Err(field.invalid("this field is required"));
            }
        }
        Ok(Self {
            descriptor,
            key,
            fields,
            parent: None,
        })
    }
    /// Lifts a stored entity back into a model of the given descriptor.
    pub fn from_entity(descriptor: Arc<ModelDescriptor>, entity: Entity) -> Result<Self> {
        let (key, properties) = entity.into_parts();
        Self::new(descriptor, key, properties)
    }
    pub(crate) fn with_parent(mut self, parent: Entity) -> Self {
        self.parent = Some(parent);
        self
    }
    pub fn descriptor(&self) -> &ModelDescriptor {
        &self.descriptor
    }
    pub fn kind(&self) -> &str {
        self.key.kind()
    }
    pub fn key(&self) -> &Key {
        &self.key
    }
    pub fn key_name(&self) -> Option<&str> {
        self.key.name()
    }
    pub fn parent_key(&self) -> Option<Key> {
        self.key.parent()
    }
    /// The ancestor entity loaded during deserialization, until the model is saved.
    pub fn parent_entity(&self) -> Option<&Entity> {
        self.parent.as_ref()
    }
    pub fn fields(&self) -> &BTreeMap<String, FieldValue> {
        &self.fields
    }
    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }
    pub fn set(&mut self, name: &str, value: FieldValue) -> Result<()> {
        let field = self.descriptor.field(name).ok_or_else(|| LoaddataError::UnknownField {
            model: self.descriptor.label(),
            field: name.to_string(),
        })?;
        field.check(&value)?;
        self.fields.insert(name.to_string(), value);
        Ok(())
    }
    pub fn to_entity(&self) -> Entity {
        Entity::new(self.key.clone(), self.fields.clone())
    }
}

impl PartialEq for Model {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key && self.fields == other.fields
    }
}

impl Persistable for Model {
    fn key(&self) -> &Key {
        &self.key
    }
    fn validate(&self) -> Result<()> {
        for field in self.descriptor.fields() {
            match self.fields.get(&field.name) {
                Some(value) => field.check(value)?,
                None if field.required => return Err(field.invalid("this field is required")),
                None => (),
            }
        }
        Ok(())
    }
    fn pre_save(&mut self) {
        let now = Utc::now().naive_utc();
        for field in self.descriptor.fields() {
            if let FieldType::DateTime { auto_now, auto_now_add } = field.field_type {
                let unset = matches!(self.fields.get(&field.name), None | Some(FieldValue::Null));
                if auto_now || (auto_now_add && unset) {
                    self.fields.insert(field.name.clone(), FieldValue::DateTime(now));
                }
            }
        }
    }
    fn put(&self, store: &dyn Datastore) -> Result<Key> {
        store.put(self.to_entity())?;
        Ok(self.key.clone())
    }
    fn release_scaffolding(&mut self) {
        self.parent = None;
    }
}
