//! Records: the transport form of one model instance.
//!
//! A record names its model, carries the native key text of its primary key
//! and maps field names to encoded values:
//!
//! ```json
//! {"model": "library.book", "pk": "Author:\"jdoe\"/Book:\"moby-dick\"",
//!  "fields": {"title": "Moby Dick", "editor": ["Author", "ishmael"]}}
//! ```
use std::collections::BTreeMap;
use std::fmt;
use std::io::BufRead;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{LoaddataError, Result};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Model label, `app_label.Kind`.
    pub model: String,
    /// Native key text of the primary key.
    pub pk: String,
    #[serde(default)]
    pub fields: BTreeMap<String, EncodedValue>,
}

impl Record {
    pub fn new(model: impl Into<String>, pk: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            pk: pk.into(),
            fields: BTreeMap::new(),
        }
    }
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<EncodedValue>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }
}

/// A reference that states which encoding it uses, so that no guessing is
/// needed when it is decoded.
///
/// In JSON these are single-entry objects: `{"path": [...]}`,
/// `{"path_expr": "from_path(...)"}` or `{"key": "Kind:\"name\""}`.
#[derive(Clone, Debug, PartialEq)]
pub enum TaggedReference {
    Path(Vec<EncodedValue>),
    PathExpr(String),
    Key(String),
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "Value", into = "Value")]
pub enum EncodedValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    /// Undecoded text; only produced by programmatic record sources.
    Bytes(Vec<u8>),
    List(Vec<EncodedValue>),
    Reference(TaggedReference),
    Object(Map<String, Value>),
}

impl From<Value> for EncodedValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => EncodedValue::Null,
            Value::Bool(b) => EncodedValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => EncodedValue::Int(i),
                None => EncodedValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => EncodedValue::Text(s),
            Value::Array(items) => EncodedValue::List(items.into_iter().map(EncodedValue::from).collect()),
            Value::Object(map) => tagged_reference(map),
        }
    }
}

fn tagged_reference(map: Map<String, Value>) -> EncodedValue {
    if map.len() == 1 {
        if let Some((tag, value)) = map.iter().next() {
            let tagged = match (tag.as_str(), value) {
                ("path", Value::Array(items)) => Some(TaggedReference::Path(
                    items.iter().cloned().map(EncodedValue::from).collect(),
                )),
                ("path_expr", Value::String(s)) => Some(TaggedReference::PathExpr(s.clone())),
                ("key", Value::String(s)) => Some(TaggedReference::Key(s.clone())),
                _ => None,
            };
            if let Some(tagged) = tagged {
                return EncodedValue::Reference(tagged);
            }
        }
    }
    EncodedValue::Object(map)
}

impl From<EncodedValue> for Value {
    fn from(value: EncodedValue) -> Self {
        match value {
            EncodedValue::Null => Value::Null,
            EncodedValue::Bool(b) => Value::Bool(b),
            EncodedValue::Int(i) => Value::Number(i.into()),
            EncodedValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            EncodedValue::Text(s) => Value::String(s),
            EncodedValue::Bytes(bytes) => Value::String(String::from_utf8_lossy(&bytes).into_owned()),
            EncodedValue::List(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            EncodedValue::Reference(tagged) => {
                let mut map = Map::new();
                match tagged {
                    TaggedReference::Path(items) => {
                        map.insert("path".into(), Value::Array(items.into_iter().map(Value::from).collect()))
                    }
                    TaggedReference::PathExpr(s) => map.insert("path_expr".into(), Value::String(s)),
                    TaggedReference::Key(s) => map.insert("key".into(), Value::String(s)),
                };
                Value::Object(map)
            }
            EncodedValue::Object(map) => Value::Object(map),
        }
    }
}

impl fmt::Display for EncodedValue {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", Value::from(self.clone()))
    }
}

impl From<&str> for EncodedValue {
    fn from(text: &str) -> Self {
        EncodedValue::Text(text.to_string())
    }
}
impl From<String> for EncodedValue {
    fn from(text: String) -> Self {
        EncodedValue::Text(text)
    }
}
impl From<i64> for EncodedValue {
    fn from(i: i64) -> Self {
        EncodedValue::Int(i)
    }
}
impl From<f64> for EncodedValue {
    fn from(f: f64) -> Self {
        EncodedValue::Float(f)
    }
}
impl From<bool> for EncodedValue {
    fn from(b: bool) -> Self {
        EncodedValue::Bool(b)
    }
}
impl From<Vec<EncodedValue>> for EncodedValue {
    fn from(items: Vec<EncodedValue>) -> Self {
        EncodedValue::List(items)
    }
}
impl From<TaggedReference> for EncodedValue {
    fn from(tagged: TaggedReference) -> Self {
        EncodedValue::Reference(tagged)
    }
}

/// Anything a record sequence may yield: plain records, or the fallible
/// results of a streaming reader.
pub trait RecordItem {
    fn into_record(self) -> Result<Record>;
}
impl RecordItem for Record {
    fn into_record(self) -> Result<Record> {
        Ok(self)
    }
}
impl RecordItem for Result<Record> {
    fn into_record(self) -> Result<Record> {
        self
    }
}

/// Reads records from a fixture.
///
/// A fixture is either a JSON array of records or a stream of whitespace
/// separated record objects (one per line, typically). Both are read one
/// record per pull.
pub fn read_records<'r, R: BufRead + 'r>(mut reader: R) -> Result<Box<dyn Iterator<Item = Result<Record>> + 'r>> {
    match next_significant(&mut reader)? {
        None => Ok(Box::new(std::iter::empty())),
        Some(b'[') => {
            reader.consume(1);
            Ok(Box::new(ArrayRecords {
                reader,
                first: true,
                done: false,
            }))
        }
        Some(_) => Ok(Box::new(
            serde_json::Deserializer::from_reader(reader)
                .into_iter::<Record>()
                .map(|record| record.map_err(LoaddataError::from)),
        )),
    }
}

// Skips whitespace and peeks at the next byte without consuming it.
fn next_significant<R: BufRead>(reader: &mut R) -> Result<Option<u8>> {
    loop {
        let buffer = reader.fill_buf()?;
        if buffer.is_empty() {
            return Ok(None);
        }
        let length = buffer.len();
        let skip = buffer.iter().take_while(|b| b.is_ascii_whitespace()).count();
        if skip < length {
            let next = buffer[skip];
            reader.consume(skip);
            return Ok(Some(next));
        }
        reader.consume(length);
    }
}

// The elements of a JSON array, parsed one at a time. The json deserializer
// stops right after the closing brace of each element, so the separators are
// framed here.
struct ArrayRecords<R> {
    reader: R,
    first: bool,
    done: bool,
}

impl<R: BufRead> ArrayRecords<R> {
    fn pull(&mut self) -> Result<Option<Record>> {
        let mut next = next_significant(&mut self.reader)?;
        if !self.first {
            match next {
                Some(b',') => {
                    self.reader.consume(1);
                    next = next_significant(&mut self.reader)?;
                }
                Some(b']') => (),
                _ => {
                    return Err(LoaddataError::Deserialization(
                        "malformed fixture: expected ',' or ']' between records".into(),
                    ));
                }
            }
        }
        match next {
            Some(b']') => {
                self.reader.consume(1);
                Ok(None)
            }
            Some(_) => {
                self.first = false;
                let mut deserializer = serde_json::Deserializer::from_reader(&mut self.reader);
                Ok(Some(Record::deserialize(&mut deserializer)?))
            }
            None => Err(LoaddataError::Deserialization(
                "malformed fixture: the record array is not closed".into(),
            )),
        }
    }
}

impl<R: BufRead> Iterator for ArrayRecords<R> {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        let pulled = self.pull();
        // the stream cannot be resynchronised after an error
        if !matches!(pulled, Ok(Some(_))) {
            self.done = true;
        }
        pulled.transpose()
    }
}
