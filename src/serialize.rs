//! Record serializer, the inverse of [`crate::deserialize`].
//!
//! References are written as flattened path lists, which decode without the
//! classification heuristic and keep numeric ids intact.
use crate::key::PathToken;
use crate::model::{DATE_FORMAT, DATETIME_OUTPUT_FORMAT, FieldValue, Model};
use crate::record::{EncodedValue, Record};

pub fn encode_value(value: &FieldValue) -> EncodedValue {
    match value {
        FieldValue::Null => EncodedValue::Null,
        FieldValue::Boolean(b) => EncodedValue::Bool(*b),
        FieldValue::Integer(i) => EncodedValue::Int(*i),
        FieldValue::Float(f) => EncodedValue::Float(*f),
        FieldValue::Text(s) => EncodedValue::Text(s.clone()),
        FieldValue::DateTime(dt) => EncodedValue::Text(dt.format(DATETIME_OUTPUT_FORMAT).to_string()),
        FieldValue::Date(d) => EncodedValue::Text(d.format(DATE_FORMAT).to_string()),
        FieldValue::Reference(key) => EncodedValue::List(
            key.flat_path()
                .into_iter()
                .map(|token| match token {
                    PathToken::Text(text) => EncodedValue::Text(text),
                    PathToken::Integer(i) => EncodedValue::Int(i),
                })
                .collect(),
        ),
    }
}

pub fn serialize_model(model: &Model) -> Record {
    let mut record = Record::new(model.descriptor().label(), model.key().to_string());
    for (name, value) in model.fields() {
        record.fields.insert(name.clone(), encode_value(value));
    }
    record
}

/// Serializes models in the order given; pass ancestors before descendants
/// so the result loads back in one pass.
pub fn serialize<'m, I>(models: I) -> Vec<Record>
where
    I: IntoIterator<Item = &'m Model>,
{
    models.into_iter().map(serialize_model).collect()
}
