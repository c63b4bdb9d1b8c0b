//! Hierarchical datastore keys.
//!
//! A [`Key`] is the full path from a root entity down to the entity it names.
//! Every element of that path carries a kind and either a numeric id or a
//! string name. Two keys are equal exactly when their paths are equal element
//! by element, and keys order by path, so an ancestor always sorts before its
//! descendants.
//!
//! Keys have two textual renderings:
//! * the native key text produced by `Display` (`Author:"jdoe"/Book:42`),
//!   which is what records carry in their `pk` field, and
//! * the path expression produced by [`Key::to_path_expr`]
//!   (`from_path('Author', 'jdoe', 'Book', 42)`).
//!
//! Both are decoded by [`crate::codec::KeyCodec`].
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec::KeyCodec;
use crate::error::{LoaddataError, Result};

// ------------- IdOrName -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub enum IdOrName {
    Id(i64),
    Name(String),
}
impl fmt::Display for IdOrName {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            IdOrName::Id(id) => write!(f, "{}", id),
            IdOrName::Name(name) => write!(f, "\"{}\"", escape_name(name)),
        }
    }
}

// ------------- PathElement -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct PathElement {
    kind: String,
    id_or_name: IdOrName,
}
impl PathElement {
    pub fn new(kind: impl Into<String>, id_or_name: IdOrName) -> Result<Self> {
        let kind = kind.into();
        check_kind(&kind)?;
        match &id_or_name {
            IdOrName::Id(id) if *id <= 0 => {
                return Err(LoaddataError::MalformedKey(format!(
                    "numeric id {} of kind '{}' must be positive",
                    id, kind
                )));
            }
            IdOrName::Name(name) if name.is_empty() => {
                return Err(LoaddataError::MalformedKey(format!(
                    "name of kind '{}' may not be empty",
                    kind
                )));
            }
            _ => (),
        }
        Ok(Self { kind, id_or_name })
    }
    pub fn kind(&self) -> &str {
        &self.kind
    }
    pub fn id_or_name(&self) -> &IdOrName {
        &self.id_or_name
    }
}
impl fmt::Display for PathElement {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.id_or_name)
    }
}

/// One item of a flattened path sequence `[kind1, id1, kind2, id2, ...]`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum PathToken {
    Text(String),
    Integer(i64),
}
impl From<&str> for PathToken {
    fn from(text: &str) -> Self {
        PathToken::Text(text.to_string())
    }
}
impl From<String> for PathToken {
    fn from(text: String) -> Self {
        PathToken::Text(text)
    }
}
impl From<i64> for PathToken {
    fn from(integer: i64) -> Self {
        PathToken::Integer(integer)
    }
}
impl fmt::Display for PathToken {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PathToken::Text(text) => write!(f, "'{}'", escape_literal(text)),
            PathToken::Integer(integer) => write!(f, "{}", integer),
        }
    }
}

// ------------- Key -------------
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct Key {
    path: Arc<[PathElement]>,
}

impl Key {
    /// A key whose terminal element is `(kind, id_or_name)`, optionally under `parent`.
    pub fn new(kind: impl Into<String>, id_or_name: IdOrName, parent: Option<&Key>) -> Result<Self> {
        let element = PathElement::new(kind, id_or_name)?;
        let mut path = parent.map(|p| p.path.to_vec()).unwrap_or_default();
        path.push(element);
        Ok(Self { path: path.into() })
    }
    pub fn named(kind: impl Into<String>, name: impl Into<String>, parent: Option<&Key>) -> Result<Self> {
        Self::new(kind, IdOrName::Name(name.into()), parent)
    }
    pub fn numeric(kind: impl Into<String>, id: i64, parent: Option<&Key>) -> Result<Self> {
        Self::new(kind, IdOrName::Id(id), parent)
    }
    /// Builds a key from already validated elements, root first.
    pub fn from_elements(path: Vec<PathElement>) -> Result<Self> {
        if path.is_empty() {
            return Err(LoaddataError::MalformedKey("a key needs at least one path element".into()));
        }
        Ok(Self { path: path.into() })
    }
    fn terminal(&self) -> &PathElement {
        // never empty, see the constructors
        &self.path[self.path.len() - 1]
    }
    pub fn kind(&self) -> &str {
        self.terminal().kind()
    }
    pub fn id_or_name(&self) -> &IdOrName {
        self.terminal().id_or_name()
    }
    pub fn id(&self) -> Option<i64> {
        match self.id_or_name() {
            IdOrName::Id(id) => Some(*id),
            IdOrName::Name(_) => None,
        }
    }
    pub fn name(&self) -> Option<&str> {
        match self.id_or_name() {
            IdOrName::Name(name) => Some(name),
            IdOrName::Id(_) => None,
        }
    }
    pub fn is_named(&self) -> bool {
        self.name().is_some()
    }
    pub fn parent(&self) -> Option<Key> {
        if self.path.len() > 1 {
            Some(Key {
                path: self.path[..self.path.len() - 1].into(),
            })
        } else {
            None
        }
    }
    /// The ancestor path, root first, ending with this key's own element.
    pub fn path(&self) -> &[PathElement] {
        &self.path
    }
    pub fn depth(&self) -> usize {
        self.path.len()
    }
    pub fn flat_path(&self) -> Vec<PathToken> {
        let mut tokens = Vec::with_capacity(self.path.len() * 2);
        for element in self.path.iter() {
            tokens.push(PathToken::Text(element.kind.clone()));
            tokens.push(match &element.id_or_name {
                IdOrName::Id(id) => PathToken::Integer(*id),
                IdOrName::Name(name) => PathToken::Text(name.clone()),
            });
        }
        tokens
    }
    /// Renders the key as `from_path('Kind', 'name', 'Kind', 42)`.
    pub fn to_path_expr(&self) -> String {
        let arguments: Vec<String> = self.flat_path().iter().map(|t| t.to_string()).collect();
        format!("from_path({})", arguments.join(", "))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let mut first = true;
        for element in self.path.iter() {
            if !first {
                write!(f, "/")?;
            }
            write!(f, "{}", element)?;
            first = false;
        }
        Ok(())
    }
}

impl FromStr for Key {
    type Err = LoaddataError;
    fn from_str(text: &str) -> Result<Self> {
        KeyCodec::default().parse(text)
    }
}

impl Serialize for Key {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> Deserialize<'de> for Key {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(D::Error::custom)
    }
}

// Kinds are identifiers so that the native key text stays unambiguous.
fn check_kind(kind: &str) -> Result<()> {
    let mut chars = kind.chars();
    let valid = match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {
            chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        }
        _ => false,
    };
    if valid {
        Ok(())
    } else {
        Err(LoaddataError::MalformedKey(format!("invalid kind '{}'", kind)))
    }
}

fn escape_name(name: &str) -> String {
    let mut escaped = String::with_capacity(name.len());
    for c in name.chars() {
        if c == '"' || c == '\\' {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn escape_literal(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\\' => escaped.push_str("\\\\"),
            '\'' => escaped.push_str("\\'"),
            '\n' => escaped.push_str("\\n"),
            '\r' => escaped.push_str("\\r"),
            '\t' => escaped.push_str("\\t"),
            _ => escaped.push(c),
        }
    }
    escaped
}
