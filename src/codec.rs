//! Key codec: conversion between [`Key`] values and their textual forms.
//!
//! Three encodings of a key show up in records:
//! * native key text (`Author:"jdoe"/Book:42`), decoded by [`KeyCodec::parse`],
//! * a flattened path sequence (`["Author", "jdoe", "Book", 42]`), folded into
//!   a key by [`KeyCodec::from_path`],
//! * a path expression (`from_path('Author', 'jdoe', 'Book', 42)`), decoded by
//!   [`KeyCodec::parse_path_expr`].
//!
//! Path expressions are only ever read through the restricted grammar in
//! `keytext.pest`: string and integer literals, plus an optional `_app`
//! keyword. Nothing in them is evaluated.
use pest::Parser;
use pest::iterators::Pair;
use pest_derive::Parser;

use crate::error::{LoaddataError, Result};
use crate::key::{IdOrName, Key, PathElement, PathToken};

#[derive(Parser)]
#[grammar = "keytext.pest"]
struct KeyTextParser;

/// The substring that marks a reference value as a path expression.
pub const PATH_EXPR_MARKER: &str = "from_path";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReferenceEncoding {
    PathExpr,
    BareKey,
}

/// Classifies a textual reference value.
///
/// This is plain substring containment of [`PATH_EXPR_MARKER`], not a parse:
/// native key text that happens to contain `from_path` inside a name is
/// classified as a path expression and will then fail to decode. Producers
/// that need to avoid the ambiguity emit tagged references instead (see
/// [`crate::record::TaggedReference`]).
pub fn classify_reference_encoding(text: &str) -> ReferenceEncoding {
    if text.contains(PATH_EXPR_MARKER) {
        ReferenceEncoding::PathExpr
    } else {
        ReferenceEncoding::BareKey
    }
}

#[derive(Clone, Debug, Default)]
pub struct KeyCodec {
    app_id: Option<String>,
}

impl KeyCodec {
    /// A codec for keys of the given application. With `None` any `_app`
    /// keyword in a path expression is accepted.
    pub fn new(app_id: Option<String>) -> Self {
        Self { app_id }
    }
    pub fn app_id(&self) -> Option<&str> {
        self.app_id.as_deref()
    }

    pub fn parse(&self, text: &str) -> Result<Key> {
        let mut pairs = KeyTextParser::parse(Rule::key_text, text)
            .map_err(|e| LoaddataError::MalformedKey(format!("'{}' is not valid key text: {}", text, e)))?;
        let key_text = pairs
            .next()
            .ok_or_else(|| LoaddataError::MalformedKey(format!("'{}' is empty", text)))?;
        let mut path = Vec::new();
        for element in key_text.into_inner().filter(|p| p.as_rule() == Rule::element) {
            path.push(parse_element(element)?);
        }
        Key::from_elements(path)
    }

    /// Folds `[kind1, id1, kind2, id2, ...]` into a key; the first pair is the root.
    pub fn from_path(&self, tokens: &[PathToken]) -> Result<Key> {
        if tokens.is_empty() {
            return Err(LoaddataError::MalformedKey("empty path".into()));
        }
        if tokens.len() % 2 != 0 {
            return Err(LoaddataError::MalformedKey(format!(
                "path has an odd number of elements ({})",
                tokens.len()
            )));
        }
        let mut path = Vec::with_capacity(tokens.len() / 2);
        for pair in tokens.chunks(2) {
            let kind = match &pair[0] {
                PathToken::Text(kind) => kind.clone(),
                PathToken::Integer(i) => {
                    return Err(LoaddataError::MalformedKey(format!(
                        "kind must be a string, found {}",
                        i
                    )));
                }
            };
            let id_or_name = match &pair[1] {
                PathToken::Text(name) => IdOrName::Name(name.clone()),
                PathToken::Integer(id) => IdOrName::Id(*id),
            };
            path.push(PathElement::new(kind, id_or_name)?);
        }
        Key::from_elements(path)
    }

    pub fn parse_path_expr(&self, text: &str) -> Result<Key> {
        let mut pairs = KeyTextParser::parse(Rule::path_expr, text).map_err(|e| {
            LoaddataError::MalformedKey(format!("'{}' is not a valid path expression: {}", text, e))
        })?;
        let path_expr = pairs
            .next()
            .ok_or_else(|| LoaddataError::MalformedKey(format!("'{}' is empty", text)))?;
        let mut tokens = Vec::new();
        if let Some(arguments) = path_expr.into_inner().find(|p| p.as_rule() == Rule::arguments) {
            for argument in arguments.into_inner() {
                match argument.as_rule() {
                    Rule::string => tokens.push(PathToken::Text(string_literal(argument)?)),
                    Rule::integer => tokens.push(PathToken::Integer(integer_literal(argument)?)),
                    Rule::keyword => self.check_keyword(argument)?,
                    _ => (),
                }
            }
        }
        self.from_path(&tokens)
    }

    fn check_keyword(&self, keyword: Pair<Rule>) -> Result<()> {
        let mut inner = keyword.into_inner();
        let name = inner.next().map(|p| p.as_str()).unwrap_or_default();
        let value = inner
            .next()
            .ok_or_else(|| LoaddataError::MalformedKey(format!("keyword '{}' has no value", name)))?;
        if name != "_app" {
            return Err(LoaddataError::MalformedKey(format!(
                "unsupported keyword argument '{}'",
                name
            )));
        }
        if value.as_rule() != Rule::string {
            return Err(LoaddataError::MalformedKey("_app must be a string".into()));
        }
        let app = string_literal(value)?;
        match &self.app_id {
            Some(expected) if *expected != app => Err(LoaddataError::MalformedKey(format!(
                "key belongs to application '{}', expected '{}'",
                app, expected
            ))),
            _ => Ok(()),
        }
    }
}

fn parse_element(element: Pair<Rule>) -> Result<PathElement> {
    let text = element.as_str().to_string();
    let mut inner = element.into_inner();
    let (kind, value) = match (inner.next(), inner.next()) {
        (Some(kind), Some(value)) => (kind.as_str().to_string(), value),
        _ => return Err(LoaddataError::MalformedKey(format!("incomplete path element '{}'", text))),
    };
    let id_or_name = match value.as_rule() {
        Rule::id => IdOrName::Id(value.as_str().parse::<i64>().map_err(|e| {
            LoaddataError::MalformedKey(format!("id in '{}' is out of range: {}", text, e))
        })?),
        _ => IdOrName::Name(unescape_name(
            value.into_inner().next().map(|p| p.as_str()).unwrap_or_default(),
        )),
    };
    PathElement::new(kind, id_or_name)
}

fn unescape_name(raw: &str) -> String {
    let mut name = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(escaped) = chars.next() {
                name.push(escaped);
            }
        } else {
            name.push(c);
        }
    }
    name
}

fn string_literal(string: Pair<Rule>) -> Result<String> {
    let raw = string.into_inner().next().map(|p| p.as_str()).unwrap_or_default();
    unescape_literal(raw)
}

fn integer_literal(integer: Pair<Rule>) -> Result<i64> {
    let digits = integer.as_str().trim_end_matches(['L', 'l']);
    digits
        .parse::<i64>()
        .map_err(|e| LoaddataError::MalformedKey(format!("integer '{}' is out of range: {}", digits, e)))
}

// Python string literal escapes.
fn unescape_literal(raw: &str) -> Result<String> {
    let mut text = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            text.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => text.push('\\'),
            Some('\'') => text.push('\''),
            Some('"') => text.push('"'),
            Some('n') => text.push('\n'),
            Some('r') => text.push('\r'),
            Some('t') => text.push('\t'),
            Some('0') => text.push('\0'),
            Some('a') => text.push('\x07'),
            Some('b') => text.push('\x08'),
            Some('f') => text.push('\x0c'),
            Some('v') => text.push('\x0b'),
            Some('\n') => (),
            Some('x') => text.push(hex_char(&mut chars, 2)?),
            Some('u') => text.push(hex_char(&mut chars, 4)?),
            Some('U') => text.push(hex_char(&mut chars, 8)?),
            Some(other) => {
                text.push('\\');
                text.push(other);
            }
            None => text.push('\\'),
        }
    }
    Ok(text)
}

fn hex_char(chars: &mut std::str::Chars, digits: usize) -> Result<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    if hex.chars().count() != digits {
        return Err(LoaddataError::MalformedKey(format!("truncated escape '{}'", hex)));
    }
    u32::from_str_radix(&hex, 16)
        .ok()
        .and_then(char::from_u32)
        .ok_or_else(|| LoaddataError::MalformedKey(format!("invalid escape '{}'", hex)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_escapes() {
        assert_eq!(unescape_literal(r"it\'s").unwrap(), "it's");
        assert_eq!(unescape_literal(r"a\\b").unwrap(), "a\\b");
        assert_eq!(unescape_literal(r"tab\there").unwrap(), "tab\there");
        assert_eq!(unescape_literal(r"caf\xe9").unwrap(), "café");
        assert_eq!(unescape_literal(r"\u00e9t\u00e9").unwrap(), "été");
        // unknown escapes keep their backslash, as in Python
        assert_eq!(unescape_literal(r"\q").unwrap(), "\\q");
    }

    #[test]
    fn truncated_hex_escape_is_malformed() {
        assert!(matches!(unescape_literal(r"\x4"), Err(LoaddataError::MalformedKey(_))));
        assert!(matches!(unescape_literal(r"\ud800"), Err(LoaddataError::MalformedKey(_))));
    }

    #[test]
    fn name_escapes() {
        assert_eq!(unescape_name(r#"say \"hi\" \\o/"#), r#"say "hi" \o/"#);
    }
}
