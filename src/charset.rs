// Text charsets that byte-string field values may be declared in.
use std::fmt;
use std::str::FromStr;

use crate::error::LoaddataError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Charset {
    #[default]
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Utf8 => "utf-8",
            Charset::Latin1 => "iso-8859-1",
            Charset::Ascii => "ascii",
        }
    }
    /// Strict decoding; any byte that is invalid in the charset is an error.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Charset::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string()),
            // every byte maps to the code point of the same value
            Charset::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
            Charset::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(position) => Err(format!(
                    "byte 0x{:02x} at position {} is not ascii",
                    bytes[position], position
                )),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
        }
    }
}

impl FromStr for Charset {
    type Err = LoaddataError;
    fn from_str(name: &str) -> Result<Self, Self::Err> {
        let normalized: String = name
            .chars()
            .filter(|c| !matches!(c, '-' | '_' | ' '))
            .map(|c| c.to_ascii_lowercase())
            .collect();
        match normalized.as_str() {
            "utf8" | "u8" => Ok(Charset::Utf8),
            "latin1" | "l1" | "iso88591" | "iso8859" | "8859" | "cp819" => Ok(Charset::Latin1),
            "ascii" | "usascii" | "646" => Ok(Charset::Ascii),
            _ => Err(LoaddataError::Config(format!("unsupported charset '{}'", name))),
        }
    }
}

impl fmt::Display for Charset {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}
