//! Wire records.
//!
//! Every line is one JSON object. Outbound integers are decimal strings;
//! inbound integers may be JSON numbers (parsed exactly) or strings.

use std::str::FromStr;

use num_bigint::{BigInt, BigUint};
use num_traits::Num;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::oracle::Leak;
use crate::{Error, Result};

/// Maximum length of any single numeric field, in characters.
pub const MAX_NUMBER_DIGITS: usize = 4096;

/// A parsed inbound record.
#[derive(Clone, Debug)]
pub struct Record(Map<String, Value>);

impl Record {
    /// Parses one line into a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] for invalid JSON or a non-object value.
    pub fn parse(line: &str) -> Result<Self> {
        match serde_json::from_str::<Value>(line.trim()) {
            Ok(Value::Object(map)) => Ok(Self(map)),
            Ok(_) => Err(Error::Validation("expected a JSON object".to_string())),
            Err(e) => Err(Error::Validation(format!("malformed JSON: {e}"))),
        }
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    fn field(&self, key: &str) -> Result<&Value> {
        self.0
            .get(key)
            .ok_or_else(|| Error::Validation(format!("missing field `{key}`")))
    }

    /// Reads a signed integer given as a JSON number or a decimal string.
    pub fn integer(&self, key: &str) -> Result<BigInt> {
        let text = match self.field(key)? {
            Value::Number(n) => n.to_string(),
            Value::String(s) => s.trim().to_string(),
            _ => {
                return Err(Error::Validation(format!(
                    "field `{key}` must be an integer"
                )))
            }
        };
        parse_decimal(key, &text)
    }

    /// Reads a non-negative integer given as a JSON number or a decimal string.
    pub fn unsigned(&self, key: &str) -> Result<BigUint> {
        let value = self.integer(key)?;
        value
            .to_biguint()
            .ok_or_else(|| Error::Validation(format!("field `{key}` must not be negative")))
    }

    /// Reads a non-negative integer in any of the accepted notations.
    ///
    /// JSON numbers and digit-only strings are decimal; strings prefixed with
    /// `0x` or containing hex letters are hexadecimal.
    pub fn flexible_unsigned(&self, key: &str) -> Result<BigUint> {
        let text = match self.field(key)? {
            Value::Number(_) => return self.unsigned(key),
            Value::String(s) => s.trim(),
            _ => {
                return Err(Error::Validation(format!(
                    "field `{key}` must be an integer or a hex string"
                )))
            }
        };

        let (digits, radix) = if let Some(hex) = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
        {
            (hex, 16)
        } else if text.chars().all(|c| c.is_ascii_digit()) {
            (text, 10)
        } else {
            (text, 16)
        };

        if digits.is_empty() || digits.len() > MAX_NUMBER_DIGITS {
            return Err(Error::Validation(format!(
                "field `{key}` has an invalid length"
            )));
        }
        BigUint::from_str_radix(digits, radix)
            .map_err(|_| Error::Validation(format!("field `{key}` is not a valid number")))
    }

    /// Reads a hex-encoded byte string.
    pub fn hex_bytes(&self, key: &str) -> Result<Vec<u8>> {
        match self.field(key)? {
            Value::String(s) => hex::decode(s.trim())
                .map_err(|e| Error::Validation(format!("field `{key}` is not valid hex: {e}"))),
            _ => Err(Error::Validation(format!(
                "field `{key}` must be a hex string"
            ))),
        }
    }

    pub fn text(&self, key: &str) -> Result<&str> {
        match self.field(key)? {
            Value::String(s) => Ok(s),
            _ => Err(Error::Validation(format!("field `{key}` must be a string"))),
        }
    }
}

fn parse_decimal(key: &str, text: &str) -> Result<BigInt> {
    if text.is_empty() || text.len() > MAX_NUMBER_DIGITS {
        return Err(Error::Validation(format!(
            "field `{key}` has an invalid length"
        )));
    }
    BigInt::from_str(text)
        .map_err(|_| Error::Validation(format!("field `{key}` must be an integer")))
}

/// Serializes big integers as decimal strings.
pub mod decimal {
    use std::borrow::Borrow;

    use num_bigint::BigUint;
    use serde::Serializer;

    pub fn serialize<T, S>(value: &T, serializer: S) -> Result<S::Ok, S::Error>
    where
        T: Borrow<BigUint>,
        S: Serializer,
    {
        serializer.serialize_str(&value.borrow().to_str_radix(10))
    }
}

/// Named public values, serialized as a map of decimal strings.
#[derive(Clone, Debug, Default)]
pub struct PublicValues(pub Vec<(&'static str, BigUint)>);

impl Serialize for PublicValues {
    fn serialize<S>(&self, serializer: S) -> core::result::Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in &self.0 {
            map.serialize_entry(name, &value.to_str_radix(10))?;
        }
        map.end()
    }
}

#[derive(Serialize)]
pub struct Notice<'a> {
    pub message: &'a str,
}

#[derive(Serialize)]
pub struct Rejection {
    pub error: String,
}

#[derive(Serialize)]
pub struct Announcement<'a> {
    pub message: &'a str,
    #[serde(flatten)]
    pub values: PublicValues,
}

/// Public parameters of the guessing game.
#[derive(Serialize)]
pub struct GroupAnnouncement<'a> {
    #[serde(with = "decimal")]
    pub a1: &'a BigUint,
    #[serde(with = "decimal")]
    pub a2: &'a BigUint,
    #[serde(with = "decimal")]
    pub b2: &'a BigUint,
    #[serde(rename = "Gx", with = "decimal")]
    pub gx: &'a BigUint,
    #[serde(rename = "Gy", with = "decimal")]
    pub gy: &'a BigUint,
}

#[derive(Serialize)]
pub struct GuessReply<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<&'a str>,
    #[serde(rename = "nextLoak", with = "decimal")]
    pub next_loak: &'a BigUint,
}

#[derive(Serialize)]
pub struct Verdict<'a> {
    pub message: &'a str,
    pub flag: &'a str,
}

#[derive(Serialize)]
pub struct Encryption {
    #[serde(flatten)]
    pub public_key: PublicValues,
    #[serde(with = "decimal")]
    pub ciphertext: BigUint,
}

#[derive(Serialize)]
pub struct LeakReply {
    pub leak: Leak,
}

#[derive(Serialize)]
pub struct SignatureReply {
    #[serde(with = "decimal")]
    pub signature: BigUint,
}

#[derive(Serialize)]
pub struct VerifyReply {
    pub valid: bool,
}

/// Encodes one outbound record as a line (without the trailing newline).
pub fn line<T: Serialize>(record: &T) -> String {
    serde_json::to_string(record)
        .unwrap_or_else(|e| unreachable!("outbound records always serialize: {e}"))
}
