//! Serde helpers for Zabbix wire conventions.
//!
//! The API sends numbers, flags and enum codes as JSON strings, but accepts
//! and sometimes returns plain numbers. Every decoder here takes either.

use serde::de::{self, Deserializer};
use serde::{Deserialize, Serializer};
use std::fmt::Display;
use std::str::FromStr;

/// An enum that travels as an integer code on the wire
pub trait WireCode: Sized + FromStr {
    fn code(&self) -> i32;
    fn from_code(code: i32) -> Option<Self>;
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Scalar {
    Str(String),
    Int(i64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Str(s) => s,
            Scalar::Int(i) => i.to_string(),
            Scalar::Float(f) => f.to_string(),
            Scalar::Bool(b) => u8::from(b).to_string(),
        }
    }
}

/// Numbers encoded as strings (`"900"`), decoded from strings or numbers
pub mod numeric {
    use super::*;

    pub fn serialize<T: Display, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(value)
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: FromStr,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = Scalar::deserialize(deserializer)?.into_text();
        text.trim().parse().map_err(de::Error::custom)
    }
}

/// Free text that the API may return as a number (`yaxismin` is `"0.0000"` or `0`)
pub mod text {
    use super::*;

    pub fn serialize<S: Serializer>(value: &str, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
        Ok(Scalar::deserialize(deserializer)?.into_text())
    }
}

/// Booleans encoded as `"0"` / `"1"`
pub mod flag {
    use super::*;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(if *value { "1" } else { "0" })
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        match Scalar::deserialize(deserializer)? {
            Scalar::Bool(b) => Ok(b),
            other => {
                let text = other.into_text();
                match text.trim() {
                    "0" => Ok(false),
                    "1" => Ok(true),
                    other => Err(de::Error::custom(format!("expected 0 or 1, got {other:?}"))),
                }
            }
        }
    }
}

/// Closed enums encoded as their integer code (`"2"`), decoded from a code or a name
pub mod code {
    use super::*;

    pub fn serialize<T: WireCode, S: Serializer>(value: &T, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&value.code())
    }

    pub fn deserialize<'de, T, D>(deserializer: D) -> Result<T, D::Error>
    where
        T: WireCode,
        T::Err: Display,
        D: Deserializer<'de>,
    {
        let text = Scalar::deserialize(deserializer)?.into_text();
        let text = text.trim();
        match text.parse::<i32>() {
            Ok(code) => T::from_code(code)
                .ok_or_else(|| de::Error::custom(format!("unknown code {code}"))),
            Err(_) => text.parse().map_err(de::Error::custom),
        }
    }
}
