//! Transform JSON as written: object members stay in source order and a
//! repeated key is kept as a separate member, so two `#if`/`#else` chains or
//! two `#calltemplate(X)` calls in one object both survive parsing.

use std::fmt;

use serde::de::{self, Deserialize, Deserializer, MapAccess, SeqAccess, Visitor};

use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Doc {
    Object(Vec<(String, Doc)>),
    Array(Vec<Doc>),
    Scalar(Value),
}

impl Doc {
    pub(crate) fn parse(text: &str) -> crate::error::Result<Doc> {
        Ok(serde_json::from_str(text)?)
    }

    pub(crate) fn as_str(&self) -> Option<&str> {
        match self {
            Doc::Scalar(Value::String(s)) => Some(s),
            _ => None,
        }
    }
}

impl<'de> Deserialize<'de> for Doc {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(DocVisitor)
    }
}

struct DocVisitor;

impl<'de> Visitor<'de> for DocVisitor {
    type Value = Doc;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a JSON value")
    }

    fn visit_unit<E: de::Error>(self) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::Null))
    }

    fn visit_bool<E: de::Error>(self, b: bool) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::Boolean(b)))
    }

    fn visit_i64<E: de::Error>(self, n: i64) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::Integer(n)))
    }

    fn visit_u64<E: de::Error>(self, n: u64) -> Result<Doc, E> {
        Ok(Doc::Scalar(match i64::try_from(n) {
            Ok(n) => Value::Integer(n),
            Err(_) => Value::Float(n as f64),
        }))
    }

    fn visit_f64<E: de::Error>(self, n: f64) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::Float(n)))
    }

    fn visit_str<E: de::Error>(self, s: &str) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::String(s.to_string())))
    }

    fn visit_string<E: de::Error>(self, s: String) -> Result<Doc, E> {
        Ok(Doc::Scalar(Value::String(s)))
    }

    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<Doc, A::Error> {
        let mut items = Vec::new();
        while let Some(item) = seq.next_element()? {
            items.push(item);
        }
        Ok(Doc::Array(items))
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Doc, A::Error> {
        let mut members = Vec::new();
        while let Some((key, value)) = map.next_entry::<String, Doc>()? {
            members.push((key, value));
        }
        Ok(Doc::Object(members))
    }
}
