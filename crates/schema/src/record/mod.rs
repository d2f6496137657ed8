//! The record binary encoding.
//!
//! A record is a single tag-prefixed value tree, little-endian throughout:
//!
//! | tag    | payload                                                     |
//! |--------|-------------------------------------------------------------|
//! | FALSE  | (none)                                                      |
//! | TRUE   | (none)                                                      |
//! | INT    | i64                                                         |
//! | FLOAT  | f64                                                         |
//! | STRING | u32 length + UTF-8 bytes                                    |
//! | OBJECT | u16 present-field count, then (u16 field index, value) each |
//! | VECTOR | u32 count + values                                          |
//!
//! Absent fields are simply not written; field indices are strictly
//! increasing. [`verify`] walks bytes against an [`ObjectDef`] before any
//! unpack touches them.

use super::{FieldDef, ObjectDef, Schema, TypeKind};
use serde_json::Value;

mod de;
pub use de::from_bytes;

pub(crate) const TAG_FALSE: u8 = 0x01;
pub(crate) const TAG_TRUE: u8 = 0x02;
pub(crate) const TAG_INT: u8 = 0x03;
pub(crate) const TAG_FLOAT: u8 = 0x04;
pub(crate) const TAG_STRING: u8 = 0x05;
pub(crate) const TAG_OBJECT: u8 = 0x06;
pub(crate) const TAG_VECTOR: u8 = 0x07;

const MAX_DEPTH: usize = 64;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    // Encode failures: the JSON value does not fit the schema.
    #[error("value for type '{object}' must be a JSON object")]
    NotAnObject { object: String },
    #[error("field '{object}.{field}' expects {expected}")]
    FieldType {
        object: String,
        field: String,
        expected: &'static str,
    },
    #[error("schema object index {0} is out of range")]
    BadObjectRef(u32),

    // Verify failures: the bytes are not a structurally valid record.
    #[error("record is truncated")]
    Truncated,
    #[error("invalid value tag {tag:#04x} at offset {offset}")]
    BadTag { tag: u8, offset: usize },
    #[error("field index {index} is out of range for '{object}'")]
    BadFieldIndex { index: u16, object: String },
    #[error("field indices of '{object}' are not strictly increasing")]
    UnorderedFields { object: String },
    #[error("invalid utf-8 in string at offset {offset}")]
    BadUtf8 { offset: usize },
    #[error("record nesting exceeds the supported depth")]
    TooDeep,
    #[error("trailing bytes after record value")]
    TrailingBytes,

    // Unpack failures surfaced through serde.
    #[error("record does not deserialize: {0}")]
    Deserialize(String),
}

impl serde::de::Error for Error {
    fn custom<T: std::fmt::Display>(msg: T) -> Self {
        Error::Deserialize(msg.to_string())
    }
}

/// Encode `value` as a record of the object at `object` within `schema`,
/// appending to `out`. Fields of `value` that the schema does not know, and
/// fields that are JSON `null`, are silently skipped.
pub fn encode(
    schema: &Schema,
    object: u32,
    value: &Value,
    out: &mut Vec<u8>,
) -> Result<(), Error> {
    let def = schema.object(object).ok_or(Error::BadObjectRef(object))?;
    encode_object(schema, def, value, out, 0)
}

fn encode_object(
    schema: &Schema,
    def: &ObjectDef,
    value: &Value,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), Error> {
    if depth == MAX_DEPTH {
        return Err(Error::TooDeep);
    }
    let fields = value.as_object().ok_or_else(|| Error::NotAnObject {
        object: def.name.clone(),
    })?;

    let present = def
        .fields
        .iter()
        .filter(|field| matches!(fields.get(&field.name), Some(value) if !value.is_null()))
        .count();

    out.push(TAG_OBJECT);
    out.extend_from_slice(&(present as u16).to_le_bytes());

    for (index, field) in def.fields.iter().enumerate() {
        let Some(value) = fields.get(&field.name) else {
            continue;
        };
        if value.is_null() {
            continue;
        }
        out.extend_from_slice(&(index as u16).to_le_bytes());
        encode_field(schema, def, field, field.kind, value, out, depth)?;
    }
    Ok(())
}

fn encode_field(
    schema: &Schema,
    def: &ObjectDef,
    field: &FieldDef,
    kind: TypeKind,
    value: &Value,
    out: &mut Vec<u8>,
    depth: usize,
) -> Result<(), Error> {
    let mismatch = |expected: &'static str| Error::FieldType {
        object: def.name.clone(),
        field: field.name.clone(),
        expected,
    };

    match kind {
        TypeKind::Bool => match value {
            Value::Bool(true) => out.push(TAG_TRUE),
            Value::Bool(false) => out.push(TAG_FALSE),
            _ => return Err(mismatch("a bool")),
        },
        TypeKind::Int => match value.as_i64() {
            Some(value) => {
                out.push(TAG_INT);
                out.extend_from_slice(&value.to_le_bytes());
            }
            None => return Err(mismatch("an integer")),
        },
        TypeKind::Float => match value.as_f64() {
            Some(value) => {
                out.push(TAG_FLOAT);
                out.extend_from_slice(&value.to_le_bytes());
            }
            None => return Err(mismatch("a number")),
        },
        TypeKind::String => match value {
            Value::String(value) => {
                out.push(TAG_STRING);
                out.extend_from_slice(&(value.len() as u32).to_le_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            _ => return Err(mismatch("a string")),
        },
        TypeKind::Object => {
            let index = field.object.ok_or(Error::BadObjectRef(u32::MAX))?;
            let child = schema.object(index).ok_or(Error::BadObjectRef(index))?;
            encode_object(schema, child, value, out, depth + 1)?;
        }
        TypeKind::Vector => {
            let Value::Array(items) = value else {
                return Err(mismatch("an array"));
            };
            if depth + 1 == MAX_DEPTH {
                return Err(Error::TooDeep);
            }
            let element = field.element.unwrap_or(TypeKind::Object);
            out.push(TAG_VECTOR);
            out.extend_from_slice(&(items.len() as u32).to_le_bytes());
            for item in items {
                encode_field(schema, def, field, element, item, out, depth + 1)?;
            }
        }
    }
    Ok(())
}

/// Byte cursor shared by [`verify`] and the serde deserializer.
pub(crate) struct Reader<'b> {
    pub(crate) bytes: &'b [u8],
    pub(crate) pos: usize,
}

impl<'b> Reader<'b> {
    pub(crate) fn new(bytes: &'b [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    pub(crate) fn u8(&mut self) -> Result<u8, Error> {
        let byte = *self.bytes.get(self.pos).ok_or(Error::Truncated)?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'b [u8], Error> {
        let end = self.pos.checked_add(len).ok_or(Error::Truncated)?;
        let bytes = self.bytes.get(self.pos..end).ok_or(Error::Truncated)?;
        self.pos = end;
        Ok(bytes)
    }

    pub(crate) fn u16(&mut self) -> Result<u16, Error> {
        Ok(u16::from_le_bytes(self.take(2)?.try_into().unwrap()))
    }

    pub(crate) fn u32(&mut self) -> Result<u32, Error> {
        Ok(u32::from_le_bytes(self.take(4)?.try_into().unwrap()))
    }

    pub(crate) fn i64(&mut self) -> Result<i64, Error> {
        Ok(i64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(crate) fn f64(&mut self) -> Result<f64, Error> {
        Ok(f64::from_le_bytes(self.take(8)?.try_into().unwrap()))
    }

    pub(crate) fn str(&mut self) -> Result<&'b str, Error> {
        let len = self.u32()? as usize;
        let offset = self.pos;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes).map_err(|_| Error::BadUtf8 { offset })
    }
}

/// Verify that `bytes` are a structurally valid record of the object at
/// `object`: tags match field types, indices are in range and strictly
/// increasing, strings are UTF-8, and nothing trails the root value.
pub fn verify(schema: &Schema, object: u32, bytes: &[u8]) -> Result<(), Error> {
    let def = schema.object(object).ok_or(Error::BadObjectRef(object))?;
    let mut reader = Reader::new(bytes);
    verify_object(schema, def, &mut reader, 0)?;
    if reader.pos != bytes.len() {
        return Err(Error::TrailingBytes);
    }
    Ok(())
}

fn verify_object(
    schema: &Schema,
    def: &ObjectDef,
    reader: &mut Reader<'_>,
    depth: usize,
) -> Result<(), Error> {
    if depth == MAX_DEPTH {
        return Err(Error::TooDeep);
    }
    expect_tag(reader, TAG_OBJECT)?;

    let count = reader.u16()?;
    let mut previous: Option<u16> = None;
    for _ in 0..count {
        let index = reader.u16()?;
        if matches!(previous, Some(previous) if previous >= index) {
            return Err(Error::UnorderedFields {
                object: def.name.clone(),
            });
        }
        previous = Some(index);

        let field = def
            .fields
            .get(index as usize)
            .ok_or_else(|| Error::BadFieldIndex {
                index,
                object: def.name.clone(),
            })?;
        verify_value(schema, field, field.kind, reader, depth)?;
    }
    Ok(())
}

fn verify_value(
    schema: &Schema,
    field: &FieldDef,
    kind: TypeKind,
    reader: &mut Reader<'_>,
    depth: usize,
) -> Result<(), Error> {
    match kind {
        TypeKind::Bool => {
            let offset = reader.pos;
            let tag = reader.u8()?;
            if tag != TAG_FALSE && tag != TAG_TRUE {
                return Err(Error::BadTag { tag, offset });
            }
        }
        TypeKind::Int => {
            expect_tag(reader, TAG_INT)?;
            reader.i64()?;
        }
        TypeKind::Float => {
            expect_tag(reader, TAG_FLOAT)?;
            reader.f64()?;
        }
        TypeKind::String => {
            expect_tag(reader, TAG_STRING)?;
            reader.str()?;
        }
        TypeKind::Object => {
            let index = field.object.ok_or(Error::BadObjectRef(u32::MAX))?;
            let child = schema.object(index).ok_or(Error::BadObjectRef(index))?;
            verify_object(schema, child, reader, depth + 1)?;
        }
        TypeKind::Vector => {
            if depth + 1 == MAX_DEPTH {
                return Err(Error::TooDeep);
            }
            expect_tag(reader, TAG_VECTOR)?;
            let count = reader.u32()?;
            let element = field.element.unwrap_or(TypeKind::Object);
            for _ in 0..count {
                verify_value(schema, field, element, reader, depth + 1)?;
            }
        }
    }
    Ok(())
}

fn expect_tag(reader: &mut Reader<'_>, want: u8) -> Result<(), Error> {
    let offset = reader.pos;
    let tag = reader.u8()?;
    if tag != want {
        return Err(Error::BadTag { tag, offset });
    }
    Ok(())
}

/// Render verified record bytes back to canonical JSON text.
/// The inverse of [`encode`], for diagnostics and tests.
pub fn to_json(schema: &Schema, object: u32, bytes: &[u8]) -> Result<String, Error> {
    verify(schema, object, bytes)?;
    let value: Value = from_bytes(schema, object, bytes)?;
    serde_json::to_string(&value).map_err(|err| Error::Deserialize(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_schema;
    use serde_json::json;

    fn demo() -> Schema {
        build_schema(&json!({
            "root": "demo.Doc",
            "objects": {
                "demo.Doc":   { "items": "[demo.Entry]", "title": "string", "count": "int" },
                "demo.Entry": { "id": "string", "val": "demo.Item" },
                "demo.Item":  { "x": "int", "ratio": "float", "on": "bool", "tags": "[string]" }
            }
        }))
        .unwrap()
    }

    fn encode_ok(schema: &Schema, name: &str, value: serde_json::Value) -> Vec<u8> {
        let (index, _) = schema.object_named(name).unwrap();
        let mut out = Vec::new();
        encode(schema, index, &value, &mut out).unwrap();
        verify(schema, index, &out).unwrap();
        out
    }

    #[test]
    fn encode_verify_print() {
        let schema = demo();
        let bytes = encode_ok(
            &schema,
            "demo.Doc",
            json!({
                "title": "t",
                "count": 3,
                "items": [
                    {"id": "a", "val": {"x": 1, "on": true, "tags": ["p", "q"]}},
                    {"id": "b", "val": {"ratio": 0.5}}
                ],
                "ignored": {"unknown": "field"}
            }),
        );

        let (index, _) = schema.object_named("demo.Doc").unwrap();
        let text = to_json(&schema, index, &bytes).unwrap();
        // Canonical output orders fields by wire index (sorted names).
        assert_eq!(
            text,
            r#"{"count":3,"items":[{"id":"a","val":{"on":true,"tags":["p","q"],"x":1}},{"id":"b","val":{"ratio":0.5}}],"title":"t"}"#
        );
    }

    #[test]
    fn null_and_unknown_fields_are_skipped() {
        let schema = demo();
        let bytes = encode_ok(&schema, "demo.Item", json!({"x": null, "other": 9}));
        // TAG_OBJECT plus a zero field count.
        assert_eq!(bytes, vec![TAG_OBJECT, 0, 0]);
    }

    #[test]
    fn encode_rejects_type_mismatches() {
        let schema = demo();
        let (index, _) = schema.object_named("demo.Item").unwrap();
        let mut out = Vec::new();

        for bad in [
            json!({"x": "not an int"}),
            json!({"x": 1.5}),
            json!({"on": 1}),
            json!({"tags": "not an array"}),
            json!({"tags": [1]}),
            json!(["not", "an", "object"]),
        ] {
            out.clear();
            assert!(
                encode(&schema, index, &bad, &mut out).is_err(),
                "expected encode failure for {bad}"
            );
        }

        // An integral JSON number is a valid float.
        out.clear();
        encode(&schema, index, &json!({"ratio": 2}), &mut out).unwrap();
    }

    #[test]
    fn verify_rejects_corruption() {
        let schema = demo();
        let (index, _) = schema.object_named("demo.Item").unwrap();
        let good = encode_ok(&schema, "demo.Item", json!({"on": true, "x": 4}));

        // Truncation anywhere fails.
        for len in 0..good.len() {
            assert!(verify(&schema, index, &good[..len]).is_err());
        }
        // Trailing garbage fails.
        let mut long = good.clone();
        long.push(0);
        assert!(matches!(
            verify(&schema, index, &long),
            Err(Error::TrailingBytes)
        ));
        // A bogus root tag fails.
        let mut bad = good.clone();
        bad[0] = 0x7f;
        assert!(matches!(verify(&schema, index, &bad), Err(Error::BadTag { .. })));
        // An out-of-range field index fails.
        let mut bad = good.clone();
        bad[3] = 0x33;
        assert!(matches!(
            verify(&schema, index, &bad),
            Err(Error::BadFieldIndex { .. })
        ));
    }

    #[test]
    fn verify_rejects_unordered_fields() {
        let schema = demo();
        let (index, _) = schema.object_named("demo.Item").unwrap();

        // Hand-assemble a record with fields [x, on]: indices 3 then 0.
        let mut bytes = vec![TAG_OBJECT, 2, 0];
        bytes.extend_from_slice(&3u16.to_le_bytes());
        bytes.push(TAG_INT);
        bytes.extend_from_slice(&7i64.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.push(TAG_TRUE);

        assert!(matches!(
            verify(&schema, index, &bytes),
            Err(Error::UnorderedFields { .. })
        ));
    }
}
