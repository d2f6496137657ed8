//! A serde `Deserializer` over verified record bytes.
//!
//! The record encoding does not carry field names; the schema's object
//! definitions supply them, so typed values deserialize with ordinary
//! `serde::Deserialize` implementations. Absent fields are absent map
//! entries, so `Option` fields and `#[serde(default)]` behave as usual.

use super::{
    Error, Reader, TAG_FALSE, TAG_FLOAT, TAG_INT, TAG_OBJECT, TAG_STRING, TAG_TRUE, TAG_VECTOR,
};
use crate::{ObjectDef, Schema, TypeKind};
use serde::de;

/// Deserialize a `T` from record bytes of the object at `object`.
/// Callers must [`super::verify`] the bytes first; this walk reports
/// structural surprises as errors but is not itself a verifier.
pub fn from_bytes<'de, T>(schema: &'de Schema, object: u32, bytes: &'de [u8]) -> Result<T, Error>
where
    T: de::Deserialize<'de>,
{
    let def = schema.object(object).ok_or(Error::BadObjectRef(object))?;
    let mut reader = Reader::new(bytes);
    let value = T::deserialize(ValueDe {
        reader: &mut reader,
        schema,
        shape: Shape::Object(def),
    })?;
    if reader.pos != bytes.len() {
        return Err(Error::TrailingBytes);
    }
    Ok(value)
}

/// What the schema expects of the value at the reader's position.
#[derive(Copy, Clone)]
enum Shape<'de> {
    Object(&'de ObjectDef),
    Vector {
        element: TypeKind,
        object: Option<&'de ObjectDef>,
    },
    Scalar,
}

struct ValueDe<'r, 'de> {
    reader: &'r mut Reader<'de>,
    schema: &'de Schema,
    shape: Shape<'de>,
}

impl<'r, 'de> de::Deserializer<'de> for ValueDe<'r, 'de> {
    type Error = Error;

    fn deserialize_any<V>(self, visitor: V) -> Result<V::Value, Error>
    where
        V: de::Visitor<'de>,
    {
        let offset = self.reader.pos;
        let tag = self.reader.u8()?;
        match tag {
            TAG_FALSE => visitor.visit_bool(false),
            TAG_TRUE => visitor.visit_bool(true),
            TAG_INT => visitor.visit_i64(self.reader.i64()?),
            TAG_FLOAT => visitor.visit_f64(self.reader.f64()?),
            TAG_STRING => visitor.visit_borrowed_str(self.reader.str()?),
            TAG_OBJECT => {
                let Shape::Object(def) = self.shape else {
                    return Err(Error::BadTag { tag, offset });
                };
                let count = self.reader.u16()?;
                visitor.visit_map(ObjectAccess {
                    reader: self.reader,
                    schema: self.schema,
                    def,
                    remain: count,
                    pending: None,
                })
            }
            TAG_VECTOR => {
                let Shape::Vector { element, object } = self.shape else {
                    return Err(Error::BadTag { tag, offset });
                };
                let count = self.reader.u32()?;
                visitor.visit_seq(VectorAccess {
                    reader: self.reader,
                    schema: self.schema,
                    element,
                    object,
                    remain: count,
                })
            }
            tag => Err(Error::BadTag { tag, offset }),
        }
    }

    fn deserialize_option<V>(self, visitor: V) -> Result<V::Value, Error>
    where
        V: de::Visitor<'de>,
    {
        // A present field is always `Some`; absent fields never reach here.
        visitor.visit_some(self)
    }

    serde::forward_to_deserialize_any! {
        bool i8 i16 i32 i64 i128 u8 u16 u32 u64 u128 f32 f64 char str string
        bytes byte_buf unit unit_struct newtype_struct seq tuple tuple_struct
        map struct enum identifier ignored_any
    }
}

struct ObjectAccess<'r, 'de> {
    reader: &'r mut Reader<'de>,
    schema: &'de Schema,
    def: &'de ObjectDef,
    remain: u16,
    pending: Option<&'de crate::FieldDef>,
}

impl<'r, 'de> de::MapAccess<'de> for ObjectAccess<'r, 'de> {
    type Error = Error;

    fn next_key_seed<K>(&mut self, seed: K) -> Result<Option<K::Value>, Error>
    where
        K: de::DeserializeSeed<'de>,
    {
        if self.remain == 0 {
            return Ok(None);
        }
        self.remain -= 1;

        let index = self.reader.u16()?;
        let field = self
            .def
            .fields
            .get(index as usize)
            .ok_or_else(|| Error::BadFieldIndex {
                index,
                object: self.def.name.clone(),
            })?;
        self.pending = Some(field);

        seed.deserialize(de::value::BorrowedStrDeserializer::new(&field.name))
            .map(Some)
    }

    fn next_value_seed<V>(&mut self, seed: V) -> Result<V::Value, Error>
    where
        V: de::DeserializeSeed<'de>,
    {
        let field = self
            .pending
            .take()
            .ok_or_else(|| de::Error::custom("value requested before key"))?;

        seed.deserialize(ValueDe {
            reader: &mut *self.reader,
            schema: self.schema,
            shape: field_shape(self.schema, field.kind, field.element, field.object)?,
        })
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remain as usize)
    }
}

struct VectorAccess<'r, 'de> {
    reader: &'r mut Reader<'de>,
    schema: &'de Schema,
    element: TypeKind,
    object: Option<&'de ObjectDef>,
    remain: u32,
}

impl<'r, 'de> de::SeqAccess<'de> for VectorAccess<'r, 'de> {
    type Error = Error;

    fn next_element_seed<T>(&mut self, seed: T) -> Result<Option<T::Value>, Error>
    where
        T: de::DeserializeSeed<'de>,
    {
        if self.remain == 0 {
            return Ok(None);
        }
        self.remain -= 1;

        let shape = match self.element {
            TypeKind::Object => Shape::Object(
                self.object
                    .ok_or_else(|| de::Error::custom("vector of objects lacks a definition"))?,
            ),
            _ => Shape::Scalar,
        };
        seed.deserialize(ValueDe {
            reader: &mut *self.reader,
            schema: self.schema,
            shape,
        })
        .map(Some)
    }

    fn size_hint(&self) -> Option<usize> {
        Some(self.remain as usize)
    }
}

fn field_shape<'de>(
    schema: &'de Schema,
    kind: TypeKind,
    element: Option<TypeKind>,
    object: Option<u32>,
) -> Result<Shape<'de>, Error> {
    let resolve = |index: Option<u32>| -> Result<&'de ObjectDef, Error> {
        let index = index.ok_or(Error::BadObjectRef(u32::MAX))?;
        schema.object(index).ok_or(Error::BadObjectRef(index))
    };

    Ok(match kind {
        TypeKind::Object => Shape::Object(resolve(object)?),
        TypeKind::Vector => {
            let element = element.unwrap_or(TypeKind::Object);
            let object = match element {
                TypeKind::Object => Some(resolve(object)?),
                _ => None,
            };
            Shape::Vector { element, object }
        }
        _ => Shape::Scalar,
    })
}

#[cfg(test)]
mod tests {
    use crate::build::build_schema;
    use crate::record;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[derive(serde::Deserialize, Debug, PartialEq, Default)]
    struct Item {
        #[serde(default)]
        x: i64,
        ratio: Option<f64>,
        #[serde(default)]
        tags: Vec<String>,
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Entry {
        id: String,
        val: Item,
    }

    #[derive(serde::Deserialize, Debug, PartialEq, Default)]
    struct Doc {
        #[serde(default)]
        title: String,
        #[serde(default)]
        items: Vec<Entry>,
    }

    fn schema() -> crate::Schema {
        build_schema(&json!({
            "root": "demo.Doc",
            "objects": {
                "demo.Doc":   { "items": "[demo.Entry]", "title": "string" },
                "demo.Entry": { "id": "string", "val": "demo.Item" },
                "demo.Item":  { "x": "int", "ratio": "float", "on": "bool", "tags": "[string]" }
            }
        }))
        .unwrap()
    }

    #[test]
    fn typed_unpack() {
        let schema = schema();
        let (index, _) = schema.object_named("demo.Doc").unwrap();
        let mut bytes = Vec::new();
        record::encode(
            &schema,
            index,
            &json!({
                "title": "t",
                "items": [
                    {"id": "a", "val": {"x": 1, "tags": ["p"]}},
                    {"id": "b", "val": {"ratio": 0.5}}
                ]
            }),
            &mut bytes,
        )
        .unwrap();
        record::verify(&schema, index, &bytes).unwrap();

        let doc: Doc = record::from_bytes(&schema, index, &bytes).unwrap();
        assert_eq!(
            doc,
            Doc {
                title: "t".to_owned(),
                items: vec![
                    Entry {
                        id: "a".to_owned(),
                        val: Item {
                            x: 1,
                            ratio: None,
                            tags: vec!["p".to_owned()]
                        },
                    },
                    Entry {
                        id: "b".to_owned(),
                        val: Item {
                            x: 0,
                            ratio: Some(0.5),
                            tags: vec![]
                        },
                    },
                ],
            }
        );
    }

    #[test]
    fn absent_fields_take_defaults() {
        let schema = schema();
        let (index, _) = schema.object_named("demo.Item").unwrap();
        let mut bytes = Vec::new();
        record::encode(&schema, index, &json!({}), &mut bytes).unwrap();

        let item: Item = record::from_bytes(&schema, index, &bytes).unwrap();
        assert_eq!(item, Item::default());
    }
}
