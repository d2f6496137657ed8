//! Build a [`Schema`] from its text form: a (leniently parsed) JSON
//! document naming a `root` type and an `objects` table,
//!
//! ```json
//! {
//!   "root": "demo.Doc",
//!   "objects": {
//!     "demo.Doc":   { "items": "[demo.Entry]" },
//!     "demo.Entry": { "id": "string", "val": "demo.Item" },
//!     "demo.Item":  { "x": "int" }
//!   }
//! }
//! ```
//!
//! Field types are `bool`, `int`, `float`, `string`, a fully-qualified
//! object name, or `[T]` for a vector of any of those.

use super::{FieldDef, ObjectDef, Schema, TypeKind};
use serde_json::Value;

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("schema document must be a JSON object")]
    NotAnObject,
    #[error("schema `objects` table is missing or not an object")]
    MissingObjects,
    #[error("schema `root` is missing or not a string")]
    MissingRoot,
    #[error("root type '{0}' is not defined")]
    UnknownRoot(String),
    #[error("definition of object '{0}' must be an object of fields")]
    BadObject(String),
    #[error("field '{object}.{field}' must be a type string")]
    BadField { object: String, field: String },
    #[error("field '{object}.{field}' references unknown type '{type_name}'")]
    UnknownType {
        object: String,
        field: String,
        type_name: String,
    },
    #[error("field '{object}.{field}' nests a vector inside a vector")]
    NestedVector { object: String, field: String },
}

pub fn build_schema(doc: &Value) -> Result<Schema, Error> {
    let doc = doc.as_object().ok_or(Error::NotAnObject)?;
    let table = doc
        .get("objects")
        .and_then(Value::as_object)
        .ok_or(Error::MissingObjects)?;

    // Object indices are positions in sorted fully-qualified name order.
    let mut names: Vec<&str> = table.keys().map(String::as_str).collect();
    names.sort_unstable();

    let index_of = |name: &str| -> Option<u32> {
        names.binary_search(&name).ok().map(|index| index as u32)
    };

    let mut objects = Vec::with_capacity(names.len());
    for name in &names {
        let fields = table
            .get(*name)
            .and_then(Value::as_object)
            .ok_or_else(|| Error::BadObject(name.to_string()))?;

        let mut built: Vec<FieldDef> = Vec::with_capacity(fields.len());
        for (field, spec) in fields {
            let spec = spec.as_str().ok_or_else(|| Error::BadField {
                object: name.to_string(),
                field: field.clone(),
            })?;
            built.push(build_field(name, field, spec, &index_of)?);
        }
        built.sort_by(|lhs, rhs| lhs.name.cmp(&rhs.name));

        objects.push(ObjectDef {
            name: name.to_string(),
            fields: built,
        });
    }

    let root = doc
        .get("root")
        .and_then(Value::as_str)
        .ok_or(Error::MissingRoot)?;
    let root = index_of(root).ok_or_else(|| Error::UnknownRoot(root.to_owned()))?;

    Ok(Schema { objects, root })
}

fn build_field(
    object: &str,
    field: &str,
    spec: &str,
    index_of: &impl Fn(&str) -> Option<u32>,
) -> Result<FieldDef, Error> {
    let spec = spec.trim();
    if let Some(rest) = spec.strip_prefix('[') {
        let element = rest
            .strip_suffix(']')
            .ok_or_else(|| Error::BadField {
                object: object.to_owned(),
                field: field.to_owned(),
            })?
            .trim();
        if element.starts_with('[') {
            return Err(Error::NestedVector {
                object: object.to_owned(),
                field: field.to_owned(),
            });
        }
        let (kind, obj) = resolve(object, field, element, index_of)?;
        Ok(FieldDef {
            name: field.to_owned(),
            kind: TypeKind::Vector,
            element: Some(kind),
            object: obj,
        })
    } else {
        let (kind, obj) = resolve(object, field, spec, index_of)?;
        Ok(FieldDef {
            name: field.to_owned(),
            kind,
            element: None,
            object: obj,
        })
    }
}

fn resolve(
    object: &str,
    field: &str,
    spec: &str,
    index_of: &impl Fn(&str) -> Option<u32>,
) -> Result<(TypeKind, Option<u32>), Error> {
    match spec {
        "bool" => Ok((TypeKind::Bool, None)),
        "int" => Ok((TypeKind::Int, None)),
        "float" => Ok((TypeKind::Float, None)),
        "string" => Ok((TypeKind::String, None)),
        name => match index_of(name) {
            Some(index) => Ok((TypeKind::Object, Some(index))),
            None => Err(Error::UnknownType {
                object: object.to_owned(),
                field: field.to_owned(),
                type_name: name.to_owned(),
            }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn demo() -> Value {
        json!({
            "root": "demo.Doc",
            "objects": {
                "demo.Doc":   { "items": "[demo.Entry]", "title": "string" },
                "demo.Entry": { "id": "string", "val": "demo.Item" },
                "demo.Item":  { "x": "int", "ratio": "float", "on": "bool" }
            }
        })
    }

    #[test]
    fn builds_sorted_tables() {
        let schema = build_schema(&demo()).unwrap();

        let names: Vec<_> = schema.objects.iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["demo.Doc", "demo.Entry", "demo.Item"]);
        assert_eq!(schema.root_object().name, "demo.Doc");

        let (index, items) = schema.objects[0].field("items").unwrap();
        assert_eq!(index, 0);
        assert_eq!(items.kind, TypeKind::Vector);
        assert_eq!(items.element, Some(TypeKind::Object));
        assert_eq!(items.object, Some(1)); // demo.Entry

        let (_, val) = schema.objects[1].field("val").unwrap();
        assert_eq!(val.kind, TypeKind::Object);
        assert_eq!(val.object, Some(2)); // demo.Item

        // Field indices follow sorted name order.
        let item = schema.object_named("demo.Item").unwrap().1;
        let order: Vec<_> = item.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, vec!["on", "ratio", "x"]);
    }

    #[test]
    fn rejects_malformed_documents() {
        assert!(matches!(build_schema(&json!([])), Err(Error::NotAnObject)));
        assert!(matches!(
            build_schema(&json!({"root": "demo.Doc"})),
            Err(Error::MissingObjects)
        ));
        assert!(matches!(
            build_schema(&json!({"objects": {}})),
            Err(Error::MissingRoot)
        ));
        assert!(matches!(
            build_schema(&json!({"root": "nope", "objects": {"demo.Doc": {}}})),
            Err(Error::UnknownRoot(_))
        ));
        assert!(matches!(
            build_schema(&json!({"root": "demo.Doc", "objects": {"demo.Doc": {"f": "missing.Type"}}})),
            Err(Error::UnknownType { .. })
        ));
        assert!(matches!(
            build_schema(&json!({"root": "demo.Doc", "objects": {"demo.Doc": {"f": "[[int]]"}}})),
            Err(Error::NestedVector { .. })
        ));
        assert!(matches!(
            build_schema(&json!({"root": "demo.Doc", "objects": {"demo.Doc": {"f": 7}}})),
            Err(Error::BadField { .. })
        ));
    }

    #[test]
    fn archive_round_trips() {
        let schema = build_schema(&demo()).unwrap();
        let blob = schema.to_archive();

        let archived =
            rkyv::access::<crate::ArchivedSchema, rkyv::rancor::Error>(&blob).unwrap();
        assert_eq!(archived.root.to_native(), schema.root);
        assert_eq!(archived.objects.len(), schema.objects.len());

        let entry = &archived.objects[1];
        assert_eq!(entry.name(), "demo.Entry");
        let (_, val) = entry.field("val").unwrap();
        assert!(val.is_object());
        assert_eq!(val.object_index(), Some(2));

        let (_, items) = archived.objects[0].field("items").unwrap();
        assert!(items.is_vector_of_objects());
    }
}
