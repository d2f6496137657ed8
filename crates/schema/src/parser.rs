use super::{record, Registry};

/// A typed record: a deserializable value bound to the fully-qualified name
/// of its schema object.
///
/// ```
/// #[derive(serde::Deserialize)]
/// struct Item {
///     #[serde(default)]
///     x: i64,
/// }
/// impl schema::Record for Item {
///     const FULL_NAME: &'static str = "demo.Item";
/// }
/// ```
pub trait Record: serde::de::DeserializeOwned {
    const FULL_NAME: &'static str;
}

/// The generic record parser: JSON text (or record bytes) in, typed record
/// out, `None` on any failure.
///
/// Holds its own reserialization scratch so that a shared [`Registry`] never
/// needs interior mutability; give each consumer its own `RecordParser`.
pub struct RecordParser<'r> {
    registry: &'r Registry,
    scratch: Vec<u8>,
}

impl<'r> RecordParser<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            scratch: Vec::new(),
        }
    }

    pub fn registry(&self) -> &'r Registry {
        self.registry
    }

    /// Reserialize `json_text` under `T::FULL_NAME`, verify, and unpack.
    pub fn parse<T: Record>(&mut self, json_text: &str) -> Option<T> {
        if let Err(err) =
            self.registry
                .reserialize_to_binary(json_text, T::FULL_NAME, &mut self.scratch)
        {
            tracing::error!(%err, root = T::FULL_NAME, "could not reserialize JSON into a record");
            return None;
        }
        self.unpack::<T>(T::FULL_NAME, &self.scratch)
    }

    /// Unpack pre-encoded record bytes, skipping reserialization.
    /// The bytes are verified before any deserialization.
    pub fn parse_from_bytes<T: Record>(&mut self, bytes: &[u8]) -> Option<T> {
        let schema = self.registry.text_schema();
        let Some((root, _)) = schema.object_named(T::FULL_NAME) else {
            tracing::error!(root = T::FULL_NAME, "record type is not in the schema");
            return None;
        };
        if let Err(err) = record::verify(schema, root, bytes) {
            tracing::error!(%err, root = T::FULL_NAME, "record bytes failed verification");
            return None;
        }
        self.unpack::<T>(T::FULL_NAME, bytes)
    }

    fn unpack<T: Record>(&self, full_name: &str, bytes: &[u8]) -> Option<T> {
        let schema = self.registry.text_schema();
        let (root, _) = schema.object_named(full_name)?;
        match record::from_bytes(schema, root, bytes) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::error!(%err, root = full_name, "record bytes do not unpack");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build::build_schema;

    #[derive(serde::Deserialize, Debug, PartialEq, Default)]
    struct Item {
        #[serde(default)]
        x: i64,
        #[serde(default)]
        label: String,
    }
    impl Record for Item {
        const FULL_NAME: &'static str = "demo.Item";
    }

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Unknown {}
    impl Record for Unknown {
        const FULL_NAME: &'static str = "demo.Unknown";
    }

    fn registry() -> Registry {
        let text = r#"{
            "root": "demo.Item",
            "objects": { "demo.Item": { "x": "int", "label": "string" } }
        }"#;
        let doc = json::value::from_str(text, json::Options::lenient()).unwrap();
        let binary = build_schema(&doc).unwrap().to_blob();
        Registry::new(format!("{text}\0").as_bytes(), &binary).unwrap()
    }

    #[test]
    fn parse_is_idempotent() {
        let registry = registry();
        let mut parser = RecordParser::new(&registry);

        let want = Item {
            x: 7,
            label: "seven".to_owned(),
        };
        for _ in 0..3 {
            let got: Item = parser.parse(r#"{"x": 7, "label": "seven"}"#).unwrap();
            assert_eq!(got, want);
        }
    }

    #[test]
    fn parse_failures_are_none() {
        let registry = registry();
        let mut parser = RecordParser::new(&registry);

        // Unknown root type.
        assert_eq!(parser.parse::<Unknown>("{}"), None);
        // Value does not fit the root type.
        assert_eq!(parser.parse::<Item>(r#"{"x": "oops"}"#), None);
        // Malformed JSON.
        assert_eq!(parser.parse::<Item>(r#"{"x":"#), None);
        // Unknown fields are ignored, lenient JSON accepted.
        assert_eq!(
            parser.parse::<Item>(r#"{x: 1, other: true,}"#),
            Some(Item {
                x: 1,
                label: String::new()
            })
        );
    }

    #[test]
    fn parse_from_bytes_verifies_first() {
        let registry = registry();
        let mut parser = RecordParser::new(&registry);

        let mut bytes = Vec::new();
        registry
            .reserialize_to_binary(r#"{"x": 3}"#, "demo.Item", &mut bytes)
            .unwrap();
        assert_eq!(
            parser.parse_from_bytes::<Item>(&bytes),
            Some(Item {
                x: 3,
                label: String::new()
            })
        );

        bytes[0] = 0x7f;
        assert_eq!(parser.parse_from_bytes::<Item>(&bytes), None);
    }
}
