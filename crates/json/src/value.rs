//! A [`Visitor`] that builds a `serde_json::Value`, for callers that want a
//! fully-materialized document (schema texts, reserialization input).

use super::{parse_document, parse_value, Error, Input, Options, Visitor};
use serde_json::Value;
use std::io;

/// Parse one complete document into a `serde_json::Value`.
pub fn to_value<R: io::Read>(input: &mut Input<R>) -> Result<Value, Error> {
    let mut builder = Builder::default();
    parse_document(&mut builder, input)?;
    builder.value.ok_or_else(|| Error::Syntax {
        offset: input.offset(),
        msg: "empty document".to_owned(),
    })
}

/// Convenience wrapper over [`to_value`] for in-memory text.
pub fn from_str(text: &str, options: Options) -> Result<Value, Error> {
    let mut input = Input::with_options(text.as_bytes(), options);
    to_value(&mut input)
}

#[derive(Default)]
struct Builder {
    stack: Vec<Frame>,
    value: Option<Value>,
}

enum Frame {
    Array(Vec<Value>),
    Object(serde_json::Map<String, Value>),
}

impl Builder {
    fn take(&mut self) -> Value {
        self.value.take().unwrap_or(Value::Null)
    }
}

impl<R: io::Read> Visitor<R> for Builder {
    fn null(&mut self) -> bool {
        self.value = Some(Value::Null);
        true
    }
    fn boolean(&mut self, value: bool) -> bool {
        self.value = Some(Value::Bool(value));
        true
    }
    fn integer(&mut self, value: i64) -> bool {
        self.value = Some(Value::from(value));
        true
    }
    fn number(&mut self, value: f64) -> bool {
        // JSON numbers are always finite.
        self.value = Some(
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
        true
    }
    fn string(&mut self, value: &str) -> bool {
        self.value = Some(Value::String(value.to_owned()));
        true
    }

    fn array_begin(&mut self) -> bool {
        self.stack.push(Frame::Array(Vec::new()));
        true
    }
    fn array_item(&mut self, input: &mut Input<R>, _index: usize) -> Result<(), Error> {
        parse_value(self, input)?;
        let item = self.take();
        if let Some(Frame::Array(items)) = self.stack.last_mut() {
            items.push(item);
        }
        Ok(())
    }
    fn array_end(&mut self, _len: usize) -> bool {
        if let Some(Frame::Array(items)) = self.stack.pop() {
            self.value = Some(Value::Array(items));
        }
        true
    }

    fn object_begin(&mut self) -> bool {
        self.stack.push(Frame::Object(serde_json::Map::new()));
        true
    }
    fn object_item(&mut self, input: &mut Input<R>, key: &str) -> Result<(), Error> {
        parse_value(self, input)?;
        let item = self.take();
        if let Some(Frame::Object(fields)) = self.stack.last_mut() {
            // A repeated key keeps its last value.
            fields.insert(key.to_owned(), item);
        }
        Ok(())
    }
    fn object_end(&mut self) -> bool {
        if let Some(Frame::Object(fields)) = self.stack.pop() {
            self.value = Some(Value::Object(fields));
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn matches_serde_json() {
        let doc = r#"{"a": [1, 2.5, null, "x"], "b": {"c": true}, "d": -9}"#;
        assert_eq!(
            from_str(doc, Options::default()).unwrap(),
            serde_json::from_str::<Value>(doc).unwrap(),
        );
    }

    #[test]
    fn lenient_text_parses() {
        let doc = r#"{root: "demo.Doc", objects: {"demo.Doc": {x: "int",},},}"#;
        assert_eq!(
            from_str(doc, Options::lenient()).unwrap(),
            json!({"root": "demo.Doc", "objects": {"demo.Doc": {"x": "int"}}}),
        );
    }

    #[test]
    fn repeated_keys_keep_the_last_value() {
        assert_eq!(
            from_str(r#"{"a": 1, "a": 2}"#, Options::default()).unwrap(),
            json!({"a": 2}),
        );
    }

    #[test]
    fn empty_document_is_an_error() {
        assert!(from_str("  ", Options::default()).is_err());
    }
}
