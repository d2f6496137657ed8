use super::{Error, Pattern};
use schema::{Record, RecordParser, Registry};
use std::io;
use std::marker::PhantomData;
use std::mem;

/// Streaming transcoder: a [`json::Visitor`] that tracks the current path,
/// rewrites matched subtrees into schema-shaped JSON, and delivers each
/// completed subtree to a message or error sink as a typed record.
///
/// One transcoder serves one response at a time; [`Transcoder::parse_stream`]
/// clears all per-response state. The registry is only read.
pub struct Transcoder<'r, M, E, FM, FE> {
    parser: RecordParser<'r>,
    message_pattern: Pattern,
    message_sink: FM,
    error: Option<(Pattern, FE)>,

    // Sticky failure: tokenizing continues, the final result is an error.
    is_parse_error: bool,
    // The active subtree was selected by the error pattern.
    is_error_path: bool,

    object_depth: usize,
    array_depth: usize,
    path: Vec<String>,
    current_key: String,

    // Rewritten JSON of the in-flight subtree.
    out: String,
    emit: bool,
    needs_close_array: bool,
    needs_close_object: bool,

    // Reflection cursor: index into the registry's object table.
    cursor: Option<u32>,

    _records: PhantomData<fn(M, E)>,
}

impl<'r, M, E, FM, FE> Transcoder<'r, M, E, FM, FE>
where
    M: Record,
    E: Record,
    FM: FnMut(M) -> bool,
    FE: FnMut(E) -> bool,
{
    pub fn new(
        registry: &'r Registry,
        message_pattern: Pattern,
        message_sink: FM,
        error: Option<(Pattern, FE)>,
    ) -> Self {
        Self {
            parser: RecordParser::new(registry),
            message_pattern,
            message_sink,
            error,
            is_parse_error: false,
            is_error_path: false,
            object_depth: 0,
            array_depth: 0,
            path: Vec::new(),
            current_key: String::new(),
            out: String::new(),
            emit: false,
            needs_close_array: false,
            needs_close_object: false,
            cursor: None,
            _records: PhantomData,
        }
    }

    /// Reset all per-response state, with the reflection cursor back at the
    /// schema root.
    pub fn clear(&mut self) {
        self.is_parse_error = false;
        self.is_error_path = false;
        self.object_depth = 0;
        self.array_depth = 0;
        self.path.clear();
        self.current_key.clear();
        self.out.clear();
        self.emit = false;
        self.needs_close_array = false;
        self.needs_close_object = false;
        self.cursor = Some(self.parser.registry().root_index());
    }

    /// Consume one response body from `source`, delivering matched subtrees
    /// to the sinks as they complete.
    ///
    /// A sink returning `false` makes the call fail, but tokenizing still
    /// runs to the end of the stream so that the caller's connection framing
    /// survives the refusal.
    pub fn parse_stream<R: io::Read>(&mut self, source: R) -> Result<(), Error> {
        self.clear();
        let mut input = json::Input::new(source);
        json::parse_document(self, &mut input)?;
        if self.is_parse_error {
            return Err(Error::Transcode);
        }
        Ok(())
    }

    /// The pattern that selected the current subtree.
    fn active_pattern(&self) -> &Pattern {
        match (&self.error, self.is_error_path) {
            (Some((pattern, _)), true) => pattern,
            _ => &self.message_pattern,
        }
    }

    /// Consult the reflection cursor for `key`, advancing it into nested
    /// object types. Returns whether the current container is a keyed map
    /// standing in for a vector of `{id, val}` records, in which case the
    /// cursor advances to the `val` object type.
    fn enter_keyed_vector(&mut self, key: &str) -> bool {
        let registry = self.parser.registry();
        let Some(def) = self.cursor.and_then(|index| registry.object_by_index(index)) else {
            return false;
        };

        if let (Some(_), Some((_, val))) = (def.field("id"), def.field("val")) {
            if val.is_object() {
                if let Some(index) = val.object_index() {
                    if registry.object_by_index(index).is_some() {
                        self.cursor = Some(index);
                        return true;
                    }
                }
            }
        } else if let Some((_, field)) = def.field(key) {
            if field.is_object() || field.is_vector_of_objects() {
                // For a vector the cursor lands on the element type; the
                // rewrite itself happens as each child is entered.
                self.cursor = field.object_index();
            }
        }
        false
    }

    /// Hand the buffered subtree to the matching sink as a typed record.
    /// The buffer is always reset, success or not.
    fn process_item(&mut self) -> bool {
        tracing::trace!(
            buffered = %self.out,
            key = %self.current_key,
            error_path = self.is_error_path,
            object_depth = self.object_depth,
            array_depth = self.array_depth,
            "subtree complete"
        );

        let ok = if self.is_error_path {
            match self.error.as_mut() {
                Some((_, errback)) => match self.parser.parse::<E>(&self.out) {
                    Some(record) => errback(record),
                    None => false,
                },
                None => false,
            }
        } else {
            match self.parser.parse::<M>(&self.out) {
                Some(record) => (self.message_sink)(record),
                None => false,
            }
        };
        self.out.clear();
        ok
    }
}

impl<'r, R, M, E, FM, FE> json::Visitor<R> for Transcoder<'r, M, E, FM, FE>
where
    R: io::Read,
    M: Record,
    E: Record,
    FM: FnMut(M) -> bool,
    FE: FnMut(E) -> bool,
{
    fn null(&mut self) -> bool {
        if self.emit {
            self.out.push_str("null");
        }
        true
    }

    fn boolean(&mut self, value: bool) -> bool {
        if self.emit {
            self.out.push_str(if value { "true" } else { "false" });
        }
        true
    }

    fn integer(&mut self, value: i64) -> bool {
        if self.emit {
            self.out.push_str(&value.to_string());
        }
        true
    }

    fn number(&mut self, value: f64) -> bool {
        // Emitted faithfully; whether a decimal is acceptable is for the
        // schema to decide when the subtree is reserialized.
        if self.emit {
            self.out.push_str(&value.to_string());
        }
        true
    }

    fn string(&mut self, value: &str) -> bool {
        if self.emit {
            json::write_json_string(&mut self.out, value);
        }
        true
    }

    fn array_begin(&mut self) -> bool {
        self.array_depth += 1;
        if self.emit {
            self.out.push('[');
        }
        true
    }

    fn array_item(&mut self, input: &mut json::Input<R>, index: usize) -> Result<(), json::Error> {
        if self.emit && index > 0 {
            self.out.push(',');
        }
        json::parse_value(self, input)
    }

    fn array_end(&mut self, _len: usize) -> bool {
        self.array_depth -= 1;
        if self.emit {
            self.out.push(']');
        }
        true
    }

    fn object_begin(&mut self) -> bool {
        self.object_depth += 1;
        // No `{` yet: the first key decides between plain emission and the
        // keyed-vector rewrite.
        true
    }

    fn object_item(&mut self, input: &mut json::Input<R>, key: &str) -> Result<(), json::Error> {
        let cursor_prev = self.cursor;
        let keyed = self.enter_keyed_vector(key);

        self.current_key.clear();
        self.current_key.push_str(key);
        self.path.push(key.to_owned());

        // A frame inside an already-matched subtree inherits it; otherwise
        // this frame may establish a new subtree, checking the error pattern
        // first so that errors override messages.
        let mut owner = false;
        if !self.emit {
            let is_error = matches!(&self.error, Some((pattern, _)) if pattern.matches(&self.path));
            if is_error || self.message_pattern.matches(&self.path) {
                self.emit = true;
                self.is_error_path = is_error;
                owner = true;
            }
        }

        if self.emit {
            // When the path length equals the active pattern's, this key IS
            // the subtree root: its value alone is the record, and no key
            // prefix is emitted for it.
            let at_subtree_root = owner && self.path.len() == self.active_pattern().len();

            if keyed {
                if at_subtree_root {
                    // The enclosing anonymous array is skipped.
                } else if !self.needs_close_array {
                    self.out.push('[');
                    self.needs_close_array = true;
                } else {
                    self.out.push(',');
                }
                self.out.push_str("{\"id\":");
                json::write_json_string(&mut self.out, key);
                self.out.push_str(",\"val\":");
            } else if !at_subtree_root {
                if !self.needs_close_object {
                    self.out.push('{');
                    self.needs_close_object = true;
                } else {
                    self.out.push(',');
                }
                json::write_json_string(&mut self.out, key);
                self.out.push(':');
            }
        }

        // The close flags belong to this scope, not the child's.
        let close_array = mem::take(&mut self.needs_close_array);
        let close_object = mem::take(&mut self.needs_close_object);

        let result = json::parse_value(self, input);

        self.needs_close_array = close_array;
        self.needs_close_object = close_object;
        self.cursor = cursor_prev;
        self.path.pop();
        result?;

        if self.emit && keyed {
            // Close the `{"id":…,"val":` wrapper around the child's value.
            self.out.push('}');
        }

        // The owner frame hands the subtree off once the path has left it.
        if owner && !self.active_pattern().matches(&self.path) {
            if !self.process_item() {
                self.is_parse_error = true;
            }
            self.emit = false;
            self.is_error_path = false;
        }
        Ok(())
    }

    fn object_end(&mut self) -> bool {
        self.current_key.clear();
        self.object_depth -= 1;

        if self.emit {
            if self.needs_close_array {
                self.out.push(']');
                self.needs_close_array = false;
            } else if self.needs_close_object {
                self.out.push('}');
                self.needs_close_object = false;
            } else {
                // No item of this object emitted an opening.
                self.out.push_str("{}");
            }

            if self.object_depth == 0 {
                // Flush the final top-level subtree.
                if !self.process_item() {
                    self.is_parse_error = true;
                }
                self.emit = false;
                self.is_error_path = false;
            }
        }
        true
    }
}

/// Run one response through a fresh transcoder with a message subscription.
pub fn parse_stream<R, M, FM>(
    registry: &Registry,
    source: R,
    message_pattern: Pattern,
    message_sink: FM,
) -> Result<(), Error>
where
    R: io::Read,
    M: Record,
    FM: FnMut(M) -> bool,
{
    let error: Option<(Pattern, fn(NoRecord) -> bool)> = None;
    Transcoder::new(registry, message_pattern, message_sink, error).parse_stream(source)
}

/// Run one response through a fresh transcoder with both a message and an
/// error subscription. Where both patterns match, the error one wins.
pub fn parse_stream_with_errors<R, M, E, FM, FE>(
    registry: &Registry,
    source: R,
    message_pattern: Pattern,
    message_sink: FM,
    error_pattern: Pattern,
    error_sink: FE,
) -> Result<(), Error>
where
    R: io::Read,
    M: Record,
    E: Record,
    FM: FnMut(M) -> bool,
    FE: FnMut(E) -> bool,
{
    Transcoder::new(
        registry,
        message_pattern,
        message_sink,
        Some((error_pattern, error_sink)),
    )
    .parse_stream(source)
}

/// Stand-in error record for message-only subscriptions.
#[derive(serde::Deserialize)]
struct NoRecord {}

impl Record for NoRecord {
    const FULL_NAME: &'static str = "";
}
