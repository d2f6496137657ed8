use super::{build, record, ArchivedObjectDef, ArchivedSchema, Schema};

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("schema buffer is empty")]
    EmptyBlob,
    #[error("schema buffer is missing its zero terminator")]
    MissingTerminator,
    #[error("text schema is not valid utf-8")]
    TextUtf8,
    #[error("text schema is not valid JSON: {0}")]
    TextSyntax(#[from] json::Error),
    #[error("text schema is malformed: {0}")]
    TextBuild(#[from] build::Error),
    #[error("binary schema failed validation: {0}")]
    BinarySchema(String),
    #[error("unknown root type '{0}'")]
    UnknownRootType(String),
    #[error(transparent)]
    Record(#[from] record::Error),
}

/// Registry owns two views of one schema:
///
/// * the **reserializer**: a [`Schema`] built from the text form, used to
///   turn JSON text into a verified binary record of a named root type;
/// * the **reflector**: the validated rkyv archive of the binary form,
///   used for zero-copy object/field introspection by name and index.
///
/// Both blobs must end in a zero byte. Construction fails unless both views
/// parse, so a live `Registry` is always ready; it is immutable thereafter
/// and may be shared across any number of transcoders.
pub struct Registry {
    schema: Schema,
    reflect: Reflector,
}

struct Reflector {
    buf: rkyv::util::AlignedVec,
}

impl Reflector {
    fn archived(&self) -> &ArchivedSchema {
        // Validated once in `Registry::new`; the buffer is aligned and
        // immutable from then on.
        unsafe { rkyv::access_unchecked::<ArchivedSchema>(&self.buf) }
    }
}

impl Registry {
    pub fn new(text_blob: &[u8], binary_blob: &[u8]) -> Result<Self, Error> {
        let text = strip_terminator(text_blob)?;
        let text = std::str::from_utf8(text).map_err(|_| Error::TextUtf8)?;
        let doc = json::value::from_str(text, json::Options::lenient())?;
        let schema = build::build_schema(&doc)?;

        let binary = strip_terminator(binary_blob)?;
        let mut buf = rkyv::util::AlignedVec::new();
        buf.extend_from_slice(binary);
        if let Err(err) = rkyv::access::<ArchivedSchema, rkyv::rancor::Error>(&buf) {
            return Err(Error::BinarySchema(err.to_string()));
        }

        tracing::debug!(
            root = %schema.root_object().name,
            objects = schema.objects.len(),
            "parsed schema registry"
        );
        Ok(Self {
            schema,
            reflect: Reflector { buf },
        })
    }

    /// The text-form schema model driving reserialization.
    pub fn text_schema(&self) -> &Schema {
        &self.schema
    }

    /// Reflection lookup by position in the object table.
    pub fn object_by_index(&self, index: u32) -> Option<&ArchivedObjectDef> {
        self.reflect.archived().objects.get(index as usize)
    }

    /// Reflection lookup by fully-qualified type name.
    pub fn object_by_name(&self, name: &str) -> Option<(u32, &ArchivedObjectDef)> {
        let objects = self.reflect.archived().objects.as_slice();
        objects
            .binary_search_by(|object| object.name.as_str().cmp(name))
            .ok()
            .map(|index| (index as u32, &objects[index]))
    }

    /// The schema's declared root object.
    pub fn root_object(&self) -> &ArchivedObjectDef {
        &self.reflect.archived().objects[self.root_index() as usize]
    }

    pub fn root_index(&self) -> u32 {
        self.reflect.archived().root.to_native()
    }

    /// Parse `json_text` as a record of `root_type`, writing the verified
    /// binary encoding into `out`. `out` is rewritten on every call; callers
    /// that need to retain the bytes must copy them before the next call.
    pub fn reserialize_to_binary(
        &self,
        json_text: &str,
        root_type: &str,
        out: &mut Vec<u8>,
    ) -> Result<(), Error> {
        let (root, _) = self
            .schema
            .object_named(root_type)
            .ok_or_else(|| Error::UnknownRootType(root_type.to_owned()))?;

        let value = json::value::from_str(json_text, json::Options::lenient())?;
        out.clear();
        record::encode(&self.schema, root, &value, out)?;
        record::verify(&self.schema, root, out)?;
        Ok(())
    }
}

fn strip_terminator(blob: &[u8]) -> Result<&[u8], Error> {
    match blob.split_last() {
        None => Err(Error::EmptyBlob),
        Some((0, rest)) => Ok(rest),
        Some(_) => Err(Error::MissingTerminator),
    }
}
