/// The base type of a field, or of a vector's elements.
#[derive(
    rkyv::Archive,
    rkyv::Serialize,
    rkyv::Deserialize,
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
)]
#[rkyv(derive(Debug, Clone, Copy, PartialEq, Eq))]
pub enum TypeKind {
    Bool,
    Int,
    Float,
    String,
    Object,
    Vector,
}

/// One field of an object definition.
/// `element` is set iff `kind` is `Vector`; `object` indexes the schema's
/// object table iff `kind` (or a vector's `element`) is `Object`.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub struct FieldDef {
    pub name: String,
    pub kind: TypeKind,
    pub element: Option<TypeKind>,
    pub object: Option<u32>,
}

/// An object (record) definition. Fields are sorted by name; a field's
/// position is its wire index in the record encoding.
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub struct ObjectDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// A complete schema: objects sorted by fully-qualified name, plus the
/// declared root object. The rkyv archive of this value is the binary
/// reflection form consumed by [`crate::Registry`].
#[derive(rkyv::Archive, rkyv::Serialize, rkyv::Deserialize, Debug, Clone, PartialEq)]
#[rkyv(derive(Debug))]
pub struct Schema {
    pub objects: Vec<ObjectDef>,
    pub root: u32,
}

impl ObjectDef {
    /// Look up a field by name, returning its wire index alongside.
    pub fn field(&self, name: &str) -> Option<(u16, &FieldDef)> {
        self.fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
            .map(|index| (index as u16, &self.fields[index]))
    }
}

impl Schema {
    pub fn object(&self, index: u32) -> Option<&ObjectDef> {
        self.objects.get(index as usize)
    }

    pub fn object_named(&self, name: &str) -> Option<(u32, &ObjectDef)> {
        self.objects
            .binary_search_by(|object| object.name.as_str().cmp(name))
            .ok()
            .map(|index| (index as u32, &self.objects[index]))
    }

    pub fn root_object(&self) -> &ObjectDef {
        // `build` guarantees the root index is in range.
        &self.objects[self.root as usize]
    }

    /// Serialize this schema into its aligned binary reflection form.
    /// Append a zero terminator to produce a registry-ready blob.
    pub fn to_archive(&self) -> rkyv::util::AlignedVec {
        rkyv::to_bytes::<rkyv::rancor::Error>(self).unwrap()
    }

    /// The binary reflection form as a registry-ready, zero-terminated blob.
    pub fn to_blob(&self) -> Vec<u8> {
        let mut blob = self.to_archive().to_vec();
        blob.push(0);
        blob
    }
}

impl ArchivedObjectDef {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Look up a field by name, returning its wire index alongside.
    pub fn field(&self, name: &str) -> Option<(u16, &ArchivedFieldDef)> {
        let fields = self.fields.as_slice();
        fields
            .binary_search_by(|field| field.name.as_str().cmp(name))
            .ok()
            .map(|index| (index as u16, &fields[index]))
    }
}

impl ArchivedFieldDef {
    pub fn object_index(&self) -> Option<u32> {
        self.object.as_ref().map(|index| index.to_native())
    }

    pub fn is_object(&self) -> bool {
        matches!(self.kind, ArchivedTypeKind::Object)
    }

    pub fn is_vector_of_objects(&self) -> bool {
        matches!(self.kind, ArchivedTypeKind::Vector)
            && matches!(self.element.as_ref(), Some(ArchivedTypeKind::Object))
    }
}
