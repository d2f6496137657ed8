// Schema model shared by both registry views: the text form builds a
// `Schema`, and its rkyv archive is the binary reflection form.
mod model;
pub use model::{
    ArchivedFieldDef, ArchivedObjectDef, ArchivedSchema, FieldDef, ObjectDef, Schema, TypeKind,
};

// Build a Schema from its lenient-JSON text form.
pub mod build;

// The record binary encoding: encode, structural verification, and a
// serde deserializer over verified bytes.
pub mod record;

// Registry joins the two schema views and performs reserialization.
mod registry;
pub use registry::{Error, Registry};

// Typed records and the generic record parser.
mod parser;
pub use parser::{Record, RecordParser};
