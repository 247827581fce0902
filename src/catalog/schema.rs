//! Field layout of a catalog.
//!
//! A [`Schema`] is an ordered list of named, typed fields with a stable layout: the position of
//! a field in the schema is the position of its value in every record's `fields` vector. The
//! reference provider exposes the reference schema independently of any data partition, so the
//! measurement engine can assemble its output layout before the first record is read.

use serde::{Deserialize, Serialize};

/// Value type of a schema field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    Int,
    Float,
    Flag,
}

/// One named, typed field of a catalog schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub doc: String,
}

/// An ordered collection of fields with a stable layout.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field and return its index in the layout.
    pub fn add_field(&mut self, name: &str, kind: FieldKind, doc: &str) -> usize {
        self.fields.push(Field {
            name: name.to_string(),
            kind,
            doc: doc.to_string(),
        });
        self.fields.len() - 1
    }

    /// Index of the field with the given name, if present.
    pub fn find(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
