// src/schema/types.rs

use serde::{Deserialize, Serialize};

/// Storage type of a unified field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    Text,
    Double,
    /// Stored as epoch milliseconds on the service, ISO text in GeoJSON.
    Date,
    Integer,
    /// Integer code from a fixed domain (see `schema::domains`).
    Coded,
}

/// A single column definition of the unified service-line class.
#[derive(Debug, Serialize, PartialEq, Clone, Copy, Eq, Hash)]
pub struct Column {
    pub name: &'static str,
    pub ty: FieldType,
}

impl Column {
    pub const fn new(name: &'static str, ty: FieldType) -> Self {
        Self { name, ty }
    }
}

/// Which input layer a record came from.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone, Copy, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    Apartment,
    MobileHome,
    School,
}

impl SourceKind {
    /// Append order of the three layers.
    pub const ALL: [SourceKind; 3] = [
        SourceKind::Apartment,
        SourceKind::MobileHome,
        SourceKind::School,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            SourceKind::Apartment => "apartments",
            SourceKind::MobileHome => "mobile_homes",
            SourceKind::School => "schools",
        }
    }
}
