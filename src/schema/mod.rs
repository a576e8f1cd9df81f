pub mod domains;
pub mod fields;
pub mod types;

pub use domains::{Side, Status};
pub use fields::{column, OBJECT_ID, UNIFIED_FIELDS};
pub use types::{Column, FieldType, SourceKind};
