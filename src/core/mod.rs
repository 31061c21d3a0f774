pub mod error;
pub mod types;
pub mod value;

pub use error::{DbError, Result};
pub use types::{FieldType, FieldValue, Row};
pub use value::{DataType, Value};
