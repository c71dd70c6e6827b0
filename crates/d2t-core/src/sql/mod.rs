//! Everything between model text and materialised rows.

pub mod executor;
pub mod extract;
pub mod value;

pub use extract::extract_sql;
