//! Safe SQL: validated identifiers, rendered statements and bound values.

mod builder;
pub mod codec;
mod ident;
pub mod params;

pub use builder::*;
pub use ident::{is_valid_sql_type, qualified_table, quoted, validate_identifier};
pub use params::*;
