//! Declarative Models: field descriptors, the registry and record instances.

pub mod field;
pub mod record;
pub mod registry;

pub use field::*;
pub use record::*;
pub use registry::*;
