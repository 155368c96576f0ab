//! CrudEngine: generic create / read over registered Models.

mod crud;
pub use crud::CrudEngine;
