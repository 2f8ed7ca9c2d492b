//! Glue between the CLI and the warehouse: locating and opening it, and
//! landing CSV files into it.

pub(crate) mod landing;
pub(crate) mod warehouse_manager;
