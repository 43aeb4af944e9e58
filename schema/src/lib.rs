//! Send tables, server classes and property flattening for srcdem.
//!
//! This crate reads the class schema carried by a demo's `DataTables` frame
//! and resolves it into the flat, ordered prop lists that entity deltas
//! index into:
//! - Send props, send tables and the server class catalog
//! - Flattening with exclusion, collapsing and both reorder rules
//! - Deterministic fingerprints of a flattened order
//!
//! # Design Principles
//!
//! - **Engine order is the contract** - The flattened index space must match the engine bit-for-bit.
//! - **Normalized flags** - Raw flag layouts are translated once, on read.
//! - **Pure functions** - Flattening the same tables twice yields the same order.

mod error;
mod flatten;
mod hash;
mod table;

pub use error::{SchemaError, SchemaResult};
pub use flatten::{
    flatten_all, flatten_class, FlattenedClass, FlattenedProp, Reorder, CHANGES_OFTEN_PRIORITY,
    MAX_TABLE_DEPTH,
};
pub use hash::flattened_fingerprint;
pub use table::{
    DataTables, SendProp, SendTable, ServerClass, PROP_NUM_BITS_BITS, PROP_NUM_ELEMENTS_BITS,
    PROP_TYPE_BITS, TABLE_NUM_PROPS_BITS,
};
