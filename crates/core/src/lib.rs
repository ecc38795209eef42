//! Functional core of the tablekit storage access layer.
//!
//! Everything here is pure: schema descriptors, the attribute model, the key
//! codec, typed conditions, the error taxonomy and the traits that the
//! imperative shell implements. No module performs I/O.

pub mod attribute;
pub mod codec;
pub mod condition;
pub mod context;
pub mod schema;
pub mod storage;
