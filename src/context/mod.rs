//! Context serialization
//!
//! Flattens the resolved module graph into the id-keyed snapshot sent to a
//! plugin at session start.

pub mod serializer;

pub use serializer::WireInputSerializer;
