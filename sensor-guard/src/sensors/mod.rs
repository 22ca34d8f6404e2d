//! Sensor identity and metadata.
//!
//! [`SensorIdentityResolver`] turns a file path and column header into a
//! canonical sensor id; [`SensorRegistry`] maps those ids to the physical
//! parameter they measure.

mod identity;
mod registry;

pub use identity::{
    clean_column, SensorIdentityResolver, SourceTag, DEFAULT_ARCHIVE_MARKER,
    DEFAULT_SUFFIX_MARKER,
};
pub use registry::{SensorMetadata, SensorRegistry};
