//! Domain value types shared across the pipeline.

mod media;

pub use media::{base_name_of, AudioProperties, Recording, Segment};
