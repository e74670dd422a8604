//! Input types at the pipeline boundary
//!
//! Decoding lives outside the crate; these types describe what a decoder
//! hands over.

pub mod audio_buffer;
pub mod part_key;

pub use audio_buffer::AudioBuffer;
pub use part_key::PartKey;
