//! Data contracts shared by the nanoforge engine and CLI.
//!
//! Nothing in this crate touches the network or the filesystem.

pub mod models;
pub mod naming;
pub mod presets;
pub mod prompts;
pub mod request;

pub use models::{ModelTier, TierSpec};
pub use presets::StylePreset;
pub use request::{
    AspectRatio, GenerationRequest, ReferenceImage, RequestError, Resolution,
    MAX_REFERENCE_IMAGES, RECOMMENDED_REFERENCE_IMAGES,
};
