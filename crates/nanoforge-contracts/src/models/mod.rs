mod registry;

pub use registry::{ModelTier, TierSpec, TIERS};
