use std::fmt;

use crate::request::Resolution;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelTier {
    Standard,
    Frugal,
}

impl ModelTier {
    pub fn from_frugal_flag(frugal: bool) -> Self {
        if frugal {
            ModelTier::Frugal
        } else {
            ModelTier::Standard
        }
    }

    pub fn spec(&self) -> &'static TierSpec {
        match self {
            ModelTier::Standard => &TIERS[0],
            ModelTier::Frugal => &TIERS[1],
        }
    }

    pub fn model_id(&self) -> &'static str {
        self.spec().model_id
    }
}

impl fmt::Display for ModelTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelTier::Standard => f.write_str("standard"),
            ModelTier::Frugal => f.write_str("frugal"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierSpec {
    pub tier: ModelTier,
    pub model_id: &'static str,
    /// Whether `imageConfig.imageSize` may be sent at all.
    pub accepts_image_size: bool,
    /// Resolution the model produces when the caller leaves it unset.
    pub default_resolution: Resolution,
}

impl TierSpec {
    /// Value for `imageConfig.imageSize`, or `None` when the field must be
    /// omitted from the payload.
    pub fn wire_image_size(&self, requested: Option<Resolution>) -> Option<Resolution> {
        if !self.accepts_image_size {
            return None;
        }
        Some(requested.unwrap_or(self.default_resolution))
    }

    pub fn effective_resolution(&self, requested: Option<Resolution>) -> Resolution {
        requested.unwrap_or(self.default_resolution)
    }
}

pub static TIERS: [TierSpec; 2] = [
    TierSpec {
        tier: ModelTier::Standard,
        model_id: "gemini-3-pro-image-preview",
        accepts_image_size: true,
        default_resolution: Resolution::FourK,
    },
    // Fixed 1024px output; the model rejects imageSize.
    TierSpec {
        tier: ModelTier::Frugal,
        model_id: "gemini-2.5-flash-image",
        accepts_image_size: false,
        default_resolution: Resolution::OneK,
    },
];
