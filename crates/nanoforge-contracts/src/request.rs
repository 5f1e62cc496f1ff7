use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::models::ModelTier;

/// Hard ceiling on inline images per request.
pub const MAX_REFERENCE_IMAGES: usize = 14;

/// Above this count the provider still accepts the request but composition
/// quality drops noticeably.
pub const RECOMMENDED_REFERENCE_IMAGES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("instruction must not be empty")]
    EmptyInstruction,
    #[error("unsupported aspect ratio: {value}. Supported: {}", .supported.join(", "))]
    UnsupportedAspectRatio {
        value: String,
        supported: Vec<String>,
    },
    #[error("unsupported resolution: {value}. Supported: {}", .supported.join(", "))]
    UnsupportedResolution {
        value: String,
        supported: Vec<String>,
    },
    #[error("too many input images ({count}). Maximum is {max} (base + additional)")]
    TooManyReferenceImages { count: usize, max: usize },
    #[error(
        "frugal mode only supports 1K resolution, but {requested} was requested; drop the frugal flag to use higher resolutions"
    )]
    FrugalResolution { requested: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Square,
    Landscape16x9,
    Portrait9x16,
    Landscape4x3,
    Portrait3x4,
    Landscape3x2,
    Portrait2x3,
    UltraWide21x9,
    Flexible5x4,
    Flexible4x5,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 10] = [
        AspectRatio::Square,
        AspectRatio::Landscape16x9,
        AspectRatio::Portrait9x16,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait3x4,
        AspectRatio::Landscape3x2,
        AspectRatio::Portrait2x3,
        AspectRatio::UltraWide21x9,
        AspectRatio::Flexible5x4,
        AspectRatio::Flexible4x5,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait3x4 => "3:4",
            AspectRatio::Landscape3x2 => "3:2",
            AspectRatio::Portrait2x3 => "2:3",
            AspectRatio::UltraWide21x9 => "21:9",
            AspectRatio::Flexible5x4 => "5:4",
            AspectRatio::Flexible4x5 => "4:5",
        }
    }

    pub fn supported() -> Vec<String> {
        Self::ALL
            .iter()
            .map(|ratio| ratio.as_str().to_string())
            .collect()
    }
}

impl FromStr for AspectRatio {
    type Err = RequestError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let value = raw.trim();
        Self::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == value)
            .ok_or_else(|| RequestError::UnsupportedAspectRatio {
                value: raw.to_string(),
                supported: Self::supported(),
            })
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    OneK,
    TwoK,
    FourK,
}

impl Resolution {
    pub const ALL: [Resolution; 3] = [Resolution::OneK, Resolution::TwoK, Resolution::FourK];

    pub fn as_str(&self) -> &'static str {
        match self {
            Resolution::OneK => "1K",
            Resolution::TwoK => "2K",
            Resolution::FourK => "4K",
        }
    }
}

impl FromStr for Resolution {
    type Err = RequestError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_uppercase();
        Self::ALL
            .into_iter()
            .find(|resolution| resolution.as_str() == normalized)
            .ok_or_else(|| RequestError::UnsupportedResolution {
                value: raw.to_string(),
                supported: Self::ALL
                    .iter()
                    .map(|resolution| resolution.as_str().to_string())
                    .collect(),
            })
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct ReferenceImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl ReferenceImage {
    pub fn new(mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            mime_type: mime_type.into(),
            bytes,
        }
    }

    pub fn png(bytes: Vec<u8>) -> Self {
        Self::new("image/png", bytes)
    }
}

impl fmt::Debug for ReferenceImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReferenceImage")
            .field("mime_type", &self.mime_type)
            .field("len", &self.bytes.len())
            .finish()
    }
}

/// Order of `reference_images` carries meaning: in an edit the first entry is
/// the base image and the rest are composition inputs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub instruction: String,
    pub reference_images: Vec<ReferenceImage>,
    pub aspect_ratio: Option<AspectRatio>,
    pub resolution: Option<Resolution>,
}

impl GenerationRequest {
    pub fn new(instruction: impl Into<String>) -> Self {
        Self {
            instruction: instruction.into(),
            reference_images: Vec::new(),
            aspect_ratio: None,
            resolution: None,
        }
    }

    pub fn with_reference_image(mut self, image: ReferenceImage) -> Self {
        self.reference_images.push(image);
        self
    }

    pub fn with_reference_images(mut self, images: impl IntoIterator<Item = ReferenceImage>) -> Self {
        self.reference_images.extend(images);
        self
    }

    pub fn with_aspect_ratio(mut self, aspect_ratio: Option<AspectRatio>) -> Self {
        self.aspect_ratio = aspect_ratio;
        self
    }

    pub fn with_resolution(mut self, resolution: Option<Resolution>) -> Self {
        self.resolution = resolution;
        self
    }

    pub fn exceeds_recommended_images(&self) -> bool {
        self.reference_images.len() > RECOMMENDED_REFERENCE_IMAGES
    }

    /// Checks every local constraint for `tier`. Nothing here touches the
    /// network, so a failure means no request was sent.
    pub fn validate(&self, tier: ModelTier) -> Result<(), RequestError> {
        if self.instruction.trim().is_empty() {
            return Err(RequestError::EmptyInstruction);
        }
        check_reference_count(self.reference_images.len())?;
        check_tier_resolution(tier, self.resolution)
    }
}

pub fn check_reference_count(count: usize) -> Result<(), RequestError> {
    if count > MAX_REFERENCE_IMAGES {
        return Err(RequestError::TooManyReferenceImages {
            count,
            max: MAX_REFERENCE_IMAGES,
        });
    }
    Ok(())
}

pub fn check_tier_resolution(
    tier: ModelTier,
    resolution: Option<Resolution>,
) -> Result<(), RequestError> {
    match (tier, resolution) {
        (ModelTier::Frugal, Some(requested)) if requested != Resolution::OneK => {
            Err(RequestError::FrugalResolution {
                requested: requested.to_string(),
            })
        }
        _ => Ok(()),
    }
}
