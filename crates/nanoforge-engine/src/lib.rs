//! Network and filesystem side of nanoforge: the Gemini image client, output
//! writing, PNG prompt metadata and preset discovery.

pub mod client;
pub mod credentials;
pub mod errors;
pub mod metadata;
pub mod output;
pub mod presets;

pub use client::{
    build_payload, extract_image, interpret_response, reference_image_from_path, ClientConfig,
    ExtractedImage, ImageClient, DEFAULT_API_BASE, REQUEST_TIMEOUT,
};
pub use credentials::{resolve_credential, resolve_credential_with, CREDENTIAL_VARS};
pub use errors::{ApiError, ApiErrorKind, GenerateError, OutputError};
pub use output::{
    next_free_path, resize_square_png, resolve_path, save_base64, unique_output_path,
    CollisionPolicy,
};
