use std::env;

use crate::errors::GenerateError;

/// Checked in order; the first non-empty value wins.
pub const CREDENTIAL_VARS: [&str; 4] = [
    "NANOBANANA_GEMINI_API_KEY",
    "NANOBANANA_GOOGLE_API_KEY",
    "GEMINI_API_KEY",
    "GOOGLE_API_KEY",
];

pub fn resolve_credential() -> Result<String, GenerateError> {
    resolve_credential_with(non_empty_env)
}

pub fn resolve_credential_with<F>(lookup: F) -> Result<String, GenerateError>
where
    F: Fn(&str) -> Option<String>,
{
    CREDENTIAL_VARS
        .iter()
        .find_map(|key| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        })
        .ok_or_else(|| GenerateError::MissingCredential {
            checked: CREDENTIAL_VARS.iter().map(|key| key.to_string()).collect(),
        })
}

pub(crate) fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
