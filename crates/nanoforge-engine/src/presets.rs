use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nanoforge_contracts::StylePreset;
use tracing::debug;

pub const LOCAL_PRESET_FILE: &str = "nanoforge.json";

pub fn default_preset_locations() -> Vec<PathBuf> {
    let mut out = vec![PathBuf::from(LOCAL_PRESET_FILE)];
    if let Some(config_dir) = dirs::config_dir() {
        out.push(config_dir.join("nanoforge").join("config.json"));
    }
    out
}

/// Loads the preset named by `explicit`, or the first default location that
/// exists. An explicit path that does not exist is an error; absent defaults
/// are not.
pub fn find_preset(explicit: Option<&Path>) -> Result<Option<StylePreset>> {
    if let Some(path) = explicit {
        if !path.is_file() {
            bail!("config file not found: {}", path.display());
        }
        return load_preset(path).map(Some);
    }
    find_preset_in(&default_preset_locations())
}

pub fn find_preset_in(candidates: &[PathBuf]) -> Result<Option<StylePreset>> {
    match candidates.iter().find(|path| path.is_file()) {
        Some(path) => load_preset(path).map(Some),
        None => Ok(None),
    }
}

pub fn load_preset(path: &Path) -> Result<StylePreset> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed reading config {}", path.display()))?;
    let preset = StylePreset::from_json(&raw)
        .with_context(|| format!("invalid config JSON in {}", path.display()))?;
    preset
        .aspect_ratio()
        .and_then(|_| preset.resolution())
        .with_context(|| format!("invalid value in config {}", path.display()))?;
    debug!(path = %path.display(), "loaded style preset");
    Ok(preset)
}
