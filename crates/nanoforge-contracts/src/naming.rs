pub const MAX_STEM_LEN: usize = 50;
pub const IMAGE_EXTENSION: &str = "png";

const SEPARATOR: char = '_';
const FALLBACK_STEM: &str = "image";

/// Lower-cases `label`, keeps only `[a-z0-9-]` and whitespace, turns each
/// whitespace run into a single `_` and trims separators from both ends.
pub fn clean_label(label: &str) -> String {
    let lowered = label.to_lowercase();
    let mut out = String::with_capacity(lowered.len());
    let mut pending_separator = false;
    for ch in lowered.chars() {
        if ch.is_ascii_whitespace() {
            pending_separator = true;
            continue;
        }
        if !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '-') {
            continue;
        }
        if pending_separator {
            out.push(SEPARATOR);
            pending_separator = false;
        }
        out.push(ch);
    }
    out.trim_matches(SEPARATOR).to_string()
}

pub fn stem_for(label: &str) -> String {
    let mut stem = clean_label(label);
    // Only ASCII survives cleaning, so a byte index is a char boundary.
    stem.truncate(MAX_STEM_LEN);
    if stem.is_empty() {
        return FALLBACK_STEM.to_string();
    }
    stem
}

/// `[{prefix}_]{stem}[_{sequence}].png`
///
/// `sequence` is 1-based and only used when a single invocation produces
/// several variants.
pub fn derive_filename(label: &str, prefix: Option<&str>, sequence: Option<u32>) -> String {
    let stem = stem_for(label);
    let mut name = match prefix.map(str::trim).filter(|value| !value.is_empty()) {
        Some(prefix) => format!("{prefix}{SEPARATOR}{stem}"),
        None => stem,
    };
    if let Some(sequence) = sequence.filter(|value| *value > 0) {
        name.push(SEPARATOR);
        name.push_str(&sequence.to_string());
    }
    format!("{name}.{IMAGE_EXTENSION}")
}

pub fn icon_prefix(size: u32) -> String {
    format!("icon_{size}x{size}")
}
