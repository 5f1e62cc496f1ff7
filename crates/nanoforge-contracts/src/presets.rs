use serde::{Deserialize, Serialize};

use crate::request::{AspectRatio, RequestError, Resolution};

/// Style/theme preset read from a JSON config document.
///
/// Every field is optional; aspect ratio and resolution only fill in values
/// the caller left unset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePreset {
    #[serde(default)]
    pub style: Option<String>,
    #[serde(default)]
    pub color_scheme: Option<String>,
    #[serde(default)]
    pub additional_context: Option<String>,
    #[serde(default)]
    pub aspect_ratio: Option<String>,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl StylePreset {
    pub fn from_json(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn aspect_ratio(&self) -> Result<Option<AspectRatio>, RequestError> {
        non_empty(self.aspect_ratio.as_deref())
            .map(str::parse::<AspectRatio>)
            .transpose()
    }

    pub fn resolution(&self) -> Result<Option<Resolution>, RequestError> {
        non_empty(self.resolution.as_deref())
            .map(str::parse::<Resolution>)
            .transpose()
    }

    /// Appends the preset's theme to `prompt`.
    pub fn apply_to_prompt(&self, prompt: &str) -> String {
        let mut out = prompt.trim_end().to_string();
        let sections = [
            ("Style", self.style.as_deref()),
            ("Color scheme", self.color_scheme.as_deref()),
            ("Additional context", self.additional_context.as_deref()),
        ];
        for (label, value) in sections {
            if let Some(value) = non_empty(value) {
                out.push_str(&format!(". {label}: {value}"));
            }
        }
        out
    }

    pub fn is_empty(&self) -> bool {
        *self == StylePreset::default()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_camel_case_document() -> anyhow::Result<()> {
        let preset = StylePreset::from_json(
            r#"{
                "style": "flat vector",
                "colorScheme": "navy and coral",
                "additionalContext": "quarterly review deck",
                "aspectRatio": "16:9",
                "resolution": "2K"
            }"#,
        )?;
        assert_eq!(preset.style.as_deref(), Some("flat vector"));
        assert_eq!(preset.aspect_ratio()?, Some(AspectRatio::Landscape16x9));
        assert_eq!(preset.resolution()?, Some(Resolution::TwoK));
        Ok(())
    }

    #[test]
    fn missing_fields_default_to_none() -> anyhow::Result<()> {
        let preset = StylePreset::from_json("{}")?;
        assert!(preset.is_empty());
        assert_eq!(preset.aspect_ratio()?, None);
        assert_eq!(preset.apply_to_prompt("a lighthouse"), "a lighthouse");
        Ok(())
    }

    #[test]
    fn invalid_preset_ratio_is_reported() -> anyhow::Result<()> {
        let preset = StylePreset::from_json(r#"{"aspectRatio": "2:1"}"#)?;
        assert!(matches!(
            preset.aspect_ratio(),
            Err(RequestError::UnsupportedAspectRatio { .. })
        ));
        Ok(())
    }

    #[test]
    fn theme_is_appended_in_fixed_order() {
        let preset = StylePreset {
            style: Some("watercolor".to_string()),
            color_scheme: Some(" ".to_string()),
            additional_context: Some("children's book".to_string()),
            ..StylePreset::default()
        };
        assert_eq!(
            preset.apply_to_prompt("a fox"),
            "a fox. Style: watercolor. Additional context: children's book"
        );
    }
}
