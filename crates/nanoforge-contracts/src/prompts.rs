use std::fmt;
use std::str::FromStr;

macro_rules! closed_kind {
    ($name:ident, $label:literal, { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(raw: &str) -> Result<Self, Self::Err> {
                let normalized = raw.trim().to_ascii_lowercase();
                Self::ALL
                    .iter()
                    .copied()
                    .find(|kind| kind.as_str() == normalized)
                    .ok_or_else(|| {
                        let supported = Self::ALL
                            .iter()
                            .map(|kind| kind.as_str())
                            .collect::<Vec<_>>()
                            .join(", ");
                        format!("unknown {} '{}'. Supported: {}", $label, raw, supported)
                    })
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

closed_kind!(IconKind, "icon type", {
    AppIcon => "app-icon",
    Favicon => "favicon",
    UiElement => "ui-element",
});

closed_kind!(PatternKind, "pattern type", {
    Seamless => "seamless",
    Texture => "texture",
    Wallpaper => "wallpaper",
});

closed_kind!(DiagramKind, "diagram type", {
    Flowchart => "flowchart",
    Architecture => "architecture",
    Sequence => "sequence",
    Network => "network",
    Mindmap => "mindmap",
});

pub fn with_style(prompt: &str, style: Option<&str>) -> String {
    match style.map(str::trim).filter(|value| !value.is_empty()) {
        Some(style) => format!("{prompt}, style: {style}"),
        None => prompt.to_string(),
    }
}

pub fn icon_prompt(kind: IconKind, description: &str) -> String {
    format!(
        "Create a clean, professional {kind} icon: {description}. The icon should be simple, \
         recognizable, and work well at small sizes. Use a square 1:1 aspect ratio. Center the \
         icon on a transparent or solid background."
    )
}

pub fn pattern_prompt(kind: PatternKind, description: &str) -> String {
    let guidance = match kind {
        PatternKind::Seamless => {
            "The pattern must tile seamlessly: left and right edges, and top and bottom edges, \
             must continue into each other without visible seams."
        }
        PatternKind::Texture => {
            "Render it as a high-detail surface texture with even lighting and no perspective, \
             suitable for use as a material map."
        }
        PatternKind::Wallpaper => {
            "Compose it as a decorative repeating wallpaper with a balanced, evenly distributed \
             motif."
        }
    };
    format!("Create a {kind} pattern: {description}. {guidance}")
}

pub fn story_frame_prompt(description: &str, frame: u32, total: u32) -> String {
    let continuity = if frame > 1 {
        " Keep characters, palette, and art style consistent with the previous frame provided."
    } else {
        " Establish the characters, setting, and art style for the sequence."
    };
    format!(
        "Frame {frame} of {total} in a sequential visual story: {description}. Show the moment \
         that belongs at step {frame} of the narrative arc.{continuity}"
    )
}

pub fn diagram_prompt(kind: DiagramKind, description: &str) -> String {
    format!(
        "Create a clear, professional {kind} diagram: {description}. Use clean lines, legible \
         labels, consistent spacing, and a restrained color palette on a plain background."
    )
}

pub fn restore_prompt(instruction: Option<&str>) -> String {
    let base = "Restore this photograph: repair scratches, tears, stains, and fading, reduce \
                noise, and recover natural color and detail while preserving the original \
                composition and the identity of every person in it.";
    match instruction.map(str::trim).filter(|value| !value.is_empty()) {
        Some(extra) => format!("{base} Additional guidance: {extra}"),
        None => base.to_string(),
    }
}
