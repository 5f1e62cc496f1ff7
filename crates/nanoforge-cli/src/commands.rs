use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use nanoforge_contracts::naming::icon_prefix;
use nanoforge_contracts::prompts::{
    diagram_prompt, icon_prompt, pattern_prompt, restore_prompt, story_frame_prompt, with_style,
};
use nanoforge_contracts::request::{check_reference_count, check_tier_resolution};
use nanoforge_contracts::{
    AspectRatio, GenerationRequest, ModelTier, ReferenceImage, Resolution, StylePreset,
    RECOMMENDED_REFERENCE_IMAGES,
};
use nanoforge_engine::output::{decode_payload, write_bytes};
use nanoforge_engine::{
    metadata, presets, reference_image_from_path, resize_square_png, resolve_path, save_base64,
    unique_output_path, ClientConfig, CollisionPolicy, ImageClient,
};
use tracing::{debug, warn};

use crate::{
    DiagramArgs, EditArgs, GenerateArgs, IconArgs, ImageArgs, PatternArgs, RestoreArgs, StoryArgs,
};

/// Values a command supplies when no flag sets them. They rank ahead of a
/// preset, which only fills what is still unset.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Defaults {
    aspect_ratio: Option<AspectRatio>,
    resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Settings {
    tier: ModelTier,
    aspect_ratio: Option<AspectRatio>,
    resolution: Option<Resolution>,
}

impl Settings {
    fn apply(&self, request: GenerationRequest) -> GenerationRequest {
        request
            .with_aspect_ratio(self.aspect_ratio)
            .with_resolution(self.resolution)
    }

    fn print_summary(&self) {
        if let Some(aspect_ratio) = self.aspect_ratio {
            println!("Aspect Ratio: {aspect_ratio}");
        }
        println!(
            "Resolution: {}",
            self.tier.spec().effective_resolution(self.resolution)
        );
        match self.tier {
            ModelTier::Frugal => println!("Model: {} (frugal)", self.tier.model_id()),
            ModelTier::Standard => println!("Model: {}", self.tier.model_id()),
        }
    }
}

/// Flags win, then the command's own defaults, then the preset. Tier
/// constraints are checked here so nothing invalid reaches the client.
fn resolve_settings(
    flags: &ImageArgs,
    preset: Option<&StylePreset>,
    defaults: Defaults,
) -> Result<Settings> {
    let (preset_ratio, preset_resolution) = match preset {
        Some(preset) => (preset.aspect_ratio()?, preset.resolution()?),
        None => (None, None),
    };
    let tier = ModelTier::from_frugal_flag(flags.frugal);
    let settings = Settings {
        tier,
        aspect_ratio: flags
            .aspect_ratio
            .or(defaults.aspect_ratio)
            .or(preset_ratio),
        resolution: flags
            .resolution
            .or(defaults.resolution)
            .or(preset_resolution),
    };
    check_tier_resolution(tier, settings.resolution)?;
    Ok(settings)
}

fn build_client(tier: ModelTier) -> Result<ImageClient> {
    let config = ClientConfig::from_env(tier).context("failed to create Gemini client")?;
    debug!(?config, "client configured");
    Ok(ImageClient::new(config)?)
}

fn save_generated(
    payload: &str,
    path: &Path,
    policy: CollisionPolicy,
    prompt: &str,
    store_prompt: bool,
) -> Result<PathBuf> {
    let saved = save_base64(payload, path, policy)?;
    if store_prompt {
        embed_prompt_or_warn(&saved, prompt);
    }
    Ok(saved)
}

fn embed_prompt_or_warn(path: &Path, prompt: &str) {
    match metadata::embed_prompt(path, prompt) {
        Ok(()) => println!("  (prompt stored in metadata)"),
        Err(err) => warn!("failed to store prompt in metadata for {}: {err:#}", path.display()),
    }
}

fn run_batch<F>(total: u32, noun: &str, mut item: F) -> i32
where
    F: FnMut(u32) -> Result<PathBuf>,
{
    let mut succeeded = 0u32;
    for index in 1..=total {
        if total > 1 {
            println!("[{index}/{total}] Generating {noun}...");
        } else {
            println!("Generating {noun}...");
        }
        match item(index) {
            Ok(path) => {
                println!("✓ Saved to: {}", path.display());
                succeeded += 1;
            }
            Err(err) => eprintln!("Error generating {noun} {index}: {err:#}"),
        }
    }
    println!("\nSuccessfully generated {succeeded}/{total} {noun}s");
    batch_exit_code(succeeded)
}

fn batch_exit_code(succeeded: u32) -> i32 {
    if succeeded == 0 {
        1
    } else {
        0
    }
}

fn sequence_for(index: u32, total: u32) -> Option<u32> {
    (total > 1).then_some(index)
}

pub(crate) fn generate(args: GenerateArgs) -> Result<i32> {
    if args.slide && args.image.frugal {
        bail!(
            "--frugal is incompatible with --slide (which requires 4K resolution); \
             the frugal model only supports 1K"
        );
    }
    let preset = if args.slide || args.config.is_some() {
        presets::find_preset(args.config.as_deref()).context("failed to load config")?
    } else {
        None
    };
    let defaults = if args.slide {
        Defaults {
            aspect_ratio: Some(AspectRatio::Landscape16x9),
            resolution: Some(Resolution::FourK),
        }
    } else {
        Defaults::default()
    };
    let settings = resolve_settings(&args.image, preset.as_ref(), defaults)?;
    let full_prompt = compose_generate_prompt(&args.prompt, args.style.as_deref(), preset.as_ref());
    let request = settings.apply(GenerationRequest::new(full_prompt.clone()));
    request.validate(settings.tier)?;
    let client = build_client(settings.tier)?;

    println!("Generating {} image(s) for: {}", args.count, args.prompt);
    if preset.is_some() {
        println!("Config: Loaded (theme applied to prompt)");
    }
    if let Some(style) = args.style.as_deref() {
        println!("Style: {style}");
    }
    settings.print_summary();
    println!();

    Ok(run_batch(args.count, "image", |index| {
        let payload = client.generate(&request)?;
        let path = unique_output_path(
            &args.output,
            &args.prompt,
            None,
            sequence_for(index, args.count),
        );
        save_generated(
            &payload,
            &path,
            CollisionPolicy::NextFree,
            &full_prompt,
            args.image.store_prompt,
        )
    }))
}

fn compose_generate_prompt(prompt: &str, style: Option<&str>, preset: Option<&StylePreset>) -> String {
    let styled = with_style(prompt, style);
    match preset {
        Some(preset) => preset.apply_to_prompt(&styled),
        None => styled,
    }
}

pub(crate) fn edit(args: EditArgs) -> Result<i32> {
    let mut images = vec![args.base_image];
    images.extend(args.inputs);
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&images[0], "edited"));
    run_edit(
        &images,
        &args.instruction,
        &output,
        args.force,
        &args.image,
    )?;
    Ok(0)
}

pub(crate) fn restore(args: RestoreArgs) -> Result<i32> {
    let instruction = restore_prompt(args.instruction.as_deref());
    let output = args
        .output
        .unwrap_or_else(|| default_output_path(&args.image_path, "restored"));
    run_edit(
        &[args.image_path],
        &instruction,
        &output,
        args.force,
        &args.image,
    )?;
    Ok(0)
}

fn default_output_path(source: &Path, suffix: &str) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    let ext = source
        .extension()
        .map(|value| format!(".{}", value.to_string_lossy()))
        .unwrap_or_default();
    let file_name = format!("{stem}-{suffix}{ext}");
    match source.parent() {
        Some(parent) => parent.join(file_name),
        None => PathBuf::from(file_name),
    }
}

/// Shared by edit and restore: the first image is the base, the rest are
/// composition inputs.
fn run_edit(
    images: &[PathBuf],
    instruction: &str,
    output: &Path,
    force: bool,
    flags: &ImageArgs,
) -> Result<PathBuf> {
    check_reference_count(images.len())?;
    if images.len() > RECOMMENDED_REFERENCE_IMAGES {
        warn!(
            "using {} images; results are best with {} or fewer",
            images.len(),
            RECOMMENDED_REFERENCE_IMAGES
        );
    }
    let policy = CollisionPolicy::from_force_flag(force);
    let output = resolve_path(output, policy)?;
    let settings = resolve_settings(flags, None, Defaults::default())?;
    if settings.tier == ModelTier::Frugal && images.len() > 1 {
        warn!(
            "multi-image composition with the frugal model may have limitations; \
             drop --frugal for best results with {} images",
            images.len()
        );
    }

    let mut references = Vec::with_capacity(images.len());
    for (index, path) in images.iter().enumerate() {
        let label = if index == 0 {
            "base image".to_string()
        } else {
            format!("input {index}")
        };
        println!("Loading {label}: {}", path.display());
        references.push(reference_image_from_path(path)?);
    }

    let request = settings.apply(
        GenerationRequest::new(instruction).with_reference_images(references),
    );
    request.validate(settings.tier)?;
    let client = build_client(settings.tier)?;

    println!("\nEditing with {} image(s)", images.len());
    println!("Instruction: {instruction}");
    settings.print_summary();
    println!("\nGenerating edited image...");

    let payload = client.generate(&request).context("failed to edit image")?;
    let saved = save_generated(&payload, &output, policy, instruction, flags.store_prompt)
        .context("failed to save edited image")?;
    println!("✓ Saved to: {}", saved.display());
    Ok(saved)
}

pub(crate) fn icon(args: IconArgs) -> Result<i32> {
    let sizes = parse_sizes(&args.sizes)?;
    let reference = args
        .input
        .as_deref()
        .map(reference_image_from_path)
        .transpose()?;
    let prompt = icon_prompt(args.kind, &args.description);
    let request = GenerationRequest::new(prompt.clone())
        .with_aspect_ratio(Some(AspectRatio::Square))
        .with_reference_images(reference);
    let client = build_client(ModelTier::Frugal)?;

    println!("Generating icon: {}", args.description);
    if let Some(input) = args.input.as_deref() {
        println!("Input image: {}", input.display());
    }
    println!("Type: {}", args.kind);
    println!("Sizes: {sizes:?}");
    println!(
        "Model: {} (1024px base, then downscaled)\n",
        ModelTier::Frugal.model_id()
    );
    println!("Generating base icon...");

    let payload = client.generate(&request).context("failed to generate icon")?;
    let source = decode_payload(&payload, &args.output)?;

    let mut succeeded = 0u32;
    for &size in &sizes {
        let prefix = icon_prefix(size);
        let path = unique_output_path(&args.output, &args.description, Some(&prefix), None);
        match resize_square_png(&source, size, &path) {
            Ok(saved) => {
                if args.store_prompt {
                    embed_prompt_or_warn(&saved, &prompt);
                }
                println!("✓ Saved {size}x{size} icon to: {}", saved.display());
                succeeded += 1;
            }
            Err(err) => eprintln!(
                "Error saving {size}x{size} icon: {:#}",
                anyhow::Error::from(err)
            ),
        }
    }
    println!(
        "\nSuccessfully generated {succeeded}/{} icon sizes",
        sizes.len()
    );
    Ok(batch_exit_code(succeeded))
}

fn parse_sizes(raw: &str) -> Result<Vec<u32>> {
    let sizes = raw
        .split(',')
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(|value| match value.parse::<u32>() {
            Ok(size) if size > 0 => Ok(size),
            _ => bail!("invalid size: {value}"),
        })
        .collect::<Result<Vec<_>>>()?;
    if sizes.is_empty() {
        bail!("at least one icon size is required");
    }
    Ok(sizes)
}

pub(crate) fn pattern(args: PatternArgs) -> Result<i32> {
    let defaults = Defaults {
        aspect_ratio: Some(AspectRatio::Square),
        resolution: None,
    };
    let settings = resolve_settings(&args.image, None, defaults)?;
    let prompt = pattern_prompt(args.kind, &args.description);
    let request = settings.apply(GenerationRequest::new(prompt.clone()));
    request.validate(settings.tier)?;
    let client = build_client(settings.tier)?;

    println!(
        "Generating {} {} pattern(s) for: {}",
        args.count, args.kind, args.description
    );
    settings.print_summary();
    println!();

    let prefix = args.kind.as_str();
    Ok(run_batch(args.count, "pattern", |index| {
        let payload = client.generate(&request)?;
        let path = unique_output_path(
            &args.output,
            &args.description,
            Some(prefix),
            sequence_for(index, args.count),
        );
        save_generated(
            &payload,
            &path,
            CollisionPolicy::NextFree,
            &prompt,
            args.image.store_prompt,
        )
    }))
}

pub(crate) fn story(args: StoryArgs) -> Result<i32> {
    let settings = resolve_settings(&args.image, None, Defaults::default())?;
    GenerationRequest::new(args.description.clone()).validate(settings.tier)?;
    let client = build_client(settings.tier)?;

    println!(
        "Generating a {}-frame story for: {}",
        args.frames, args.description
    );
    settings.print_summary();
    println!();

    let mut previous: Option<Vec<u8>> = None;
    Ok(run_batch(args.frames, "frame", |frame| {
        let prompt = story_frame_prompt(&args.description, frame, args.frames);
        let request = settings.apply(
            GenerationRequest::new(prompt.clone())
                .with_reference_images(previous.clone().map(ReferenceImage::png)),
        );
        let payload = client.generate(&request)?;
        let path = unique_output_path(&args.output, &args.description, Some("story"), Some(frame));
        let bytes = decode_payload(&payload, &path)?;
        let saved = write_bytes(&bytes, &path, CollisionPolicy::NextFree)?;
        if args.image.store_prompt {
            embed_prompt_or_warn(&saved, &prompt);
        }
        previous = Some(bytes);
        Ok(saved)
    }))
}

pub(crate) fn diagram(args: DiagramArgs) -> Result<i32> {
    let defaults = Defaults {
        aspect_ratio: Some(AspectRatio::Landscape16x9),
        resolution: None,
    };
    let settings = resolve_settings(&args.image, None, defaults)?;
    let prompt = diagram_prompt(args.kind, &args.description);
    let request = settings.apply(GenerationRequest::new(prompt.clone()));
    request.validate(settings.tier)?;
    let client = build_client(settings.tier)?;

    println!("Generating {} diagram: {}", args.kind, args.description);
    settings.print_summary();
    println!("\nGenerating diagram...");

    let payload = client
        .generate(&request)
        .context("failed to generate diagram")?;
    let path = unique_output_path(&args.output, &args.description, Some(args.kind.as_str()), None);
    let saved = save_generated(
        &payload,
        &path,
        CollisionPolicy::NextFree,
        &prompt,
        args.image.store_prompt,
    )?;
    println!("✓ Saved to: {}", saved.display());
    Ok(0)
}
