mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use nanoforge_contracts::prompts::{DiagramKind, IconKind, PatternKind};
use nanoforge_contracts::{AspectRatio, Resolution};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(
    name = "nanoforge",
    version,
    about = "Generate and edit images with Gemini from the command line"
)]
struct Cli {
    /// Log request details to stderr (RUST_LOG takes precedence).
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Generate images from a text prompt.
    Generate(GenerateArgs),
    /// Edit an image, optionally composing additional input images.
    Edit(EditArgs),
    /// Restore a damaged or faded photograph.
    Restore(RestoreArgs),
    /// Generate an icon and export it at several square sizes.
    Icon(IconArgs),
    /// Generate seamless patterns and textures.
    Pattern(PatternArgs),
    /// Generate a sequence of frames that tell a visual story.
    Story(StoryArgs),
    /// Generate a technical diagram.
    Diagram(DiagramArgs),
}

/// Flags shared by every command that talks to a selectable model tier.
#[derive(Debug, Clone, Default, Args)]
struct ImageArgs {
    /// Aspect ratio, e.g. 1:1, 16:9, 9:16, 4:3, 3:4, 3:2, 2:3, 21:9, 5:4, 4:5.
    #[arg(short = 'a', long)]
    aspect_ratio: Option<AspectRatio>,
    /// Output resolution: 1K, 2K or 4K (frugal mode supports 1K only).
    #[arg(short = 'r', long)]
    resolution: Option<Resolution>,
    /// Use the cheaper fixed-1024px model.
    #[arg(short = 'f', long)]
    frugal: bool,
    /// Embed the prompt in the PNG output as metadata.
    #[arg(long)]
    store_prompt: bool,
}

#[derive(Debug, Args)]
struct GenerateArgs {
    prompt: String,
    /// Number of variants to generate.
    #[arg(short = 'c', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,
    /// Output directory.
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,
    /// Style appended to the prompt.
    #[arg(short = 's', long)]
    style: Option<String>,
    /// Presentation slide defaults: 16:9, 4K and the configured theme.
    #[arg(long)]
    slide: bool,
    /// JSON config with style, colorScheme, additionalContext, aspectRatio, resolution.
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Args)]
struct EditArgs {
    base_image: PathBuf,
    instruction: String,
    /// Additional input image for composition (repeatable).
    #[arg(short = 'i', long = "input")]
    inputs: Vec<PathBuf>,
    /// Output file (default: <base>-edited.<ext> next to the base image).
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    /// Overwrite the output file if it exists.
    #[arg(long)]
    force: bool,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Args)]
struct RestoreArgs {
    image_path: PathBuf,
    /// Extra guidance for the restoration.
    instruction: Option<String>,
    /// Output file (default: <image>-restored.<ext> next to the source).
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,
    #[arg(long)]
    force: bool,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Args)]
struct IconArgs {
    description: String,
    /// Comma-separated square sizes in pixels.
    #[arg(long, default_value = "64,128,256")]
    sizes: String,
    #[arg(long = "type", default_value = "app-icon")]
    kind: IconKind,
    /// Source image to turn into an icon.
    #[arg(short = 'i', long)]
    input: Option<PathBuf>,
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,
    #[arg(long)]
    store_prompt: bool,
}

#[derive(Debug, Args)]
struct PatternArgs {
    description: String,
    #[arg(long = "type", default_value = "seamless")]
    kind: PatternKind,
    #[arg(short = 'c', long, default_value_t = 1, value_parser = clap::value_parser!(u32).range(1..))]
    count: u32,
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Args)]
struct StoryArgs {
    description: String,
    /// Number of frames (1-14).
    #[arg(long, default_value_t = 4, value_parser = clap::value_parser!(u32).range(1..=14))]
    frames: u32,
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,
    #[command(flatten)]
    image: ImageArgs,
}

#[derive(Debug, Args)]
struct DiagramArgs {
    description: String,
    #[arg(long = "type", default_value = "flowchart")]
    kind: DiagramKind,
    #[arg(short = 'o', long, default_value = ".")]
    output: PathBuf,
    #[command(flatten)]
    image: ImageArgs,
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("nanoforge error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let dotenv = dotenvy::dotenv();
    let cli = Cli::parse();
    init_logging(cli.verbose);
    if let Some(err) = env_file_problem(dotenv) {
        warn!("failed to load .env: {err}");
    }

    match cli.command {
        Command::Generate(args) => commands::generate(args),
        Command::Edit(args) => commands::edit(args),
        Command::Restore(args) => commands::restore(args),
        Command::Icon(args) => commands::icon(args),
        Command::Pattern(args) => commands::pattern(args),
        Command::Story(args) => commands::story(args),
        Command::Diagram(args) => commands::diagram(args),
    }
}

/// A missing `.env` is normal; anything else is worth a warning.
fn env_file_problem<T>(result: dotenvy::Result<T>) -> Option<dotenvy::Error> {
    match result {
        Err(err) if !err.not_found() => Some(err),
        _ => None,
    }
}

fn init_logging(verbose: bool) {
    let fallback = if verbose {
        "warn,nanoforge_cli=debug,nanoforge_engine=debug"
    } else {
        "warn"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
