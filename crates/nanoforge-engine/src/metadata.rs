//! Prompt text stored inside PNG outputs as an `iTXt` chunk.

use std::fs;
use std::io::Cursor;
use std::path::Path;

use anyhow::{bail, Context, Result};

use crate::output::{write_bytes, CollisionPolicy};

pub const PROMPT_KEYWORD: &str = "prompt";

/// Re-encodes the PNG at `path` with `text` under the `prompt` keyword.
///
/// Pixel data, colour type, bit depth, palette and transparency are carried
/// over unchanged. Other text chunks survive; an older prompt is replaced.
pub fn embed_prompt(path: &Path, text: &str) -> Result<()> {
    let source = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let encoded = with_prompt_chunk(&source, text)
        .with_context(|| format!("failed to embed prompt in {}", path.display()))?;
    write_bytes(&encoded, path, CollisionPolicy::Overwrite)?;
    Ok(())
}

pub fn read_prompt(path: &Path) -> Result<Option<String>> {
    let source = fs::read(path).with_context(|| format!("failed reading {}", path.display()))?;
    let decoder = png::Decoder::new(Cursor::new(source.as_slice()));
    let reader = decoder
        .read_info()
        .with_context(|| format!("{} is not a readable PNG", path.display()))?;
    let info = reader.info();

    for chunk in &info.utf8_text {
        if chunk.keyword == PROMPT_KEYWORD {
            return Ok(Some(chunk.get_text()?));
        }
    }
    Ok(info
        .uncompressed_latin1_text
        .iter()
        .find(|chunk| chunk.keyword == PROMPT_KEYWORD)
        .map(|chunk| chunk.text.clone()))
}

fn with_prompt_chunk(source: &[u8], text: &str) -> Result<Vec<u8>> {
    if !source.starts_with(&PNG_SIGNATURE) {
        bail!("prompt metadata is only supported for PNG files");
    }
    let mut decoder = png::Decoder::new(Cursor::new(source));
    decoder.set_transformations(png::Transformations::IDENTITY);
    let mut reader = decoder.read_info()?;
    let mut pixels = vec![0; reader.output_buffer_size()];
    let frame = reader.next_frame(&mut pixels)?;
    pixels.truncate(frame.buffer_size());
    let info = reader.info();

    let mut out = Vec::with_capacity(source.len() + text.len() + 64);
    {
        let mut encoder = png::Encoder::new(&mut out, info.width, info.height);
        encoder.set_color(info.color_type);
        encoder.set_depth(info.bit_depth);
        if let Some(palette) = info.palette.as_ref() {
            encoder.set_palette(palette.to_vec());
        }
        if let Some(trns) = info.trns.as_ref() {
            encoder.set_trns(trns.to_vec());
        }
        for chunk in &info.uncompressed_latin1_text {
            if chunk.keyword != PROMPT_KEYWORD {
                encoder.add_text_chunk(chunk.keyword.clone(), chunk.text.clone())?;
            }
        }
        for chunk in &info.utf8_text {
            if chunk.keyword != PROMPT_KEYWORD {
                encoder.add_itxt_chunk(chunk.keyword.clone(), chunk.get_text()?)?;
            }
        }
        encoder.add_itxt_chunk(PROMPT_KEYWORD.to_string(), text.to_string())?;

        let mut writer = encoder.write_header()?;
        writer.write_image_data(&pixels)?;
        writer.finish()?;
    }
    Ok(out)
}

const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0d, 0x0a, 0x1a, 0x0a];
