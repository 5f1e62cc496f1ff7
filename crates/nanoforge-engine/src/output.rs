use std::fs;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use image::imageops::FilterType;
use image::ImageFormat;
use nanoforge_contracts::naming;
use tempfile::NamedTempFile;
use tracing::debug;

use crate::errors::OutputError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionPolicy {
    NextFree,
    Fail,
    Overwrite,
}

impl CollisionPolicy {
    pub fn from_force_flag(force: bool) -> Self {
        if force {
            CollisionPolicy::Overwrite
        } else {
            CollisionPolicy::Fail
        }
    }
}

pub fn resolve_path(path: &Path, policy: CollisionPolicy) -> Result<PathBuf, OutputError> {
    if !path.exists() {
        return Ok(path.to_path_buf());
    }
    match policy {
        CollisionPolicy::NextFree => Ok(next_free_path(path)),
        CollisionPolicy::Overwrite => Ok(path.to_path_buf()),
        CollisionPolicy::Fail => Err(OutputError::AlreadyExists {
            path: path.to_path_buf(),
        }),
    }
}

/// Smallest `{stem}_{n}{.ext}` with `n >= 1` that does not exist yet, or
/// `path` itself when it is free.
pub fn next_free_path(path: &Path) -> PathBuf {
    if !path.exists() {
        return path.to_path_buf();
    }
    let parent = path.parent().unwrap_or_else(|| Path::new(""));
    let stem = path
        .file_stem()
        .map(|value| value.to_string_lossy().into_owned())
        .unwrap_or_default();
    let ext = path
        .extension()
        .map(|value| format!(".{}", value.to_string_lossy()))
        .unwrap_or_default();
    let mut counter: u64 = 1;
    loop {
        let candidate = parent.join(format!("{stem}_{counter}{ext}"));
        if !candidate.exists() {
            return candidate;
        }
        counter += 1;
    }
}

pub fn unique_output_path(
    dir: &Path,
    label: &str,
    prefix: Option<&str>,
    sequence: Option<u32>,
) -> PathBuf {
    next_free_path(&dir.join(naming::derive_filename(label, prefix, sequence)))
}

pub fn decode_payload(payload: &str, path: &Path) -> Result<Vec<u8>, OutputError> {
    let compact: String = payload
        .chars()
        .filter(|ch| !ch.is_ascii_whitespace())
        .collect();
    BASE64
        .decode(compact.as_bytes())
        .map_err(|source| OutputError::Decode {
            path: path.to_path_buf(),
            source,
        })
}

pub fn save_base64(
    payload: &str,
    path: &Path,
    policy: CollisionPolicy,
) -> Result<PathBuf, OutputError> {
    let bytes = decode_payload(payload, path)?;
    write_bytes(&bytes, path, policy)
}

/// Atomic write via a temp file in the target directory. Only `Overwrite`
/// replaces an existing file; returns the path actually written.
pub fn write_bytes(
    bytes: &[u8],
    path: &Path,
    policy: CollisionPolicy,
) -> Result<PathBuf, OutputError> {
    let parent = ensure_parent(path)?;
    let write_err = |source: io::Error| OutputError::Write {
        path: path.to_path_buf(),
        source,
    };
    let mut tmp = temp_file_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.as_file().sync_all().map_err(write_err)?;

    let mut target = path.to_path_buf();
    loop {
        if policy == CollisionPolicy::Overwrite {
            tmp.persist(&target).map_err(|err| write_err(err.error))?;
            break;
        }
        match tmp.persist_noclobber(&target) {
            Ok(_) => break,
            Err(err) if err.error.kind() == io::ErrorKind::AlreadyExists => {
                if policy == CollisionPolicy::Fail {
                    return Err(OutputError::AlreadyExists { path: target });
                }
                tmp = err.file;
                target = next_free_path(path);
            }
            Err(err) => return Err(write_err(err.error)),
        }
    }
    debug!(path = %target.display(), bytes = bytes.len(), "wrote image");
    Ok(target)
}

fn temp_file_in(parent: &Path) -> io::Result<NamedTempFile> {
    let mut builder = tempfile::Builder::new();
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        builder.permissions(fs::Permissions::from_mode(0o644));
    }
    builder.tempfile_in(parent)
}

pub fn resize_square_png(source: &[u8], size: u32, path: &Path) -> Result<PathBuf, OutputError> {
    let decoded = image::load_from_memory(source).map_err(|source| OutputError::ImageDecode {
        path: path.to_path_buf(),
        source,
    })?;
    let resized = decoded.resize_exact(size, size, FilterType::CatmullRom);

    let mut encoded = std::io::Cursor::new(Vec::new());
    resized
        .write_to(&mut encoded, ImageFormat::Png)
        .map_err(|source| OutputError::Encode {
            path: path.to_path_buf(),
            source,
        })?;
    write_bytes(encoded.get_ref(), path, CollisionPolicy::NextFree)
}

fn ensure_parent(path: &Path) -> Result<PathBuf, OutputError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&parent).map_err(|source| OutputError::CreateDir {
        path: parent.clone(),
        source,
    })?;
    Ok(parent)
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;

    fn png_bytes(width: u32, height: u32) -> anyhow::Result<Vec<u8>> {
        let image = RgbaImage::from_pixel(width, height, Rgba([200, 40, 90, 255]));
        let mut out = std::io::Cursor::new(Vec::new());
        image.write_to(&mut out, ImageFormat::Png)?;
        Ok(out.into_inner())
    }

    #[test]
    fn free_path_is_returned_unchanged() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fox.png");
        assert_eq!(next_free_path(&path), path);
        Ok(())
    }

    #[test]
    fn collision_takes_smallest_unused_suffix() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        fs::write(dir.path().join("fox.png"), b"a")?;
        fs::write(dir.path().join("fox_1.png"), b"b")?;
        fs::write(dir.path().join("fox_3.png"), b"c")?;
        assert_eq!(
            next_free_path(&dir.path().join("fox.png")),
            dir.path().join("fox_2.png")
        );
        Ok(())
    }

    #[test]
    fn repeated_saves_produce_distinct_paths() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let payload = BASE64.encode(b"not really a png");
        let mut seen = Vec::new();
        for _ in 0..5 {
            let path = unique_output_path(dir.path(), "Watercolor Fox", None, None);
            seen.push(save_base64(&payload, &path, CollisionPolicy::NextFree)?);
        }
        seen.sort();
        seen.dedup();
        assert_eq!(seen.len(), 5);
        assert!(seen.contains(&dir.path().join("watercolor_fox.png")));
        assert!(seen.contains(&dir.path().join("watercolor_fox_4.png")));
        Ok(())
    }

    #[test]
    fn fail_policy_refuses_existing_path() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("photo-edited.png");
        fs::write(&path, b"keep me")?;
        assert!(matches!(
            resolve_path(&path, CollisionPolicy::Fail),
            Err(OutputError::AlreadyExists { .. })
        ));
        assert_eq!(resolve_path(&path, CollisionPolicy::Overwrite)?, path);
        assert_eq!(fs::read(&path)?, b"keep me");
        Ok(())
    }

    #[test]
    fn save_creates_missing_directories() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("nested/deeper/out.png");
        save_base64(&BASE64.encode(b"bytes"), &path, CollisionPolicy::NextFree)?;
        assert_eq!(fs::read(&path)?, b"bytes");
        Ok(())
    }

    #[test]
    fn payload_with_line_breaks_still_decodes() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let encoded = BASE64.encode(b"wrapped payload bytes");
        let wrapped = format!("{}\n{}", &encoded[..8], &encoded[8..]);
        assert_eq!(
            decode_payload(&wrapped, &dir.path().join("x.png"))?,
            b"wrapped payload bytes"
        );
        Ok(())
    }

    #[test]
    fn invalid_base64_leaves_no_file() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("broken.png");
        let err = save_base64("@@not base64@@", &path, CollisionPolicy::NextFree).unwrap_err();
        assert!(matches!(err, OutputError::Decode { .. }));
        assert!(!path.exists());
        assert_eq!(fs::read_dir(dir.path())?.count(), 0);
        Ok(())
    }

    #[test]
    fn resize_produces_exact_square() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let source = png_bytes(300, 200)?;
        for size in [16, 64, 128] {
            let path = dir.path().join(format!("icon_{size}x{size}_cup.png"));
            resize_square_png(&source, size, &path)?;
            let written = image::open(&path)?;
            assert_eq!((written.width(), written.height()), (size, size));
        }
        Ok(())
    }

    #[test]
    fn resize_rejects_non_image_source() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let err = resize_square_png(b"garbage", 64, &dir.path().join("icon.png")).unwrap_err();
        assert!(matches!(err, OutputError::ImageDecode { .. }));
        Ok(())
    }

    #[cfg(unix)]
    #[test]
    fn saved_images_are_world_readable() -> anyhow::Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fox.png");
        save_base64(&BASE64.encode(b"fox"), &path, CollisionPolicy::NextFree)?;
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, 0o644);
        Ok(())
    }

    #[test]
    fn file_appearing_after_path_choice_is_not_clobbered() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("fox.png");
        let chosen = unique_output_path(dir.path(), "fox", None, None);
        assert_eq!(chosen, path);
        fs::write(&path, b"someone else")?;

        let saved = write_bytes(b"ours", &chosen, CollisionPolicy::NextFree)?;
        assert_eq!(saved, dir.path().join("fox_1.png"));
        assert_eq!(fs::read(&path)?, b"someone else");
        assert_eq!(fs::read(&saved)?, b"ours");

        let err = write_bytes(b"ours", &path, CollisionPolicy::Fail).unwrap_err();
        assert!(matches!(err, OutputError::AlreadyExists { .. }));
        assert_eq!(fs::read(&path)?, b"someone else");

        assert_eq!(write_bytes(b"ours", &path, CollisionPolicy::Overwrite)?, path);
        assert_eq!(fs::read(&path)?, b"ours");
        assert_eq!(fs::read_dir(dir.path())?.count(), 2);
        Ok(())
    }
}
