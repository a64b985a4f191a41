//! Title compositing on local files.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use musabi_core::config::DEFAULT_FONT_PATH;
use musabi_core::image::{decode_image, encode_png, to_png};
use musabi_core::{validate_image, TitleCompositor};

/// Render the title image for `image` into `out`, and save the source as a
/// PNG next to it with an `_origin` suffix.
pub fn compose_file(image: &Path, title: &str, out: &Path, font: Option<&Path>) -> Result<()> {
    let source =
        fs::read(image).with_context(|| format!("Failed to read {}", image.display()))?;
    validate_image(&source)?;

    let font_path = font.map(Path::to_path_buf).unwrap_or_else(|| {
        env::var("MUSABI_FONT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_FONT_PATH))
    });
    let compositor = TitleCompositor::from_path(&font_path);

    let decoded = decode_image(&source)?;
    let composed = compositor.compose(&decoded, title.trim());

    if let Some(parent) = out.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    fs::write(out, encode_png(&composed)?)
        .with_context(|| format!("Failed to write {}", out.display()))?;

    let origin = origin_path(out);
    fs::write(&origin, to_png(&source)?)
        .with_context(|| format!("Failed to write {}", origin.display()))?;

    tracing::info!(
        title = %out.display(),
        origin = %origin.display(),
        has_font = compositor.has_font(),
        "Wrote title image"
    );
    Ok(())
}

fn origin_path(out: &Path) -> PathBuf {
    let stem = out
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "title".to_string());
    out.with_file_name(format!("{}_origin.png", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_origin_path_sits_beside_output() {
        assert_eq!(
            origin_path(Path::new("out/dish.png")),
            PathBuf::from("out/dish_origin.png")
        );
        assert_eq!(origin_path(Path::new("dish")), PathBuf::from("dish_origin.png"));
    }
}
