//! Title image rendering.
//!
//! The title image is a blurred copy of the dish photo with a translucent
//! rounded band across the middle, holding a subtitle and the dish name.

use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_text_mut, text_size};
use tracing::{debug, warn};

pub const BLUR_SIGMA: f32 = 4.0;
pub const SUBTITLE: &str = "AI-generated recipe";

/// Title text may not reach this share of the image width.
pub const MAX_TITLE_WIDTH_RATIO: f32 = 0.8;
pub const MIN_FONT_SIZE: u32 = 5;
pub const DEFAULT_FONT_SIZE: u32 = 40;
pub const MAX_SUBTITLE_FONT_SIZE: u32 = 50;
pub const MAX_FIT_ITERATIONS: u32 = 1000;

pub const BAND_MARGIN_X: u32 = 10;
pub const BAND_PADDING_Y: i32 = 20;
pub const BAND_RADIUS: u32 = 50;
pub const BAND_COLOR: Rgba<u8> = Rgba([200, 200, 200, 200]);
pub const TEXT_COLOR: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// Outcome of the font size search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FontFit {
    /// Largest size whose width stays below the limit.
    Fitted(u32),
    /// No size could be fitted; use this one anyway.
    Fallback(u32),
}

impl FontFit {
    pub fn size(self) -> u32 {
        match self {
            FontFit::Fitted(size) | FontFit::Fallback(size) => size,
        }
    }
}

/// Grow the font size from [`MIN_FONT_SIZE`] until `measure(size)` reaches
/// `max_width`, then back off one step.
///
/// If even the minimum size is too wide, the minimum is returned as a
/// fallback. If the limit is never reached within [`MAX_FIT_ITERATIONS`]
/// sizes, [`DEFAULT_FONT_SIZE`] is returned.
pub fn fit_font_size(max_width: f32, mut measure: impl FnMut(u32) -> f32) -> FontFit {
    for size in MIN_FONT_SIZE..MIN_FONT_SIZE + MAX_FIT_ITERATIONS {
        if measure(size) >= max_width {
            return if size == MIN_FONT_SIZE {
                FontFit::Fallback(MIN_FONT_SIZE)
            } else {
                FontFit::Fitted(size - 1)
            };
        }
    }
    FontFit::Fallback(DEFAULT_FONT_SIZE)
}

/// Axis-aligned rectangle in pixel coordinates; `bottom` and `right` are exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BandRect {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

/// Where each caption element lands on the image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptionLayout {
    pub title_origin: (i32, i32),
    pub subtitle_origin: (i32, i32),
    pub band: BandRect,
}

/// Center the title, stack the subtitle directly above it, and wrap both in a band.
pub fn layout_caption(
    width: u32,
    height: u32,
    title_dims: (u32, u32),
    subtitle_dims: (u32, u32),
) -> CaptionLayout {
    let (w, h) = (width as i32, height as i32);
    let (tw, th) = (title_dims.0 as i32, title_dims.1 as i32);
    let (sw, sh) = (subtitle_dims.0 as i32, subtitle_dims.1 as i32);

    let title_left = (w - tw) / 2;
    let title_top = (h - th) / 2;
    let title_bottom = title_top + th;

    let subtitle_left = (w - sw) / 2;
    let subtitle_top = title_top - sh;

    CaptionLayout {
        title_origin: (title_left, title_top),
        subtitle_origin: (subtitle_left, subtitle_top),
        band: BandRect {
            left: BAND_MARGIN_X as i32,
            top: subtitle_top - BAND_PADDING_Y,
            right: w - BAND_MARGIN_X as i32,
            bottom: title_bottom + BAND_PADDING_Y,
        },
    }
}

/// Fill a rounded rectangle, clipped to the canvas.
pub fn fill_rounded_rect(canvas: &mut RgbaImage, rect: BandRect, radius: u32, color: Rgba<u8>) {
    let (cw, ch) = (canvas.width() as i32, canvas.height() as i32);
    let rw = rect.right - rect.left;
    let rh = rect.bottom - rect.top;
    if rw <= 0 || rh <= 0 {
        return;
    }
    let r = (radius as i32).min(rw / 2).min(rh / 2);

    for y in rect.top.max(0)..rect.bottom.min(ch) {
        for x in rect.left.max(0)..rect.right.min(cw) {
            // distance into the nearest corner square, 0 outside corners
            let dx = (rect.left + r - x).max(x - (rect.right - 1 - r)).max(0);
            let dy = (rect.top + r - y).max(y - (rect.bottom - 1 - r)).max(0);
            if dx * dx + dy * dy <= r * r {
                canvas.put_pixel(x as u32, y as u32, color);
            }
        }
    }
}

/// Renders title images. Holds the caption font, if one could be loaded.
#[derive(Clone)]
pub struct TitleCompositor {
    font: Option<FontArc>,
}

impl TitleCompositor {
    pub fn new(font: FontArc) -> Self {
        Self { font: Some(font) }
    }

    /// A compositor that only blurs; used when no font is available.
    pub fn without_font() -> Self {
        Self { font: None }
    }

    /// Load the font at `path`. A missing or unreadable font degrades to
    /// [`TitleCompositor::without_font`] instead of failing.
    pub fn from_path(path: &Path) -> Self {
        let font = std::fs::read(path)
            .map_err(|e| e.to_string())
            .and_then(|bytes| FontArc::try_from_vec(bytes).map_err(|e| e.to_string()));

        match font {
            Ok(font) => Self::new(font),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Font unavailable, title text disabled");
                Self::without_font()
            }
        }
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Render the title image for `title`. Output has the input's dimensions.
    pub fn compose(&self, image: &DynamicImage, title: &str) -> RgbaImage {
        let source = image.to_rgba8();
        let mut background = imageops::blur(&source, BLUR_SIGMA);

        let Some(font) = &self.font else {
            return background;
        };

        let (width, height) = background.dimensions();
        let max_width = width as f32 * MAX_TITLE_WIDTH_RATIO;

        let fit = fit_font_size(max_width, |size| {
            text_size(PxScale::from(size as f32), font, title).0 as f32
        });
        if let FontFit::Fallback(size) = fit {
            warn!(size, title, "Title font size could not be fitted");
        }
        let title_size = fit.size();
        let subtitle_size = title_size.min(MAX_SUBTITLE_FONT_SIZE);
        debug!(title_size, subtitle_size, "Fitted title font");

        let title_scale = PxScale::from(title_size as f32);
        let subtitle_scale = PxScale::from(subtitle_size as f32);
        let layout = layout_caption(
            width,
            height,
            text_size(title_scale, font, title),
            text_size(subtitle_scale, font, SUBTITLE),
        );

        let mut overlay = RgbaImage::new(width, height);
        fill_rounded_rect(&mut overlay, layout.band, BAND_RADIUS, BAND_COLOR);
        draw_text_mut(
            &mut overlay,
            TEXT_COLOR,
            layout.subtitle_origin.0,
            layout.subtitle_origin.1,
            subtitle_scale,
            font,
            SUBTITLE,
        );
        draw_text_mut(
            &mut overlay,
            TEXT_COLOR,
            layout.title_origin.0,
            layout.title_origin.1,
            title_scale,
            font,
            title,
        );

        imageops::overlay(&mut background, &overlay, 0, 0);
        background
    }
}
