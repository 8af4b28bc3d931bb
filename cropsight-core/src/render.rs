use std::path::Path;

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::{
    drawing::{draw_hollow_rect_mut, draw_text_mut},
    rect::Rect,
};
use snafu::ResultExt;

use crate::{
    consts::{CAPTION_OFFSET, CAPTION_SCALE, DEFAULT_COLOR, HIGHLIGHT_COLOR, HIGHLIGHT_LABEL},
    detection::{Classification, Detection},
    error::*,
};

/// Loads a TrueType font used for overlay captions.
pub fn load_font(path: &Path) -> Result<FontArc, CropsightError> {
    let bytes = std::fs::read(path).context(IoReadSnafu {
        path: path.to_string_lossy(),
    })?;
    FontArc::try_from_vec(bytes).context(FontSnafu {
        path: path.to_string_lossy(),
    })
}

pub fn label_color(classification: &Classification) -> Rgb<u8> {
    if classification.label_id == HIGHLIGHT_LABEL {
        Rgb(HIGHLIGHT_COLOR)
    } else {
        Rgb(DEFAULT_COLOR)
    }
}

/// Draws a detection box, 2px thick, and its `"<label> <prob>"` caption above it.
pub fn draw_detection(
    image: &mut RgbImage,
    detection: &Detection,
    classification: &Classification,
    font: Option<&FontArc>,
) {
    let pixels = detection.bbox.to_pixels();
    let x = pixels.x_min as i32;
    let y = pixels.y_min as i32;
    let width = (pixels.x_max - pixels.x_min) as u32;
    let height = (pixels.y_max - pixels.y_min) as u32;

    if width == 0 || height == 0 {
        return;
    }

    let color = label_color(classification);

    // Draw nested rectangles to create thicker lines
    for offset in 0..2 {
        let thick_rect = Rect::at(x - offset, y - offset)
            .of_size(width + (offset * 2) as u32, height + (offset * 2) as u32);
        draw_hollow_rect_mut(image, thick_rect, color);
    }

    let Some(font) = font else {
        return;
    };

    let caption = format!("{} {:.2}", classification.label, classification.proba);
    let text_y = (y - CAPTION_OFFSET - CAPTION_SCALE as i32).max(0);
    draw_text_mut(
        image,
        color,
        x.max(0),
        text_y,
        PxScale::from(CAPTION_SCALE),
        font,
        &caption,
    );
}

/// Saves an overlay or heatmap next to the other per-image artefacts.
pub fn save(image: &RgbImage, path: &Path) -> Result<(), CropsightError> {
    image.save(path).context(ImageWriteSnafu {
        path: path.to_string_lossy(),
    })
}
