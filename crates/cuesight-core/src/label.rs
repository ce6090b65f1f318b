//! Text labels on annotated frames, set in an embedded DejaVu Sans Mono.

use ab_glyph::{FontArc, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_text_mut, text_size};
use std::sync::OnceLock;

static FONT_BYTES: &[u8] = include_bytes!("../assets/DejaVuSansMono.ttf");

/// Glyph height of every label, in pixels.
pub const LABEL_SCALE: f32 = 20.0;

fn font() -> Option<&'static FontArc> {
    static FONT: OnceLock<Option<FontArc>> = OnceLock::new();
    FONT.get_or_init(|| match FontArc::try_from_slice(FONT_BYTES) {
        Ok(f) => Some(f),
        Err(e) => {
            log::error!("embedded label font: {e}");
            None
        }
    })
    .as_ref()
}

/// Draw `text` with the top-left of its box at `(x, y)`. Text running off the
/// image is clipped.
pub fn draw_label(img: &mut RgbImage, text: &str, x: i32, y: i32, color: Rgb<u8>) {
    if let Some(f) = font() {
        draw_text_mut(img, color, x, y, PxScale::from(LABEL_SCALE), f, text);
    }
}

/// Width and height `text` occupies when drawn by [`draw_label`].
pub fn label_size(text: &str) -> (u32, u32) {
    font().map_or((0, 0), |f| text_size(PxScale::from(LABEL_SCALE), f, text))
}
