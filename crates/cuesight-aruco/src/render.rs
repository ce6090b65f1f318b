//! Rasterize dictionary markers, for printing and for synthetic test scenes.

use crate::Dictionary;
use image::{GrayImage, Luma};

/// Render marker `id` with square cells of `cell_px` pixels, a one-cell black
/// border and `quiet_zone_cells` of white margin on every side.
///
/// Returns `None` for an unknown id or a zero cell size.
pub fn render_marker(
    dict: &Dictionary,
    id: u32,
    cell_px: u32,
    quiet_zone_cells: u32,
) -> Option<GrayImage> {
    let code = dict.code(id)?;
    if cell_px == 0 {
        return None;
    }

    let bits = dict.marker_size as u32;
    let cells = bits + 2;
    let side = (cells + 2 * quiet_zone_cells) * cell_px;
    let offset = quiet_zone_cells * cell_px;

    let img = GrayImage::from_fn(side, side, |x, y| {
        if x < offset || y < offset {
            return Luma([255]);
        }
        let (cx, cy) = ((x - offset) / cell_px, (y - offset) / cell_px);
        if cx >= cells || cy >= cells {
            return Luma([255]);
        }
        let border = cx == 0 || cy == 0 || cx + 1 == cells || cy + 1 == cells;
        let black = border || (code >> ((cy - 1) * bits + (cx - 1))) & 1 == 1;
        Luma([if black { 0 } else { 255 }])
    });
    Some(img)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builtins::builtin_dictionary;

    #[test]
    fn layout_has_border_bits_and_quiet_zone() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        let img = render_marker(&dict, 0, 4, 1).unwrap();
        assert_eq!(img.dimensions(), (32, 32));
        // quiet zone
        assert_eq!(img.get_pixel(0, 0).0[0], 255);
        assert_eq!(img.get_pixel(31, 31).0[0], 255);
        // border
        assert_eq!(img.get_pixel(4, 4).0[0], 0);
        assert_eq!(img.get_pixel(27, 27).0[0], 0);
        // first payload bit
        let first_black = dict.codes[0] & 1 == 1;
        assert_eq!(img.get_pixel(9, 9).0[0] == 0, first_black);
    }

    #[test]
    fn unknown_id_renders_nothing() {
        let dict = builtin_dictionary("DICT_4X4_50").unwrap();
        assert!(render_marker(&dict, 50, 4, 1).is_none());
        assert!(render_marker(&dict, 0, 0, 1).is_none());
    }
}
