//! Camera frame to table frame.

use crate::core::{
    compute_homography, warp_perspective, CornerRole, Homography, HomographyError, TableCorners,
};
use nalgebra::Point2;

/// Homography taking the table, as seen by the camera, onto a `w x h` canvas.
///
/// The corner markers sit `offset` pixels inside the playing area along x, so
/// the right-hand markers move left by `offset` and the left-hand ones right.
/// Source corners `[TR, TL, BL, BR]` land on `[(0,0), (w,0), (w,h), (0,h)]`.
pub fn table_homography(
    corners: &TableCorners,
    offset: i32,
    (w, h): (u32, u32),
) -> Result<Homography, HomographyError> {
    let shift = offset as f32;
    let [tr, tl, bl, br] = corners.in_order([
        CornerRole::TopRight,
        CornerRole::TopLeft,
        CornerRole::BottomLeft,
        CornerRole::BottomRight,
    ]);
    let src = [
        Point2::new(tr.x - shift, tr.y),
        Point2::new(tl.x + shift, tl.y),
        Point2::new(bl.x + shift, bl.y),
        Point2::new(br.x - shift, br.y),
    ];
    let (w, h) = (w as f32, h as f32);
    let dst = [
        Point2::new(0.0, 0.0),
        Point2::new(w, 0.0),
        Point2::new(w, h),
        Point2::new(0.0, h),
    ];
    compute_homography(&src, &dst)
}

/// `image` at exactly `size`, resampled bilinearly when it differs.
pub fn fit_canvas(image: &image::RgbImage, (w, h): (u32, u32)) -> image::RgbImage {
    if image.dimensions() == (w, h) {
        image.clone()
    } else {
        image::imageops::resize(image, w, h, image::imageops::FilterType::Triangle)
    }
}

/// Warp `image` so the table fills a `size` canvas.
pub fn rectify_table(
    image: &image::RgbImage,
    corners: &TableCorners,
    offset: i32,
    size: (u32, u32),
) -> Result<image::RgbImage, HomographyError> {
    let h = table_homography(corners, offset, size)?;
    warp_perspective(image, &h, size.0, size.1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::PixelPoint;
    use image::{Rgb, RgbImage};

    fn corners() -> TableCorners {
        TableCorners {
            top_right: PixelPoint::new(20, 30),
            top_left: PixelPoint::new(300, 25),
            bottom_left: PixelPoint::new(310, 220),
            bottom_right: PixelPoint::new(15, 230),
        }
    }

    #[test]
    fn offset_corners_land_on_the_canvas_corners() {
        let h = table_homography(&corners(), 10, (200, 100)).unwrap();
        // TR shifted left, BL shifted right.
        let p = h.apply(Point2::new(10.0, 30.0));
        assert!(p.x.abs() < 1e-2 && p.y.abs() < 1e-2, "{p:?}");
        let p = h.apply(Point2::new(320.0, 220.0));
        assert!((p.x - 200.0).abs() < 1e-2 && (p.y - 100.0).abs() < 1e-2, "{p:?}");
    }

    #[test]
    fn rectified_image_has_the_requested_size() {
        let img = RgbImage::from_pixel(340, 260, Rgb([1, 2, 3]));
        let out = rectify_table(&img, &corners(), 0, (160, 90)).unwrap();
        assert_eq!(out.dimensions(), (160, 90));
        assert_eq!(out.get_pixel(80, 45).0, [1, 2, 3]);
    }

    #[test]
    fn collapsed_corners_are_degenerate() {
        let p = PixelPoint::new(50, 50);
        let c = TableCorners {
            top_left: p,
            top_right: p,
            bottom_left: p,
            bottom_right: p,
        };
        assert!(table_homography(&c, 0, (100, 100)).is_err());
    }
}
