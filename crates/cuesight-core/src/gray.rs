use image::RgbImage;

/// Borrowed single-channel 8-bit image, row-major.
#[derive(Clone, Copy, Debug)]
pub struct GrayImageView<'a> {
    pub width: usize,
    pub height: usize,
    pub data: &'a [u8], // row-major, len = w*h
}

#[derive(Clone, Debug)]
pub struct GrayImage {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

impl GrayImage {
    pub fn view(&self) -> GrayImageView<'_> {
        GrayImageView {
            width: self.width,
            height: self.height,
            data: &self.data,
        }
    }
}

impl<'a> From<&'a image::GrayImage> for GrayImageView<'a> {
    fn from(img: &'a image::GrayImage) -> Self {
        Self {
            width: img.width() as usize,
            height: img.height() as usize,
            data: img.as_raw(),
        }
    }
}

/// BT.601 luma of an RGB image, rounded to the nearest integer.
///
/// Uses the same 0.299/0.587/0.114 weights as common camera pipelines so
/// thresholds tuned on other tooling carry over.
pub fn luminance(img: &RgbImage) -> image::GrayImage {
    let (w, h) = img.dimensions();
    image::GrayImage::from_fn(w, h, |x, y| {
        let [r, g, b] = img.get_pixel(x, y).0;
        let luma = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
        image::Luma([((luma + 500) / 1000) as u8])
    })
}

#[inline]
fn get_gray(src: &GrayImageView<'_>, x: i32, y: i32) -> u8 {
    if x < 0 || y < 0 || x >= src.width as i32 || y >= src.height as i32 {
        return 0;
    }
    src.data[y as usize * src.width + x as usize]
}

/// Bilinear sample; pixels outside the image read as zero.
#[inline]
pub fn sample_bilinear(src: &GrayImageView<'_>, x: f32, y: f32) -> f32 {
    let x0 = x.floor() as i32;
    let y0 = y.floor() as i32;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let p00 = get_gray(src, x0, y0) as f32;
    let p10 = get_gray(src, x0 + 1, y0) as f32;
    let p01 = get_gray(src, x0, y0 + 1) as f32;
    let p11 = get_gray(src, x0 + 1, y0 + 1) as f32;

    let a = p00 + fx * (p10 - p00);
    let b = p01 + fx * (p11 - p01);
    a + fy * (b - a)
}

#[inline]
pub fn sample_bilinear_u8(src: &GrayImageView<'_>, x: f32, y: f32) -> u8 {
    sample_bilinear(src, x, y).round().clamp(0.0, 255.0) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn luminance_matches_bt601_weights() {
        let mut img = RgbImage::new(3, 1);
        img.put_pixel(0, 0, Rgb([255, 0, 0]));
        img.put_pixel(1, 0, Rgb([0, 255, 0]));
        img.put_pixel(2, 0, Rgb([255, 255, 255]));
        let y = luminance(&img);
        assert_eq!(y.get_pixel(0, 0).0[0], 76);
        assert_eq!(y.get_pixel(1, 0).0[0], 150);
        assert_eq!(y.get_pixel(2, 0).0[0], 255);
    }

    #[test]
    fn bilinear_blends_with_zero_outside() {
        let img = GrayImage {
            width: 2,
            height: 1,
            data: vec![100, 200],
        };
        let view = img.view();
        assert_eq!(sample_bilinear_u8(&view, 0.5, 0.0), 150);
        assert_eq!(sample_bilinear_u8(&view, 1.5, 0.0), 100);
        assert_eq!(sample_bilinear_u8(&view, -1.0, 0.0), 0);
    }
}
