//! Dominant color of an image region by k-means clustering.

use cuesight_core::Bgr;
use image::{GenericImageView, Rgb};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KMeansParams {
    pub clusters: usize,
    /// Iteration cap per attempt.
    pub max_iter: usize,
    /// Stop once no center moves farther than this (in 8-bit units).
    pub epsilon: f32,
    /// Independent random restarts; the most compact result wins.
    pub attempts: usize,
    pub seed: u64,
}

impl Default for KMeansParams {
    fn default() -> Self {
        Self {
            clusters: 1,
            max_iter: 5,
            epsilon: 1.0,
            attempts: 5,
            seed: 0x5eed,
        }
    }
}

type Sample = [f32; 3];

#[inline]
fn dist_sq(a: &Sample, b: &Sample) -> f32 {
    let d0 = a[0] - b[0];
    let d1 = a[1] - b[1];
    let d2 = a[2] - b[2];
    d0 * d0 + d1 * d1 + d2 * d2
}

/// Result of one clustering run.
#[derive(Clone, Debug)]
struct Clustering {
    centers: Vec<Sample>,
    sizes: Vec<usize>,
    compactness: f32,
}

fn nearest(centers: &[Sample], s: &Sample) -> (usize, f32) {
    centers
        .iter()
        .enumerate()
        .map(|(i, c)| (i, dist_sq(c, s)))
        .min_by(|a, b| a.1.total_cmp(&b.1))
        .unwrap_or((0, 0.0))
}

fn run_attempt(samples: &[Sample], k: usize, params: &KMeansParams, rng: &mut StdRng) -> Clustering {
    // Random centers inside the samples' bounding box.
    let mut lo = [f32::MAX; 3];
    let mut hi = [f32::MIN; 3];
    for s in samples {
        for c in 0..3 {
            lo[c] = lo[c].min(s[c]);
            hi[c] = hi[c].max(s[c]);
        }
    }
    let mut centers: Vec<Sample> = (0..k)
        .map(|_| [0, 1, 2].map(|c| lo[c] + rng.random::<f32>() * (hi[c] - lo[c])))
        .collect();

    let eps_sq = params.epsilon * params.epsilon;
    let mut sizes = vec![0usize; k];
    for _ in 0..params.max_iter.max(1) {
        let mut sums = vec![[0f64; 3]; k];
        sizes.iter_mut().for_each(|n| *n = 0);
        for s in samples {
            let (i, _) = nearest(&centers, s);
            sizes[i] += 1;
            for c in 0..3 {
                sums[i][c] += s[c] as f64;
            }
        }

        let mut max_shift = 0f32;
        for i in 0..k {
            let next = if sizes[i] == 0 {
                // Re-seed an empty cluster on a random sample.
                samples[rng.random_range(0..samples.len())]
            } else {
                let n = sizes[i] as f64;
                [0, 1, 2].map(|c| (sums[i][c] / n) as f32)
            };
            max_shift = max_shift.max(dist_sq(&centers[i], &next));
            centers[i] = next;
        }
        if max_shift <= eps_sq {
            break;
        }
    }

    sizes.iter_mut().for_each(|n| *n = 0);
    let mut compactness = 0f32;
    for s in samples {
        let (i, d) = nearest(&centers, s);
        sizes[i] += 1;
        compactness += d;
    }
    Clustering {
        centers,
        sizes,
        compactness,
    }
}

/// Dominant color of `region`, or `None` if the region has no pixels.
pub fn try_dominant_color<V>(region: &V, params: &KMeansParams) -> Option<Bgr>
where
    V: GenericImageView<Pixel = Rgb<u8>>,
{
    let samples: Vec<Sample> = region
        .pixels()
        .map(|(_, _, Rgb([r, g, b]))| [b as f32, g as f32, r as f32])
        .collect();
    if samples.is_empty() {
        return None;
    }

    let k = params.clusters.clamp(1, samples.len());
    let mut rng = StdRng::seed_from_u64(params.seed);
    let best = (0..params.attempts.max(1))
        .map(|_| run_attempt(&samples, k, params, &mut rng))
        .min_by(|a, b| a.compactness.total_cmp(&b.compactness))?;

    let (largest, _) = best
        .sizes
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    let c = best.centers[largest];
    let q = |v: f32| v.round().clamp(0.0, 255.0) as u8;
    Some(Bgr::new(q(c[0]), q(c[1]), q(c[2])))
}

/// Dominant color of `region`; an empty region yields black.
pub fn dominant_color<V>(region: &V, params: &KMeansParams) -> Bgr
where
    V: GenericImageView<Pixel = Rgb<u8>>,
{
    try_dominant_color(region, params).unwrap_or_else(|| {
        log::debug!("dominant color requested for an empty region");
        Bgr::BLACK
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    #[test]
    fn constant_region_returns_its_color() {
        let img = RgbImage::from_pixel(17, 9, Rgb([12, 200, 34]));
        let c = dominant_color(&img, &KMeansParams::default());
        assert_eq!(c, Bgr::new(34, 200, 12));
    }

    #[test]
    fn single_pixel_and_empty_regions() {
        let img = RgbImage::from_pixel(1, 1, Rgb([1, 2, 3]));
        assert_eq!(dominant_color(&img, &KMeansParams::default()), Bgr::new(3, 2, 1));

        let empty = RgbImage::new(0, 0);
        assert_eq!(try_dominant_color(&empty, &KMeansParams::default()), None);
        assert_eq!(dominant_color(&empty, &KMeansParams::default()), Bgr::BLACK);
    }

    #[test]
    fn single_cluster_is_the_rounded_mean() {
        let mut img = RgbImage::from_pixel(4, 1, Rgb([0, 0, 0]));
        img.put_pixel(0, 0, Rgb([10, 100, 255]));
        // mean = (2.5, 25, 63.75)
        let c = dominant_color(&img, &KMeansParams::default());
        assert_eq!(c, Bgr::new(64, 25, 3));
    }

    #[test]
    fn two_clusters_pick_the_larger_one() {
        let mut img = RgbImage::from_pixel(10, 10, Rgb([200, 20, 20]));
        for x in 0..10 {
            for y in 0..3 {
                img.put_pixel(x, y, Rgb([10, 10, 240]));
            }
        }
        let params = KMeansParams {
            clusters: 2,
            max_iter: 20,
            ..KMeansParams::default()
        };
        assert_eq!(dominant_color(&img, &params), Bgr::new(20, 20, 200));
    }

    #[test]
    fn works_on_sub_image_views() {
        let mut img = RgbImage::from_pixel(20, 20, Rgb([0, 0, 0]));
        for y in 5..10 {
            for x in 5..10 {
                img.put_pixel(x, y, Rgb([250, 250, 250]));
            }
        }
        let view = image::imageops::crop_imm(&img, 5, 5, 5, 5);
        assert_eq!(
            dominant_color(&*view, &KMeansParams::default()),
            Bgr::new(250, 250, 250)
        );
    }
}
