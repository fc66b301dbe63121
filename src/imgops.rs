//! Grayscale image primitives.
//!
//! Resampling, blur and edge detection come from `image` and `imageproc`.
//! This module bridges the `imgref` crops the renderer hands out to the
//! `GrayImage` buffers those crates work on, and adds the closed-form
//! eigen-decomposition of a symmetric 2×2 matrix.

use image::{GrayImage, imageops};
use imgref::ImgRef;

/// Copy an `imgref` view into `buf`, reusing its allocation.
pub fn load_gray(src: ImgRef<'_, u8>, buf: &mut GrayImage) {
    let (w, h) = (src.width(), src.height());
    let mut raw = std::mem::take(buf).into_raw();
    raw.clear();
    raw.reserve(w * h);
    for row in src.rows() {
        raw.extend_from_slice(row);
    }
    *buf = GrayImage::from_raw(w as u32, h as u32, raw)
        .unwrap_or_else(|| GrayImage::new(w as u32, h as u32));
}

/// Area-resample `src` to `width × height`.
///
/// Every destination pixel is the coverage-weighted mean of the source
/// pixels its footprint overlaps.
#[must_use]
pub fn resize_area(src: &GrayImage, width: usize, height: usize) -> GrayImage {
    if (src.width() as usize, src.height() as usize) == (width, height) {
        return src.clone();
    }
    imageops::thumbnail(src, width as u32, height as u32)
}

/// Gaussian blur; a non-positive sigma leaves the image unchanged.
#[must_use]
pub fn gaussian_blur(src: &GrayImage, sigma: f32) -> GrayImage {
    if sigma > 0.0 && src.width() > 0 && src.height() > 0 {
        imageproc::filter::gaussian_blur_f32(src, sigma)
    } else {
        src.clone()
    }
}

/// Canny edge map with hysteresis thresholds; edge pixels are 255.
#[must_use]
pub fn canny(src: &GrayImage, low: f32, high: f32) -> GrayImage {
    if src.width() == 0 || src.height() == 0 {
        return GrayImage::new(src.width(), src.height());
    }
    imageproc::edges::canny(src, low.min(high), low.max(high))
}

/// Eigen-decomposition of a symmetric 2×2 matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Eigen2 {
    /// Eigenvalues, largest first.
    pub values: [f64; 2],
    /// Unit eigenvectors, `vectors[i]` belongs to `values[i]`.
    pub vectors: [[f64; 2]; 2],
}

/// Decompose `[[a, b], [b, c]]`.
#[must_use]
pub fn eigen_symmetric_2x2(a: f64, b: f64, c: f64) -> Eigen2 {
    let half_trace = (a + c) / 2.0;
    let disc = (((a - c) / 2.0).powi(2) + b * b).sqrt();
    let l1 = half_trace + disc;
    let l2 = half_trace - disc;

    let v1 = if b.abs() > f64::EPSILON * (a.abs() + c.abs()).max(1.0) {
        normalize([l1 - c, b])
    } else if a >= c {
        [1.0, 0.0]
    } else {
        [0.0, 1.0]
    };
    let v2 = [-v1[1], v1[0]];

    Eigen2 {
        values: [l1, l2],
        vectors: [v1, v2],
    }
}

fn normalize(v: [f64; 2]) -> [f64; 2] {
    let len = v[0].hypot(v[1]);
    [v[0] / len, v[1] / len]
}

#[cfg(test)]
mod tests {
    use super::*;
    use imgref::ImgVec;

    fn mean(img: &GrayImage) -> f64 {
        img.iter().map(|&p| f64::from(p)).sum::<f64>() / img.len() as f64
    }

    #[test]
    fn test_load_gray_copies_crop() {
        let full = ImgVec::new((0..36).map(|i| i as u8).collect(), 6, 6);
        let mut buf = GrayImage::new(1, 1);
        load_gray(full.sub_image(2, 1, 3, 2), &mut buf);
        assert_eq!(buf.dimensions(), (3, 2));
        assert_eq!(buf.as_raw().as_slice(), &[8, 9, 10, 14, 15, 16]);
    }

    #[test]
    fn test_resize_area_preserves_mean() {
        let src = GrayImage::from_fn(16, 8, |x, y| image::Luma([((x + y * 16) * 7 % 256) as u8]));
        let dst = resize_area(&src, 4, 2);
        assert_eq!(dst.dimensions(), (4, 2));
        let (src_mean, dst_mean) = (mean(&src), mean(&dst));
        assert!((src_mean - dst_mean).abs() < 2.0, "{src_mean} vs {dst_mean}");
    }

    #[test]
    fn test_resize_area_box_average() {
        let src = GrayImage::from_raw(4, 1, vec![0, 100, 200, 255]).unwrap();
        let dst = resize_area(&src, 2, 1);
        assert!(dst.as_raw()[0].abs_diff(50) <= 1, "{:?}", dst.as_raw());
        assert!(dst.as_raw()[1].abs_diff(228) <= 1, "{:?}", dst.as_raw());
    }

    #[test]
    fn test_gaussian_blur_constant_image() {
        let img = GrayImage::from_pixel(10, 10, image::Luma([77]));
        let blurred = gaussian_blur(&img, 1.0);
        assert!(blurred.iter().all(|&p| p.abs_diff(77) <= 1));
        assert_eq!(gaussian_blur(&img, 0.0), img);
    }

    #[test]
    fn test_canny_finds_square_outline() {
        let img = GrayImage::from_fn(32, 32, |x, y| {
            let inside = (8..24).contains(&x) && (8..24).contains(&y);
            image::Luma([if inside { 0 } else { 255 }])
        });
        let edges = canny(&img, 25.5, 51.0);

        assert!(edges.iter().any(|&p| p != 0));
        // Interior and far background stay empty.
        assert_eq!(edges.get_pixel(16, 16).0[0], 0);
        assert_eq!(edges.get_pixel(2, 2).0[0], 0);
    }

    #[test]
    fn test_canny_flat_image_has_no_edges() {
        let img = GrayImage::from_pixel(20, 20, image::Luma([128]));
        assert!(canny(&img, 51.0, 25.5).iter().all(|&p| p == 0));
    }

    #[test]
    fn test_eigen_diagonal() {
        let e = eigen_symmetric_2x2(1.0, 0.0, 4.0);
        assert_eq!(e.values, [4.0, 1.0]);
        assert_eq!(e.vectors[0], [0.0, 1.0]);
    }

    #[test]
    fn test_eigen_rotated() {
        // Covariance of a cloud elongated along the diagonal.
        let e = eigen_symmetric_2x2(2.0, 1.0, 2.0);
        assert!((e.values[0] - 3.0).abs() < 1e-12);
        assert!((e.values[1] - 1.0).abs() < 1e-12);
        let [x, y] = e.vectors[0];
        assert!((x - y).abs() < 1e-12);
        assert!((x.hypot(y) - 1.0).abs() < 1e-12);
    }
}
