//! Perceptual metrics used to score designs.
//!
//! - **Windowed SSIM** ([`ssim`]): similarity of two grayscale images, used
//!   to measure how much removing a class changes the plot (1 = identical,
//!   so a low value means the class stands out).
//! - **Ellipse fit** ([`ellipse`]): principal-axis ellipse of the raw data
//!   and of the rendered layer's edges, used for the perceived-correlation
//!   measures.

pub mod ellipse;
pub mod ssim;

pub use ellipse::{EllipseDetector, EllipseFit, fit_points};
pub use ssim::{WindowedSsim, mean_ssim};
