//! Scatterplot rendering.
//!
//! - [`PointCountGrid`]: fixed-resolution histogram of one class
//! - [`ClassLayerRenderer`]: marker stamping and ink lookup for one class
//! - [`CompositeRenderer`]: gamma-correct blending of all classes
//!
//! Every buffer is allocated once at the configured maximum canvas size.
//! Render calls hand out views cropped to the design's size; those views
//! borrow the renderer and end before the next call.

pub mod composite;
pub mod grid;
pub mod layer;

pub use composite::{CompositeRenderer, GAMMA};
pub use grid::PointCountGrid;
pub use layer::{ClassLayerRenderer, InkLut};
