//! PNG rendering command.

use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;

use anyhow::{Context, Result};
use scatter_opt::{CompositeRenderer, OptimizerConfig};

use super::{design_from_args, load_points};
use crate::{DataArgs, DesignArgs};

pub fn run(
    mut config: OptimizerConfig,
    data: &DataArgs,
    design: &DesignArgs,
    output: PathBuf,
    verbose: bool,
) -> Result<()> {
    let points = load_points(data, verbose)?;
    let design = design_from_args(design, &points);

    config.render.max_width = config.render.max_width.max(design.width);
    config.render.max_height = config.render.max_height.max(design.height);
    config.render.max_marker_size = config.render.max_marker_size.max(design.marker_size);

    let mut renderer = CompositeRenderer::new(config.render);
    renderer.set_data(&points);
    let image = renderer.render(&design).context("Failed to render design")?;

    let mut bytes = Vec::with_capacity(image.width() * image.height() * 4);
    for row in image.rows() {
        for px in row {
            bytes.extend_from_slice(&[px.r, px.g, px.b, px.a]);
        }
    }

    let file = File::create(&output)
        .with_context(|| format!("Failed to create {}", output.display()))?;
    let mut encoder = png::Encoder::new(
        BufWriter::new(file),
        image.width() as u32,
        image.height() as u32,
    );
    encoder.set_color(png::ColorType::Rgba);
    encoder.set_depth(png::BitDepth::Eight);
    let mut writer = encoder
        .write_header()
        .context("Failed to write PNG header")?;
    writer
        .write_image_data(&bytes)
        .context("Failed to write PNG data")?;

    println!(
        "Rendered {}x{} to: {}",
        image.width(),
        image.height(),
        output.display()
    );
    Ok(())
}
