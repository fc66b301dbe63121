//! scatter-opt CLI - Scatterplot design optimizer

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use scatter_opt::{MarkerShape, RangeSpec, WeightPreset};

mod commands;

/// Find the scatterplot design that best shows a labeled point set.
#[derive(Parser)]
#[command(name = "scatter-opt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// JSON optimizer config (renderer limits, metric parameters)
    #[arg(long, global = true, env = "SCATTER_OPT_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Point data source.
#[derive(Args, Debug)]
pub struct DataArgs {
    /// Input CSV file with a header row
    #[arg(short, long)]
    input: PathBuf,

    /// X column name (defaults to the first column)
    #[arg(long)]
    x_col: Option<String>,

    /// Y column name (defaults to the second column)
    #[arg(long)]
    y_col: Option<String>,

    /// Class column name
    #[arg(long)]
    class_col: Option<String>,

    /// Outlier flag column name
    #[arg(long)]
    outlier_col: Option<String>,
}

/// A single design.
#[derive(Args, Debug)]
pub struct DesignArgs {
    /// Canvas width in pixels
    #[arg(long, default_value_t = 400)]
    width: usize,

    /// Canvas height in pixels
    #[arg(long, default_value_t = 400)]
    height: usize,

    /// Marker shape (circle, triangle-up, square)
    #[arg(long, default_value = "circle")]
    marker: MarkerShape,

    /// Marker size in pixels
    #[arg(long, default_value_t = 6)]
    size: u32,

    /// Marker opacity (0-255)
    #[arg(long, default_value_t = 128)]
    opacity: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Sweep a design space and report the best design
    Optimize {
        #[command(flatten)]
        data: DataArgs,

        /// Available canvas width
        #[arg(long, default_value_t = 400)]
        width: usize,

        /// Available canvas height
        #[arg(long, default_value_t = 400)]
        height: usize,

        /// Marker shape (circle, triangle-up, square)
        #[arg(long, default_value = "circle")]
        marker: MarkerShape,

        /// Aspect diff range as min:max:step
        #[arg(long, default_value = "-0.6:0.6:0.2", value_parser = parse_range, allow_hyphen_values = true)]
        aspect: RangeSpec,

        /// Marker size range as min:max:step
        #[arg(long, default_value = "2:12:2", value_parser = parse_range, allow_hyphen_values = true)]
        sizes: RangeSpec,

        /// Marker opacity range as min:max:step
        #[arg(long, default_value = "15:255:15", value_parser = parse_range, allow_hyphen_values = true)]
        opacities: RangeSpec,

        /// Ten comma-separated measure weights
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        weights: Option<Vec<f64>>,

        /// Named weight set (uniform, correlation, clusters, outliers, density)
        #[arg(long, conflicts_with = "weights")]
        preset: Option<WeightPreset>,

        /// Evaluate batches on all cores
        #[arg(long)]
        parallel: bool,

        /// Write the JSON report here
        #[arg(short, long)]
        report: Option<PathBuf>,

        /// Write a CSV row per evaluated design here
        #[arg(long)]
        csv: Option<PathBuf>,
    },

    /// Print the measures and score of one design
    Evaluate {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        design: DesignArgs,

        /// Ten comma-separated measure weights
        #[arg(long, value_delimiter = ',', allow_hyphen_values = true)]
        weights: Option<Vec<f64>>,

        /// Named weight set (uniform, correlation, clusters, outliers, density)
        #[arg(long, conflicts_with = "weights")]
        preset: Option<WeightPreset>,
    },

    /// Render one design to a PNG file
    Render {
        #[command(flatten)]
        data: DataArgs,

        #[command(flatten)]
        design: DesignArgs,

        /// Output PNG file
        #[arg(short, long)]
        output: PathBuf,
    },
}

fn parse_range(s: &str) -> Result<RangeSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let parse = |p: &str| {
        p.trim()
            .parse::<f64>()
            .map_err(|e| format!("invalid number '{p}': {e}"))
    };
    match parts.as_slice() {
        [value] => Ok(RangeSpec::fixed(parse(value)?)),
        [min, max, step] => Ok(RangeSpec::new(parse(min)?, parse(max)?, parse(step)?)),
        _ => Err(format!("expected min:max:step, got '{s}'")),
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Optimize {
            data,
            width,
            height,
            marker,
            aspect,
            sizes,
            opacities,
            weights,
            preset,
            parallel,
            report,
            csv,
        } => commands::optimize::run(
            config,
            &data,
            commands::optimize::SpaceArgs {
                width,
                height,
                marker,
                aspect,
                sizes,
                opacities,
            },
            commands::parse_weights(weights, preset)?,
            parallel,
            report,
            csv,
            cli.verbose,
        ),
        Commands::Evaluate {
            data,
            design,
            weights,
            preset,
        } => commands::evaluate::run(
            config,
            &data,
            &design,
            commands::parse_weights(weights, preset)?,
            cli.verbose,
        ),
        Commands::Render {
            data,
            design,
            output,
        } => commands::render::run(config, &data, &design, output, cli.verbose),
    }
}
