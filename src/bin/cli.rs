//! CLI application for shape alignment and shape-normalized texture warping.
//!
//! Usage:
//!   aam-shape align shapes.json                       # Print aligned shapes as JSON
//!   aam-shape align shapes.json -o aligned.json       # Save to file
//!   aam-shape warp frame.json face.png instance.json -o warped.png

use aam_shape::{align_set, Shape, ShapeFrame, ShapeFrameBuilder, ShapeSet, Triangulation};
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "aam-shape")]
#[command(author, version, about = "Procrustes alignment and barycentric texture warping", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Show verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Align a set of shapes with Generalized Procrustes Analysis
    Align {
        /// JSON file with a list of shapes
        shapes: PathBuf,

        /// Maximum number of GPA iterations
        #[arg(long, default_value = "100")]
        max_iterations: usize,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Warp the texture under a shape instance into the mean-shape frame
    Warp {
        /// Frame description (JSON) or a saved binary frame (.bin)
        frame: PathBuf,

        /// Input image file
        image: PathBuf,

        /// JSON file with the instance shape in image coordinates
        instance: PathBuf,

        /// Output image file
        #[arg(short, long)]
        output: PathBuf,

        /// Save the rasterized frame for reuse
        #[arg(long)]
        save_frame: Option<PathBuf>,
    },
}

/// JSON description of a shape frame.
#[derive(Deserialize, Debug)]
struct FrameConfig {
    mean_shape: Shape,
    triangulation: Triangulation,
    #[serde(default = "default_scale")]
    scale: f64,
    /// Fit the mean shape into the raster with this margin (pixels)
    #[serde(default)]
    margin: Option<f64>,
    #[serde(default)]
    width: Option<u32>,
    #[serde(default)]
    height: Option<u32>,
}

fn default_scale() -> f64 {
    1.0
}

/// Output structure for JSON serialization
#[derive(Serialize)]
struct AlignOutput {
    shapes: usize,
    landmarks: usize,
    passes: usize,
    last_distance: f64,
    stop_reason: String,
    mean_shape: Shape,
    aligned: ShapeSet,
}

fn main() {
    let args = Args::parse();

    let level = if args.verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(Env::default().default_filter_or(level)).init();

    if let Err(e) = run(&args) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run(args: &Args) -> Result<(), Box<dyn std::error::Error>> {
    match &args.command {
        Command::Align {
            shapes,
            max_iterations,
            output,
        } => run_align(shapes, *max_iterations, output.as_deref()),
        Command::Warp {
            frame,
            image,
            instance,
            output,
            save_frame,
        } => run_warp(frame, image, instance, output, save_frame.as_deref()),
    }
}

fn run_align(
    path: &Path,
    max_iterations: usize,
    output: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading shapes from {:?}...", path);
    let mut shapes: ShapeSet = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    info!(
        "Aligning {} shapes with {} landmarks",
        shapes.len(),
        shapes.num_landmarks()
    );

    let outcome = align_set(&mut shapes, max_iterations)?;
    info!(
        "Stopped after {} passes ({:?}), distance {:.3e}",
        outcome.passes, outcome.stop_reason, outcome.last_distance
    );

    let result = AlignOutput {
        shapes: shapes.len(),
        landmarks: shapes.num_landmarks(),
        passes: outcome.passes,
        last_distance: outcome.last_distance,
        stop_reason: format!("{:?}", outcome.stop_reason),
        mean_shape: outcome.mean_shape,
        aligned: shapes,
    };
    let output_str = serde_json::to_string_pretty(&result)?;

    if let Some(path) = output {
        std::fs::write(path, &output_str)?;
        info!("Output written to {:?}", path);
    } else {
        println!("{}", output_str);
    }

    Ok(())
}

fn load_frame(path: &Path) -> Result<ShapeFrame, Box<dyn std::error::Error>> {
    if path.extension().is_some_and(|ext| ext == "bin") {
        return Ok(ShapeFrame::load(path)?);
    }

    let config: FrameConfig = serde_json::from_str(&std::fs::read_to_string(path)?)?;
    let mut builder = ShapeFrameBuilder::new()
        .mean_shape(config.mean_shape)
        .triangulation(config.triangulation)
        .scale(config.scale);
    if let Some(margin) = config.margin {
        builder = builder.fit_to_raster(margin);
    }
    if let (Some(w), Some(h)) = (config.width, config.height) {
        builder = builder.size(w, h);
    }
    Ok(builder.build()?)
}

fn run_warp(
    frame_path: &Path,
    image_path: &Path,
    instance_path: &Path,
    output: &Path,
    save_frame: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    info!("Loading frame {:?}...", frame_path);
    let frame = load_frame(frame_path)?;
    info!(
        "Frame: {}x{}, {} triangles, {} samples",
        frame.width(),
        frame.height(),
        frame.triangulation().num_triangles(),
        frame.num_samples()
    );

    if let Some(path) = save_frame {
        frame.save(path)?;
        info!("Frame saved to {:?}", path);
    }

    info!("Loading image {:?}...", image_path);
    let img = image::open(image_path)?.to_rgb8();

    let instance: Shape = serde_json::from_str(&std::fs::read_to_string(instance_path)?)?;

    let mut warped = image::RgbImage::new(frame.width(), frame.height());
    let written = frame.warp_to_reference(&instance, &img, &mut warped)?;
    info!("Wrote {} of {} samples", written, frame.num_samples());

    warped.save(output)?;
    info!("Output written to {:?}", output);

    Ok(())
}
