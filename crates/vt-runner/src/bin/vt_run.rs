use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use image::{GrayImage, RgbImage};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vt_core::{Frame, Image};
use vt_pipeline::{AcquiredFrame, InspectionStep, RunStatus, StepConfig, StepSource};
use vt_tools::{ConfigError, ConfigErrors, ToolKind, default_parameters};

#[derive(Parser, Debug)]
#[command(name = "vt_run")]
#[command(about = "Run an inspection step on image files")]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Execute a step configuration against one acquisition.
    #[command(name = "run")]
    Run(RunArgs),
    /// Print the default parameters of a tool type as JSON.
    #[command(name = "describe")]
    Describe(DescribeArgs),
}

#[derive(Args, Debug, Clone)]
struct RunArgs {
    #[arg(long, required = true)]
    image: PathBuf,
    /// Step configuration; its file stem is the step name.
    #[arg(long, required = true)]
    step: PathBuf,
    #[arg(long, default_value = "out")]
    out: PathBuf,
    /// 16-bit PNG depth map.
    #[arg(long)]
    depth: Option<PathBuf>,
    /// Millimetres per depth count; a count of 0 means no return.
    #[arg(long, default_value_t = 0.01)]
    depth_scale: f32,
}

#[derive(Args, Debug, Clone)]
struct DescribeArgs {
    /// Tool type or display name, e.g. `BlobAnalysis` or "Line Fit".
    #[arg(long, required = true)]
    tool: String,
}

/// Step records stored as `<dir>/<name>.json`.
struct JsonStepDir {
    dir: PathBuf,
}

impl StepSource for JsonStepDir {
    fn load_step(&self, name: &str) -> Result<StepConfig, ConfigErrors> {
        let path = self.dir.join(format!("{name}.json"));
        let text = fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ConfigError::UnknownStep(name.to_owned()),
            _ => ConfigError::Parse(format!("{}: {e}", path.display())),
        })?;
        let mut cfg = StepConfig::from_json(&text)?;
        if cfg.name.is_empty() {
            cfg.name = name.to_owned();
        }
        Ok(cfg)
    }
}

#[derive(Debug, Serialize)]
struct ToolSummary<'a> {
    id: u32,
    name: &'a str,
    kind: ToolKind,
    skipped: Option<&'a str>,
    success: bool,
    message: &'a str,
    output: Option<String>,
    overlay: Option<String>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let cli = Cli::parse();

    match cli.cmd {
        Command::Run(args) => run_step(args),
        Command::Describe(args) => describe(args),
    }
}

fn describe(args: DescribeArgs) -> Result<()> {
    let Ok(kind) = args.tool.parse::<ToolKind>() else {
        let known: Vec<&str> = ToolKind::ALL.iter().map(|k| k.type_name()).collect();
        bail!("unknown tool type '{}'; known: {}", args.tool, known.join(", "));
    };
    let params = default_parameters(kind);
    let text = serde_json::to_string_pretty(&params).context("serializing parameters")?;
    println!("{text}");
    Ok(())
}

fn run_step(args: RunArgs) -> Result<()> {
    let (dir, name) = split_step_path(&args.step)?;
    let source = JsonStepDir { dir };
    let mut step = InspectionStep::load(&source, &name)
        .with_context(|| format!("loading step {}", args.step.display()))?;

    let mut frame = AcquiredFrame::from_image(load_frame(&args.image)?);
    if let Some(depth) = &args.depth {
        frame = frame.with_point_cloud(load_depth(depth, args.depth_scale)?);
    }

    let outcome = step.run(&frame).context("running step")?;

    let case_dir = args.out.join(step.name());
    fs::create_dir_all(&case_dir)
        .with_context(|| format!("creating output directory {}", case_dir.display()))?;

    let mut summary = Vec::with_capacity(outcome.results.len());
    for run in &outcome.results {
        let stem = format!("{:02}_{}", run.tool_id, run.kind.type_name());
        let output = match &run.result.output_image {
            Some(img) => Some(save_frame(&case_dir, &format!("{stem}_output.png"), img)?),
            None => None,
        };
        let overlay = match &run.result.overlay_image {
            Some(img) => Some(save_frame(&case_dir, &format!("{stem}_overlay.png"), img)?),
            None => None,
        };
        let skipped = match &run.status {
            RunStatus::Skipped(reason) => Some(reason.as_str()),
            RunStatus::Executed => None,
        };
        tracing::info!(
            id = run.tool_id,
            tool = %run.name,
            success = run.result.success,
            "{}",
            run.result.message
        );
        summary.push(ToolSummary {
            id: run.tool_id,
            name: &run.name,
            kind: run.kind,
            skipped,
            success: run.result.success,
            message: &run.result.message,
            output,
            overlay,
        });
    }

    write_json(case_dir.join("result.json"), &outcome)?;
    write_json(case_dir.join("summary.json"), &summary)?;
    println!(
        "{}: {} of {} tools passed in {:.2} ms -> {}",
        outcome.step,
        outcome.passed_count(),
        outcome.results.len(),
        outcome.elapsed.as_secs_f64() * 1e3,
        case_dir.display()
    );
    Ok(())
}

fn split_step_path(path: &Path) -> Result<(PathBuf, String)> {
    let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
        bail!("step path {} has no file name", path.display());
    };
    let dir = path
        .parent()
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    Ok((dir, name.to_owned()))
}

fn load_frame(path: &Path) -> Result<Frame> {
    let dyn_img =
        image::open(path).with_context(|| format!("opening input image {}", path.display()))?;
    let (w, h) = (dyn_img.width() as usize, dyn_img.height() as usize);
    if dyn_img.color().has_color() {
        let pixels = dyn_img
            .to_rgb8()
            .into_raw()
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect();
        let img = Image::from_vec(w, h, pixels)
            .with_context(|| format!("constructing image from {}", path.display()))?;
        Ok(Frame::Rgb8(img))
    } else {
        let img = Image::from_vec(w, h, dyn_img.to_luma8().into_raw())
            .with_context(|| format!("constructing image from {}", path.display()))?;
        Ok(Frame::Gray8(img))
    }
}

fn load_depth(path: &Path, scale: f32) -> Result<Image<f32>> {
    if !(scale.is_finite() && scale > 0.0) {
        bail!("depth scale must be positive, got {scale}");
    }
    let dyn_img =
        image::open(path).with_context(|| format!("opening depth map {}", path.display()))?;
    let luma = dyn_img.to_luma16();
    let (w, h) = luma.dimensions();
    let data = luma.into_raw().into_iter().map(|v| v as f32 * scale).collect();
    Image::from_vec(w as usize, h as usize, data)
        .with_context(|| format!("constructing depth map from {}", path.display()))
}

fn save_frame(dir: &Path, file: &str, frame: &Frame) -> Result<String> {
    let path = dir.join(file);
    let (w, h) = (frame.width() as u32, frame.height() as u32);
    let saved = match frame {
        Frame::Gray8(img) => GrayImage::from_raw(w, h, img.data().to_vec())
            .context("constructing GrayImage from raw bytes")?
            .save(&path),
        Frame::Rgb8(img) => RgbImage::from_raw(w, h, img.data().iter().flatten().copied().collect())
            .context("constructing RgbImage from raw bytes")?
            .save(&path),
        Frame::Depth32(img) => GrayImage::from_raw(w, h, depth_to_u8_vis(img.data()))
            .context("constructing GrayImage from depth")?
            .save(&path),
    };
    saved.with_context(|| format!("saving image {}", path.display()))?;
    Ok(file.to_owned())
}

/// Stretches the finite non-zero range to 1..=255; invalid samples are 0.
fn depth_to_u8_vis(data: &[f32]) -> Vec<u8> {
    let valid = |v: f32| v.is_finite() && v != 0.0;
    let (lo, hi) = data
        .iter()
        .copied()
        .filter(|&v| valid(v))
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    let span = hi - lo;
    data.iter()
        .map(|&v| match (valid(v), span > 1e-12) {
            (false, _) => 0,
            (true, false) => 255,
            (true, true) => (1.0 + (v - lo) / span * 254.0).round().clamp(1.0, 255.0) as u8,
        })
        .collect()
}

fn write_json(path: PathBuf, value: &impl Serialize) -> Result<()> {
    let bytes = serde_json::to_vec_pretty(value).context("serializing json")?;
    fs::write(&path, bytes).with_context(|| format!("writing json {}", path.display()))
}
