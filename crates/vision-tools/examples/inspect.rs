//! Example: a locate-then-measure step on synthetic parts.
//!
//! Renders a plate with a bored hole at a jittered position, locates the
//! hole with a circle fit, then counts small drill marks in an ROI that
//! follows the hole through a `Coordinates` connection.
//!
//! Run from the workspace root:
//!   cargo run -p vision-tools --example inspect -- --help
//!   cargo run -p vision-tools --example inspect -- --frames 5

use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;
use serde::Serialize;
use vision_tools::{
    AcquiredFrame, ConnectionConfig, ConnectionType, DataValue, Frame, FrameQueue, FrameSource,
    Image, InspectionStep, StepConfig, ToolConfig,
};

#[derive(Parser, Debug)]
#[command(about = "Run a locate-then-measure step on synthetic parts")]
struct Args {
    #[arg(long, default_value_t = 3)]
    frames: usize,

    /// Print the step configuration as JSON and exit.
    #[arg(long)]
    print_config: bool,

    /// Output JSON path for per-frame measurements.
    #[arg(long)]
    out: Option<String>,
}

#[derive(Serialize)]
struct FrameReport {
    frame: usize,
    elapsed_ms: f64,
    passed: bool,
    hole: Option<(f64, f64, f64)>,
    marks: Option<f64>,
}

/// Dark plate, bright hole of radius 30 at `(cx, cy)`, three drill marks
/// to the right of it.
fn render_part(cx: f32, cy: f32) -> Frame {
    Frame::Gray8(Image::from_fn(320, 240, |x, y| {
        let (px, py) = (x as f32, y as f32);
        let d2 = |ox: f32, oy: f32| (px - ox) * (px - ox) + (py - oy) * (py - oy);
        if d2(cx, cy) <= 900.0 {
            230
        } else if [-20.0, 0.0, 20.0].iter().any(|&dy| d2(cx + 60.0, cy + dy) <= 16.0) {
            200
        } else {
            40
        }
    }))
}

fn step_config() -> StepConfig {
    let mut locate = ToolConfig::new(1, "CircleFit");
    locate.name = "Locate hole".to_owned();
    for (key, value) in [("CenterX", 160.0), ("CenterY", 120.0), ("Radius", 34.0), ("SearchLength", 30.0)] {
        locate.parameters.insert(key.to_owned(), DataValue::Float(value));
    }

    let mut marks = ToolConfig::new(2, "BlobAnalysis");
    marks.name = "Drill marks".to_owned();
    marks.sequence = 1;
    marks.use_roi = true;
    // Centred on the nominal hole; the reference re-centres it each frame.
    marks.roi_x = 100;
    marks.roi_y = 70;
    marks.roi_width = 161;
    marks.roi_height = 101;
    marks.parameters.insert("MinArea".to_owned(), DataValue::Int(20));
    marks.parameters.insert("MaxArea".to_owned(), DataValue::Int(200));
    marks.connections.push(ConnectionConfig {
        source_tool_id: 1,
        connection_type: ConnectionType::Coordinates,
    });

    StepConfig {
        name: "Plate".to_owned(),
        tools: vec![locate, marks],
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    if args.frames == 0 {
        bail!("--frames must be > 0");
    }

    let cfg = step_config();
    if args.print_config {
        println!("{}", cfg.to_json().context("serializing step")?);
        return Ok(());
    }
    let mut step = InspectionStep::from_config(&cfg).context("building step")?;

    let mut source = FrameQueue::new((0..args.frames).map(|i| {
        let t = i as f32;
        AcquiredFrame::from_image(render_part(150.0 + 7.0 * (1.3 * t).sin(), 115.0 + 9.0 * (0.7 * t).cos()))
    }));

    let mut reports = Vec::with_capacity(args.frames);
    let total_start = Instant::now();
    for frame in 0..args.frames {
        let acquired = source.acquire();
        let t0 = Instant::now();
        let out = step.run(&acquired).context("running step")?;
        let elapsed_ms = t0.elapsed().as_secs_f64() * 1e3;

        let hole = out.get(1).map(|r| &r.result).and_then(|r| {
            Some((r.get_f64("CenterX")?, r.get_f64("CenterY")?, r.get_f64("Radius")?))
        });
        let marks = out.get(2).and_then(|r| r.result.get_f64("BlobCount"));
        match hole {
            Some((x, y, r)) => println!(
                "  frame {frame}: hole ({x:.2}, {y:.2}) r={r:.2}, marks={}  ({elapsed_ms:.2} ms)",
                marks.unwrap_or(0.0)
            ),
            None => println!("  frame {frame}: hole not found  ({elapsed_ms:.2} ms)"),
        }
        reports.push(FrameReport {
            frame,
            elapsed_ms,
            passed: out.all_passed(),
            hole,
            marks,
        });
    }
    let total_ms = total_start.elapsed().as_secs_f64() * 1e3;
    println!("{} frames in {total_ms:.2} ms", args.frames);

    if let Some(path) = args.out {
        let bytes = serde_json::to_vec_pretty(&reports).context("serializing reports")?;
        std::fs::write(&path, bytes).with_context(|| format!("writing {path}"))?;
        println!("results written to {path}");
    }
    Ok(())
}
