// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Polyframe Inc.

//! stl2scad CLI

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use stl2scad::cli::Reporter;
use stl2scad::geometry::weld::DEFAULT_TOLERANCE;
use stl2scad::verification::{self, discover_meshes, report_path, write_json};
use stl2scad::{
    convert, convert_with_debug, BatchOptions, ConvertOptions, OpenScadMeasurer, RendererConfig,
    RendererGateway, Tolerance, WeldStrategy,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Instant;
use tempfile::TempDir;
use tracing::Level;

const EXIT_ERROR: u8 = 1;
const EXIT_VERIFICATION_FAILED: u8 = 2;

#[derive(Parser)]
#[command(name = "stl2scad")]
#[command(version, about = "Convert STL meshes to OpenSCAD polyhedra and verify the result", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Renderer configuration file (TOML)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,
}

#[derive(Args, Clone, Copy)]
struct ToleranceArgs {
    /// Allowed volume difference in percent
    #[arg(long, default_value_t = 1.0)]
    volume_tol: f64,

    /// Allowed surface area difference in percent
    #[arg(long, default_value_t = 2.0)]
    area_tol: f64,

    /// Allowed bounding box dimension difference in percent
    #[arg(long, default_value_t = 0.5)]
    bbox_tol: f64,
}

impl From<ToleranceArgs> for Tolerance {
    fn from(args: ToleranceArgs) -> Self {
        Tolerance {
            volume_pct: args.volume_tol,
            surface_area_pct: args.area_tol,
            bbox_dimension_pct: args.bbox_tol,
        }
    }
}

#[derive(Args, Clone, Copy)]
struct WeldArgs {
    /// Relative vertex weld tolerance
    #[arg(short, long, default_value_t = DEFAULT_TOLERANCE)]
    tolerance: f64,

    /// Compare every vertex against every representative instead of hashing
    #[arg(long)]
    linear_scan: bool,
}

impl From<WeldArgs> for ConvertOptions {
    fn from(args: WeldArgs) -> Self {
        ConvertOptions {
            strategy: if args.linear_scan {
                WeldStrategy::LinearScan
            } else {
                WeldStrategy::SpatialHash
            },
            ..ConvertOptions::default().with_tolerance(args.tolerance)
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an STL file to an OpenSCAD polyhedron
    Convert {
        /// Input STL file
        input: PathBuf,

        /// Output SCAD file
        output: PathBuf,

        #[command(flatten)]
        weld: WeldArgs,

        /// Write analysis JSON, a preview PNG and the echo stream next to the output
        #[arg(long)]
        debug: bool,
    },

    /// Convert and verify that volume, area and bounding box survived
    Verify {
        /// Input STL file
        input: PathBuf,

        /// Output SCAD file; a scratch file is used when omitted
        output: Option<PathBuf>,

        #[command(flatten)]
        tolerance: ToleranceArgs,

        #[command(flatten)]
        weld: WeldArgs,

        /// Render a PNG preview next to the report
        #[arg(long)]
        visualize: bool,

        /// Renderer timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Convert and verify every STL file under a directory
    Batch {
        /// Directory searched recursively for STL files
        input_dir: PathBuf,

        /// Directory receiving artifacts, reports and the summary
        output_dir: PathBuf,

        #[command(flatten)]
        tolerance: ToleranceArgs,

        #[command(flatten)]
        weld: WeldArgs,

        /// Process files in parallel
        #[arg(long)]
        parallel: bool,

        /// Renderer timeout in seconds
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::WARN })
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            match e.downcast_ref::<stl2scad::Error>() {
                Some(error) => Reporter::report_error(error),
                None => eprintln!("error [config]: {:#}", e),
            }
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn run(cli: &Cli) -> Result<u8> {
    match &cli.command {
        Commands::Convert {
            input,
            output,
            weld,
            debug,
        } => convert_command(cli, input, output, (*weld).into(), *debug),
        Commands::Verify {
            input,
            output,
            tolerance,
            weld,
            visualize,
            timeout,
        } => verify_command(
            cli,
            input,
            output.as_deref(),
            (*tolerance).into(),
            (*weld).into(),
            *visualize,
            *timeout,
        ),
        Commands::Batch {
            input_dir,
            output_dir,
            tolerance,
            weld,
            parallel,
            timeout,
        } => batch_command(
            cli,
            input_dir,
            output_dir,
            BatchOptions {
                tolerance: (*tolerance).into(),
                convert: (*weld).into(),
                parallel: *parallel,
                input_root: Some(input_dir.clone()),
                show_progress: !cli.verbose,
            },
            *timeout,
        ),
    }
}

fn load_config(cli: &Cli, timeout: Option<u64>) -> Result<RendererConfig> {
    let mut config = match &cli.config {
        Some(path) => RendererConfig::from_file(path)?.with_env_overrides(),
        None => RendererConfig::load()?,
    };
    if let Some(secs) = timeout {
        config.timeout_secs = secs;
    }
    Ok(config)
}

fn convert_command(
    cli: &Cli,
    input: &Path,
    output: &Path,
    options: ConvertOptions,
    debug: bool,
) -> Result<u8> {
    let start = Instant::now();

    if debug {
        let gateway = RendererGateway::new(load_config(cli, None)?);
        let (stats, artifacts) = convert_with_debug(input, output, &options, &gateway)?;
        Reporter::report_conversion(output, &stats, start.elapsed());
        Reporter::report_debug(&artifacts);
    } else {
        let stats = convert(input, output, &options)?;
        Reporter::report_conversion(output, &stats, start.elapsed());
    }

    Ok(0)
}

fn verify_command(
    cli: &Cli,
    input: &Path,
    output: Option<&Path>,
    tolerance: Tolerance,
    options: ConvertOptions,
    visualize: bool,
    timeout: Option<u64>,
) -> Result<u8> {
    let gateway = RendererGateway::new(load_config(cli, timeout)?);
    let measurer = OpenScadMeasurer::new(&gateway);

    // Keeps a scratch artifact alive until the preview has been rendered
    let scratch;
    let artifact = match output {
        Some(path) => path.to_path_buf(),
        None => {
            scratch = TempDir::new().context("Failed to create scratch directory")?;
            let stem = input
                .file_stem()
                .map(|s| s.to_string_lossy().into_owned())
                .unwrap_or_else(|| "converted".to_string());
            scratch.path().join(format!("{}.scad", stem))
        }
    };

    let stats = convert(input, &artifact, &options)?;
    if cli.verbose {
        Reporter::report_info(&format!(
            "{} vertices welded to {}",
            stats.original_vertex_count, stats.deduplicated_vertex_count
        ));
    }

    let result =
        verification::verify_conversion(input, Some(&artifact), &options, &tolerance, &measurer)?;
    Reporter::report_verification(&result);

    let report_dir = output
        .and_then(Path::parent)
        .or_else(|| input.parent())
        .unwrap_or_else(|| Path::new("."));
    let file_name = input.file_name().map(PathBuf::from).unwrap_or_default();
    let report = report_path(report_dir, &file_name);
    write_json(&result, &report)?;
    Reporter::report_info(&format!("Report: {}", report.display()));

    if visualize {
        let png = report.with_file_name(format!(
            "{}.preview.png",
            file_name.with_extension("").display()
        ));
        let log = png.with_extension("log");
        gateway.render_png(&artifact, &png, &log)?;
        Reporter::report_info(&format!("Preview: {}", png.display()));
    }

    Ok(if result.passed {
        0
    } else {
        EXIT_VERIFICATION_FAILED
    })
}

fn batch_command(
    cli: &Cli,
    input_dir: &Path,
    output_dir: &Path,
    options: BatchOptions,
    timeout: Option<u64>,
) -> Result<u8> {
    let sources = discover_meshes(input_dir);
    if sources.is_empty() {
        Reporter::report_warning(&format!("No STL files found under {}", input_dir.display()));
    } else {
        Reporter::progress(&format!("Verifying {} files", sources.len()));
    }

    let gateway = RendererGateway::new(load_config(cli, timeout)?);
    let measurer = OpenScadMeasurer::new(&gateway);

    let report = verification::batch_verify(&sources, output_dir, &options, &measurer)?;
    Reporter::report_batch(&report);

    Ok(if report.summary.errors > 0 {
        EXIT_ERROR
    } else if report.summary.failed > 0 {
        EXIT_VERIFICATION_FAILED
    } else {
        Reporter::success("All files verified");
        0
    })
}
