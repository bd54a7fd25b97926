use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::AtomicBool;
use std::sync::mpsc;
use std::thread;

use anyhow::Context as _;
use clap::{ArgAction, Parser};
use solidify::{
    NormalizeMode, OutputBitDepth, OutputFormat, ProcessingSettings, ProgressEvent, RangeMode,
    RepairMode, Stage,
};
use tracing::{debug, Level};

/// Fill transparent texture regions and repair normal maps.
///
/// A file whose name contains one of the mask substrings is used as alpha for
/// every other file of the batch.
#[derive(Parser, Debug)]
#[command(name = "solidify", version)]
struct Cli {
    /// Input images.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Skip push-pull hole filling.
    #[arg(long, default_value_t = false)]
    no_fill: bool,

    /// Write the alpha channel next to the color channels.
    #[arg(long, default_value_t = false)]
    export_alpha: bool,

    /// When to normalize vectors.
    #[arg(long, value_enum, default_value_t = NormalizeMode::Smart)]
    normalize: NormalizeMode,

    /// Vector axis to rebuild from the other two.
    #[arg(long, value_enum, default_value_t = RepairMode::Off)]
    repair: RepairMode,

    /// Value range of vector data.
    #[arg(long, value_enum, default_value_t = RangeMode::Unsigned)]
    range: RangeMode,

    /// Output bit depth.
    #[arg(long, value_enum, default_value_t = OutputBitDepth::Original)]
    bit_depth: OutputBitDepth,

    /// Output file format.
    #[arg(long, value_enum, default_value_t = OutputFormat::Original)]
    format: OutputFormat,

    /// Format used when the output format cannot be written.
    #[arg(long, value_enum, default_value_t = OutputFormat::Tiff)]
    default_format: OutputFormat,

    /// Comma separated file name substrings marking normal maps.
    #[arg(long, value_delimiter = ',')]
    normal_names: Option<Vec<String>>,

    /// Comma separated file name substrings marking the mask file.
    #[arg(long, value_delimiter = ',')]
    mask_names: Option<Vec<String>>,

    /// Files processed in parallel, 0 uses every CPU.
    #[arg(long, default_value_t = 3)]
    threads: usize,

    /// Threads per image kernel, 1 runs single-threaded.
    #[arg(long)]
    kernel_threads: Option<usize>,

    /// More log output, repeat for more.
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,

    /// Only log errors.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

impl Cli {
    fn settings(&self) -> ProcessingSettings {
        let defaults = ProcessingSettings::default();
        ProcessingSettings {
            solidify: !self.no_fill,
            export_alpha: self.export_alpha,
            normalize: self.normalize,
            repair: self.repair,
            range: self.range,
            output_bit_depth: self.bit_depth,
            output_format: self.format,
            default_format: self.default_format,
            normal_names: self.normal_names.clone().unwrap_or(defaults.normal_names),
            mask_names: self.mask_names.clone().unwrap_or(defaults.mask_names),
            worker_threads: self.threads,
            kernel_threads: self.kernel_threads,
        }
    }

    const fn log_level(&self) -> Level {
        match (self.quiet, self.verbose) {
            (true, _) => Level::ERROR,
            (false, 0) => Level::INFO,
            (false, 1) => Level::DEBUG,
            (false, _) => Level::TRACE,
        }
    }
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    tracing_subscriber::fmt()
        .with_max_level(cli.log_level())
        .with_target(false)
        .init();

    let settings = cli.settings();
    let (sender, receiver) = mpsc::channel::<ProgressEvent>();
    let consumer = thread::spawn(move || {
        for event in receiver {
            if event.stage == Stage::Done {
                eprintln!("done {}", event.path.display());
            } else {
                debug!(path = %event.path.display(), stage = ?event.stage, portion = event.portion, "Progress");
            }
        }
    });

    let cancel = AtomicBool::new(false);
    let report = solidify::process_batch(&cli.files, &settings, &sender, &cancel)
        .context("batch aborted")?;
    drop(sender);
    if consumer.join().is_err() {
        eprintln!("progress output stopped early");
    }

    if let Some(mask) = &report.mask {
        println!("mask   {}", mask.display());
    }
    for outcome in &report.outcomes {
        match &outcome.result {
            Ok(summary) => println!(
                "ok     {} -> {}",
                summary.input.display(),
                summary.output.display()
            ),
            Err(error) => println!("failed {}: {error}", outcome.input.display()),
        }
    }
    println!(
        "{} of {} file(s) processed",
        report.succeeded(),
        report.outcomes.len()
    );

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}
