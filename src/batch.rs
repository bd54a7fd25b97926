//! Batch orchestration: mask detection and parallel per-file processing.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

#[cfg(feature = "rayon")]
use rayon::prelude::*;
use tracing::{error, info, warn};

use crate::error::Error;
use crate::imageops::mask::{self, MaskPair};
use crate::io;
use crate::pipeline::{self, FileSummary};
use crate::progress::ProgressSink;
use crate::settings::{contains_any, ProcessingSettings};

/// Result for one file of a batch.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub result: Result<FileSummary, Error>,
}

impl FileOutcome {
    pub const fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

/// Outcome of a whole batch, in input order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BatchReport {
    /// The file used as external mask
    pub mask: Option<PathBuf>,
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|outcome| outcome.is_success()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn is_success(&self) -> bool {
        self.failed() == 0
    }
}

/// Picks the batch mask file.
///
/// Substrings are tried in order; the first one found in any file name,
/// ignoring case, selects that file.
pub fn find_mask<'a>(paths: &'a [PathBuf], substrings: &[String]) -> Option<&'a PathBuf> {
    substrings.iter().find_map(|substring| {
        paths.iter().find(|path| {
            path.file_name()
                .is_some_and(|name| contains_any(&name.to_string_lossy(), std::slice::from_ref(substring)))
        })
    })
}

/// Processes every file of a batch.
///
/// The mask is detected and loaded once and excluded from processing. Files
/// run on `settings.worker_threads` workers; a failing file does not stop the
/// others. Files that have not started when `cancel` is set report
/// [`Error::Cancelled`].
///
/// # Errors
///
/// Returns [`Error::MaskRead`] when the mask cannot be loaded and
/// [`Error::Internal`] when the worker pool cannot be started.
pub fn process_batch(
    paths: &[PathBuf],
    settings: &ProcessingSettings,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<BatchReport, Error> {
    let started = Instant::now();
    let mask_path = find_mask(paths, &settings.mask_names).cloned();
    let mask = match (&mask_path, settings.solidify) {
        (Some(path), true) => Some(mask::load_mask(path)?),
        (Some(path), false) => {
            info!("Mask {} ignored, filling holes is disabled", path.display());
            None
        }
        (None, _) => None,
    };

    let inputs: Vec<&PathBuf> = paths
        .iter()
        .filter(|path| Some(*path) != mask_path.as_ref())
        .collect();
    let run = |input: &&PathBuf| FileOutcome {
        input: (*input).clone(),
        result: run_file(input, mask.as_ref(), settings, progress, cancel),
    };

    #[cfg(feature = "rayon")]
    let outcomes: Vec<FileOutcome> = rayon::ThreadPoolBuilder::new()
        .num_threads(settings.worker_threads)
        .build()
        .map_err(|error| Error::Internal(format!("could not start workers: {error}")))?
        .install(|| inputs.par_iter().map(run).collect());

    #[cfg(not(feature = "rayon"))]
    let outcomes: Vec<FileOutcome> = inputs.iter().map(run).collect();

    let report = BatchReport {
        mask: mask_path,
        outcomes,
    };
    info!(
        elapsed = ?started.elapsed(),
        succeeded = report.succeeded(),
        failed = report.failed(),
        "Batch done"
    );
    Ok(report)
}

fn run_file(
    input: &Path,
    mask: Option<&MaskPair>,
    settings: &ProcessingSettings,
    progress: &dyn ProgressSink,
    cancel: &AtomicBool,
) -> Result<FileSummary, Error> {
    if cancel.load(Ordering::Relaxed) {
        warn!("{} cancelled", input.display());
        return Err(Error::Cancelled);
    }
    let output = io::output_path(input, settings);
    info!("Source: {}, target: {}", input.display(), output.display());
    pipeline::process_file(input, &output, mask, settings, progress)
        .inspect_err(|failure| error!("{}: {failure}", input.display()))
}
