//! The per-file pipeline: decode, classify, composite, fill, vector kernel,
//! pack and encode.

use std::path::{Path, PathBuf};
use std::time::Instant;

use tracing::{debug, info, instrument, warn};

use crate::error::Error;
use crate::imageops::classify::{self, ChannelLayout};
use crate::imageops::composite::{self, AlphaSource, Composite};
use crate::imageops::mask::MaskPair;
use crate::imageops::pack::{self, PackedLayout};
use crate::imageops::push_pull::PushPull;
use crate::imageops::vector::{VectorKernel, VectorOp};
use crate::io::{self, EncodeOptions};
use crate::progress::{ProgressEvent, ProgressSink, Stage};
use crate::raster::{ElementType, RasterBuffer};
use crate::settings::ProcessingSettings;

/// What happened to one successfully processed file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileSummary {
    pub input: PathBuf,
    pub output: PathBuf,
    pub layout: ChannelLayout,
    /// Whether holes were filled
    pub filled: bool,
    /// Vector operation that ran, if any
    pub vector: Option<VectorOp>,
    pub packed: PackedLayout,
    /// Element type written by the codec
    pub stored: ElementType,
}

/// Processes one file from `input` into `output`.
///
/// `mask` is the batch mask, shared read-only between workers.
///
/// # Errors
///
/// Returns the error of the first stage that fails. Nothing is written in that case.
#[instrument(skip_all, fields(input = %input.display()))]
pub fn process_file(
    input: &Path,
    output: &Path,
    mask: Option<&MaskPair>,
    settings: &ProcessingSettings,
    progress: &dyn ProgressSink,
) -> Result<FileSummary, Error> {
    let report = |stage, portion| progress.report(ProgressEvent::new(input, stage, portion));
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();

    report(Stage::Decode, 0.0);
    let decoded = io::decode(input)?;
    let mut buffer = decoded.buffer;
    let (width, height) = buffer.dimensions();
    info!(
        width,
        height,
        channels = buffer.channel_count(),
        bit_depth = %decoded.original,
        "Loaded {file_name}"
    );
    report(Stage::Decode, 1.0);

    let classification = if settings.solidify {
        classify::classify(buffer.channel_count(), mask.is_some())
    } else {
        classify::passthrough(buffer.channel_count())
    }
    .inspect_err(|error| warn!("{error}"))?;
    classify::tag_channel_roles(&mut buffer, classification.layout)
        .map_err(|error| Error::Internal(error.to_string()))?;
    debug!(?classification, alpha_channel = ?buffer.alpha_channel(), "Classified");

    if settings.solidify {
        report(Stage::Fill, 0.0);
        buffer = fill(buffer, classification.layout, AlphaSource::resolve(&classification, mask)?, settings)?;
        report(Stage::Fill, 1.0);
    } else {
        info!("Filling holes skipped");
    }

    let vector = settings.vector_op(&file_name);
    let vector = match vector {
        Some(_) if classification.is_grayscale() => {
            warn!("Vector operations need color channels, skipped for grayscale {file_name}");
            None
        }
        Some(op) => {
            report(Stage::Vector, 0.0);
            let started = Instant::now();
            VectorKernel::new(op)
                .with_threads(settings.kernel_threads)
                .apply(&mut buffer, None)?;
            info!(elapsed = ?started.elapsed(), "Vector operation {op:?} done");
            report(Stage::Vector, 1.0);
            Some(op)
        }
        None => {
            info!("Normalize skipped");
            None
        }
    };

    let packed = pack::pack_output(
        &mut buffer,
        classification.is_grayscale(),
        settings.export_alpha,
        settings.output_bit_depth,
        decoded.original,
    );

    report(Stage::Encode, 0.0);
    let stored = io::encode(output, &buffer, packed.element, &EncodeOptions::default())?;
    info!(output = %output.display(), format = %stored, "Written");
    report(Stage::Encode, 1.0);
    report(Stage::Done, 1.0);

    Ok(FileSummary {
        input: input.to_path_buf(),
        output: output.to_path_buf(),
        layout: classification.layout,
        filled: settings.solidify,
        vector,
        packed,
        stored,
    })
}

/// Premultiplies, fills holes and puts the exported alpha back.
fn fill(
    buffer: RasterBuffer,
    layout: ChannelLayout,
    source: AlphaSource<'_>,
    settings: &ProcessingSettings,
) -> Result<RasterBuffer, Error> {
    let started = Instant::now();
    let Composite { mut buffer, alpha } = composite::composite(buffer, layout, source)?;

    PushPull::new()
        .with_threads(settings.kernel_threads)
        .fill(&mut buffer)?;

    if settings.export_alpha {
        let channel = buffer
            .alpha_channel()
            .ok_or_else(|| Error::Internal("filled buffer lost its alpha channel".into()))?;
        buffer
            .paste_channel(channel, &alpha)
            .map_err(|error| Error::Reconstruction(error.to_string()))?;
    }
    info!(
        elapsed = ?started.elapsed(),
        format = %buffer.element_type(),
        "Push-pull done"
    );
    Ok(buffer)
}
