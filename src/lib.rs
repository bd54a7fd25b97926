//! Push-pull hole filling and normal map repair for texture batches.
//!
//! Every file of a batch runs through the same pipeline: classify the channel
//! layout, premultiply color by the embedded or external alpha, fill the
//! transparent regions with push-pull, optionally normalize or repair normal
//! vectors, and write the result with the requested channels and bit depth.

mod batch;
mod error;
mod imageops;
mod io;
mod pipeline;
mod progress;
mod raster;
mod settings;
#[cfg(test)]
mod test_utils;
mod utils;

pub use batch::{find_mask, process_batch, BatchReport, FileOutcome};
pub use error::{Error, RasterError};
pub use imageops::classify::{
    classify, passthrough, tag_channel_roles, AlphaOrigin, ChannelLayout, Classification,
};
pub use imageops::composite::{composite, AlphaSource, Composite};
pub use imageops::mask::{load_mask, MaskPair};
pub use imageops::pack::{pack_output, packed_channel_count, PackedLayout};
pub use imageops::push_pull::{FillHoles, PushPull};
pub use imageops::vector::{
    normalize_pixel, repair_pixel, Axis, RangeMapping, RepairAxis, Roi, VectorKernel, VectorOp,
};
pub use io::{
    decode, decode_mask, encode, output_extension, output_path, storage_element_type,
    supports_alpha, Decoded, EncodeOptions,
};
pub use pipeline::{process_file, FileSummary};
pub use progress::{NoProgress, ProgressEvent, ProgressSink, Stage};
pub use raster::{default_channel_names, ElementType, PixelData, RasterBuffer, Sample};
pub use settings::{
    NormalizeMode, OutputBitDepth, OutputFormat, ProcessingSettings, RangeMode, RepairMode,
};
