use tracing::debug;

use crate::raster::{ElementType, RasterBuffer};
use crate::settings::OutputBitDepth;

/// Channel count and element type of an output buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PackedLayout {
    pub channels: usize,
    pub element: ElementType,
}

/// Channel count written for a buffer currently holding `channels` channels.
///
/// Grayscale keeps one color channel and RGB three. Alpha is kept behind the
/// color only when exporting and the buffer still has a channel after the
/// color, so packing an already packed buffer changes nothing.
pub const fn packed_channel_count(grayscale: bool, export_alpha: bool, channels: usize) -> usize {
    let color = if grayscale { 1 } else { 3 };
    if export_alpha && channels > color {
        color + 1
    } else {
        color
    }
}

/// Strips `buffer` down to its output channels and converts it to the output type.
///
/// The alpha role is always cleared: exported alpha is plain channel data of
/// the output layout. [`OutputBitDepth::Original`] selects `original`, the
/// element type the file was decoded with.
pub fn pack_output(
    buffer: &mut RasterBuffer,
    grayscale: bool,
    export_alpha: bool,
    bit_depth: OutputBitDepth,
    original: ElementType,
) -> PackedLayout {
    let channels = packed_channel_count(grayscale, export_alpha, buffer.channel_count());
    buffer.truncate_channels(channels);
    buffer.clear_alpha_channel();

    let element = bit_depth.element_type().unwrap_or(original);
    if buffer.element_type() != element {
        *buffer = buffer.convert(element);
    }
    let layout = PackedLayout {
        channels: buffer.channel_count(),
        element,
    };
    debug!(?layout, "Packed output");
    layout
}
