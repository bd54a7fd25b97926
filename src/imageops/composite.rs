use tracing::debug;

use crate::error::{Error, RasterError};
use crate::imageops::classify::{AlphaOrigin, ChannelLayout, Classification};
use crate::imageops::mask::MaskPair;
use crate::raster::RasterBuffer;

/// The alpha that drives hole filling, resolved once per file.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AlphaSource<'a> {
    /// Alpha stored in `channel` of the image itself
    Embedded { channel: usize },
    /// Alpha from the batch mask
    External(&'a MaskPair),
}

impl<'a> AlphaSource<'a> {
    /// Picks the alpha source for a classified image.
    ///
    /// A mask always wins over embedded alpha.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Internal`] when there is neither, which classification
    /// rules out for images that are filled.
    pub fn resolve(
        classification: &Classification,
        mask: Option<&'a MaskPair>,
    ) -> Result<Self, Error> {
        match (mask, classification.alpha) {
            (Some(mask), _) => Ok(Self::External(mask)),
            (None, AlphaOrigin::Embedded(channel)) => Ok(Self::Embedded { channel }),
            (None, origin) => Err(Error::Internal(format!(
                "no alpha available for hole filling ({origin:?} alpha, {:?} layout)",
                classification.layout
            ))),
        }
    }
}

/// Premultiplied buffer ready for hole filling.
#[derive(Debug, Clone, PartialEq)]
pub struct Composite {
    /// Color multiplied by alpha, with alpha as the tagged last channel
    pub buffer: RasterBuffer,
    /// Single-channel copy of the alpha, in the buffer's element type
    pub alpha: RasterBuffer,
}

/// Premultiplies color by alpha and makes sure the alpha channel is tagged.
///
/// Embedded alpha is multiplied into the color channels of `buffer` in place.
/// External alpha replaces any embedded alpha: the color channels are kept,
/// multiplied by the mask, and the mask is appended as channel `"A"`.
///
/// # Errors
///
/// Returns [`Error::Composite`] when the mask size differs from the image or
/// a channel operation fails.
pub fn composite(
    buffer: RasterBuffer,
    layout: ChannelLayout,
    source: AlphaSource<'_>,
) -> Result<Composite, Error> {
    let color = layout.color_channels();
    let result = match source {
        AlphaSource::Embedded { channel } => premultiply_embedded(buffer, color, channel),
        AlphaSource::External(mask) => append_external(buffer, color, mask),
    };
    result.map_err(|error| Error::Composite(error.to_string()))
}

fn premultiply_embedded(
    mut buffer: RasterBuffer,
    color: usize,
    channel: usize,
) -> Result<Composite, RasterError> {
    debug!(channel, "Premultiplying embedded alpha");
    let alpha = buffer.channels(&[channel])?;
    let factor = buffer.channels(&vec![channel; color])?;
    buffer.multiply(&factor)?;
    buffer.set_alpha_channel(Some(channel))?;
    Ok(Composite { buffer, alpha })
}

fn append_external(
    buffer: RasterBuffer,
    color: usize,
    mask: &MaskPair,
) -> Result<Composite, RasterError> {
    debug!(color, "Appending external alpha");
    let mut color_buffer = if buffer.channel_count() > color {
        buffer.channels(&(0..color).collect::<Vec<_>>())?
    } else {
        buffer
    };
    let factor = if color == 1 {
        mask.alpha()
    } else {
        mask.broadcast()
    };
    color_buffer.multiply(factor)?;

    let alpha = mask.alpha().convert(color_buffer.element_type());
    let mut buffer = color_buffer.append(&alpha)?;
    let index = buffer.channel_count() - 1;
    buffer.set_channel_name(index, "A")?;
    buffer.set_alpha_channel(Some(index))?;
    Ok(Composite { buffer, alpha })
}
