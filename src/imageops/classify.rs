use crate::error::{Error, RasterError};
use crate::raster::RasterBuffer;

/// Channel layout of a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Single luminance channel
    Grayscale,
    /// Luminance followed by alpha
    GrayscaleAlpha,
    /// Three color channels
    Rgb,
    /// Three color channels followed by alpha
    Rgba,
    /// Any other channel count
    Invalid,
}

impl ChannelLayout {
    /// Layout implied by a raw channel count.
    pub const fn from_channel_count(channels: usize) -> Self {
        match channels {
            1 => Self::Grayscale,
            2 => Self::GrayscaleAlpha,
            3 => Self::Rgb,
            4 => Self::Rgba,
            _ => Self::Invalid,
        }
    }

    pub const fn is_grayscale(self) -> bool {
        matches!(self, Self::Grayscale | Self::GrayscaleAlpha)
    }

    /// Number of leading color channels.
    pub const fn color_channels(self) -> usize {
        match self {
            Self::Grayscale | Self::GrayscaleAlpha => 1,
            Self::Rgb | Self::Rgba => 3,
            Self::Invalid => 0,
        }
    }

    /// Index of the alpha channel stored inside the image, if any.
    pub const fn embedded_alpha(self) -> Option<usize> {
        match self {
            Self::GrayscaleAlpha => Some(1),
            Self::Rgba => Some(3),
            _ => None,
        }
    }
}

/// Where the fill weights of an image come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlphaOrigin {
    /// A channel of the image itself
    Embedded(usize),
    /// The batch mask
    External,
    /// No alpha, only valid when hole filling is disabled
    Absent,
}

/// Result of classifying a decoded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub layout: ChannelLayout,
    pub alpha: AlphaOrigin,
}

impl Classification {
    pub const fn is_grayscale(&self) -> bool {
        self.layout.is_grayscale()
    }
}

/// Classifies an image that is going to be hole filled.
///
/// One- and three-channel images have no alpha of their own and are only
/// accepted when an external mask is available. Two- and four-channel images
/// are always accepted; an external mask takes precedence over their alpha.
///
/// # Errors
///
/// Returns [`Error::UnsupportedLayout`] for channel counts outside 1 to 4 and
/// for alpha-less images without an external mask.
pub fn classify(channels: usize, external_alpha: bool) -> Result<Classification, Error> {
    let layout = ChannelLayout::from_channel_count(channels);
    if layout == ChannelLayout::Invalid {
        return Err(Error::UnsupportedLayout { channels });
    }
    let alpha = match (external_alpha, layout.embedded_alpha()) {
        (true, _) => AlphaOrigin::External,
        (false, Some(index)) => AlphaOrigin::Embedded(index),
        (false, None) => return Err(Error::UnsupportedLayout { channels }),
    };
    Ok(Classification { layout, alpha })
}

/// Classifies an image that skips hole filling.
///
/// Without filling no alpha is required, so any 1 to 4 channel image passes.
pub fn passthrough(channels: usize) -> Result<Classification, Error> {
    let layout = ChannelLayout::from_channel_count(channels);
    match layout {
        ChannelLayout::Invalid => Err(Error::UnsupportedLayout { channels }),
        _ => Ok(Classification {
            layout,
            alpha: layout
                .embedded_alpha()
                .map_or(AlphaOrigin::Absent, AlphaOrigin::Embedded),
        }),
    }
}

/// Writes channel names and the alpha role that `layout` implies.
pub fn tag_channel_roles(
    buffer: &mut RasterBuffer,
    layout: ChannelLayout,
) -> Result<(), RasterError> {
    match layout {
        ChannelLayout::GrayscaleAlpha => {
            buffer.set_channel_name(0, "Y")?;
            buffer.set_channel_name(1, "A")?;
        }
        ChannelLayout::Rgba => buffer.set_channel_name(3, "A")?,
        _ => {}
    }
    buffer.set_alpha_channel(layout.embedded_alpha())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ElementType;

    #[test]
    fn alpha_less_layouts_need_a_mask() {
        for channels in [1, 3] {
            assert_eq!(
                classify(channels, false),
                Err(Error::UnsupportedLayout { channels })
            );
            assert_eq!(classify(channels, true).unwrap().alpha, AlphaOrigin::External);
        }
    }

    #[test]
    fn alpha_layouts_always_classify() {
        assert_eq!(
            classify(2, false).unwrap(),
            Classification {
                layout: ChannelLayout::GrayscaleAlpha,
                alpha: AlphaOrigin::Embedded(1),
            }
        );
        assert_eq!(classify(4, false).unwrap().alpha, AlphaOrigin::Embedded(3));
        assert_eq!(classify(4, true).unwrap().alpha, AlphaOrigin::External);
        assert!(classify(2, true).unwrap().is_grayscale());
    }

    #[test]
    fn out_of_range_counts_are_rejected() {
        for channels in [0, 5, 16] {
            assert!(matches!(
                classify(channels, true),
                Err(Error::UnsupportedLayout { .. })
            ));
            assert!(passthrough(channels).is_err());
        }
    }

    #[test]
    fn passthrough_accepts_alpha_less_images() {
        assert_eq!(passthrough(3).unwrap().alpha, AlphaOrigin::Absent);
        assert_eq!(passthrough(1).unwrap().layout, ChannelLayout::Grayscale);
        assert_eq!(passthrough(4).unwrap().alpha, AlphaOrigin::Embedded(3));
    }

    #[test]
    fn tagging_renames_and_sets_alpha() {
        let mut buffer = RasterBuffer::new(1, 1, 2, ElementType::U16).unwrap();
        tag_channel_roles(&mut buffer, ChannelLayout::GrayscaleAlpha).unwrap();
        assert_eq!(buffer.alpha_channel(), Some(1));
        assert_eq!(buffer.channel_names(), &["Y".to_owned(), "A".to_owned()]);

        let mut buffer = RasterBuffer::new(1, 1, 3, ElementType::U16).unwrap();
        tag_channel_roles(&mut buffer, ChannelLayout::Rgb).unwrap();
        assert_eq!(buffer.alpha_channel(), None);
    }
}
