//! In-memory multi-channel pixel buffer with channel role metadata.

mod sample;

pub use sample::{ElementType, Sample};

use half::f16;
use image::{ImageBuffer, Pixel};

use crate::error::RasterError;

/// Typed, contiguous, row-major sample storage.
#[derive(Debug, Clone, PartialEq)]
pub enum PixelData {
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

macro_rules! impl_from_samples {
    ($($type:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<Vec<$type>> for PixelData {
                fn from(samples: Vec<$type>) -> Self {
                    Self::$variant(samples)
                }
            }
        )*
    };
}

impl_from_samples!(
    u8 => U8,
    u16 => U16,
    u32 => U32,
    u64 => U64,
    f16 => F16,
    f32 => F32,
    f64 => F64,
);

/// Runs `$body` with `$samples` bound to the concrete sample vector.
macro_rules! with_samples {
    ($data:expr, $samples:ident => $body:expr) => {
        match $data {
            PixelData::U8($samples) => $body,
            PixelData::U16($samples) => $body,
            PixelData::U32($samples) => $body,
            PixelData::U64($samples) => $body,
            PixelData::F16($samples) => $body,
            PixelData::F32($samples) => $body,
            PixelData::F64($samples) => $body,
        }
    };
}

impl PixelData {
    fn zeroed(element: ElementType, len: usize) -> Self {
        match element {
            ElementType::U8 => Self::U8(vec![0; len]),
            ElementType::U16 => Self::U16(vec![0; len]),
            ElementType::U32 => Self::U32(vec![0; len]),
            ElementType::U64 => Self::U64(vec![0; len]),
            ElementType::F16 => Self::F16(vec![f16::ZERO; len]),
            ElementType::F32 => Self::F32(vec![0.0; len]),
            ElementType::F64 => Self::F64(vec![0.0; len]),
        }
    }

    fn from_unit(element: ElementType, unit: &[f32]) -> Self {
        fn collect<S: Sample>(unit: &[f32]) -> Vec<S> {
            unit.iter().map(|&value| S::from_unit(value)).collect()
        }
        match element {
            ElementType::U8 => Self::U8(collect(unit)),
            ElementType::U16 => Self::U16(collect(unit)),
            ElementType::U32 => Self::U32(collect(unit)),
            ElementType::U64 => Self::U64(collect(unit)),
            ElementType::F16 => Self::F16(collect(unit)),
            ElementType::F32 => Self::F32(collect(unit)),
            ElementType::F64 => Self::F64(collect(unit)),
        }
    }

    pub const fn element_type(&self) -> ElementType {
        match self {
            Self::U8(_) => ElementType::U8,
            Self::U16(_) => ElementType::U16,
            Self::U32(_) => ElementType::U32,
            Self::U64(_) => ElementType::U64,
            Self::F16(_) => ElementType::F16,
            Self::F32(_) => ElementType::F32,
            Self::F64(_) => ElementType::F64,
        }
    }

    pub fn len(&self) -> usize {
        with_samples!(self, samples => samples.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Default channel names for a channel count.
pub fn default_channel_names(channels: usize) -> Vec<String> {
    let names: &[&str] = match channels {
        1 => &["Y"],
        2 => &["Y", "A"],
        3 => &["R", "G", "B"],
        _ => &["R", "G", "B", "A"],
    };
    names.iter().take(channels).map(|name| (*name).to_owned()).collect()
}

/// A 2D image buffer with 1 to 4 channels of one element type.
///
/// Samples are interleaved per pixel, rows are contiguous. The alpha role is
/// explicit metadata: a buffer with 4 channels has no alpha until one is
/// assigned with [`RasterBuffer::set_alpha_channel`].
#[derive(Debug, Clone, PartialEq)]
pub struct RasterBuffer {
    width: u32,
    height: u32,
    channel_names: Vec<String>,
    alpha_channel: Option<usize>,
    data: PixelData,
}

impl RasterBuffer {
    /// Creates a zero-filled buffer.
    pub fn new(
        width: u32,
        height: u32,
        channels: usize,
        element: ElementType,
    ) -> Result<Self, RasterError> {
        validate_channel_count(channels)?;
        let len = sample_len(width, height, channels);
        Ok(Self {
            width,
            height,
            channel_names: default_channel_names(channels),
            alpha_channel: None,
            data: PixelData::zeroed(element, len),
        })
    }

    /// Wraps existing samples.
    pub fn from_samples<S: Sample>(
        width: u32,
        height: u32,
        channels: usize,
        samples: Vec<S>,
    ) -> Result<Self, RasterError>
    where
        PixelData: From<Vec<S>>,
    {
        Self::from_data(width, height, channels, PixelData::from(samples))
    }

    /// Builds a buffer of `element` type from normalized float samples.
    pub fn from_unit_samples(
        width: u32,
        height: u32,
        channels: usize,
        element: ElementType,
        unit: &[f32],
    ) -> Result<Self, RasterError> {
        Self::from_data(width, height, channels, PixelData::from_unit(element, unit))
    }

    fn from_data(
        width: u32,
        height: u32,
        channels: usize,
        data: PixelData,
    ) -> Result<Self, RasterError> {
        validate_channel_count(channels)?;
        let expected = sample_len(width, height, channels);
        if data.len() != expected {
            return Err(RasterError::SampleCount {
                expected,
                actual: data.len(),
            });
        }
        Ok(Self {
            width,
            height,
            channel_names: default_channel_names(channels),
            alpha_channel: None,
            data,
        })
    }

    pub const fn width(&self) -> u32 {
        self.width
    }

    pub const fn height(&self) -> u32 {
        self.height
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn channel_count(&self) -> usize {
        self.channel_names.len()
    }

    pub const fn element_type(&self) -> ElementType {
        self.data.element_type()
    }

    pub const fn alpha_channel(&self) -> Option<usize> {
        self.alpha_channel
    }

    pub fn channel_names(&self) -> &[String] {
        &self.channel_names
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// Bytes between horizontally adjacent pixels.
    pub fn pixel_stride(&self) -> usize {
        self.channel_count() * self.element_type().size_bytes()
    }

    /// Bytes between vertically adjacent pixels.
    pub fn scanline_stride(&self) -> usize {
        self.pixel_stride() * self.width as usize
    }

    /// Bytes between image planes. Only one plane is ever stored.
    pub fn z_stride(&self) -> usize {
        self.scanline_stride() * self.height as usize
    }

    pub const fn data(&self) -> &PixelData {
        &self.data
    }

    /// Typed view of the samples, `None` if `S` is not the stored type.
    pub fn samples<S: Sample>(&self) -> Option<&[S]> {
        S::slice(&self.data)
    }

    pub fn samples_mut<S: Sample>(&mut self) -> Option<&mut [S]> {
        S::slice_mut(&mut self.data)
    }

    /// Assigns or clears the alpha role.
    pub fn set_alpha_channel(&mut self, channel: Option<usize>) -> Result<(), RasterError> {
        if let Some(index) = channel {
            self.check_channel(index)?;
        }
        self.alpha_channel = channel;
        Ok(())
    }

    pub fn clear_alpha_channel(&mut self) {
        self.alpha_channel = None;
    }

    pub fn set_channel_name(
        &mut self,
        channel: usize,
        name: impl Into<String>,
    ) -> Result<(), RasterError> {
        self.check_channel(channel)?;
        self.channel_names[channel] = name.into();
        Ok(())
    }

    fn check_channel(&self, index: usize) -> Result<(), RasterError> {
        if index < self.channel_count() {
            Ok(())
        } else {
            Err(RasterError::ChannelOutOfRange {
                index,
                channels: self.channel_count(),
            })
        }
    }

    fn index(&self, x: u32, y: u32, channel: usize) -> usize {
        (y as usize * self.width as usize + x as usize) * self.channel_count() + channel
    }

    /// Normalized value of one sample.
    ///
    /// # Panics
    ///
    /// Panics when the coordinates are outside the buffer.
    pub fn sample(&self, x: u32, y: u32, channel: usize) -> f32 {
        let index = self.index(x, y, channel);
        with_samples!(&self.data, samples => samples[index].to_unit())
    }

    /// Stores a normalized value into one sample.
    ///
    /// # Panics
    ///
    /// Panics when the coordinates are outside the buffer.
    pub fn set_sample(&mut self, x: u32, y: u32, channel: usize, value: f32) {
        let index = self.index(x, y, channel);
        with_samples!(&mut self.data, samples => samples[index] = Sample::from_unit(value));
    }

    /// Normalized values of one pixel.
    pub fn pixel(&self, x: u32, y: u32) -> Vec<f32> {
        (0..self.channel_count())
            .map(|channel| self.sample(x, y, channel))
            .collect()
    }

    /// All samples as normalized floats.
    pub fn to_unit_samples(&self) -> Vec<f32> {
        with_samples!(&self.data, samples => samples.iter().map(|s| s.to_unit()).collect())
    }

    /// Overwrites all samples from normalized floats.
    pub fn store_unit_samples(&mut self, unit: &[f32]) -> Result<(), RasterError> {
        if unit.len() != self.data.len() {
            return Err(RasterError::SampleCount {
                expected: self.data.len(),
                actual: unit.len(),
            });
        }
        with_samples!(&mut self.data, samples => {
            for (sample, &value) in samples.iter_mut().zip(unit) {
                *sample = Sample::from_unit(value);
            }
        });
        Ok(())
    }

    /// All samples converted to `S`.
    pub fn to_samples<S: Sample>(&self) -> Vec<S> {
        match S::slice(&self.data) {
            Some(samples) => samples.to_vec(),
            None => with_samples!(
                &self.data,
                samples => samples.iter().map(|s| S::from_unit(s.to_unit())).collect()
            ),
        }
    }

    /// Copy of the buffer stored as `element`. Metadata is kept.
    pub fn convert(&self, element: ElementType) -> Self {
        if element == self.element_type() {
            return self.clone();
        }
        Self {
            width: self.width,
            height: self.height,
            channel_names: self.channel_names.clone(),
            alpha_channel: self.alpha_channel,
            data: PixelData::from_unit(element, &self.to_unit_samples()),
        }
    }

    /// New buffer whose channel `i` is a copy of channel `order[i]`.
    ///
    /// Channel names follow their source channel, the alpha role is cleared.
    pub fn channels(&self, order: &[usize]) -> Result<Self, RasterError> {
        validate_channel_count(order.len())?;
        for &index in order {
            self.check_channel(index)?;
        }
        let source_channels = self.channel_count();
        let data = with_samples!(&self.data, samples => PixelData::from(
            samples
                .chunks_exact(source_channels)
                .flat_map(|pixel| order.iter().map(move |&index| pixel[index]))
                .collect::<Vec<_>>()
        ));
        Ok(Self {
            width: self.width,
            height: self.height,
            channel_names: order
                .iter()
                .map(|&index| self.channel_names[index].clone())
                .collect(),
            alpha_channel: None,
            data,
        })
    }

    /// New buffer with the channels of `other` after the channels of `self`.
    pub fn append(&self, other: &Self) -> Result<Self, RasterError> {
        validate_matching_dimensions(self, other)?;
        if self.element_type() != other.element_type() {
            return Err(RasterError::ElementTypeMismatch {
                expected: self.element_type(),
                actual: other.element_type(),
            });
        }
        let left = self.channel_count();
        let right = other.channel_count();
        validate_channel_count(left + right)?;

        let data = with_samples!(&self.data, samples => PixelData::from(
            interleave(samples, left, other.samples().unwrap_or_default(), right)
        ));
        let mut channel_names = self.channel_names.clone();
        channel_names.extend(other.channel_names.iter().cloned());
        Ok(Self {
            width: self.width,
            height: self.height,
            channel_names,
            alpha_channel: self.alpha_channel,
            data,
        })
    }

    /// Multiplies the first `factor.channel_count()` channels by `factor`.
    ///
    /// The product is formed on normalized values, so `factor` may be stored
    /// in a different element type. Remaining channels are untouched.
    pub fn multiply(&mut self, factor: &Self) -> Result<(), RasterError> {
        validate_matching_dimensions(self, factor)?;
        let channels = self.channel_count();
        let factor_channels = factor.channel_count();
        if factor_channels > channels {
            return Err(RasterError::ChannelOutOfRange {
                index: factor_channels - 1,
                channels,
            });
        }
        let factor = factor.to_unit_samples();
        with_samples!(&mut self.data, samples => {
            for (pixel, weights) in samples
                .chunks_exact_mut(channels)
                .zip(factor.chunks_exact(factor_channels))
            {
                for (sample, &weight) in pixel.iter_mut().zip(weights) {
                    *sample = Sample::from_unit(sample.to_unit() * weight);
                }
            }
        });
        Ok(())
    }

    /// Copies the single channel of `source` into `channel`.
    pub fn paste_channel(&mut self, channel: usize, source: &Self) -> Result<(), RasterError> {
        validate_matching_dimensions(self, source)?;
        self.check_channel(channel)?;
        if source.channel_count() != 1 {
            return Err(RasterError::ChannelCount(source.channel_count()));
        }
        let channels = self.channel_count();
        let values = source.to_unit_samples();
        with_samples!(&mut self.data, samples => {
            for (pixel, &value) in samples.chunks_exact_mut(channels).zip(&values) {
                pixel[channel] = Sample::from_unit(value);
            }
        });
        Ok(())
    }

    /// Keeps only the first `channels` channels.
    ///
    /// Requests for more channels than stored are clamped. An alpha role that
    /// no longer exists is cleared.
    pub fn truncate_channels(&mut self, channels: usize) {
        let current = self.channel_count();
        let keep = channels.clamp(1, current);
        if keep == current {
            return;
        }
        with_samples!(&mut self.data, samples => {
            let kept: Vec<_> = samples
                .chunks_exact(current)
                .flat_map(|pixel| pixel[..keep].iter().copied())
                .collect();
            *samples = kept;
        });
        self.channel_names.truncate(keep);
        if self.alpha_channel.is_some_and(|alpha| alpha >= keep) {
            self.alpha_channel = None;
        }
    }
}

impl<P> From<&ImageBuffer<P, Vec<P::Subpixel>>> for RasterBuffer
where
    P: Pixel,
    P::Subpixel: Sample,
    PixelData: From<Vec<P::Subpixel>>,
{
    fn from(image: &ImageBuffer<P, Vec<P::Subpixel>>) -> Self {
        let channels = usize::from(P::CHANNEL_COUNT);
        Self {
            width: image.width(),
            height: image.height(),
            channel_names: default_channel_names(channels),
            alpha_channel: None,
            data: PixelData::from(image.as_raw().clone()),
        }
    }
}

fn interleave<S: Sample>(left: &[S], left_channels: usize, right: &[S], right_channels: usize) -> Vec<S> {
    left.chunks_exact(left_channels)
        .zip(right.chunks_exact(right_channels))
        .flat_map(|(a, b)| a.iter().chain(b).copied())
        .collect()
}

fn sample_len(width: u32, height: u32, channels: usize) -> usize {
    width as usize * height as usize * channels
}

fn validate_channel_count(channels: usize) -> Result<(), RasterError> {
    if (1..=4).contains(&channels) {
        Ok(())
    } else {
        Err(RasterError::ChannelCount(channels))
    }
}

fn validate_matching_dimensions(
    expected: &RasterBuffer,
    actual: &RasterBuffer,
) -> Result<(), RasterError> {
    if expected.dimensions() == actual.dimensions() {
        Ok(())
    } else {
        Err(RasterError::DimensionMismatch {
            expected: expected.dimensions(),
            actual: actual.dimensions(),
        })
    }
}
