//! Storage element types and their conversion to normalized floats.
//!
//! Integer samples map onto `[0, 1]` by dividing by the type maximum,
//! float samples are taken as they are.

use std::fmt;

use half::f16;
use imageproc::definitions::Clamp;

use super::PixelData;

/// Numeric type of the samples stored in a [`RasterBuffer`](super::RasterBuffer).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ElementType {
    U8,
    U16,
    U32,
    U64,
    F16,
    F32,
    F64,
}

impl ElementType {
    /// Size of one sample in bytes.
    pub const fn size_bytes(self) -> usize {
        match self {
            Self::U8 => 1,
            Self::U16 | Self::F16 => 2,
            Self::U32 | Self::F32 => 4,
            Self::U64 | Self::F64 => 8,
        }
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::F16 | Self::F32 | Self::F64)
    }

    /// Type used while processing a freshly decoded buffer.
    ///
    /// 8-bit sources are widened to 16-bit and half floats to 32-bit floats so
    /// premultiplication and filling do not band.
    pub const fn working_type(self) -> Self {
        match self {
            Self::U8 => Self::U16,
            Self::F16 => Self::F32,
            other => other,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::U8 => "8bit integer",
            Self::U16 => "16bit integer",
            Self::U32 => "32bit integer",
            Self::U64 => "64bit integer",
            Self::F16 => "16bit (half) float",
            Self::F32 => "32bit float",
            Self::F64 => "64bit (double) float",
        };
        f.write_str(text)
    }
}

/// A storable sample type.
pub trait Sample: Copy + Default + PartialEq + Send + Sync + fmt::Debug + 'static {
    const ELEMENT: ElementType;

    /// Converts to a normalized float.
    fn to_unit(self) -> f32;

    /// Converts from a normalized float, clamping and rounding for integer types.
    fn from_unit(value: f32) -> Self;

    fn slice(data: &PixelData) -> Option<&[Self]>;

    fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]>;
}

macro_rules! impl_small_int_sample {
    ($type:ty, $variant:ident) => {
        impl Sample for $type {
            const ELEMENT: ElementType = ElementType::$variant;

            #[inline]
            fn to_unit(self) -> f32 {
                f32::from(self) / f32::from(<$type>::MAX)
            }

            #[inline]
            fn from_unit(value: f32) -> Self {
                <$type as Clamp<f32>>::clamp((value * f32::from(<$type>::MAX)).round())
            }

            fn slice(data: &PixelData) -> Option<&[Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }
        }
    };
}

macro_rules! impl_wide_int_sample {
    ($type:ty, $variant:ident) => {
        impl Sample for $type {
            const ELEMENT: ElementType = ElementType::$variant;

            #[inline]
            fn to_unit(self) -> f32 {
                (self as f64 / <$type>::MAX as f64) as f32
            }

            #[inline]
            fn from_unit(value: f32) -> Self {
                // `as` saturates, NaN lands on zero
                (f64::from(value.clamp(0.0, 1.0)) * <$type>::MAX as f64).round() as $type
            }

            fn slice(data: &PixelData) -> Option<&[Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }
        }
    };
}

impl_small_int_sample!(u8, U8);
impl_small_int_sample!(u16, U16);
impl_wide_int_sample!(u32, U32);
impl_wide_int_sample!(u64, U64);

macro_rules! impl_float_sample {
    ($type:ty, $variant:ident, $to:path, $from:path) => {
        impl Sample for $type {
            const ELEMENT: ElementType = ElementType::$variant;

            #[inline]
            fn to_unit(self) -> f32 {
                $to(self)
            }

            #[inline]
            fn from_unit(value: f32) -> Self {
                $from(value)
            }

            fn slice(data: &PixelData) -> Option<&[Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }

            fn slice_mut(data: &mut PixelData) -> Option<&mut [Self]> {
                match data {
                    PixelData::$variant(samples) => Some(samples),
                    _ => None,
                }
            }
        }
    };
}

fn same(value: f32) -> f32 {
    value
}

fn narrow(value: f64) -> f32 {
    value as f32
}

impl_float_sample!(f16, F16, f16::to_f32, f16::from_f32);
impl_float_sample!(f32, F32, same, same);
impl_float_sample!(f64, F64, narrow, f64::from);
