//! Per-pixel normal vector kernels.
//!
//! Channels 0 to 2 of a pixel are read as the X, Y and Z components of a
//! vector. A [`RangeMapping`] converts stored values into centered components
//! and back, so the same kernel serves unsigned `[0, 1]` and signed `[-1, 1]`
//! encodings. A fourth channel passes through untouched.

use std::ops::Range;

use tracing::debug;

use crate::error::{Error, RasterError};
use crate::raster::{ElementType, RasterBuffer, Sample};
use crate::settings::RangeMode;
use crate::utils::{for_each_strip, with_thread_pool};

/// Value range conversion `(inCenter, outCenter, scale)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RangeMapping {
    pub in_center: f32,
    pub out_center: f32,
    pub scale: f32,
}

impl RangeMapping {
    pub const UNSIGNED: Self = Self::new(0.5, 0.5, 0.5);
    pub const SIGNED: Self = Self::new(0.0, 0.0, 1.0);
    pub const UNSIGNED_TO_SIGNED: Self = Self::new(0.0, 0.5, 0.5);
    pub const SIGNED_TO_UNSIGNED: Self = Self::new(0.5, 0.0, 1.0);

    pub const fn new(in_center: f32, out_center: f32, scale: f32) -> Self {
        Self {
            in_center,
            out_center,
            scale,
        }
    }

    #[inline]
    fn decode(self, value: f32) -> f32 {
        (value - self.in_center) / self.scale
    }

    /// Maps centered components back, rescaling them to unit length.
    #[inline]
    fn encode_unit(self, t: [f32; 3]) -> [f32; 3] {
        let length = (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt();
        let factor = if length > 0.0 {
            self.scale / length
        } else {
            self.scale
        };
        t.map(|component| component * factor + self.out_center)
    }
}

impl From<RangeMode> for RangeMapping {
    fn from(mode: RangeMode) -> Self {
        match mode {
            RangeMode::Unsigned => Self::UNSIGNED,
            RangeMode::Signed => Self::SIGNED,
            RangeMode::UnsignedToSigned => Self::UNSIGNED_TO_SIGNED,
            RangeMode::SignedToUnsigned => Self::SIGNED_TO_UNSIGNED,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    X,
    Y,
    Z,
}

impl Axis {
    pub const fn index(self) -> usize {
        match self {
            Self::X => 0,
            Self::Y => 1,
            Self::Z => 2,
        }
    }
}

/// Vector component to rebuild and the sign it gets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RepairAxis {
    pub axis: Axis,
    pub negative: bool,
}

impl RepairAxis {
    pub const fn new(axis: Axis, negative: bool) -> Self {
        Self { axis, negative }
    }

    const fn sign(self) -> f32 {
        if self.negative {
            -1.0
        } else {
            1.0
        }
    }
}

/// Kernel applied to every pixel of the region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VectorOp {
    /// Rescale the vector to unit length
    Normalize(RangeMapping),
    /// Rebuild one component from the other two, then rescale to unit length
    Repair {
        axis: RepairAxis,
        mapping: RangeMapping,
    },
}

impl VectorOp {
    #[inline]
    pub fn apply(self, pixel: [f32; 3]) -> [f32; 3] {
        match self {
            Self::Normalize(mapping) => normalize_pixel(pixel, mapping),
            Self::Repair { axis, mapping } => repair_pixel(pixel, axis, mapping),
        }
    }

    fn error(self, message: String) -> Error {
        match self {
            Self::Normalize(_) => Error::Normalize(message),
            Self::Repair { .. } => Error::Repair(message),
        }
    }
}

/// Normalizes one stored vector. A zero vector maps to the output center.
pub fn normalize_pixel(pixel: [f32; 3], mapping: RangeMapping) -> [f32; 3] {
    mapping.encode_unit(pixel.map(|value| mapping.decode(value)))
}

/// Rebuilds the `axis` component of one stored vector assuming unit length.
///
/// The stored value of the target component is ignored. When the remaining
/// components are all zero the target stays zero as well.
pub fn repair_pixel(pixel: [f32; 3], axis: RepairAxis, mapping: RangeMapping) -> [f32; 3] {
    let target = axis.axis.index();
    let mut t = [0.0f32; 3];
    for (channel, component) in t.iter_mut().enumerate() {
        if channel != target {
            *component = mapping.decode(pixel[channel]);
        }
    }
    let squared: f32 = t.iter().map(|component| component * component).sum();
    if t.iter().any(|&component| component != 0.0) {
        t[target] = axis.sign() * (1.0 - squared).max(0.0).sqrt();
    }
    mapping.encode_unit(t)
}

/// Rectangle of pixels processed by the kernel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Roi {
    pub x: Range<u32>,
    pub y: Range<u32>,
}

impl Roi {
    pub const fn full(width: u32, height: u32) -> Self {
        Self {
            x: 0..width,
            y: 0..height,
        }
    }

    /// Clips the region to an image of the given size. Inverted ranges
    /// become empty.
    fn clip(&self, width: u32, height: u32) -> Self {
        Self {
            x: clip_range(&self.x, width),
            y: clip_range(&self.y, height),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty() || self.y.is_empty()
    }
}

fn clip_range(range: &Range<u32>, limit: u32) -> Range<u32> {
    let end = range.end.min(limit);
    range.start.min(end)..end
}

/// Vector kernel runner with an optional dedicated thread count.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorKernel {
    op: VectorOp,
    threads: Option<usize>,
}

impl VectorKernel {
    pub const fn new(op: VectorOp) -> Self {
        Self { op, threads: None }
    }

    /// `Some(1)` runs single-threaded and deterministic.
    pub const fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Applies the kernel to `roi` of `buffer`, the whole image when `None`.
    ///
    /// 8 and 16 bit integer, half and single float buffers are processed in
    /// their own type. Other element types go through a 32-bit float copy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Normalize`] or [`Error::Repair`], matching the
    /// operation, for buffers with fewer than three channels or when the
    /// worker threads cannot be started. Zero vectors are not an error.
    pub fn apply(&self, buffer: &mut RasterBuffer, roi: Option<&Roi>) -> Result<(), Error> {
        let channels = buffer.channel_count();
        if channels < 3 {
            return Err(self.op.error(format!(
                "vector data needs at least 3 channels, got {channels}"
            )));
        }
        let (width, height) = buffer.dimensions();
        let roi = roi.map_or_else(|| Roi::full(width, height), |roi| roi.clip(width, height));
        debug!(op = ?self.op, ?roi, element = %buffer.element_type(), "Running vector kernel");

        if roi.is_empty() {
            return Ok(());
        }

        with_thread_pool(self.threads, || match buffer.element_type() {
            ElementType::U8 => self.run_native::<u8>(buffer, &roi),
            ElementType::U16 => self.run_native::<u16>(buffer, &roi),
            ElementType::F16 => self.run_native::<half::f16>(buffer, &roi),
            ElementType::F32 => self.run_native::<f32>(buffer, &roi),
            ElementType::U32 | ElementType::U64 | ElementType::F64 => {
                self.run_via_f32(buffer, &roi)
            }
        })
        .and_then(|result| result)
        .map_err(|error| self.op.error(error.to_string()))
    }

    fn run_native<S: Sample>(&self, buffer: &mut RasterBuffer, roi: &Roi) -> Result<(), RasterError> {
        let width = buffer.width() as usize;
        let channels = buffer.channel_count();
        let actual = buffer.element_type();
        let samples = buffer
            .samples_mut::<S>()
            .ok_or(RasterError::ElementTypeMismatch {
                expected: S::ELEMENT,
                actual,
            })?;
        run_kernel(samples, width, channels, roi, self.op);
        Ok(())
    }

    fn run_via_f32(&self, buffer: &mut RasterBuffer, roi: &Roi) -> Result<(), RasterError> {
        debug!(element = %buffer.element_type(), "Vector kernel falls back to 32-bit float");
        let width = buffer.width() as usize;
        let channels = buffer.channel_count();
        let mut unit = buffer.to_unit_samples();
        run_kernel(&mut unit, width, channels, roi, self.op);
        buffer.store_unit_samples(&unit)
    }
}

fn run_kernel<S: Sample>(
    samples: &mut [S],
    width: usize,
    channels: usize,
    roi: &Roi,
    op: VectorOp,
) {
    let row_len = width * channels;
    let columns = roi.x.start as usize..roi.x.end as usize;
    for_each_strip(samples, row_len, |first_row, strip| {
        for (offset, row) in strip.chunks_exact_mut(row_len).enumerate() {
            if !roi.y.contains(&((first_row + offset) as u32)) {
                continue;
            }
            for pixel in row[columns.start * channels..columns.end * channels].chunks_exact_mut(channels) {
                let result = op.apply([pixel[0].to_unit(), pixel[1].to_unit(), pixel[2].to_unit()]);
                for (sample, value) in pixel.iter_mut().zip(result) {
                    *sample = S::from_unit(value);
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::unsigned_normal_map;

    fn length(t: [f32; 3]) -> f32 {
        (t[0] * t[0] + t[1] * t[1] + t[2] * t[2]).sqrt()
    }

    fn assert_close(actual: [f32; 3], expected: [f32; 3], tolerance: f32) {
        for (a, e) in actual.iter().zip(expected) {
            assert!((a - e).abs() <= tolerance, "{actual:?} != {expected:?}");
        }
    }

    #[test]
    fn range_modes_map_to_literal_triples() {
        assert_eq!(RangeMapping::from(RangeMode::Unsigned), RangeMapping::new(0.5, 0.5, 0.5));
        assert_eq!(RangeMapping::from(RangeMode::Signed), RangeMapping::new(0.0, 0.0, 1.0));
        assert_eq!(
            RangeMapping::from(RangeMode::UnsignedToSigned),
            RangeMapping::new(0.0, 0.5, 0.5)
        );
        assert_eq!(
            RangeMapping::from(RangeMode::SignedToUnsigned),
            RangeMapping::new(0.5, 0.0, 1.0)
        );
    }

    #[test]
    fn normalize_rescales_to_unit_length() {
        let result = normalize_pixel([0.3, 0.4, 0.0], RangeMapping::SIGNED);
        assert_close(result, [0.6, 0.8, 0.0], 1e-6);
        assert!((length(result) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_maps_to_out_center() {
        assert_eq!(normalize_pixel([0.5; 3], RangeMapping::UNSIGNED), [0.5; 3]);
        assert_eq!(normalize_pixel([0.0; 3], RangeMapping::SIGNED), [0.0; 3]);
    }

    #[test]
    fn repair_rebuilds_dropped_z() {
        let mapping = RangeMapping::UNSIGNED;
        let stored = [0.6 * 0.5 + 0.5, 0.8 * 0.5 + 0.5, 0.5];
        let result = repair_pixel(stored, RepairAxis::new(Axis::Z, false), mapping);
        assert_close(result, [0.8, 0.9, 0.5], 1e-3);
    }

    #[test]
    fn repair_applies_sign() {
        let mapping = RangeMapping::SIGNED;
        let positive = repair_pixel([0.0, 0.6, 0.8], RepairAxis::new(Axis::X, false), mapping);
        let negative = repair_pixel([0.0, 0.6, 0.0], RepairAxis::new(Axis::X, true), mapping);
        assert_close(positive, [0.0, 0.6, 0.8], 1e-6);
        assert_close(negative, [-0.8, 0.6, 0.0], 1e-6);
    }

    #[test]
    fn repair_ignores_stored_target_and_handles_zero() {
        let mapping = RangeMapping::SIGNED;
        let axis = RepairAxis::new(Axis::Y, false);
        assert_eq!(repair_pixel([0.0, 0.7, 0.0], axis, mapping), [0.0, 0.0, 0.0]);
        // components longer than one clamp the rebuilt axis to zero
        let result = repair_pixel([3.0, 0.0, 4.0], axis, mapping);
        assert_close(result, [0.6, 0.0, 0.8], 1e-6);
    }

    #[test]
    fn kernel_passes_alpha_through() {
        let mut buffer =
            RasterBuffer::from_samples(1, 1, 4, vec![0.3f32, 0.4, 0.0, 0.25]).unwrap();
        VectorKernel::new(VectorOp::Normalize(RangeMapping::SIGNED))
            .apply(&mut buffer, None)
            .unwrap();
        let pixel = buffer.samples::<f32>().unwrap();
        assert_close([pixel[0], pixel[1], pixel[2]], [0.6, 0.8, 0.0], 1e-6);
        assert_eq!(pixel[3], 0.25);
    }

    #[test]
    fn kernel_respects_region() {
        let samples: Vec<f32> = [0.3, 0.4, 0.0].repeat(4);
        let mut buffer = RasterBuffer::from_samples(2, 2, 3, samples).unwrap();
        let roi = Roi { x: 1..2, y: 0..1 };
        VectorKernel::new(VectorOp::Normalize(RangeMapping::SIGNED))
            .apply(&mut buffer, Some(&roi))
            .unwrap();
        assert!((buffer.sample(1, 0, 0) - 0.6).abs() < 1e-6);
        assert_eq!(buffer.sample(0, 0, 0), 0.3);
        assert_eq!(buffer.sample(1, 1, 0), 0.3);
    }

    #[test]
    fn wide_types_use_float_fallback() {
        let mut buffer = RasterBuffer::from_unit_samples(
            1,
            1,
            3,
            ElementType::F64,
            &[0.3, 0.4, 0.0],
        )
        .unwrap();
        VectorKernel::new(VectorOp::Normalize(RangeMapping::SIGNED))
            .with_threads(Some(1))
            .apply(&mut buffer, None)
            .unwrap();
        assert!((buffer.sample(0, 0, 1) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn integer_results_are_clamped() {
        let mut buffer = RasterBuffer::from_samples(1, 1, 3, vec![255u8, 128, 128]).unwrap();
        VectorKernel::new(VectorOp::Normalize(RangeMapping::SIGNED))
            .apply(&mut buffer, None)
            .unwrap();
        assert!(buffer.samples::<u8>().unwrap().iter().all(|&value| value <= 255));
    }

    #[test]
    fn too_few_channels_fail_per_operation() {
        let mut buffer = RasterBuffer::new(1, 1, 2, ElementType::F32).unwrap();
        assert!(matches!(
            VectorKernel::new(VectorOp::Normalize(RangeMapping::UNSIGNED)).apply(&mut buffer, None),
            Err(Error::Normalize(_))
        ));
        let repair = VectorOp::Repair {
            axis: RepairAxis::new(Axis::Z, false),
            mapping: RangeMapping::UNSIGNED,
        };
        assert!(matches!(
            VectorKernel::new(repair).apply(&mut buffer, None),
            Err(Error::Repair(_))
        ));
    }

    #[test]
    fn short_vectors_are_rescaled_across_the_map() {
        let mut buffer = unsigned_normal_map(5, 4, [0.0, 0.0, 0.5]);
        VectorKernel::new(VectorOp::Normalize(RangeMapping::UNSIGNED))
            .with_threads(Some(2))
            .apply(&mut buffer, None)
            .unwrap();
        for pixel in buffer.to_unit_samples().chunks(3) {
            assert_close([pixel[0], pixel[1], pixel[2]], [0.5, 0.5, 1.0], 1e-6);
        }
    }

    #[test]
    fn region_limits_repair() {
        let mut buffer = unsigned_normal_map(6, 6, [0.6, 0.0, 0.0]);
        let repair = VectorOp::Repair {
            axis: RepairAxis::new(Axis::Z, false),
            mapping: RangeMapping::UNSIGNED,
        };
        let roi = Roi { x: 2..4, y: 1..6 };
        VectorKernel::new(repair).apply(&mut buffer, Some(&roi)).unwrap();

        for (x, y) in (0..6).flat_map(|y| (0..6).map(move |x| (x, y))) {
            let z = buffer.sample(x, y, 2);
            if roi.x.contains(&x) && roi.y.contains(&y) {
                assert!((z - 0.9).abs() < 1e-5, "{x},{y}: {z}");
            } else {
                assert_eq!(z, 0.5, "{x},{y}");
            }
        }
    }

    #[test]
    #[allow(clippy::reversed_empty_ranges)]
    fn inverted_ranges_clip_to_empty() {
        let roi = Roi { x: 3..1, y: 0..9 }.clip(4, 2);
        assert_eq!(roi, Roi { x: 1..1, y: 0..2 });
        assert!(roi.is_empty());
        assert_eq!(Roi { x: 7..5, y: 1..3 }.clip(4, 2), Roi { x: 4..4, y: 1..2 });
        assert!(!Roi::full(4, 2).is_empty());
    }
}
