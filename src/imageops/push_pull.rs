//! Push-pull hole filling.
//!
//! The input holds premultiplied color and an alpha channel used as fill
//! confidence. The push phase averages color and alpha into ever coarser
//! levels down to a single pixel. The pull phase walks back up and composites
//! each level over the bilinear upsample of the coarser reconstruction:
//!
//! `R = P + (1 - alpha) * upsample(R_coarser)`
//!
//! Fully opaque pixels keep their color, holes receive the extrapolated color
//! and partially covered pixels blend both.

use itertools::iproduct;
use tracing::debug;

use crate::error::Error;
use crate::raster::RasterBuffer;
use crate::utils::{for_each_strip, validate_non_empty_image, with_thread_pool};

/// Hole filler with an optional dedicated thread count.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushPull {
    threads: Option<usize>,
}

impl PushPull {
    pub const fn new() -> Self {
        Self { threads: None }
    }

    /// Runs the level passes on `threads` threads, `None` uses the global pool.
    pub const fn with_threads(mut self, threads: Option<usize>) -> Self {
        self.threads = threads;
        self
    }

    /// Fills the holes of `buffer` in place.
    ///
    /// Color channels are replaced by the reconstruction, the alpha channel is
    /// set to fully opaque. Channel names and the alpha role are left alone.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Reconstruction`] for an empty buffer or a buffer
    /// without a valid alpha channel.
    pub fn fill(&self, buffer: &mut RasterBuffer) -> Result<(), Error> {
        let (width, height) = buffer.dimensions();
        validate_non_empty_image(width, height)
            .map_err(|error| Error::Reconstruction(error.to_string()))?;
        let channels = buffer.channel_count();
        let alpha = buffer
            .alpha_channel()
            .filter(|&index| index < channels)
            .ok_or_else(|| {
                Error::Reconstruction(format!(
                    "buffer with {channels} channel(s) has no valid alpha channel"
                ))
            })?;

        let finest = Level {
            width: width as usize,
            height: height as usize,
            samples: buffer.to_unit_samples(),
        };
        let filled = with_thread_pool(self.threads, || reconstruct(finest, channels, alpha))
            .map_err(|error| Error::Reconstruction(error.to_string()))?;
        buffer
            .store_unit_samples(&filled)
            .map_err(|error| Error::Reconstruction(error.to_string()))
    }
}

/// Builds the pyramid and pulls it back up into the finest level.
fn reconstruct(finest: Level, channels: usize, alpha: usize) -> Vec<f32> {
    let mut pyramid = vec![finest];
    while let Some(level) = pyramid.last().filter(|level| !level.is_base()) {
        let coarser = downsample(level, channels);
        pyramid.push(coarser);
    }
    debug!(levels = pyramid.len(), "Push-pull pyramid built");

    let mut levels = pyramid.into_iter().rev();
    let Some(base) = levels.next() else {
        return Vec::new();
    };
    let mut reconstruction = unpremultiply(base, channels, alpha);
    for level in levels {
        reconstruction = upsample_composite(&level, &reconstruction, channels, alpha);
    }

    let mut samples = reconstruction.samples;
    for pixel in samples.chunks_exact_mut(channels) {
        pixel[alpha] = 1.0;
    }
    samples
}

/// Extension trait filling holes with the default [`PushPull`] settings.
pub trait FillHoles {
    /// Fills holes and returns the buffer.
    ///
    /// # Examples
    /// ```no_run
    /// use solidify::{ElementType, FillHoles, RasterBuffer};
    ///
    /// # fn example() -> Result<(), Box<dyn std::error::Error>> {
    /// let mut buffer = RasterBuffer::new(64, 64, 4, ElementType::F32)?;
    /// buffer.set_alpha_channel(Some(3))?;
    /// let filled = buffer.fill_holes()?;
    /// # Ok(())
    /// # }
    /// ```
    fn fill_holes(self) -> Result<Self, Error>
    where
        Self: Sized;

    /// Fills holes in place.
    fn fill_holes_mut(&mut self) -> Result<&mut Self, Error>;
}

impl FillHoles for RasterBuffer {
    fn fill_holes(mut self) -> Result<Self, Error> {
        self.fill_holes_mut()?;
        Ok(self)
    }

    fn fill_holes_mut(&mut self) -> Result<&mut Self, Error> {
        PushPull::new().fill(self)?;
        Ok(self)
    }
}

/// One pyramid level of interleaved unit samples.
#[derive(Debug, Clone, PartialEq)]
struct Level {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl Level {
    const fn is_base(&self) -> bool {
        self.width <= 1 && self.height <= 1
    }

    fn pixel(&self, x: usize, y: usize, channels: usize) -> &[f32] {
        let start = (y * self.width + x) * channels;
        &self.samples[start..start + channels]
    }
}

/// Range `[start, end)` of fine indices covered by coarse index `index`.
fn footprint(index: usize, fine: usize, coarse: usize) -> (usize, usize) {
    let start = index * fine / coarse;
    let end = ((index + 1) * fine / coarse).max(start + 1).min(fine);
    (start, end)
}

/// Block mean of every channel. Color is premultiplied, so the mean of color
/// is the alpha weighted average and alpha is averaged once.
fn downsample(fine: &Level, channels: usize) -> Level {
    let width = (fine.width / 2).max(1);
    let height = (fine.height / 2).max(1);
    let row_len = width * channels;
    let mut samples = vec![0.0f32; row_len * height];

    for_each_strip(&mut samples, row_len, |first_row, strip| {
        for (offset, row) in strip.chunks_exact_mut(row_len).enumerate() {
            let (y0, y1) = footprint(first_row + offset, fine.height, height);
            for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let (x0, x1) = footprint(x, fine.width, width);
                for (fy, fx) in iproduct!(y0..y1, x0..x1) {
                    for (sum, &value) in pixel.iter_mut().zip(fine.pixel(fx, fy, channels)) {
                        *sum += value;
                    }
                }
                let count = ((y1 - y0) * (x1 - x0)) as f32;
                pixel.iter_mut().for_each(|sum| *sum /= count);
            }
        }
    });

    Level {
        width,
        height,
        samples,
    }
}

/// Turns the coarsest level back into straight color. Zero alpha gives black.
fn unpremultiply(mut base: Level, channels: usize, alpha: usize) -> Level {
    for pixel in base.samples.chunks_exact_mut(channels) {
        let weight = pixel[alpha];
        for (channel, value) in pixel.iter_mut().enumerate() {
            if channel != alpha {
                *value = if weight > 0.0 { *value / weight } else { 0.0 };
            }
        }
    }
    base
}

/// Bilinear source position and weight along one axis.
fn bilinear_axis(index: usize, fine: usize, coarse: usize) -> (usize, usize, f32) {
    let position = ((index as f32 + 0.5) * coarse as f32 / fine as f32 - 0.5)
        .clamp(0.0, (coarse - 1) as f32);
    let low = position.floor() as usize;
    let high = (low + 1).min(coarse - 1);
    (low, high, position - low as f32)
}

fn upsample_composite(level: &Level, coarser: &Level, channels: usize, alpha: usize) -> Level {
    let row_len = level.width * channels;
    let mut samples = level.samples.clone();

    for_each_strip(&mut samples, row_len, |first_row, strip| {
        for (offset, row) in strip.chunks_exact_mut(row_len).enumerate() {
            let (y0, y1, fy) = bilinear_axis(first_row + offset, level.height, coarser.height);
            for (x, pixel) in row.chunks_exact_mut(channels).enumerate() {
                let (x0, x1, fx) = bilinear_axis(x, level.width, coarser.width);
                let coverage = 1.0 - pixel[alpha].clamp(0.0, 1.0);
                if coverage <= 0.0 {
                    continue;
                }
                let top_left = coarser.pixel(x0, y0, channels);
                let top_right = coarser.pixel(x1, y0, channels);
                let bottom_left = coarser.pixel(x0, y1, channels);
                let bottom_right = coarser.pixel(x1, y1, channels);
                for (channel, value) in pixel.iter_mut().enumerate() {
                    if channel == alpha {
                        continue;
                    }
                    let top = top_left[channel] + (top_right[channel] - top_left[channel]) * fx;
                    let bottom =
                        bottom_left[channel] + (bottom_right[channel] - bottom_left[channel]) * fx;
                    *value += coverage * (top + (bottom - top) * fy);
                }
            }
        }
    });

    Level {
        width: level.width,
        height: level.height,
        samples,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::ElementType;
    use crate::test_utils::seeded_rgba;

    fn rgba(width: u32, height: u32, samples: Vec<f32>) -> RasterBuffer {
        let mut buffer = RasterBuffer::from_samples(width, height, 4, samples).unwrap();
        buffer.set_alpha_channel(Some(3)).unwrap();
        buffer
    }

    #[test]
    fn footprint_covers_every_fine_index() {
        for fine in 1..20 {
            let coarse = (fine / 2).max(1);
            let mut next = 0;
            for index in 0..coarse {
                let (start, end) = footprint(index, fine, coarse);
                assert_eq!(start, next);
                assert!(end > start);
                next = end;
            }
            assert_eq!(next, fine);
        }
    }

    #[test]
    fn opaque_pixels_are_unchanged() {
        let samples = vec![
            0.2, 0.4, 0.6, 1.0, 0.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 0.0, 0.9, 0.1, 0.3, 1.0,
        ];
        let mut buffer = rgba(2, 2, samples);
        PushPull::new().fill(&mut buffer).unwrap();
        assert_eq!(buffer.pixel(0, 0), vec![0.2, 0.4, 0.6, 1.0]);
        assert_eq!(buffer.pixel(1, 1), vec![0.9, 0.1, 0.3, 1.0]);
    }

    #[test]
    fn single_seed_fills_whole_image() {
        let mut samples = vec![0.0f32; 8 * 8 * 4];
        samples[..4].copy_from_slice(&[0.8, 0.4, 0.2, 1.0]);
        let mut buffer = rgba(8, 8, samples);
        PushPull::new().with_threads(Some(1)).fill(&mut buffer).unwrap();

        for y in 0..8 {
            for x in 0..8 {
                let pixel = buffer.pixel(x, y);
                assert!((pixel[0] - 0.8).abs() < 1e-4, "{x},{y}: {pixel:?}");
                assert!((pixel[1] - 0.4).abs() < 1e-4);
                assert!((pixel[2] - 0.2).abs() < 1e-4);
                assert_eq!(pixel[3], 1.0);
            }
        }
    }

    #[test]
    fn seed_in_a_corner_reaches_the_opposite_corner() {
        for seed in [(0, 0), (12, 0), (0, 8), (12, 8)] {
            let mut buffer = seeded_rgba(13, 9, seed, [0.1, 0.7, 0.3]);
            PushPull::new().fill(&mut buffer).unwrap();
            let pixel = buffer.pixel(12 - seed.0, 8 - seed.1);
            assert!((pixel[1] - 0.7).abs() < 1e-4, "{seed:?}: {pixel:?}");
            assert_eq!(buffer.pixel(seed.0, seed.1), vec![0.1, 0.7, 0.3, 1.0]);
        }
    }

    #[test]
    fn partial_alpha_blends_with_neighbors() {
        // premultiplied white at half alpha next to an opaque black pixel
        let mut buffer = rgba(2, 1, vec![0.5, 0.5, 0.5, 0.5, 0.0, 0.0, 0.0, 1.0]);
        PushPull::new().fill(&mut buffer).unwrap();
        let blended = buffer.sample(0, 0, 0);
        assert!(blended > 0.0 && blended < 1.0);
        assert_eq!(buffer.sample(1, 0, 0), 0.0);
    }

    #[test]
    fn odd_sizes_and_integer_storage() {
        let mut buffer = RasterBuffer::new(7, 3, 2, ElementType::U16).unwrap();
        buffer.set_alpha_channel(Some(1)).unwrap();
        buffer.set_sample(6, 2, 0, 1.0);
        buffer.set_sample(6, 2, 1, 1.0);
        PushPull::new().fill(&mut buffer).unwrap();
        for y in 0..3 {
            for x in 0..7 {
                assert_eq!(buffer.sample(x, y, 0), 1.0);
                assert_eq!(buffer.sample(x, y, 1), 1.0);
            }
        }
    }

    #[test]
    fn fully_transparent_image_becomes_black() {
        let mut buffer = rgba(4, 4, vec![0.0; 64]).fill_holes().unwrap();
        assert!(buffer.fill_holes_mut().is_ok());
        assert!(buffer.to_unit_samples().chunks(4).all(|p| p == [0.0, 0.0, 0.0, 1.0]));
    }

    #[test]
    fn missing_alpha_fails() {
        let mut buffer = RasterBuffer::new(4, 4, 3, ElementType::F32).unwrap();
        assert!(matches!(
            PushPull::new().fill(&mut buffer),
            Err(Error::Reconstruction(_))
        ));
    }

    #[test]
    fn empty_buffer_fails() {
        let mut buffer = RasterBuffer::new(0, 0, 4, ElementType::F32).unwrap();
        buffer.set_alpha_channel(Some(3)).unwrap();
        assert!(matches!(
            PushPull::new().fill(&mut buffer),
            Err(Error::Reconstruction(message)) if message.contains("must be non-zero, got 0x0")
        ));
    }

    #[test]
    fn dedicated_threads_match_global_pool() {
        let mut pooled = seeded_rgba(37, 21, (5, 17), [0.3, 0.6, 0.9]);
        let mut dedicated = pooled.clone();
        PushPull::new().fill(&mut pooled).unwrap();
        PushPull::new().with_threads(Some(3)).fill(&mut dedicated).unwrap();
        assert_eq!(pooled, dedicated);
    }
}
