//! Test utilities for solidify
//!
//! Fixtures shared by the unit tests. Only compiled when running tests.

use image::Rgba;
use imageproc::definitions::Image;
use itertools::iproduct;

use crate::raster::{ElementType, RasterBuffer};

/// Creates a 2x2 RGBA image with known pixel values:
/// - (0,0): [200, 150, 100, 255] (opaque)
/// - (1,0): [100, 200, 150, 128] (semi-transparent)
/// - (0,1): [150, 100, 200, 64]  (more transparent)
/// - (1,1): [50, 75, 25, 0]      (fully transparent)
pub fn create_test_rgba_image() -> Image<Rgba<u8>> {
    let mut image: Image<Rgba<u8>> = Image::new(2, 2);
    image.put_pixel(0, 0, Rgba([200, 150, 100, 255]));
    image.put_pixel(1, 0, Rgba([100, 200, 150, 128]));
    image.put_pixel(0, 1, Rgba([150, 100, 200, 64]));
    image.put_pixel(1, 1, Rgba([50, 75, 25, 0]));
    image
}

/// Float RGBA buffer, fully transparent except an opaque `color` pixel at `seed`.
///
/// The alpha role is set on channel 3.
pub fn seeded_rgba(width: u32, height: u32, seed: (u32, u32), color: [f32; 3]) -> RasterBuffer {
    let mut buffer = RasterBuffer::new(width, height, 4, ElementType::F32).unwrap();
    buffer.set_alpha_channel(Some(3)).unwrap();
    for (channel, value) in color.into_iter().enumerate() {
        buffer.set_sample(seed.0, seed.1, channel, value);
    }
    buffer.set_sample(seed.0, seed.1, 3, 1.0);
    buffer
}

/// Float RGB buffer filled with the unsigned encoding of `vector`.
pub fn unsigned_normal_map(width: u32, height: u32, vector: [f32; 3]) -> RasterBuffer {
    let mut buffer = RasterBuffer::new(width, height, 3, ElementType::F32).unwrap();
    for ((x, y), channel) in iproduct!(iproduct!(0..width, 0..height), 0..3) {
        buffer.set_sample(x, y, channel, vector[channel] * 0.5 + 0.5);
    }
    buffer
}
