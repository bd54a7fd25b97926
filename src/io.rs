//! Decoding and encoding through the `image` crate, and output file naming.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{DynamicImage, ImageBuffer, ImageFormat, Luma, LumaA, Rgb, Rgba};
use tracing::{debug, warn};

use crate::error::Error;
use crate::imageops::vector::VectorOp;
use crate::raster::{ElementType, RasterBuffer};
use crate::settings::{OutputFormat, ProcessingSettings};

/// A decoded input file.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    /// Samples in the working element type
    pub buffer: RasterBuffer,
    /// Element type stored in the file
    pub original: ElementType,
}

/// Decodes an image file.
///
/// 8-bit files are widened to 16-bit and half floats to 32-bit floats so later
/// stages work with more precision. The stored type is reported as
/// [`Decoded::original`].
///
/// # Errors
///
/// Returns [`Error::Decode`] when the file cannot be opened or decoded.
pub fn decode(path: &Path) -> Result<Decoded, Error> {
    let image = image::open(path).map_err(|error| Error::Decode {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    let buffer = raster_from_dynamic(&image);
    let original = buffer.element_type();
    let working = original.working_type();
    debug!(
        path = %path.display(),
        %original,
        %working,
        "Decoded image"
    );
    Ok(Decoded {
        buffer: buffer.convert(working),
        original,
    })
}

/// Decodes a mask file as single-channel 32-bit float luminance.
///
/// # Errors
///
/// Returns [`Error::MaskRead`] when the file cannot be opened or decoded.
pub fn decode_mask(path: &Path) -> Result<RasterBuffer, Error> {
    let image = image::open(path).map_err(|error| Error::MaskRead {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    let luma: ImageBuffer<Luma<f32>, Vec<f32>> = image.to_luma32f();
    Ok(RasterBuffer::from(&luma))
}

fn raster_from_dynamic(image: &DynamicImage) -> RasterBuffer {
    match image {
        DynamicImage::ImageLuma8(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageLumaA8(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgb8(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgba8(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageLuma16(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageLumaA16(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgb16(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgba16(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgb32F(buffer) => RasterBuffer::from(buffer),
        DynamicImage::ImageRgba32F(buffer) => RasterBuffer::from(buffer),
        other if other.color().has_alpha() => RasterBuffer::from(&other.to_rgba32f()),
        other => RasterBuffer::from(&other.to_rgb32f()),
    }
}

/// Codec parameters for [`encode`].
#[derive(Debug, Clone, Copy)]
pub struct EncodeOptions {
    /// JPEG quality from 1 to 100
    pub jpeg_quality: u8,
    pub png_compression: CompressionType,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            jpeg_quality: 100,
            png_compression: CompressionType::Default,
        }
    }
}

/// Element type `format` stores for a requested `element`.
pub const fn storage_element_type(format: ImageFormat, element: ElementType) -> ElementType {
    match format {
        ImageFormat::Jpeg => ElementType::U8,
        ImageFormat::Png | ImageFormat::Pnm => match element {
            ElementType::U8 => ElementType::U8,
            _ => ElementType::U16,
        },
        ImageFormat::Tiff => match element {
            ElementType::U8 | ElementType::U16 => element,
            ElementType::U32 | ElementType::U64 => ElementType::U16,
            ElementType::F16 | ElementType::F32 | ElementType::F64 => ElementType::F32,
        },
        _ => ElementType::F32,
    }
}

/// Whether `format` can store an alpha channel.
pub const fn supports_alpha(format: ImageFormat) -> bool {
    !matches!(format, ImageFormat::Jpeg | ImageFormat::Pnm)
}

/// Writes `buffer` to `path`, the format taken from the extension.
///
/// The buffer is stored as `element` when the format allows it, otherwise as
/// [`storage_element_type`]. Alpha is dropped for formats without alpha and
/// grayscale is expanded where the encoder has no matching color type.
///
/// Returns the element type actually written.
///
/// # Errors
///
/// Returns [`Error::Encode`] for unknown extensions and codec or I/O failures.
pub fn encode(
    path: &Path,
    buffer: &RasterBuffer,
    element: ElementType,
    options: &EncodeOptions,
) -> Result<ElementType, Error> {
    let encode_error = |message: String| Error::Encode {
        path: path.to_path_buf(),
        message,
    };
    let format = ImageFormat::from_path(path).map_err(|error| encode_error(error.to_string()))?;

    let stored = storage_element_type(format, element);
    if stored != element {
        warn!(
            "{format:?} cannot store {element}, writing {stored} instead"
        );
    }

    let layout = storage_channels(format, stored, buffer.channel_count());
    let prepared = if layout == (0..buffer.channel_count()).collect::<Vec<_>>() {
        buffer.clone()
    } else {
        buffer
            .channels(&layout)
            .map_err(|error| encode_error(error.to_string()))?
    };
    let image = dynamic_from_raster(&prepared, stored).ok_or_else(|| {
        encode_error(format!(
            "no encoder color type for {} channel(s) of {stored}",
            prepared.channel_count()
        ))
    })?;

    let file = File::create(path).map_err(|error| encode_error(error.to_string()))?;
    let mut writer = BufWriter::new(file);
    let written = match format {
        ImageFormat::Jpeg => {
            image.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, options.jpeg_quality))
        }
        ImageFormat::Png => image.write_with_encoder(PngEncoder::new_with_quality(
            &mut writer,
            options.png_compression,
            FilterType::Adaptive,
        )),
        _ => image.write_to(&mut writer, format),
    };
    written.map_err(|error| encode_error(error.to_string()))?;
    writer
        .flush()
        .map_err(|error| encode_error(error.to_string()))?;
    debug!(path = %path.display(), %stored, channels = prepared.channel_count(), "Encoded image");
    Ok(stored)
}

/// Source channel order of the stored image.
fn storage_channels(format: ImageFormat, stored: ElementType, channels: usize) -> Vec<usize> {
    let channels = if supports_alpha(format) {
        channels
    } else {
        let color = if channels < 3 { 1 } else { 3 };
        if channels > color {
            warn!("{format:?} has no alpha channel, alpha is not written");
        }
        color
    };
    let expand = stored == ElementType::F32
        || matches!(format, ImageFormat::Pnm)
        || (matches!(format, ImageFormat::Tiff) && channels == 2);
    match channels {
        1 if expand => {
            warn!("{format:?} stores grayscale as RGB");
            vec![0, 0, 0]
        }
        2 if expand => {
            warn!("{format:?} stores grayscale with alpha as RGBA");
            vec![0, 0, 0, 1]
        }
        _ => (0..channels).collect(),
    }
}

fn dynamic_from_raster(buffer: &RasterBuffer, element: ElementType) -> Option<DynamicImage> {
    let (width, height) = buffer.dimensions();
    match (element, buffer.channel_count()) {
        (ElementType::U8, 1) => ImageBuffer::<Luma<u8>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageLuma8),
        (ElementType::U8, 2) => ImageBuffer::<LumaA<u8>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageLumaA8),
        (ElementType::U8, 3) => ImageBuffer::<Rgb<u8>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgb8),
        (ElementType::U8, 4) => ImageBuffer::<Rgba<u8>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgba8),
        (ElementType::U16, 1) => ImageBuffer::<Luma<u16>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageLuma16),
        (ElementType::U16, 2) => ImageBuffer::<LumaA<u16>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageLumaA16),
        (ElementType::U16, 3) => ImageBuffer::<Rgb<u16>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgb16),
        (ElementType::U16, 4) => ImageBuffer::<Rgba<u16>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgba16),
        (ElementType::F32, 3) => ImageBuffer::<Rgb<f32>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgb32F),
        (ElementType::F32, 4) => ImageBuffer::<Rgba<f32>, _>::from_raw(width, height, buffer.to_samples())
            .map(DynamicImage::ImageRgba32F),
        _ => None,
    }
}

/// Extension of the output file for `input`, without the dot.
///
/// [`OutputFormat::Original`] keeps the input extension when it can be
/// written. Formats that cannot be written fall back to the default format.
pub fn output_extension(input: &Path, settings: &ProcessingSettings) -> String {
    let requested = match settings.output_format {
        OutputFormat::Original => input
            .extension()
            .and_then(|extension| extension.to_str())
            .filter(|extension| {
                ImageFormat::from_extension(extension).is_some_and(|format| format.writing_enabled())
            })
            .map(str::to_owned),
        format if format.is_writable() => format.extension().map(str::to_owned),
        _ => None,
    };
    requested.unwrap_or_else(|| {
        let fallback = Some(settings.default_format)
            .filter(|format| format.is_writable())
            .and_then(OutputFormat::extension)
            .unwrap_or("tif");
        warn!(
            "{} cannot be written as {:?}, using .{fallback}",
            input.display(),
            settings.output_format
        );
        fallback.to_owned()
    })
}

/// Output path `<dir>/<stem><suffix>.<ext>` next to `input`.
///
/// The suffix names the first stage that changes the file: `_fill` for hole
/// filling, `_norm` for normalization, `_rep` for repair, `_conv` otherwise.
pub fn output_path(input: &Path, settings: &ProcessingSettings) -> PathBuf {
    let file_name = input
        .file_name()
        .map(|name| name.to_string_lossy())
        .unwrap_or_default();
    let suffix = if settings.solidify {
        "_fill"
    } else {
        match settings.vector_op(&file_name) {
            Some(VectorOp::Normalize(_)) => "_norm",
            Some(VectorOp::Repair { .. }) => "_rep",
            None => "_conv",
        }
    };
    let stem = input
        .file_stem()
        .map(|stem| stem.to_string_lossy())
        .unwrap_or_default();
    let name = format!("{stem}{suffix}.{}", output_extension(input, settings));
    input.with_file_name(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::{NormalizeMode, RepairMode};

    #[test]
    fn storage_types_per_format() {
        assert_eq!(storage_element_type(ImageFormat::Jpeg, ElementType::F32), ElementType::U8);
        assert_eq!(storage_element_type(ImageFormat::Png, ElementType::U8), ElementType::U8);
        assert_eq!(storage_element_type(ImageFormat::Png, ElementType::F16), ElementType::U16);
        assert_eq!(storage_element_type(ImageFormat::Tiff, ElementType::U64), ElementType::U16);
        assert_eq!(storage_element_type(ImageFormat::Tiff, ElementType::F64), ElementType::F32);
        assert_eq!(storage_element_type(ImageFormat::OpenExr, ElementType::U8), ElementType::F32);
    }

    #[test]
    fn alpha_support() {
        assert!(supports_alpha(ImageFormat::Png));
        assert!(supports_alpha(ImageFormat::OpenExr));
        assert!(!supports_alpha(ImageFormat::Jpeg));
        assert!(!supports_alpha(ImageFormat::Pnm));
    }

    #[test]
    fn storage_channels_expand_and_drop() {
        assert_eq!(storage_channels(ImageFormat::Jpeg, ElementType::U8, 4), vec![0, 1, 2]);
        assert_eq!(storage_channels(ImageFormat::Jpeg, ElementType::U8, 2), vec![0]);
        assert_eq!(storage_channels(ImageFormat::OpenExr, ElementType::F32, 1), vec![0, 0, 0]);
        assert_eq!(storage_channels(ImageFormat::Tiff, ElementType::U16, 2), vec![0, 0, 0, 1]);
        assert_eq!(storage_channels(ImageFormat::Png, ElementType::U16, 2), vec![0, 1]);
    }

    #[test]
    fn output_suffix_follows_first_active_stage() {
        let input = Path::new("textures/rock_normal.png");
        let mut settings = ProcessingSettings::default();
        assert_eq!(output_path(input, &settings), PathBuf::from("textures/rock_normal_fill.png"));

        settings.solidify = false;
        assert_eq!(output_path(input, &settings), PathBuf::from("textures/rock_normal_norm.png"));

        settings.repair = RepairMode::PosZ;
        assert_eq!(output_path(input, &settings), PathBuf::from("textures/rock_normal_rep.png"));

        settings.repair = RepairMode::Off;
        settings.normalize = NormalizeMode::Off;
        assert_eq!(output_path(input, &settings), PathBuf::from("textures/rock_normal_conv.png"));
    }

    #[test]
    fn unwritable_formats_fall_back() {
        let mut settings = ProcessingSettings {
            output_format: OutputFormat::Heic,
            ..ProcessingSettings::default()
        };
        assert_eq!(output_extension(Path::new("a.png"), &settings), "tif");

        settings.output_format = OutputFormat::Original;
        assert_eq!(output_extension(Path::new("a.psd"), &settings), "tif");
        assert_eq!(output_extension(Path::new("a.exr"), &settings), "exr");

        settings.output_format = OutputFormat::Exr;
        assert_eq!(output_extension(Path::new("a.png"), &settings), "exr");
    }

    #[test]
    fn rgba_u8_round_trips_through_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.png");
        let buffer =
            RasterBuffer::from_samples(2, 1, 4, vec![10u8, 20, 30, 255, 40, 50, 60, 0]).unwrap();
        let stored = encode(&path, &buffer, ElementType::U8, &EncodeOptions::default()).unwrap();
        assert_eq!(stored, ElementType::U8);

        let decoded = decode(&path).unwrap();
        assert_eq!(decoded.original, ElementType::U8);
        assert_eq!(decoded.buffer.element_type(), ElementType::U16);
        assert_eq!(decoded.buffer.to_samples::<u8>(), vec![10, 20, 30, 255, 40, 50, 60, 0]);
    }

    #[test]
    fn unknown_extension_is_encode_error() {
        let buffer = RasterBuffer::new(1, 1, 3, ElementType::U8).unwrap();
        let result = encode(Path::new("out.unknown"), &buffer, ElementType::U8, &EncodeOptions::default());
        assert!(matches!(result, Err(Error::Encode { .. })));
    }

    #[test]
    fn missing_input_is_decode_error() {
        assert!(matches!(decode(Path::new("missing.png")), Err(Error::Decode { .. })));
    }
}
