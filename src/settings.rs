//! Immutable processing configuration shared by every file of a batch.

use clap::ValueEnum;

use crate::imageops::vector::{Axis, RangeMapping, RepairAxis, VectorOp};
use crate::raster::ElementType;

/// When vector normalization runs.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum NormalizeMode {
    /// Never
    Off,
    /// Only for files whose name contains a normal map substring
    #[default]
    Smart,
    /// For every file
    Force,
}

/// Vector component rebuilt by the repair kernel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum RepairMode {
    #[default]
    Off,
    PosX,
    PosY,
    PosZ,
    NegX,
    NegY,
    NegZ,
}

impl RepairMode {
    pub const fn axis(self) -> Option<RepairAxis> {
        match self {
            Self::Off => None,
            Self::PosX => Some(RepairAxis::new(Axis::X, false)),
            Self::PosY => Some(RepairAxis::new(Axis::Y, false)),
            Self::PosZ => Some(RepairAxis::new(Axis::Z, false)),
            Self::NegX => Some(RepairAxis::new(Axis::X, true)),
            Self::NegY => Some(RepairAxis::new(Axis::Y, true)),
            Self::NegZ => Some(RepairAxis::new(Axis::Z, true)),
        }
    }
}

/// Stored value range of vector data.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum RangeMode {
    #[default]
    Unsigned,
    Signed,
    UnsignedToSigned,
    SignedToUnsigned,
}

/// Element type of the written file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum OutputBitDepth {
    /// The type the input was decoded with
    #[default]
    Original,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Half,
    Float,
    Double,
}

impl OutputBitDepth {
    /// Requested element type, `None` for [`OutputBitDepth::Original`].
    pub const fn element_type(self) -> Option<ElementType> {
        match self {
            Self::Original => None,
            Self::Uint8 => Some(ElementType::U8),
            Self::Uint16 => Some(ElementType::U16),
            Self::Uint32 => Some(ElementType::U32),
            Self::Uint64 => Some(ElementType::U64),
            Self::Half => Some(ElementType::F16),
            Self::Float => Some(ElementType::F32),
            Self::Double => Some(ElementType::F64),
        }
    }
}

/// Container format of the written file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, ValueEnum)]
pub enum OutputFormat {
    /// Same extension as the input
    #[default]
    Original,
    Tiff,
    Exr,
    Png,
    Jpeg,
    Jpeg2000,
    Heic,
    Ppm,
}

impl OutputFormat {
    /// File extension without the dot, `None` for [`OutputFormat::Original`].
    pub const fn extension(self) -> Option<&'static str> {
        match self {
            Self::Original => None,
            Self::Tiff => Some("tif"),
            Self::Exr => Some("exr"),
            Self::Png => Some("png"),
            Self::Jpeg => Some("jpg"),
            Self::Jpeg2000 => Some("jp2"),
            Self::Heic => Some("heic"),
            Self::Ppm => Some("ppm"),
        }
    }

    /// Whether files of this format can be encoded.
    pub const fn is_writable(self) -> bool {
        !matches!(self, Self::Jpeg2000 | Self::Heic)
    }
}

/// Settings for one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingSettings {
    /// Fill transparent regions with push-pull
    pub solidify: bool,
    /// Write the original or mask alpha as an extra channel
    pub export_alpha: bool,
    pub normalize: NormalizeMode,
    pub repair: RepairMode,
    pub range: RangeMode,
    pub output_bit_depth: OutputBitDepth,
    pub output_format: OutputFormat,
    /// Format used when the selected one cannot be written
    pub default_format: OutputFormat,
    /// Lowercase substrings marking a file as a normal map
    pub normal_names: Vec<String>,
    /// Lowercase substrings marking a file as the batch mask
    pub mask_names: Vec<String>,
    /// Files processed in parallel, 0 picks the number of CPUs
    pub worker_threads: usize,
    /// Threads per kernel, `None` uses the global pool
    pub kernel_threads: Option<usize>,
}

impl Default for ProcessingSettings {
    fn default() -> Self {
        Self {
            solidify: true,
            export_alpha: false,
            normalize: NormalizeMode::Smart,
            repair: RepairMode::Off,
            range: RangeMode::Unsigned,
            output_bit_depth: OutputBitDepth::Original,
            output_format: OutputFormat::Original,
            default_format: OutputFormat::Tiff,
            normal_names: ["normal", "tangent", "object", "world"]
                .map(String::from)
                .to_vec(),
            mask_names: ["_mask.", "_mask_", "_alpha.", "_alpha_"]
                .map(String::from)
                .to_vec(),
            worker_threads: 3,
            kernel_threads: None,
        }
    }
}

impl ProcessingSettings {
    /// Whether `file_name` contains one of the normal map substrings, ignoring case.
    pub fn is_normal_name(&self, file_name: &str) -> bool {
        contains_any(file_name, &self.normal_names)
    }

    /// Whether normalization applies to `file_name` under the normalize mode.
    pub fn should_normalize(&self, file_name: &str) -> bool {
        match self.normalize {
            NormalizeMode::Off => false,
            NormalizeMode::Smart => self.is_normal_name(file_name),
            NormalizeMode::Force => true,
        }
    }

    pub fn range_mapping(&self) -> RangeMapping {
        RangeMapping::from(self.range)
    }

    /// Vector operation for `file_name`. Repair takes precedence over normalize.
    pub fn vector_op(&self, file_name: &str) -> Option<VectorOp> {
        let mapping = self.range_mapping();
        match self.repair.axis() {
            Some(axis) => Some(VectorOp::Repair { axis, mapping }),
            None => self
                .should_normalize(file_name)
                .then_some(VectorOp::Normalize(mapping)),
        }
    }
}

/// Case-insensitive substring test against a list of needles.
pub(crate) fn contains_any(haystack: &str, needles: &[String]) -> bool {
    let haystack = haystack.to_lowercase();
    needles
        .iter()
        .any(|needle| haystack.contains(&needle.to_lowercase()))
}
