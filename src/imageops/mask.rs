use std::path::Path;

use tracing::{debug, info};

use crate::error::{Error, RasterError};
use crate::io;
use crate::raster::{ElementType, RasterBuffer};

/// Alpha taken from an external mask file, shared read-only by every file of a batch.
///
/// Holds the single-channel alpha and a three-channel broadcast of it for
/// multiplying into RGB color. Both members always exist together; "no mask"
/// is expressed as `Option<MaskPair>::None`.
#[derive(Debug, Clone, PartialEq)]
pub struct MaskPair {
    alpha: RasterBuffer,
    broadcast: RasterBuffer,
}

impl MaskPair {
    /// Builds the pair from the first channel of `mask`, stored as 32-bit float.
    pub fn from_alpha(mask: &RasterBuffer) -> Result<Self, RasterError> {
        let mut alpha = mask.channels(&[0])?.convert(ElementType::F32);
        alpha.set_channel_name(0, "A")?;
        alpha.set_alpha_channel(Some(0))?;

        let mut broadcast = alpha.channels(&[0, 0, 0])?;
        for (index, name) in ["R", "G", "B"].into_iter().enumerate() {
            broadcast.set_channel_name(index, name)?;
        }
        Ok(Self { alpha, broadcast })
    }

    /// Single-channel alpha with the alpha role set.
    pub const fn alpha(&self) -> &RasterBuffer {
        &self.alpha
    }

    /// The alpha replicated into three channels.
    pub const fn broadcast(&self) -> &RasterBuffer {
        &self.broadcast
    }

    pub const fn dimensions(&self) -> (u32, u32) {
        self.alpha.dimensions()
    }
}

/// Loads an external mask file.
///
/// # Errors
///
/// Returns [`Error::MaskRead`] when the file cannot be decoded. Every file of
/// the batch depends on the mask, so callers should stop the batch.
pub fn load_mask(path: &Path) -> Result<MaskPair, Error> {
    info!("Loading mask {}", path.display());
    let mask = io::decode_mask(path)?;
    let pair = MaskPair::from_alpha(&mask).map_err(|error| Error::MaskRead {
        path: path.to_path_buf(),
        message: error.to_string(),
    })?;
    let (width, height) = pair.dimensions();
    debug!(width, height, "Mask loaded");
    Ok(pair)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_broadcasts_first_channel() {
        let mask = RasterBuffer::from_samples(2, 1, 2, vec![0u8, 9, 255, 9]).unwrap();
        let pair = MaskPair::from_alpha(&mask).unwrap();

        assert_eq!(pair.alpha().element_type(), ElementType::F32);
        assert_eq!(pair.alpha().alpha_channel(), Some(0));
        assert_eq!(pair.alpha().samples::<f32>().unwrap(), &[0.0, 1.0]);
        assert_eq!(
            pair.broadcast().samples::<f32>().unwrap(),
            &[0.0, 0.0, 0.0, 1.0, 1.0, 1.0]
        );
        assert_eq!(pair.broadcast().alpha_channel(), None);
        assert_eq!(pair.dimensions(), (2, 1));
    }

    #[test]
    fn missing_mask_file_is_a_mask_error() {
        let result = load_mask(Path::new("definitely/not/here_mask.png"));
        assert!(matches!(result, Err(Error::MaskRead { .. })));
        assert!(result.unwrap_err().is_batch_fatal());
    }
}
