//! Internal utility functions shared by the fill and vector stages.

use crate::error::RasterError;

/// Rows handed to one worker at a time.
pub const STRIP_ROWS: usize = 16;

/// Validates that an image has non-zero dimensions.
///
/// # Arguments
///
/// * `width` - The width of the image
/// * `height` - The height of the image
///
/// # Returns
///
/// `Ok(())` if the dimensions are valid, otherwise [`RasterError::EmptyImage`]
pub const fn validate_non_empty_image(width: u32, height: u32) -> Result<(), RasterError> {
    if width == 0 || height == 0 {
        Err(RasterError::EmptyImage { width, height })
    } else {
        Ok(())
    }
}

/// Runs a whole stage on `threads` threads.
///
/// `Some(n)` builds one dedicated pool of `n` threads and installs `stage` in
/// it, so every [`for_each_strip`] call inside the stage shares that pool.
/// `Some(1)` gives deterministic single-threaded execution. `None` runs on
/// the current pool.
pub fn with_thread_pool<R, F>(threads: Option<usize>, stage: F) -> Result<R, RasterError>
where
    R: Send,
    F: FnOnce() -> R + Send,
{
    #[cfg(feature = "rayon")]
    {
        if let Some(count) = threads {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(count)
                .build()
                .map_err(|error| RasterError::ThreadPool(error.to_string()))?;
            return Ok(pool.install(stage));
        }
    }

    #[cfg(not(feature = "rayon"))]
    let _ = threads;

    Ok(stage())
}

/// Runs `kernel` over horizontal strips of an interleaved sample slice.
///
/// `rows` holds whole rows of `row_len` samples. The kernel receives the
/// index of the strip's first row and the strip itself; strips never overlap,
/// so a kernel must not depend on rows outside its strip. Strips run on the
/// current rayon pool, see [`with_thread_pool`].
pub fn for_each_strip<T, F>(rows: &mut [T], row_len: usize, kernel: F)
where
    T: Send,
    F: Fn(usize, &mut [T]) + Send + Sync,
{
    if row_len == 0 || rows.is_empty() {
        return;
    }
    let chunk = row_len * STRIP_ROWS;

    #[cfg(feature = "rayon")]
    {
        use rayon::prelude::*;

        rows.par_chunks_mut(chunk)
            .enumerate()
            .for_each(|(index, strip)| kernel(index * STRIP_ROWS, strip));
    }

    #[cfg(not(feature = "rayon"))]
    rows.chunks_mut(chunk)
        .enumerate()
        .for_each(|(index, strip)| kernel(index * STRIP_ROWS, strip));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_non_empty_image() {
        assert!(validate_non_empty_image(100, 100).is_ok());
        assert!(validate_non_empty_image(1, 1).is_ok());
        assert!(validate_non_empty_image(0, 100).is_err());
        assert!(validate_non_empty_image(100, 0).is_err());
        assert_eq!(
            validate_non_empty_image(0, 0),
            Err(RasterError::EmptyImage {
                width: 0,
                height: 0
            })
        );
    }

    fn write_row_indices(threads: Option<usize>) -> Vec<usize> {
        let width = 3;
        let height = 40;
        let mut rows = vec![0usize; width * height];
        with_thread_pool(threads, || {
            for_each_strip(&mut rows, width, |first_row, strip| {
                for (offset, row) in strip.chunks_exact_mut(width).enumerate() {
                    row.fill(first_row + offset);
                }
            });
        })
        .unwrap();
        rows
    }

    #[test]
    fn strips_report_their_first_row() {
        let rows = write_row_indices(None);
        for (index, value) in rows.iter().enumerate() {
            assert_eq!(*value, index / 3);
        }
    }

    #[test]
    fn single_thread_matches_default_pool() {
        assert_eq!(write_row_indices(Some(1)), write_row_indices(None));
        assert_eq!(write_row_indices(Some(3)), write_row_indices(None));
    }

    #[test]
    fn stage_runs_once_and_returns_its_value() {
        let mut calls = 0;
        let value = with_thread_pool(Some(2), || {
            calls += 1;
            for_each_strip(&mut [0u8; 64], 4, |_, strip| strip.fill(1));
            42
        })
        .unwrap();
        assert_eq!((value, calls), (42, 1));
    }

    #[cfg(feature = "rayon")]
    #[test]
    fn dedicated_pool_runs_the_whole_stage() {
        let threads = with_thread_pool(Some(2), rayon::current_num_threads).unwrap();
        assert_eq!(threads, 2);
    }

    #[test]
    fn empty_input_is_a_no_op() {
        let mut rows: Vec<f32> = Vec::new();
        for_each_strip(&mut rows, 4, |_, _| unreachable!());
        for_each_strip(&mut [0.0f32; 8], 0, |_, _| unreachable!());
    }
}
