use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ScreenshotError {
    #[error("display image has {actual} bytes, {width}x{height} RGBA needs {expected}")]
    SizeMismatch {
        width: u32,
        height: u32,
        expected: usize,
        actual: usize,
    },
    #[error("write screenshot '{}': {source}", path.display())]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Writes bottom-row-first RGBA8 pixels as a PNG with the usual top-left origin.
pub fn write_png(
    path: &Path,
    width: u32,
    height: u32,
    rgba: &[u8],
) -> Result<(), ScreenshotError> {
    let expected = width as usize * height as usize * 4;
    let size_mismatch = ScreenshotError::SizeMismatch {
        width,
        height,
        expected,
        actual: rgba.len(),
    };
    if rgba.len() != expected || expected == 0 {
        return Err(size_mismatch);
    }

    let row_bytes = width as usize * 4;
    let flipped: Vec<u8> = rgba
        .chunks_exact(row_bytes)
        .rev()
        .flatten()
        .copied()
        .collect();
    let image = image::RgbaImage::from_raw(width, height, flipped).ok_or(size_mismatch)?;

    log::info!(
        "[screenshot] saving {width} x {height} image to '{}'",
        path.display()
    );
    image
        .save_with_format(path, image::ImageFormat::Png)
        .map_err(|source| ScreenshotError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_are_flipped_to_top_left_origin() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("image.png");
        let bottom = [255, 0, 0, 255, 255, 0, 0, 255];
        let top = [0, 0, 255, 255, 0, 0, 255, 255];
        let rgba: Vec<u8> = bottom.iter().chain(top.iter()).copied().collect();

        write_png(&path, 2, 2, &rgba).expect("write png");

        let decoded = image::open(&path).expect("decode png").to_rgba8();
        assert_eq!(decoded.dimensions(), (2, 2));
        assert_eq!(decoded.get_pixel(0, 0).0, [0, 0, 255, 255]);
        assert_eq!(decoded.get_pixel(1, 1).0, [255, 0, 0, 255]);
    }

    #[test]
    fn rejects_mismatched_pixel_count() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("image.png");
        let error = write_png(&path, 4, 4, &[0; 12]).expect_err("too few bytes");
        assert!(matches!(
            error,
            ScreenshotError::SizeMismatch {
                expected: 64,
                actual: 12,
                ..
            }
        ));
        assert!(!path.exists());
    }
}
