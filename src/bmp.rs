//! Uncompressed 24-bit bitmap output.
//!
//! Rows are stored bottom-to-top, so the first row of pixels (`y = 0`) is the
//! first row in the file and the bottom row of the picture. Alpha is dropped.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

use image::{codecs::bmp::BmpEncoder, ColorType, ImageError, ImageResult};
use log::debug;

use crate::{error::Error, grid::Size, julia::Bgra};

/// Pack `pixels` into RGB rows starting from the last row.
///
/// `image` treats its first row as the top of the picture and stores it last,
/// so reversing here puts `y = 0` first on disk.
fn top_down_rgb(pixels: &[Bgra], size: Size) -> Vec<u8> {
    pixels
        .chunks_exact(size.width as usize)
        .rev()
        .flat_map(|row| {
            row.iter()
                .flat_map(|pixel| [pixel.red, pixel.green, pixel.blue])
        })
        .collect()
}

pub fn write(writer: &mut impl Write, pixels: &[Bgra], size: Size) -> ImageResult<()> {
    debug_assert_eq!(pixels.len(), size.pixel_count());

    BmpEncoder::new(writer).encode(
        &top_down_rgb(pixels, size),
        size.width,
        size.height,
        ColorType::Rgb8,
    )
}

/// Write `pixels` to a new file at `path`, replacing any existing file.
pub fn save(path: impl AsRef<Path>, pixels: &[Bgra], size: Size) -> Result<(), Error> {
    let path = path.as_ref();
    let image_error = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::create(path).map_err(|e| image_error(ImageError::IoError(e)))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer, pixels, size).map_err(image_error)?;
    writer
        .flush()
        .map_err(|e| image_error(ImageError::IoError(e)))?;

    debug!("wrote {} {} bitmap", path.display(), size);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    /// Bytes per row on disk: three per pixel, padded to a multiple of four.
    fn row_len(width: u32) -> usize {
        (width as usize * 3 + 3) & !3
    }

    /// Decode a bitmap back into pixels, `y = 0` first, with opaque alpha.
    fn read(bytes: &[u8]) -> (Size, Vec<Bgra>) {
        let image = image::load_from_memory_with_format(bytes, image::ImageFormat::Bmp)
            .unwrap()
            .to_rgb8();
        let size = Size {
            width: image.width(),
            height: image.height(),
        };

        let mut pixels = Vec::with_capacity(size.pixel_count());
        for y in 0..size.height {
            for x in 0..size.width {
                let [red, green, blue] = image.get_pixel(x, size.height - 1 - y).0;
                pixels.push(Bgra {
                    blue,
                    green,
                    red,
                    alpha: 255,
                });
            }
        }
        (size, pixels)
    }

    fn gradient(size: Size) -> Vec<Bgra> {
        (0..size.height)
            .flat_map(|y| {
                (0..size.width).map(move |x| Bgra {
                    blue: x as u8,
                    green: y as u8,
                    red: (x * 7 + y * 13) as u8,
                    alpha: 128,
                })
            })
            .collect()
    }

    #[test]
    fn header_and_layout() {
        let size = Size {
            width: 2,
            height: 3,
        };
        let mut bytes = Vec::new();
        write(&mut bytes, &gradient(size), size).unwrap();

        assert_eq!(&bytes[0..2], b"BM");
        assert_eq!(u32_at(&bytes, 2) as usize, bytes.len());
        let offset = u32_at(&bytes, 10) as usize;
        assert_eq!(offset, 54);
        assert_eq!(u32_at(&bytes, 14), 40);
        assert_eq!(u32_at(&bytes, 18), 2);
        // Positive height: rows are stored bottom-up.
        assert_eq!(u32_at(&bytes, 22), 3);
        assert_eq!(u16_at(&bytes, 26), 1);
        assert_eq!(u16_at(&bytes, 28), 24);
        assert_eq!(u32_at(&bytes, 30), 0);

        // Three rows of 6 bytes, each padded to 8.
        assert_eq!(bytes.len(), offset + 3 * row_len(2));

        // Row y = 0 comes first: (x=0) then (x=1) as BGR, then two padding bytes.
        assert_eq!(&bytes[offset..offset + 8], &[0, 0, 0, 1, 0, 7, 0, 0]);
        // Row y = 2 comes last.
        assert_eq!(&bytes[offset + 16..offset + 24], &[0, 2, 26, 1, 2, 33, 0, 0]);
    }

    #[test]
    fn round_trip_drops_alpha() {
        for (width, height) in [(1, 1), (1, 7), (7, 1), (5, 3), (16, 9)] {
            let size = Size { width, height };
            let pixels = gradient(size);

            let mut bytes = Vec::new();
            write(&mut bytes, &pixels, size).unwrap();
            assert_eq!(bytes.len(), 54 + row_len(width) * height as usize);

            let (read_size, read_pixels) = read(&bytes);
            assert_eq!(read_size, size);
            let opaque: Vec<Bgra> = pixels
                .iter()
                .map(|pixel| Bgra {
                    alpha: 255,
                    ..*pixel
                })
                .collect();
            assert_eq!(read_pixels, opaque);
        }
    }

    #[test]
    fn save_writes_file() {
        let size = Size {
            width: 3,
            height: 2,
        };
        let path = std::env::temp_dir().join(format!("wgpu-julia-{}.bmp", std::process::id()));
        save(&path, &gradient(size), size).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let opaque: Vec<Bgra> = gradient(size)
            .into_iter()
            .map(|pixel| Bgra {
                alpha: 255,
                ..pixel
            })
            .collect();
        assert_eq!(read(&bytes), (size, opaque));
    }

    #[test]
    fn save_reports_path() {
        let size = Size {
            width: 1,
            height: 1,
        };
        let path = std::env::temp_dir()
            .join("wgpu-julia-missing-directory")
            .join("julia.bmp");
        match save(&path, &gradient(size), size) {
            Err(Error::Io {
                path: error_path,
                source: ImageError::IoError(_),
            }) => assert_eq!(error_path, path),
            other => panic!("expected an IO error, got {:?}", other),
        }
    }
}
