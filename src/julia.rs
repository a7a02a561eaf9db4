//! Escape-time evaluation of the Julia set.
//!
//! The device kernel lives in `julia.wgsl`. This module holds the constants it
//! is compiled with and a host implementation of the same formula, used to
//! check device output.

use bytemuck::{Pod, Zeroable};
use log::trace;
use rayon::prelude::{
    IndexedParallelIterator, IntoParallelRefIterator, ParallelIterator, ParallelSliceMut,
};

use crate::grid::Size;

/// Escape-time bound. A rendering constant, unrelated to how many times the
/// kernel is dispatched.
pub const ITERATIONS: u32 = 16;

/// Lower edge of the viewport, on both axes.
pub const VIEW_MIN: f32 = -1.5;

/// Upper edge of the viewport, on both axes.
pub const VIEW_MAX: f32 = 1.5;

#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq)]
pub struct Complex {
    pub real: f32,
    pub imaginary: f32,
}

impl Complex {
    /// The parameter `julia.bmp` is rendered with: Douady's rabbit.
    pub const RABBIT: Self = Complex {
        real: -0.123,
        imaginary: 0.745,
    };
}

/// One output pixel, in the byte order the kernel writes it.
#[repr(C)]
#[derive(Pod, Zeroable, Clone, Copy, Debug, PartialEq, Eq)]
pub struct Bgra {
    pub blue: u8,
    pub green: u8,
    pub red: u8,
    pub alpha: u8,
}

impl Bgra {
    /// Whether every channel of `self` is within `tolerance` of `other`.
    pub fn approx_eq(&self, other: &Bgra, tolerance: u8) -> bool {
        self.blue.abs_diff(other.blue) <= tolerance
            && self.green.abs_diff(other.green) <= tolerance
            && self.red.abs_diff(other.red) <= tolerance
            && self.alpha.abs_diff(other.alpha) <= tolerance
    }
}

/// Map a pixel to the complex plane.
///
/// Both axes are divided by the grid *width*, so a non-square grid is
/// stretched vertically rather than corrected for aspect ratio.
pub fn plane_point(x: u32, y: u32, width: u32) -> (f32, f32) {
    let a = x as f32 * (VIEW_MAX - VIEW_MIN) / width as f32 + VIEW_MIN;
    let b = y as f32 * (VIEW_MAX - VIEW_MIN) / width as f32 + VIEW_MIN;
    (a, b)
}

/// Fraction of [`ITERATIONS`] that pixel `(x, y)` survives before its squared
/// magnitude reaches `ITERATIONS² / 64`. Always in `[0, 1]`.
pub fn escape_fraction(x: u32, y: u32, width: u32, c: Complex) -> f32 {
    let (mut a, mut b) = plane_point(x, y, width);
    let threshold_squared = (ITERATIONS * ITERATIONS) as f32 / 64.0;

    let mut result = 0.0f32;
    for _ in 0..ITERATIONS {
        let aa = a * a;
        let bb = b * b;

        if aa + bb >= threshold_squared {
            break;
        }

        result += 1.0 / ITERATIONS as f32;
        b = 2.0 * a * b + c.imaginary;
        a = aa - bb + c.real;
    }

    result.clamp(0.0, 1.0)
}

/// Colour for an escape fraction: full blue, `sqrt(result)` green, `result`
/// red, opaque. Channels are truncated, not rounded.
pub fn colour(result: f32) -> Bgra {
    Bgra {
        blue: 255,
        green: (result.sqrt() * 255.0) as u8,
        red: (result * 255.0) as u8,
        alpha: 255,
    }
}

pub fn evaluate(x: u32, y: u32, width: u32, c: Complex) -> Bgra {
    colour(escape_fraction(x, y, width, c))
}

/// Evaluate every pixel of `size` on the host, row-major from `y = 0`.
pub fn render(size: Size, c: Complex) -> Vec<Bgra> {
    trace!("begin render");

    let mut pixels = vec![Bgra::zeroed(); size.pixel_count()];
    pixels
        .par_chunks_mut(size.width as usize)
        .enumerate()
        .for_each(|(y, row)| {
            for (x, pixel) in row.iter_mut().enumerate() {
                *pixel = evaluate(x as u32, y as u32, size.width, c);
            }
        });

    trace!("end render");
    pixels
}

/// Count pixels of `actual` that differ from `expected` by more than
/// `tolerance` in any channel.
pub fn count_mismatches(actual: &[Bgra], expected: &[Bgra], tolerance: u8) -> usize {
    debug_assert_eq!(actual.len(), expected.len());

    actual
        .par_iter()
        .zip(expected.par_iter())
        .filter(|(actual, expected)| !actual.approx_eq(expected, tolerance))
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SQUARE: Size = Size {
        width: 512,
        height: 512,
    };

    #[test]
    fn corner_maps_to_viewport_corner() {
        assert_eq!(plane_point(0, 0, SQUARE.width), (-1.5, -1.5));
    }

    #[test]
    fn corner_escapes_immediately() {
        // |(-1.5, -1.5)|² = 4.5 ≥ 4, so no iteration completes.
        assert_eq!(escape_fraction(0, 0, SQUARE.width, Complex::RABBIT), 0.0);
        assert_eq!(
            evaluate(0, 0, SQUARE.width, Complex::RABBIT),
            Bgra {
                blue: 255,
                green: 0,
                red: 0,
                alpha: 255
            }
        );
    }

    #[test]
    fn left_edge_escapes_after_one_iteration() {
        // (-1.5, 0) → (2.127, 0.745) after one step, which is past the threshold.
        assert_eq!(plane_point(0, 256, SQUARE.width), (-1.5, 0.0));
        assert_eq!(escape_fraction(0, 256, SQUARE.width, Complex::RABBIT), 0.0625);
        assert_eq!(
            evaluate(0, 256, SQUARE.width, Complex::RABBIT),
            Bgra {
                blue: 255,
                green: 63,
                red: 15,
                alpha: 255
            }
        );
    }

    #[test]
    fn centre_never_escapes() {
        // The critical orbit of the rabbit is bounded.
        assert_eq!(plane_point(256, 256, SQUARE.width), (0.0, 0.0));
        assert_eq!(escape_fraction(256, 256, SQUARE.width, Complex::RABBIT), 1.0);
        assert_eq!(
            evaluate(256, 256, SQUARE.width, Complex::RABBIT),
            Bgra {
                blue: 255,
                green: 255,
                red: 255,
                alpha: 255
            }
        );
    }

    #[test]
    fn channels_follow_escape_fraction() {
        let size = Size {
            width: 96,
            height: 64,
        };
        for y in 0..size.height {
            for x in 0..size.width {
                let result = escape_fraction(x, y, size.width, Complex::RABBIT);
                assert!((0.0..=1.0).contains(&result), "{} at ({}, {})", result, x, y);

                let pixel = evaluate(x, y, size.width, Complex::RABBIT);
                assert_eq!(pixel.blue, 255);
                assert_eq!(pixel.alpha, 255);
                assert_eq!(pixel.red, (255.0 * result).floor() as u8);
                assert_eq!(pixel.green, (255.0 * result.sqrt()).floor() as u8);
            }
        }
    }

    #[test]
    fn render_matches_evaluate() {
        let size = Size {
            width: 33,
            height: 17,
        };
        let pixels = render(size, Complex::RABBIT);
        assert_eq!(pixels.len(), size.pixel_count());
        assert_eq!(pixels[0], evaluate(0, 0, size.width, Complex::RABBIT));
        assert_eq!(
            pixels[16 * 33 + 32],
            evaluate(32, 16, size.width, Complex::RABBIT)
        );
    }

    #[test]
    fn render_is_deterministic() {
        let first = render(SQUARE, Complex::RABBIT);
        let second = render(SQUARE, Complex::RABBIT);
        assert_eq!(
            bytemuck::cast_slice::<Bgra, u8>(&first),
            bytemuck::cast_slice::<Bgra, u8>(&second)
        );
    }

    #[test]
    fn degenerate_grids() {
        let column = render(
            Size {
                width: 1,
                height: 5,
            },
            Complex::RABBIT,
        );
        assert_eq!(column.len(), 5);
        assert!(column.iter().all(|pixel| pixel.blue == 255));

        let row = render(
            Size {
                width: 5,
                height: 1,
            },
            Complex::RABBIT,
        );
        assert_eq!(row.len(), 5);
        assert!(row.iter().all(|pixel| pixel.alpha == 255));
    }

    #[test]
    fn mismatches_respect_tolerance() {
        let expected = render(SQUARE, Complex::RABBIT);
        let mut actual = expected.clone();
        assert_eq!(count_mismatches(&actual, &expected, 0), 0);

        actual[10].red = actual[10].red.wrapping_add(1);
        actual[20].green = actual[20].green.wrapping_add(9);
        assert_eq!(count_mismatches(&actual, &expected, 0), 2);
        assert_eq!(count_mismatches(&actual, &expected, 1), 1);
    }
}
