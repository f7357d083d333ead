//! 3×3 convolution kernels with wrap-around borders
//!
//! Border cells read their missing neighbors from the opposite edge, the same
//! toroidal policy the divergence operator uses. Kernels are applied as
//! cross-correlation: `out(x, y) = Σ k[dy+1][dx+1] · in(x+dx, y+dy)`.

use rayon::prelude::*;

/// Row-major 3×3 kernel, rows ordered from `y - 1` to `y + 1`
pub type Kernel3 = [[f32; 3]; 3];

/// Binomial approximation of a Gaussian, normalized to sum to 1
pub const GAUSSIAN_3X3: Kernel3 = [
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
    [2.0 / 16.0, 4.0 / 16.0, 2.0 / 16.0],
    [1.0 / 16.0, 2.0 / 16.0, 1.0 / 16.0],
];

/// Sobel derivative along x (positive when values grow with x)
pub const SOBEL_X: Kernel3 = [[-1.0, 0.0, 1.0], [-2.0, 0.0, 2.0], [-1.0, 0.0, 1.0]];

/// Sobel derivative along y (positive when values grow with y)
pub const SOBEL_Y: Kernel3 = [[-1.0, -2.0, -1.0], [0.0, 0.0, 0.0], [1.0, 2.0, 1.0]];

/// Convolve a `width × height` buffer with wrap-around borders
///
/// # Panics
///
/// Panics if `input` does not hold exactly `width * height` values
#[must_use]
pub fn convolve_wrapped(input: &[f32], width: usize, height: usize, kernel: &Kernel3) -> Vec<f32> {
    assert_eq!(
        input.len(),
        width * height,
        "Convolution input must hold width * height values"
    );
    let mut out = vec![0.0; input.len()];
    if input.is_empty() {
        return out;
    }

    out.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, row)| {
            let rows = [
                (y + height - 1) % height,
                y,
                (y + 1) % height,
            ];
            for (x, cell) in row.iter_mut().enumerate() {
                let cols = [(x + width - 1) % width, x, (x + 1) % width];
                let mut acc = 0.0;
                for (ky, &sy) in rows.iter().enumerate() {
                    for (kx, &sx) in cols.iter().enumerate() {
                        acc += kernel[ky][kx] * input[sy * width + sx];
                    }
                }
                *cell = acc;
            }
        });

    out
}

/// Per-cell gradient of a scalar image
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    /// `sqrt(gx² + gy²)` per cell
    pub magnitude: Vec<f32>,
    /// `atan2(gy, gx)` per cell, radians in `(-π, π]`
    pub direction: Vec<f32>,
}

/// Sobel gradient magnitude and direction
///
/// # Panics
///
/// Panics if `input` does not hold exactly `width * height` values
#[must_use]
pub fn sobel_gradient(input: &[f32], width: usize, height: usize) -> Gradient {
    let gx = convolve_wrapped(input, width, height, &SOBEL_X);
    let gy = convolve_wrapped(input, width, height, &SOBEL_Y);
    let (magnitude, direction) = gx
        .iter()
        .zip(&gy)
        .map(|(&x, &y)| ((x * x + y * y).sqrt(), y.atan2(x)))
        .unzip();
    Gradient {
        magnitude,
        direction,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernels_are_normalized() {
        let sum: f32 = GAUSSIAN_3X3.iter().flatten().sum();
        assert_relative_eq!(sum, 1.0);
        let sobel_x: f32 = SOBEL_X.iter().flatten().sum();
        let sobel_y: f32 = SOBEL_Y.iter().flatten().sum();
        assert_eq!(sobel_x, 0.0);
        assert_eq!(sobel_y, 0.0);
    }

    #[test]
    fn test_blur_keeps_uniform_field() {
        let input = vec![3.7; 30];
        let out = convolve_wrapped(&input, 6, 5, &GAUSSIAN_3X3);
        for v in out {
            assert_relative_eq!(v, 3.7, max_relative = 1e-6);
        }
    }

    #[test]
    fn test_blur_spreads_impulse_across_seam() {
        // Impulse in the corner: its weights land on the wrapped opposite edges
        let mut input = vec![0.0; 16];
        input[0] = 16.0;
        let out = convolve_wrapped(&input, 4, 4, &GAUSSIAN_3X3);
        assert_relative_eq!(out[0], 4.0);
        assert_relative_eq!(out[3], 2.0); // west neighbour via wrap
        assert_relative_eq!(out[12], 2.0); // previous row via wrap
        assert_relative_eq!(out[15], 1.0); // diagonal via wrap
        assert_relative_eq!(out.iter().sum::<f32>(), 16.0);
    }

    #[test]
    fn test_sobel_of_constant_is_zero() {
        let g = sobel_gradient(&[5.0; 25], 5, 5);
        assert!(g.magnitude.iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_sobel_direction_follows_ramp() {
        // Values increase along y only, away from the wrapped seam
        let width = 5;
        let height = 5;
        let input: Vec<f32> = (0..25).map(|i| (i / width) as f32).collect();
        let g = sobel_gradient(&input, width, height);
        let centre = 2 * width + 2;
        assert_relative_eq!(g.magnitude[centre], 8.0);
        assert_relative_eq!(g.direction[centre], std::f32::consts::FRAC_PI_2);
    }
}
