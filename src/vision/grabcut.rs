//! Iterative foreground/background refinement seeded by a trimap
//!
//! Each pass re-estimates a colour mixture for both classes from the current
//! labelling, then relaxes the probable pixels with iterated conditional
//! modes over a contrast-sensitive Potts energy on the 8-neighbourhood.
//! Pixels labelled certain background/foreground never change.

use super::gmm::{squared_distance, Color, Gmm};
use super::labels;
use crate::config::SegmentationConfig;
use crate::error::{CutoutError, Result};

const NEIGHBOURS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Learned colour models for both classes
#[derive(Debug, Clone, Default)]
pub struct ColorModels {
    pub background: Option<Gmm>,
    pub foreground: Option<Gmm>,
}

/// Outcome of a refinement run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefineStats {
    pub passes: u32,
    pub changed: usize,
}

/// Refine `trimap` in place
///
/// `pixels` are interleaved with `channels` bytes per pixel; only the first
/// three channels are used as colour.
///
/// # Errors
/// - [`CutoutError::Runtime`] if the trimap has no background or no
///   foreground pixels, or `config` asks for zero mixture components;
///   `trimap` is left untouched
#[allow(clippy::too_many_arguments)]
pub fn refine(
    pixels: &[u8],
    channels: usize,
    trimap: &mut [u8],
    rows: usize,
    cols: usize,
    iterations: u32,
    config: &SegmentationConfig,
    models: &mut ColorModels,
) -> Result<RefineStats> {
    if config.components == 0 {
        return Err(CutoutError::runtime(
            "segmentation needs at least one mixture component",
        ));
    }

    let colors: Vec<Color> = pixels
        .chunks_exact(channels)
        .take(rows * cols)
        .map(|p| {
            let g = if channels >= 3 { p[1] } else { p[0] };
            let b = if channels >= 3 { p[2] } else { p[0] };
            [f64::from(p[0]), f64::from(g), f64::from(b)]
        })
        .collect();

    let (bg, fg) = partition(&colors, trimap);
    if bg.is_empty() || fg.is_empty() {
        return Err(CutoutError::runtime(format!(
            "segmentation needs both classes, got {} background and {} foreground pixels",
            bg.len(),
            fg.len()
        )));
    }

    models.background = Gmm::from_kmeans(&bg, config.components);
    models.foreground = Gmm::from_kmeans(&fg, config.components);

    let beta = contrast_beta(&colors, rows, cols);
    let initial = trimap.to_vec();

    for _ in 0..iterations {
        relearn(&colors, trimap, config.components, models);
        let (Some(bg_model), Some(fg_model)) = (&models.background, &models.foreground) else {
            break;
        };

        let data_costs: Vec<(f64, f64)> = colors
            .iter()
            .zip(trimap.iter())
            .map(|(color, &label)| {
                if labels::is_fixed(label) {
                    (0.0, 0.0)
                } else {
                    (bg_model.cost(color), fg_model.cost(color))
                }
            })
            .collect();

        for _ in 0..config.sweeps_per_pass {
            if sweep(&colors, trimap, &data_costs, rows, cols, beta, config.smoothness) == 0 {
                break;
            }
        }
    }

    let changed = initial
        .iter()
        .zip(trimap.iter())
        .filter(|(a, b)| a != b)
        .count();
    Ok(RefineStats {
        passes: iterations,
        changed,
    })
}

fn partition(colors: &[Color], trimap: &[u8]) -> (Vec<Color>, Vec<Color>) {
    let mut bg = Vec::new();
    let mut fg = Vec::new();
    for (color, &label) in colors.iter().zip(trimap) {
        if labels::is_foreground(label) {
            fg.push(*color);
        } else {
            bg.push(*color);
        }
    }
    (bg, fg)
}

/// Assign components under the current models and refit; a class that
/// became empty keeps its previous model
fn relearn(colors: &[Color], trimap: &[u8], components: usize, models: &mut ColorModels) {
    let (bg, fg) = partition(colors, trimap);
    if let Some(model) = &models.background {
        let assignments: Vec<usize> = bg.iter().map(|c| model.most_likely_component(c)).collect();
        if let Some(updated) = Gmm::fit(&bg, &assignments, components) {
            models.background = Some(updated);
        }
    }
    if let Some(model) = &models.foreground {
        let assignments: Vec<usize> = fg.iter().map(|c| model.most_likely_component(c)).collect();
        if let Some(updated) = Gmm::fit(&fg, &assignments, components) {
            models.foreground = Some(updated);
        }
    }
}

/// `1 / (2 * mean squared neighbour difference)`, 0 for flat images
fn contrast_beta(colors: &[Color], rows: usize, cols: usize) -> f64 {
    let mut total = 0.0;
    let mut pairs = 0usize;
    for r in 0..rows {
        for c in 0..cols {
            let here = &colors[r * cols + c];
            // Forward half of the neighbourhood visits every pair once
            for (dr, dc) in [(0isize, 1isize), (1, -1), (1, 0), (1, 1)] {
                if let Some(n) = neighbour_index(r, c, dr, dc, rows, cols) {
                    total += squared_distance(here, &colors[n]);
                    pairs += 1;
                }
            }
        }
    }
    if pairs == 0 || total <= 0.0 {
        0.0
    } else {
        1.0 / (2.0 * total / pairs as f64)
    }
}

fn neighbour_index(
    r: usize,
    c: usize,
    dr: isize,
    dc: isize,
    rows: usize,
    cols: usize,
) -> Option<usize> {
    let nr = r.checked_add_signed(dr)?;
    let nc = c.checked_add_signed(dc)?;
    (nr < rows && nc < cols).then_some(nr * cols + nc)
}

/// One raster-order ICM sweep; returns the number of relabelled pixels
fn sweep(
    colors: &[Color],
    trimap: &mut [u8],
    data_costs: &[(f64, f64)],
    rows: usize,
    cols: usize,
    beta: f64,
    smoothness: f64,
) -> usize {
    let mut changed = 0;
    for r in 0..rows {
        for c in 0..cols {
            let index = r * cols + c;
            let current = trimap[index];
            if labels::is_fixed(current) {
                continue;
            }

            let (mut cost_bg, mut cost_fg) = data_costs[index];
            for (dr, dc) in NEIGHBOURS {
                let Some(n) = neighbour_index(r, c, dr, dc, rows, cols) else {
                    continue;
                };
                let distance = if dr != 0 && dc != 0 {
                    std::f64::consts::SQRT_2
                } else {
                    1.0
                };
                let weight = smoothness / distance
                    * (-beta * squared_distance(&colors[index], &colors[n])).exp();
                if labels::is_foreground(trimap[n]) {
                    cost_bg += weight;
                } else {
                    cost_fg += weight;
                }
            }

            let next = if cost_fg < cost_bg {
                labels::PROBABLE_FOREGROUND
            } else if cost_bg < cost_fg {
                labels::PROBABLE_BACKGROUND
            } else {
                current
            };
            if next != current {
                trimap[index] = next;
                changed += 1;
            }
        }
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::labels::{BACKGROUND, FOREGROUND, PROBABLE_BACKGROUND, PROBABLE_FOREGROUND};

    /// 12x12 RGBA image: red square in rows/cols 3..9 on a blue field
    fn square_scene() -> (Vec<u8>, usize, usize) {
        let (rows, cols) = (12, 12);
        let mut pixels = Vec::with_capacity(rows * cols * 4);
        for r in 0..rows {
            for c in 0..cols {
                if (3..9).contains(&r) && (3..9).contains(&c) {
                    pixels.extend_from_slice(&[220, 20, 20, 255]);
                } else {
                    pixels.extend_from_slice(&[20, 20, 220, 255]);
                }
            }
        }
        (pixels, rows, cols)
    }

    #[test]
    fn test_probable_band_snaps_to_colour_edge() {
        let (pixels, rows, cols) = square_scene();
        // Mask too generous by two pixels: certain core, probable ring
        let mut labels = vec![BACKGROUND; rows * cols];
        for r in 1..11 {
            for c in 1..11 {
                labels[r * cols + c] = if (4..8).contains(&r) && (4..8).contains(&c) {
                    FOREGROUND
                } else {
                    PROBABLE_FOREGROUND
                };
            }
        }

        let mut models = ColorModels::default();
        let stats = refine(
            &pixels,
            4,
            &mut labels,
            rows,
            cols,
            5,
            &SegmentationConfig::default(),
            &mut models,
        )
        .unwrap();

        assert_eq!(stats.passes, 5);
        assert!(stats.changed > 0);
        assert_eq!(labels[cols + 1], PROBABLE_BACKGROUND);
        assert_eq!(labels[3 * cols + 3], PROBABLE_FOREGROUND);
        assert_eq!(labels[5 * cols + 5], FOREGROUND);
        assert_eq!(labels[0], BACKGROUND);
        assert!(models.foreground.is_some());
        assert!(models.background.is_some());
    }

    #[test]
    fn test_single_class_is_rejected() {
        let (pixels, rows, cols) = square_scene();
        for fill in [PROBABLE_FOREGROUND, BACKGROUND] {
            let mut labels = vec![fill; rows * cols];
            let mut models = ColorModels::default();
            let result = refine(
                &pixels,
                4,
                &mut labels,
                rows,
                cols,
                3,
                &SegmentationConfig::default(),
                &mut models,
            );
            assert!(matches!(result, Err(CutoutError::Runtime(_))));
            assert!(labels.iter().all(|&l| l == fill));
            assert!(models.foreground.is_none());
        }
    }

    #[test]
    fn test_zero_components_is_an_error() {
        let (pixels, rows, cols) = square_scene();
        let mut labels = vec![BACKGROUND; rows * cols];
        labels[5 * cols + 5] = FOREGROUND;
        let config = SegmentationConfig {
            components: 0,
            ..SegmentationConfig::default()
        };
        let result = refine(
            &pixels,
            4,
            &mut labels,
            rows,
            cols,
            2,
            &config,
            &mut ColorModels::default(),
        );
        assert!(matches!(result, Err(CutoutError::Runtime(_))));
    }

    #[test]
    fn test_contrast_beta_flat_image() {
        let colors = vec![[5.0, 5.0, 5.0]; 9];
        assert!(contrast_beta(&colors, 3, 3).abs() < f64::EPSILON);
    }
}
