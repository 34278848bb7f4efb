use super::FeatureExtractor;

const L2_HYS_CLIP: f64 = 0.2;
const BLOCK_EPS: f64 = 1e-5;

/// Histogram of oriented gradients.
///
/// Gradients are central differences (zero on the border) of the
/// square-rooted image. On multichannel input each pixel keeps the gradient of
/// the channel with the largest magnitude. Unsigned orientations are binned
/// per cell, cells are grouped into overlapping blocks and every block is
/// L2-Hys normalised.
#[derive(Debug, Clone, Copy)]
pub struct HogDescriptor {
    pub orientations: usize,
    pub pixels_per_cell: usize,
    pub cells_per_block: usize,
}

impl Default for HogDescriptor {
    fn default() -> Self {
        HogDescriptor {
            orientations: 9,
            pixels_per_cell: 8,
            cells_per_block: 2,
        }
    }
}

impl HogDescriptor {
    fn grid(&self, height: usize, width: usize) -> (usize, usize, usize, usize) {
        let cells_y = height / self.pixels_per_cell;
        let cells_x = width / self.pixels_per_cell;
        let blocks_y = (cells_y + 1).saturating_sub(self.cells_per_block);
        let blocks_x = (cells_x + 1).saturating_sub(self.cells_per_block);
        (cells_y, cells_x, blocks_y, blocks_x)
    }

    /// Per-pixel (magnitude, orientation in degrees within [0, 180)).
    fn gradients(&self, image: &[u8], height: usize, width: usize, channels: usize) -> (Vec<f64>, Vec<f64>) {
        let channels = channels.max(1);
        let value = |r: usize, c: usize, ch: usize| (image[(r * width + c) * channels + ch] as f64).sqrt();

        let mut magnitude = vec![0.0; height * width];
        let mut orientation = vec![0.0; height * width];
        for r in 0..height {
            for c in 0..width {
                let mut best = (0.0, 0.0, -1.0);
                for ch in 0..channels {
                    let g_row = if r == 0 || r + 1 == height {
                        0.0
                    } else {
                        value(r + 1, c, ch) - value(r - 1, c, ch)
                    };
                    let g_col = if c == 0 || c + 1 == width {
                        0.0
                    } else {
                        value(r, c + 1, ch) - value(r, c - 1, ch)
                    };
                    let mag = g_row.hypot(g_col);
                    if mag > best.2 {
                        best = (g_row, g_col, mag);
                    }
                }
                let (g_row, g_col, mag) = best;
                magnitude[r * width + c] = mag;
                orientation[r * width + c] = g_row.atan2(g_col).to_degrees().rem_euclid(180.0);
            }
        }
        (magnitude, orientation)
    }

    fn cell_histograms(&self, magnitude: &[f64], orientation: &[f64], width: usize, cells_y: usize, cells_x: usize) -> Vec<f64> {
        let n_bins = self.orientations;
        let bin_width = 180.0 / n_bins as f64;
        let ppc = self.pixels_per_cell;
        let area = (ppc * ppc) as f64;

        let mut hist = vec![0.0; cells_y * cells_x * n_bins];
        for cy in 0..cells_y {
            for cx in 0..cells_x {
                let cell = &mut hist[(cy * cells_x + cx) * n_bins..][..n_bins];
                for r in cy * ppc..(cy + 1) * ppc {
                    for c in cx * ppc..(cx + 1) * ppc {
                        let idx = r * width + c;
                        let bin = ((orientation[idx] / bin_width) as usize).min(n_bins - 1);
                        cell[bin] += magnitude[idx];
                    }
                }
                cell.iter_mut().for_each(|v| *v /= area);
            }
        }
        hist
    }
}

fn l2_hys(block: &mut [f64]) {
    let norm = |b: &[f64]| (b.iter().map(|v| v * v).sum::<f64>() + BLOCK_EPS * BLOCK_EPS).sqrt();
    let n = norm(block);
    block.iter_mut().for_each(|v| *v = (*v / n).min(L2_HYS_CLIP));
    let n = norm(block);
    block.iter_mut().for_each(|v| *v /= n);
}

impl FeatureExtractor for HogDescriptor {
    fn n_features(&self, height: usize, width: usize, _channels: usize) -> usize {
        let (_, _, blocks_y, blocks_x) = self.grid(height, width);
        blocks_y * blocks_x * self.cells_per_block * self.cells_per_block * self.orientations
    }

    fn describe(&self, image: &[u8], height: usize, width: usize, channels: usize) -> Vec<f64> {
        let (cells_y, cells_x, blocks_y, blocks_x) = self.grid(height, width);
        let (magnitude, orientation) = self.gradients(image, height, width, channels);
        let hist = self.cell_histograms(&magnitude, &orientation, width, cells_y, cells_x);

        let n_bins = self.orientations;
        let cpb = self.cells_per_block;
        let mut features = Vec::with_capacity(self.n_features(height, width, channels));
        for by in 0..blocks_y {
            for bx in 0..blocks_x {
                let mut block = Vec::with_capacity(cpb * cpb * n_bins);
                for cy in by..by + cpb {
                    for cx in bx..bx + cpb {
                        block.extend_from_slice(&hist[(cy * cells_x + cx) * n_bins..][..n_bins]);
                    }
                }
                l2_hys(&mut block);
                features.extend(block);
            }
        }
        features
    }

    fn name(&self) -> &str {
        "hog"
    }
}
