use super::{grayscale, FeatureExtractor};

/// Vertical-edge response of the grayscale image.
///
/// The Prewitt kernel takes the horizontal difference of the right and left
/// neighbours averaged over three rows. Border pixels are zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrewittEdges;

impl FeatureExtractor for PrewittEdges {
    fn n_features(&self, height: usize, width: usize, _channels: usize) -> usize {
        height * width
    }

    fn describe(&self, image: &[u8], height: usize, width: usize, channels: usize) -> Vec<f64> {
        let gray: Vec<f64> = grayscale(image, channels)
            .into_iter()
            .map(|g| g as f64 / 255.0)
            .collect();

        let mut out = vec![0.0; height * width];
        for r in 1..height.saturating_sub(1) {
            for c in 1..width.saturating_sub(1) {
                let mut acc = 0.0;
                for dr in [r - 1, r, r + 1] {
                    acc += gray[dr * width + c + 1] - gray[dr * width + c - 1];
                }
                out[r * width + c] = acc / 3.0;
            }
        }
        out
    }

    fn name(&self) -> &str {
        "prewitt"
    }
}
