//! Image to feature-matrix transforms.
//!
//! Every extractor keeps sample order: row `i` of the output describes image
//! `i` of the batch. Images are processed in parallel with rayon.
use anyhow::Result;
use ndarray::Array2;
use rayon::prelude::*;

use crate::config::ExtractorKind;
use crate::dataset::ImageBatch;

pub mod flatten;
pub mod hog;
pub mod prewitt;

pub use flatten::PixelFlatten;
pub use hog::HogDescriptor;
pub use prewitt::PrewittEdges;

pub trait FeatureExtractor: Send + Sync {
    /// Number of output columns for images of the given shape.
    fn n_features(&self, height: usize, width: usize, channels: usize) -> usize;

    /// Feature vector of one channel-last image.
    fn describe(&self, image: &[u8], height: usize, width: usize, channels: usize) -> Vec<f64>;

    fn name(&self) -> &str;

    /// One row per image, in batch order.
    fn extract(&self, images: &ImageBatch) -> Result<Array2<f64>> {
        let n_features = self.n_features(images.height, images.width, images.channels);
        let rows: Vec<Vec<f64>> = (0..images.len())
            .into_par_iter()
            .map(|i| self.describe(images.image(i), images.height, images.width, images.channels))
            .collect();

        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let matrix = Array2::from_shape_vec((images.len(), n_features), flat)?;
        log::debug!(
            "{} extracted {} features from {} images",
            self.name(),
            n_features,
            images.len()
        );
        Ok(matrix)
    }
}

/// Build the extractor selected in the experiment config.
pub fn extractor_for(kind: ExtractorKind) -> Box<dyn FeatureExtractor> {
    match kind {
        ExtractorKind::Flatten => Box::new(PixelFlatten),
        ExtractorKind::Prewitt => Box::new(PrewittEdges),
        ExtractorKind::Hog => Box::new(HogDescriptor::default()),
    }
}

/// ITU-R 601 luma of one channel-last image, rounded to `u8` levels.
pub(crate) fn grayscale(image: &[u8], channels: usize) -> Vec<u8> {
    if channels < 3 {
        return image.iter().step_by(channels.max(1)).copied().collect();
    }
    image
        .chunks_exact(channels)
        .map(|px| {
            let y = 0.299 * px[0] as f64 + 0.587 * px[1] as f64 + 0.114 * px[2] as f64;
            y.round().min(255.0) as u8
        })
        .collect()
}
