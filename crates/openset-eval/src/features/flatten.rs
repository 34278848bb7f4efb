use super::FeatureExtractor;

/// Raw pixels scaled to `[0, 1]`, one column per channel value.
#[derive(Debug, Clone, Copy, Default)]
pub struct PixelFlatten;

impl FeatureExtractor for PixelFlatten {
    fn n_features(&self, height: usize, width: usize, channels: usize) -> usize {
        height * width * channels
    }

    fn describe(&self, image: &[u8], _height: usize, _width: usize, _channels: usize) -> Vec<f64> {
        image.iter().map(|&p| p as f64 / 255.0).collect()
    }

    fn name(&self) -> &str {
        "flatten"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::ImageBatch;

    #[test]
    fn test_rows_follow_image_order() {
        let images = ImageBatch::new(vec![0, 255, 51, 102, 255, 0, 0, 0], 2, 2, 2, 1).unwrap();
        let x = PixelFlatten.extract(&images).unwrap();
        assert_eq!(x.dim(), (2, 4));
        assert_eq!(x[[0, 1]], 1.0);
        assert!((x[[0, 2]] - 0.2).abs() < 1e-12);
        assert_eq!(x[[1, 0]], 1.0);
        assert_eq!(x[[1, 3]], 0.0);
    }
}
