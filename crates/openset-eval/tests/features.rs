//! Integration tests for the feature extractors and the CIFAR loader.

use openset_eval::config::ExtractorKind;
use openset_eval::dataset::{load_cifar100, ImageBatch, LabelGranularity};
use openset_eval::features::{extractor_for, FeatureExtractor, HogDescriptor, PixelFlatten, PrewittEdges};

fn gradient_batch(n: usize) -> ImageBatch {
    // image i has a constant brightness i * 20 so rows are identifiable
    let pixels: Vec<u8> = (0..n)
        .flat_map(|i| std::iter::repeat((i * 20) as u8).take(32 * 32 * 3))
        .collect();
    ImageBatch::new(pixels, n, 32, 32, 3).unwrap()
}

/// Image `i` is dark left of a vertical edge and bright from column
/// `4 + 8 * i` on, so each edge sits inside a different 8-pixel cell.
fn edge_batch(n: usize) -> ImageBatch {
    let mut pixels = Vec::with_capacity(n * 32 * 32 * 3);
    for i in 0..n {
        let edge = 4 + 8 * i;
        let bright = (60 + 40 * i) as u8;
        for _row in 0..32 {
            for col in 0..32 {
                let v = if col >= edge { bright } else { 10 };
                pixels.extend([v, v, v]);
            }
        }
    }
    ImageBatch::new(pixels, n, 32, 32, 3).unwrap()
}

fn reversed(images: &ImageBatch) -> ImageBatch {
    let pixels: Vec<u8> = (0..images.len())
        .rev()
        .flat_map(|i| images.image(i).to_vec())
        .collect();
    ImageBatch::new(pixels, images.len(), images.height, images.width, images.channels).unwrap()
}

// ---------------------------------------------------------------------------
// Shapes and row order
// ---------------------------------------------------------------------------

#[test]
fn every_extractor_preserves_sample_count() {
    let images = gradient_batch(4);
    for kind in [ExtractorKind::Flatten, ExtractorKind::Prewitt, ExtractorKind::Hog] {
        let extractor = extractor_for(kind);
        let x = extractor.extract(&images).unwrap();
        assert_eq!(x.nrows(), 4, "{}", extractor.name());
        assert_eq!(x.ncols(), extractor.n_features(32, 32, 3));
    }
}

#[test]
fn feature_widths_on_cifar_images() {
    assert_eq!(PixelFlatten.n_features(32, 32, 3), 3072);
    assert_eq!(PrewittEdges.n_features(32, 32, 3), 1024);
    assert_eq!(HogDescriptor::default().n_features(32, 32, 3), 324);
}

#[test]
fn flatten_row_i_describes_image_i() {
    let images = gradient_batch(5);
    let x = PixelFlatten.extract(&images).unwrap();
    for i in 0..5 {
        let expected = (i * 20) as f64 / 255.0;
        assert!(x.row(i).iter().all(|&v| (v - expected).abs() < 1e-12));
    }
}

#[test]
fn distinct_images_keep_their_rows_in_every_extractor() {
    let images = edge_batch(4);
    let extractors: Vec<Box<dyn FeatureExtractor>> = vec![
        Box::new(PixelFlatten),
        Box::new(PrewittEdges),
        Box::new(HogDescriptor::default()),
    ];

    for extractor in &extractors {
        let x = extractor.extract(&images).unwrap();
        for i in 0..images.len() {
            let expected = extractor.describe(images.image(i), 32, 32, 3);
            assert_eq!(x.row(i).to_vec(), expected, "{} row {}", extractor.name(), i);
        }
        for i in 0..images.len() {
            for j in i + 1..images.len() {
                assert_ne!(x.row(i), x.row(j), "{} rows {} and {}", extractor.name(), i, j);
            }
        }

        let x_rev = extractor.extract(&reversed(&images)).unwrap();
        let n = images.len();
        for i in 0..n {
            assert_eq!(x_rev.row(i), x.row(n - 1 - i), "{} reversed row {}", extractor.name(), i);
        }
    }
}

#[test]
fn prewitt_border_columns_are_zero() {
    let pixels: Vec<u8> = (0..32 * 32 * 3).map(|i| (i % 97) as u8).collect();
    let images = ImageBatch::new(pixels, 1, 32, 32, 3).unwrap();
    let x = PrewittEdges.extract(&images).unwrap();
    for r in 0..32 {
        assert_eq!(x[[0, r * 32]], 0.0);
        assert_eq!(x[[0, r * 32 + 31]], 0.0);
    }
    for c in 0..32 {
        assert_eq!(x[[0, c]], 0.0);
        assert_eq!(x[[0, 31 * 32 + c]], 0.0);
    }
}

// ---------------------------------------------------------------------------
// Loader into extractor
// ---------------------------------------------------------------------------

#[test]
fn loaded_cifar_batch_feeds_extractors() {
    let dir = tempfile::tempdir().unwrap();
    let mut record = vec![4u8, 17u8];
    record.extend((0..3072).map(|i| (i % 251) as u8));
    std::fs::write(dir.path().join("train.bin"), record.repeat(3)).unwrap();
    std::fs::write(dir.path().join("test.bin"), &record).unwrap();

    let data = load_cifar100(dir.path(), LabelGranularity::Fine).unwrap();
    assert_eq!(data.train.labels, vec![17, 17, 17]);
    assert_eq!(data.test.images.len(), 1);

    let x = HogDescriptor::default().extract(&data.train.images).unwrap();
    assert_eq!(x.dim(), (3, 324));
    assert_eq!(x.row(0), x.row(2));
}
