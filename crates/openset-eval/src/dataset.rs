//! CIFAR-100 binary-format loading and row shuffling.
//!
//! Each record of `train.bin` / `test.bin` is one coarse label byte, one fine
//! label byte and 3072 pixel bytes stored channel-planar (1024 red, then
//! green, then blue). Images are converted to channel-last on load.
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

pub const CIFAR_HEIGHT: usize = 32;
pub const CIFAR_WIDTH: usize = 32;
pub const CIFAR_CHANNELS: usize = 3;
const CIFAR_PIXELS: usize = CIFAR_HEIGHT * CIFAR_WIDTH * CIFAR_CHANNELS;
const RECORD_LEN: usize = 2 + CIFAR_PIXELS;

/// `n` images of identical shape, `u8` pixels stored row-major channel-last.
#[derive(Debug, Clone, PartialEq)]
pub struct ImageBatch {
    pub pixels: Vec<u8>,
    pub n: usize,
    pub height: usize,
    pub width: usize,
    pub channels: usize,
}

impl ImageBatch {
    pub fn new(pixels: Vec<u8>, n: usize, height: usize, width: usize, channels: usize) -> Result<Self> {
        let expected = n * height * width * channels;
        if pixels.len() != expected {
            anyhow::bail!(
                "image batch of {} x {}x{}x{} needs {} pixels, got {}",
                n,
                height,
                width,
                channels,
                expected,
                pixels.len()
            );
        }
        Ok(ImageBatch {
            pixels,
            n,
            height,
            width,
            channels,
        })
    }

    pub fn len(&self) -> usize {
        self.n
    }

    pub fn is_empty(&self) -> bool {
        self.n == 0
    }

    pub fn image_len(&self) -> usize {
        self.height * self.width * self.channels
    }

    /// Pixels of image `i`, channel-last.
    pub fn image(&self, i: usize) -> &[u8] {
        let len = self.image_len();
        &self.pixels[i * len..(i + 1) * len]
    }

    pub fn images(&self) -> impl Iterator<Item = &[u8]> + '_ {
        self.pixels.chunks_exact(self.image_len().max(1)).take(self.n)
    }
}

/// Which CIFAR-100 label byte to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelGranularity {
    /// 100 fine classes.
    #[default]
    Fine,
    /// 20 superclasses.
    Coarse,
}

impl LabelGranularity {
    pub fn n_classes(&self) -> usize {
        match self {
            LabelGranularity::Fine => 100,
            LabelGranularity::Coarse => 20,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Split {
    pub images: ImageBatch,
    pub labels: Vec<usize>,
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Split,
    pub test: Split,
}

/// Parse the raw bytes of one CIFAR-100 binary file.
pub fn parse_cifar100(bytes: &[u8], granularity: LabelGranularity) -> Result<Split> {
    if bytes.len() % RECORD_LEN != 0 {
        anyhow::bail!(
            "file length {} is not a multiple of the {}-byte record size",
            bytes.len(),
            RECORD_LEN
        );
    }

    let n = bytes.len() / RECORD_LEN;
    let plane = CIFAR_HEIGHT * CIFAR_WIDTH;
    let mut pixels = Vec::with_capacity(n * CIFAR_PIXELS);
    let mut labels = Vec::with_capacity(n);

    for record in bytes.chunks_exact(RECORD_LEN) {
        let label = match granularity {
            LabelGranularity::Coarse => record[0],
            LabelGranularity::Fine => record[1],
        };
        labels.push(label as usize);

        let planar = &record[2..];
        for p in 0..plane {
            for c in 0..CIFAR_CHANNELS {
                pixels.push(planar[c * plane + p]);
            }
        }
    }

    let images = ImageBatch::new(pixels, n, CIFAR_HEIGHT, CIFAR_WIDTH, CIFAR_CHANNELS)?;
    Ok(Split { images, labels })
}

fn load_split(path: &Path, granularity: LabelGranularity) -> Result<Split> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read CIFAR file: {:?}", path))?;
    let split = parse_cifar100(&bytes, granularity)
        .with_context(|| format!("Malformed CIFAR file: {:?}", path))?;
    log::debug!("loaded {} images from {:?}", split.labels.len(), path);
    Ok(split)
}

/// Load `train.bin` and `test.bin` from a CIFAR-100 binary directory.
pub fn load_cifar100<P: AsRef<Path>>(dir: P, granularity: LabelGranularity) -> Result<Dataset> {
    let dir = dir.as_ref();
    let train = load_split(&dir.join("train.bin"), granularity)?;
    let test = load_split(&dir.join("test.bin"), granularity)?;
    log::info!(
        "loaded CIFAR-100 ({:?} labels): {} train, {} test images",
        granularity,
        train.labels.len(),
        test.labels.len()
    );
    Ok(Dataset { train, test })
}

/// Shuffle feature rows and labels with the same seeded permutation.
pub fn shuffle_split(features: &Array2<f64>, labels: &[usize], seed: u64) -> Result<(Array2<f64>, Vec<usize>)> {
    if features.nrows() != labels.len() {
        anyhow::bail!(
            "cannot shuffle {} feature rows with {} labels",
            features.nrows(),
            labels.len()
        );
    }
    let mut order: Vec<usize> = (0..labels.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    order.shuffle(&mut rng);

    let shuffled = features.select(Axis(0), &order);
    let shuffled_labels = order.iter().map(|&i| labels[i]).collect();
    Ok((shuffled, shuffled_labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn record(coarse: u8, fine: u8, red: u8, green: u8, blue: u8) -> Vec<u8> {
        let plane = CIFAR_HEIGHT * CIFAR_WIDTH;
        let mut bytes = vec![coarse, fine];
        bytes.extend(std::iter::repeat(red).take(plane));
        bytes.extend(std::iter::repeat(green).take(plane));
        bytes.extend(std::iter::repeat(blue).take(plane));
        bytes
    }

    #[test]
    fn test_parse_planar_to_channel_last() {
        let mut bytes = record(3, 42, 10, 20, 30);
        bytes.extend(record(7, 99, 1, 2, 3));

        let split = parse_cifar100(&bytes, LabelGranularity::Fine).unwrap();
        assert_eq!(split.labels, vec![42, 99]);
        assert_eq!(split.images.len(), 2);
        assert_eq!(&split.images.image(0)[..6], &[10, 20, 30, 10, 20, 30]);
        assert_eq!(&split.images.image(1)[..3], &[1, 2, 3]);

        let coarse = parse_cifar100(&bytes, LabelGranularity::Coarse).unwrap();
        assert_eq!(coarse.labels, vec![3, 7]);
    }

    #[test]
    fn test_truncated_record_rejected() {
        let mut bytes = record(0, 0, 0, 0, 0);
        bytes.pop();
        assert!(parse_cifar100(&bytes, LabelGranularity::Fine).is_err());
    }

    #[test]
    fn test_load_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("train.bin"), record(1, 5, 0, 0, 0)).unwrap();
        fs::write(dir.path().join("test.bin"), [record(1, 6, 0, 0, 0), record(2, 7, 0, 0, 0)].concat()).unwrap();

        let data = load_cifar100(dir.path(), LabelGranularity::Fine).unwrap();
        assert_eq!(data.train.labels, vec![5]);
        assert_eq!(data.test.labels, vec![6, 7]);
    }

    #[test]
    fn test_missing_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_cifar100(dir.path(), LabelGranularity::Fine).unwrap_err();
        assert!(format!("{:#}", err).contains("train.bin"));
    }

    #[test]
    fn test_shuffle_keeps_rows_and_labels_together() {
        let x = array![[0.0], [1.0], [2.0], [3.0], [4.0]];
        let y = vec![0, 1, 2, 3, 4];
        let (xs, ys) = shuffle_split(&x, &y, 42).unwrap();
        for (row, label) in xs.rows().into_iter().zip(&ys) {
            assert_eq!(row[0] as usize, *label);
        }
        let (xs2, ys2) = shuffle_split(&x, &y, 42).unwrap();
        assert_eq!(xs, xs2);
        assert_eq!(ys, ys2);
    }
}
