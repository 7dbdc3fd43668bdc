//! Decoder for the IDX files the MNIST database of handwritten digits ships in.
//!
//! Images become the columns of an input matrix with pixel values scaled to
//! 0.0-1.0, labels become one-hot columns of a 10-row target matrix.

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use matrix::Matrix;
use neural_network::{Dataset, NetworkError};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use thiserror::Error;

pub const IMAGE_MAGIC_NUMBER: u32 = 0x0000_0803;
pub const LABEL_MAGIC_NUMBER: u32 = 0x0000_0801;
pub const OUTPUT_NODES: usize = 10;

pub const TRAIN_IMAGES: &str = "train-images-idx3-ubyte";
pub const TRAIN_LABELS: &str = "train-labels-idx1-ubyte";
pub const TEST_IMAGES: &str = "t10k-images-idx3-ubyte";
pub const TEST_LABELS: &str = "t10k-labels-idx1-ubyte";

/// Errors that can occur while decoding MNIST files
#[derive(Debug, Error)]
pub enum MnistError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Invalid magic number for {kind} file: expected {expected}, got {actual}")]
    InvalidMagicNumber {
        kind: &'static str,
        expected: u32,
        actual: u32,
    },
    /// The image and label files describe different numbers of examples
    #[error("Data mismatch: {images} images but {labels} labels")]
    DataMismatch { images: usize, labels: usize },
    #[error("Label {label} of example {index} is not a digit")]
    InvalidLabel { index: usize, label: u8 },
    #[error(transparent)]
    Network(#[from] NetworkError),
}

/// The two halves of the MNIST distribution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MnistSet {
    /// The 60 000 training examples
    Training,
    /// The 10 000 test examples
    Test,
}

impl MnistSet {
    /// Image and label file names inside the data directory.
    pub fn file_names(&self) -> (&'static str, &'static str) {
        match self {
            MnistSet::Training => (TRAIN_IMAGES, TRAIN_LABELS),
            MnistSet::Test => (TEST_IMAGES, TEST_LABELS),
        }
    }
}

/// Creates a progress bar style, falling back to the plain bar on a bad template
pub(crate) fn create_progress_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-")
}

/// Reads a 32-bit unsigned integer in big-endian format
fn read_u32(reader: &mut impl Read) -> std::io::Result<u32> {
    let mut buffer = [0; 4];
    reader.read_exact(&mut buffer)?;
    Ok(u32::from_be_bytes(buffer))
}

fn check_magic(reader: &mut impl Read, kind: &'static str, expected: u32) -> Result<(), MnistError> {
    let actual = read_u32(reader)?;
    if actual != expected {
        return Err(MnistError::InvalidMagicNumber {
            kind,
            expected,
            actual,
        });
    }
    Ok(())
}

/// Reads an IDX image file.
///
/// # Arguments
/// * `path` - Path to the image file
/// * `progress` - Progress bar advanced once per image
///
/// # Returns
/// * `Ok(Matrix)` with one column of `rows * cols` scaled pixels per image
/// * `Err(MnistError)` if the file cannot be read or has the wrong magic number
///
/// # Format
/// * 32-bit magic number (2051)
/// * 32-bit number of images
/// * 32-bit number of rows
/// * 32-bit number of columns
/// * Pixels in row-major order (1 byte per pixel)
pub fn read_mnist_images(path: impl AsRef<Path>, progress: &ProgressBar) -> Result<Matrix, MnistError> {
    let mut reader = BufReader::new(File::open(path)?);
    check_magic(&mut reader, "images", IMAGE_MAGIC_NUMBER)?;

    let num_images = read_u32(&mut reader)? as usize;
    let num_rows = read_u32(&mut reader)? as usize;
    let num_cols = read_u32(&mut reader)? as usize;
    let pixels_per_image = num_rows * num_cols;

    progress.set_length(num_images as u64);
    progress.set_message("Loading images...");

    let mut pixels = Vec::with_capacity(num_images * pixels_per_image);
    let mut buffer = vec![0u8; pixels_per_image];
    for _ in 0..num_images {
        reader.read_exact(&mut buffer)?;
        pixels.extend(buffer.iter().map(|&pixel| f64::from(pixel) / 255.0));
        progress.inc(1);
    }

    progress.finish_with_message("Images loaded");
    // one image per row as read, one per column as the network expects
    Ok(Matrix::new(num_images, pixels_per_image, pixels).transpose())
}

/// Reads an IDX label file into one-hot columns.
///
/// # Format
/// * 32-bit magic number (2049)
/// * 32-bit number of labels
/// * Labels (1 byte per label)
pub fn read_mnist_labels(path: impl AsRef<Path>, progress: &ProgressBar) -> Result<Matrix, MnistError> {
    let mut reader = BufReader::new(File::open(path)?);
    check_magic(&mut reader, "labels", LABEL_MAGIC_NUMBER)?;

    let num_labels = read_u32(&mut reader)? as usize;
    progress.set_length(num_labels as u64);
    progress.set_message("Loading labels...");

    let mut labels = vec![0u8; num_labels];
    reader.read_exact(&mut labels)?;

    let mut one_hot = vec![0.0; OUTPUT_NODES * num_labels];
    for (index, &label) in labels.iter().enumerate() {
        if usize::from(label) >= OUTPUT_NODES {
            return Err(MnistError::InvalidLabel { index, label });
        }
        one_hot[usize::from(label) * num_labels + index] = 1.0;
        progress.inc(1);
    }

    progress.finish_with_message("Labels loaded");
    Ok(Matrix::new(OUTPUT_NODES, num_labels, one_hot))
}

/// Loads an image file and its label file as a dataset.
pub fn load_mnist_data(
    images_path: impl AsRef<Path>,
    labels_path: impl AsRef<Path>,
) -> Result<Dataset, MnistError> {
    let multi_progress = MultiProgress::new();
    let style = create_progress_style(
        "{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} {msg}",
    );

    let images_progress = multi_progress.add(ProgressBar::new(0));
    let labels_progress = multi_progress.add(ProgressBar::new(0));
    images_progress.set_style(style.clone());
    labels_progress.set_style(style);

    let images = read_mnist_images(images_path, &images_progress)?;
    let labels = read_mnist_labels(labels_path, &labels_progress)?;
    if images.cols() != labels.cols() {
        return Err(MnistError::DataMismatch {
            images: images.cols(),
            labels: labels.cols(),
        });
    }
    Ok(Dataset::new(images, labels)?)
}

/// Loads one half of MNIST from the standard file names inside `dir`.
pub fn load_dataset(dir: impl AsRef<Path>, set: MnistSet) -> Result<Dataset, MnistError> {
    let (images, labels) = set.file_names();
    let dir = dir.as_ref();
    load_mnist_data(dir.join(images), dir.join(labels))
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_fs::prelude::*;
    use std::io::Write;

    type TestResult = Result<(), Box<dyn std::error::Error>>;

    fn write_idx(path: &Path, magic_number: u32, dimensions: &[u32], data: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(path)?;
        file.write_all(&magic_number.to_be_bytes())?;
        for dimension in dimensions {
            file.write_all(&dimension.to_be_bytes())?;
        }
        file.write_all(data)
    }

    #[test]
    fn test_read_images() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        let file = temp.child("images");
        // two 2x2 images
        write_idx(file.path(), IMAGE_MAGIC_NUMBER, &[2, 2, 2], &[0, 255, 51, 0, 255, 255, 0, 102])?;

        let images = read_mnist_images(file.path(), &ProgressBar::hidden())?;

        assert_eq!(images.shape(), (4, 2));
        assert_eq!(images.column(0), Matrix::from(vec![0.0, 1.0, 0.2, 0.0]));
        assert_eq!(images.column(1), Matrix::from(vec![1.0, 1.0, 0.0, 0.4]));
        Ok(())
    }

    #[test]
    fn test_read_images_invalid_magic() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        let file = temp.child("images");
        write_idx(file.path(), 0x1234_5678, &[1, 1, 1], &[0])?;

        match read_mnist_images(file.path(), &ProgressBar::hidden()) {
            Err(MnistError::InvalidMagicNumber {
                kind,
                expected,
                actual,
            }) => {
                assert_eq!(kind, "images");
                assert_eq!(expected, 2051);
                assert_eq!(actual, 0x1234_5678);
            }
            other => panic!("Expected InvalidMagicNumber error, got {other:?}"),
        }
        Ok(())
    }

    #[test]
    fn test_truncated_file_is_an_error() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        let file = temp.child("images");
        write_idx(file.path(), IMAGE_MAGIC_NUMBER, &[3, 2, 2], &[0; 8])?;

        let result = read_mnist_images(file.path(), &ProgressBar::hidden());
        assert!(matches!(result, Err(MnistError::Io(_))));
        Ok(())
    }

    #[test]
    fn test_read_labels_one_hot() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        let file = temp.child("labels");
        write_idx(file.path(), LABEL_MAGIC_NUMBER, &[3], &[0, 7, 9])?;

        let labels = read_mnist_labels(file.path(), &ProgressBar::hidden())?;

        assert_eq!(labels.shape(), (10, 3));
        assert_eq!(labels.argmax_column(0), 0);
        assert_eq!(labels.argmax_column(1), 7);
        assert_eq!(labels.argmax_column(2), 9);
        assert_eq!(labels.sum(), 3.0);
        Ok(())
    }

    #[test]
    fn test_label_out_of_range() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        let file = temp.child("labels");
        write_idx(file.path(), LABEL_MAGIC_NUMBER, &[2], &[3, 10])?;

        let result = read_mnist_labels(file.path(), &ProgressBar::hidden());
        assert!(matches!(
            result,
            Err(MnistError::InvalidLabel { index: 1, label: 10 })
        ));
        Ok(())
    }

    #[test]
    fn test_load_dataset_from_directory() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        write_idx(temp.child(TEST_IMAGES).path(), IMAGE_MAGIC_NUMBER, &[2, 1, 3], &[0; 6])?;
        write_idx(temp.child(TEST_LABELS).path(), LABEL_MAGIC_NUMBER, &[2], &[4, 2])?;

        let data = load_dataset(temp.path(), MnistSet::Test)?;

        assert_eq!(data.len(), 2);
        assert_eq!(data.input_size(), 3);
        assert_eq!(data.target_size(), 10);
        assert_eq!(data.targets().argmax_column(1), 2);
        Ok(())
    }

    #[test]
    fn test_count_mismatch() -> TestResult {
        let temp = assert_fs::TempDir::new()?;
        write_idx(temp.child(TRAIN_IMAGES).path(), IMAGE_MAGIC_NUMBER, &[2, 1, 1], &[0, 0])?;
        write_idx(temp.child(TRAIN_LABELS).path(), LABEL_MAGIC_NUMBER, &[1], &[5])?;

        let result = load_dataset(temp.path(), MnistSet::Training);
        assert!(matches!(
            result,
            Err(MnistError::DataMismatch { images: 2, labels: 1 })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_directory() {
        let result = load_dataset("/nonexistent/mnist", MnistSet::Training);
        assert!(matches!(result, Err(MnistError::Io(_))));
    }
}
