use std::{fs, path::Path};

use log::info;
use ndarray::Array2;

use super::Dataset;
use crate::{MlErr, Result};

const IMAGES_MAGIC: u32 = 2051;
const LABELS_MAGIC: u32 = 2049;

/// Reads an uncompressed idx3 image file, one flattened image per row with pixels scaled to
/// `[0, 1]`.
///
/// # Errors
/// `MlErr::Io` if the file can't be read, `MlErr::InvalidIdx` if it's not a well formed image
/// file.
pub fn read_images<P: AsRef<Path>>(path: P) -> Result<Array2<f32>> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    parse_images(&data).map_err(|reason| invalid(path, reason))
}

/// Reads an uncompressed idx1 label file.
///
/// # Errors
/// `MlErr::Io` if the file can't be read, `MlErr::InvalidIdx` if it's not a well formed label
/// file.
pub fn read_labels<P: AsRef<Path>>(path: P) -> Result<Vec<usize>> {
    let path = path.as_ref();
    let data = fs::read(path)?;
    parse_labels(&data).map_err(|reason| invalid(path, reason))
}

fn invalid(path: &Path, reason: String) -> MlErr {
    MlErr::InvalidIdx {
        path: path.display().to_string(),
        reason,
    }
}

fn read_be_u32(data: &[u8], offset: &mut usize) -> std::result::Result<u32, String> {
    let bytes = data
        .get(*offset..*offset + 4)
        .ok_or_else(|| format!("truncated header at byte {offset}"))?;

    *offset += 4;
    Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}

fn parse_images(data: &[u8]) -> std::result::Result<Array2<f32>, String> {
    let mut offset = 0;
    // IDX header: magic, count, rows, cols.
    let magic = read_be_u32(data, &mut offset)?;
    if magic != IMAGES_MAGIC {
        return Err(format!("bad magic {magic}, expected {IMAGES_MAGIC}"));
    }

    let count = read_be_u32(data, &mut offset)? as usize;
    let rows = read_be_u32(data, &mut offset)? as usize;
    let cols = read_be_u32(data, &mut offset)? as usize;

    let too_large = || format!("{count} images of {rows}x{cols} do not fit in memory");
    let image_size = rows.checked_mul(cols).ok_or_else(too_large)?;
    let expected = count.checked_mul(image_size).ok_or_else(too_large)?;

    let pixels = &data[offset..];
    if pixels.len() != expected {
        return Err(format!(
            "expected {count} images of {rows}x{cols}, found {} bytes of pixels",
            pixels.len()
        ));
    }

    let xs = pixels.iter().map(|&px| px as f32 / 255.0).collect();
    Array2::from_shape_vec((count, image_size), xs).map_err(|e| e.to_string())
}

fn parse_labels(data: &[u8]) -> std::result::Result<Vec<usize>, String> {
    let mut offset = 0;
    let magic = read_be_u32(data, &mut offset)?;
    if magic != LABELS_MAGIC {
        return Err(format!("bad magic {magic}, expected {LABELS_MAGIC}"));
    }

    let count = read_be_u32(data, &mut offset)? as usize;
    let labels = &data[offset..];
    if labels.len() != count {
        return Err(format!("expected {count} labels, found {}", labels.len()));
    }

    Ok(labels.iter().map(|&l| l as usize).collect())
}

/// The fashion mnist dataset as distributed: four uncompressed idx files in one directory.
pub struct FashionMnist;

impl FashionMnist {
    pub const TRAIN_IMAGES: &'static str = "train-images-idx3-ubyte";
    pub const TRAIN_LABELS: &'static str = "train-labels-idx1-ubyte";
    pub const TEST_IMAGES: &'static str = "t10k-images-idx3-ubyte";
    pub const TEST_LABELS: &'static str = "t10k-labels-idx1-ubyte";

    /// The amount of classes.
    pub const CLASSES: usize = 10;

    /// Loads the training and test splits found in `dir`.
    ///
    /// # Returns
    /// The `(train, test)` datasets.
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<(Dataset, Dataset)> {
        let dir = dir.as_ref();
        let train = Self::load_split(dir, Self::TRAIN_IMAGES, Self::TRAIN_LABELS)?;
        let test = Self::load_split(dir, Self::TEST_IMAGES, Self::TEST_LABELS)?;
        Ok((train, test))
    }

    fn load_split(dir: &Path, images: &str, labels: &str) -> Result<Dataset> {
        let xs = read_images(dir.join(images))?;
        let labels = read_labels(dir.join(labels))?;

        if let Some(&label) = labels.iter().find(|&&l| l >= Self::CLASSES) {
            return Err(MlErr::LabelOutOfRange {
                label,
                classes: Self::CLASSES,
            });
        }

        let dataset = Dataset::new(xs, labels)?;
        info!(samples = dataset.len(), features = dataset.x_size(); "loaded {images}");
        Ok(dataset)
    }
}
