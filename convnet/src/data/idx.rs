//! Reader for the IDX files the MNIST distribution ships in.
//!
//! Headers are big-endian: a magic number, a sample count and, for images,
//! the row and column sizes. Pixels are bytes and get normalized to the
//! dataset statistics on the way in.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::error::{MlErr, Result};

use super::{IMAGE_PIXELS, IMAGE_SIDE, MNIST_MEAN, MNIST_STD};

const IMAGE_MAGIC: u32 = 2051;
const LABEL_MAGIC: u32 = 2049;

/// Reads an idx3 image file into normalized flat pixels.
///
/// # Returns
/// The pixel buffer (`count * 784` values) and the sample count.
pub fn read_images(path: &Path) -> Result<(Vec<f32>, usize)> {
    let mut r = BufReader::new(File::open(path)?);

    if read_u32_be(&mut r)? != IMAGE_MAGIC {
        return Err(MlErr::Idx {
            what: "image magic",
            path: path.to_path_buf(),
        });
    }
    let count = read_u32_be(&mut r)? as usize;
    let rows = read_u32_be(&mut r)? as usize;
    let cols = read_u32_be(&mut r)? as usize;
    if rows != IMAGE_SIDE || cols != IMAGE_SIDE {
        return Err(MlErr::Idx {
            what: "image dimensions",
            path: path.to_path_buf(),
        });
    }

    let mut raw = vec![0u8; count * IMAGE_PIXELS];
    r.read_exact(&mut raw)?;

    let pixels = raw
        .iter()
        .map(|&b| (b as f32 / 255.0 - MNIST_MEAN) / MNIST_STD)
        .collect();
    Ok((pixels, count))
}

/// Reads an idx1 label file.
pub fn read_labels(path: &Path) -> Result<Vec<u8>> {
    let mut r = BufReader::new(File::open(path)?);

    if read_u32_be(&mut r)? != LABEL_MAGIC {
        return Err(MlErr::Idx {
            what: "label magic",
            path: path.to_path_buf(),
        });
    }
    let count = read_u32_be(&mut r)? as usize;

    let mut labels = vec![0u8; count];
    r.read_exact(&mut labels)?;
    Ok(labels)
}

fn read_u32_be(r: &mut impl Read) -> std::io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_be_bytes(buf))
}
