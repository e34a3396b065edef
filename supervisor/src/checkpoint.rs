//! Checkpoint save/load on top of the safetensors format.
//!
//! One file holds the model tensors named after the parameter layout, the
//! optimizer velocity under `optim.velocity`, and a small string metadata
//! table with the epoch and test accuracy.

use std::collections::HashMap;
use std::error::Error;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use convnet::layout::ParamLayout;
use convnet::optim::SgdMomentum;
use safetensors::tensor::{Dtype, TensorView};
use safetensors::{SafeTensorError, SafeTensors};

pub type Result<T> = std::result::Result<T, CheckpointErr>;

const VELOCITY_TENSOR: &str = "optim.velocity";

/// Why a checkpoint could not be written or used.
///
/// All of these are recoverable from the pipeline's point of view: a run
/// that cannot load resumes fresh, a run that cannot save still reports
/// its results.
#[derive(Debug)]
pub enum CheckpointErr {
    Io(io::Error),
    /// No file at the checkpoint path.
    NotFound { path: PathBuf },
    /// The file is not a safetensors archive.
    Format(SafeTensorError),
    /// A tensor the layout requires is absent.
    MissingTensor { name: String },
    ShapeMismatch {
        name: String,
        got: Vec<usize>,
        expected: Vec<usize>,
    },
    /// The metadata table is absent or does not parse.
    Metadata { what: String },
}

impl fmt::Display for CheckpointErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckpointErr::Io(e) => write!(f, "io error: {e}"),
            CheckpointErr::NotFound { path } => {
                write!(f, "no checkpoint at {}", path.display())
            }
            CheckpointErr::Format(e) => write!(f, "malformed checkpoint: {e}"),
            CheckpointErr::MissingTensor { name } => {
                write!(f, "checkpoint is missing tensor {name}")
            }
            CheckpointErr::ShapeMismatch {
                name,
                got,
                expected,
            } => write!(
                f,
                "tensor {name} has shape {got:?}, expected {expected:?}"
            ),
            CheckpointErr::Metadata { what } => write!(f, "checkpoint metadata: {what}"),
        }
    }
}

impl Error for CheckpointErr {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            CheckpointErr::Io(e) => Some(e),
            CheckpointErr::Format(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for CheckpointErr {
    fn from(value: io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<SafeTensorError> for CheckpointErr {
    fn from(value: SafeTensorError) -> Self {
        Self::Format(value)
    }
}

/// One tensor pulled out of a checkpoint file.
#[derive(Debug, Clone, PartialEq)]
pub struct TensorRecord {
    pub name: String,
    pub shape: Vec<usize>,
    pub values: Vec<f32>,
}

/// A checkpoint read back into memory, not yet applied to anything.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckpointRecord {
    pub tensors: Vec<TensorRecord>,
    pub epoch: u64,
    pub accuracy: f32,
}

impl CheckpointRecord {
    /// Copies the model tensors into `out`.
    ///
    /// Every layout entry is validated against the record before a single
    /// value moves, so a failed restore leaves `out` untouched. Extra
    /// tensors in the record (the optimizer state) are ignored: the model
    /// is restored exactly and momentum starts over.
    pub fn restore_into(&self, layout: &ParamLayout, out: &mut [f32]) -> Result<()> {
        if out.len() != layout.total() {
            return Err(CheckpointErr::ShapeMismatch {
                name: "parameters".into(),
                got: vec![out.len()],
                expected: vec![layout.total()],
            });
        }

        let mut resolved = Vec::with_capacity(layout.entries().len());
        for entry in layout.entries() {
            let tensor = self
                .tensors
                .iter()
                .find(|t| t.name == entry.name)
                .ok_or_else(|| CheckpointErr::MissingTensor {
                    name: entry.name.to_string(),
                })?;
            if tensor.shape != entry.shape {
                return Err(CheckpointErr::ShapeMismatch {
                    name: entry.name.to_string(),
                    got: tensor.shape.clone(),
                    expected: entry.shape.clone(),
                });
            }
            resolved.push((entry, tensor));
        }

        for (entry, tensor) in resolved {
            out[entry.range.clone()].copy_from_slice(&tensor.values);
        }
        Ok(())
    }
}

/// Writes parameters (and optionally a momentum buffer) to `path`.
///
/// The archive goes to a sibling `.tmp` file first and is renamed into
/// place, so a crash mid-write never leaves a truncated checkpoint where
/// the next run expects a valid one.
///
/// # Arguments
/// * `path` - Final checkpoint location.
/// * `layout` - Names and shapes for the flat parameter buffer.
/// * `params` - The parameter values, `layout.total()` long.
/// * `optim` - When given, its velocity is stored under `optim.velocity`.
/// * `epoch` - Recorded in the metadata table.
/// * `accuracy` - Test accuracy in percent, recorded in the metadata table.
pub fn save(
    path: &Path,
    layout: &ParamLayout,
    params: &[f32],
    optim: Option<&SgdMomentum>,
    epoch: u64,
    accuracy: f32,
) -> Result<()> {
    if params.len() != layout.total() {
        return Err(CheckpointErr::ShapeMismatch {
            name: "parameters".into(),
            got: vec![params.len()],
            expected: vec![layout.total()],
        });
    }

    let mut tensors = Vec::with_capacity(layout.entries().len() + 1);
    for entry in layout.entries() {
        let view = TensorView::new(
            Dtype::F32,
            entry.shape.clone(),
            bytemuck::cast_slice(&params[entry.range.clone()]),
        )?;
        tensors.push((entry.name, view));
    }
    if let Some(optim) = optim {
        let velocity = optim.velocity();
        let view = TensorView::new(
            Dtype::F32,
            vec![velocity.len()],
            bytemuck::cast_slice(velocity),
        )?;
        tensors.push((VELOCITY_TENSOR, view));
    }

    let metadata = HashMap::from([
        ("epoch".to_string(), epoch.to_string()),
        ("accuracy".to_string(), accuracy.to_string()),
    ]);

    let tmp = tmp_path(path);
    safetensors::serialize_to_file(tensors, &Some(metadata), &tmp)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Reads a checkpoint file back into a [`CheckpointRecord`].
pub fn load(path: &Path) -> Result<CheckpointRecord> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(CheckpointErr::NotFound {
                path: path.to_path_buf(),
            });
        }
        Err(e) => return Err(CheckpointErr::Io(e)),
    };

    let (_, header) = SafeTensors::read_metadata(&bytes)?;
    let meta = header.metadata().as_ref().ok_or_else(|| CheckpointErr::Metadata {
        what: "missing the metadata table".into(),
    })?;
    let epoch = parse_meta(meta, "epoch")?;
    let accuracy = parse_meta(meta, "accuracy")?;

    let archive = SafeTensors::deserialize(&bytes)?;
    let mut tensors = Vec::new();
    for (name, view) in archive.tensors() {
        if view.dtype() != Dtype::F32 {
            return Err(CheckpointErr::Metadata {
                what: format!("tensor {name} is {:?}, expected F32", view.dtype()),
            });
        }
        tensors.push(TensorRecord {
            name,
            shape: view.shape().to_vec(),
            values: f32s_from_le(view.data()),
        });
    }

    Ok(CheckpointRecord {
        tensors,
        epoch,
        accuracy,
    })
}

fn parse_meta<T: std::str::FromStr>(meta: &HashMap<String, String>, key: &str) -> Result<T> {
    meta.get(key)
        .ok_or_else(|| CheckpointErr::Metadata {
            what: format!("missing {key}"),
        })?
        .parse()
        .map_err(|_| CheckpointErr::Metadata {
            what: format!("{key} does not parse"),
        })
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_else(|| "checkpoint".into());
    name.push(".tmp");
    path.with_file_name(name)
}

// The mapped tensor data has no alignment guarantee, so values are decoded
// byte-wise rather than cast.
fn f32s_from_le(bytes: &[u8]) -> Vec<f32> {
    bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect()
}
