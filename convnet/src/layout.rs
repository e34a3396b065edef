use std::ops::Range;

use crate::error::{MlErr, Result};

/// One named tensor inside the flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamEntry {
    pub name: &'static str,
    pub shape: Vec<usize>,
    pub range: Range<usize>,
}

impl ParamEntry {
    pub fn len(&self) -> usize {
        self.range.end - self.range.start
    }

    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

/// Maps a flat parameter buffer into named tensors.
/// This is the core "offsets + shapes" mechanism: layers, the optimizer and
/// the checkpoint writer all agree on buffer positions through it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamLayout {
    entries: Vec<ParamEntry>,
    total: usize,
}

impl ParamLayout {
    /// Layout of the MNIST convnet, in the order the layers consume the
    /// buffer. Linear weights are stored `[input, output]` for the `x @ W`
    /// convention used by the dense layers.
    pub fn mnist_cnn() -> Self {
        Self::from_shapes(&[
            ("conv1.weight", &[10, 1, 5, 5][..]),
            ("conv1.bias", &[10]),
            ("conv2.weight", &[20, 10, 5, 5]),
            ("conv2.bias", &[20]),
            ("fc1.weight", &[320, 50]),
            ("fc1.bias", &[50]),
            ("fc2.weight", &[50, 10]),
            ("fc2.bias", &[10]),
        ])
    }

    fn from_shapes(shapes: &[(&'static str, &[usize])]) -> Self {
        let mut entries = Vec::with_capacity(shapes.len());
        let mut offset = 0;
        for (name, shape) in shapes {
            let len: usize = shape.iter().product();
            entries.push(ParamEntry {
                name,
                shape: shape.to_vec(),
                range: offset..offset + len,
            });
            offset += len;
        }
        Self {
            entries,
            total: offset,
        }
    }

    pub fn entries(&self) -> &[ParamEntry] {
        &self.entries
    }

    /// Total number of `f32` values the buffer must hold.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn find(&self, name: &str) -> Option<&ParamEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Sanity check: entries must tile the buffer exactly, in order,
    /// with each range matching its shape.
    pub fn validate(&self) -> Result<()> {
        let mut offset = 0;
        for entry in &self.entries {
            if entry.range.start != offset {
                return Err(MlErr::Layout("entries must be contiguous"));
            }
            let expected: usize = entry.shape.iter().product();
            if entry.len() != expected {
                return Err(MlErr::SizeMismatch {
                    what: entry.name,
                    got: entry.len(),
                    expected,
                });
            }
            offset = entry.range.end;
        }
        if offset != self.total {
            return Err(MlErr::Layout("entries do not cover the buffer"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mnist_layout_is_valid() {
        let layout = ParamLayout::mnist_cnn();
        layout.validate().expect("layout must validate");
        assert_eq!(layout.total(), 21_840);
        assert_eq!(layout.entries().len(), 8);
    }

    #[test]
    fn mnist_layout_ranges() {
        let layout = ParamLayout::mnist_cnn();
        let conv1_w = layout.find("conv1.weight").unwrap();
        assert_eq!(conv1_w.range, 0..250);
        assert_eq!(conv1_w.shape, vec![10, 1, 5, 5]);
        let fc2_b = layout.find("fc2.bias").unwrap();
        assert_eq!(fc2_b.range, 21_830..21_840);
        assert!(layout.find("fc3.weight").is_none());
    }

    #[test]
    fn entries_are_contiguous() {
        let layout = ParamLayout::mnist_cnn();
        let mut offset = 0;
        for entry in layout.entries() {
            assert_eq!(entry.range.start, offset);
            offset = entry.range.end;
        }
        assert_eq!(offset, layout.total());
    }
}
