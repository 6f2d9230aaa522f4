//! Exact inner-product index with caller-assigned `i64` ids.
//!
//! Vectors are stored row-major in a single buffer. Search scans every row, so
//! results are exact; callers normalise vectors to make inner product equal to
//! cosine similarity.

use bytes::{Buf, BufMut, BytesMut};

use super::IndexError;

/// Id reported for result slots that could not be filled.
pub const NO_MATCH: i64 = -1;

const BLOB_MAGIC: &[u8; 4] = b"VIDX";
const BLOB_VERSION: u32 = 1;
const HEADER_LEN: usize = 4 + 4 + 4 + 8;

#[derive(Debug, Clone, PartialEq)]
pub struct FlatIpIndex {
    dimension: usize,
    ids: Vec<i64>,
    data: Vec<f32>,
}

impl FlatIpIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ids: Vec::new(),
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn ntotal(&self) -> usize {
        self.ids.len()
    }

    pub fn ids(&self) -> &[i64] {
        &self.ids
    }

    /// Appends rows. `vectors` must already be checked for dimension by the caller.
    pub fn add_with_ids(&mut self, vectors: &[Vec<f32>], ids: &[i64]) {
        debug_assert_eq!(vectors.len(), ids.len());
        for (vector, id) in vectors.iter().zip(ids) {
            debug_assert_eq!(vector.len(), self.dimension);
            self.data.extend_from_slice(vector);
            self.ids.push(*id);
        }
    }

    /// Drops every row after the first `len`.
    pub fn truncate(&mut self, len: usize) {
        self.ids.truncate(len);
        self.data.truncate(len * self.dimension);
    }

    /// Returns exactly `k` `(id, score)` slots, best first. Slots beyond the
    /// number of stored rows are padded with [`NO_MATCH`].
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(i64, f32)> {
        let mut scored: Vec<(i64, f32)> = self
            .ids
            .iter()
            .zip(self.data.chunks_exact(self.dimension))
            .map(|(id, row)| (*id, dot(row, query)))
            .collect();

        scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        scored.truncate(k);
        scored.resize(k, (NO_MATCH, f32::NEG_INFINITY));
        scored
    }

    /// Serializes to the little-endian blob format:
    /// magic, version, dimension, count, then `(id, vector)` per row.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf =
            BytesMut::with_capacity(HEADER_LEN + self.ids.len() * (8 + 4 * self.dimension));
        buf.put_slice(BLOB_MAGIC);
        buf.put_u32_le(BLOB_VERSION);
        buf.put_u32_le(self.dimension as u32);
        buf.put_u64_le(self.ids.len() as u64);
        for (id, row) in self.ids.iter().zip(self.data.chunks_exact(self.dimension)) {
            buf.put_i64_le(*id);
            for value in row {
                buf.put_f32_le(*value);
            }
        }
        buf.to_vec()
    }

    pub fn from_bytes(mut buf: &[u8]) -> Result<Self, IndexError> {
        if buf.remaining() < HEADER_LEN {
            return Err(IndexError::Corrupt("index blob is shorter than its header".into()));
        }
        let mut magic = [0u8; 4];
        buf.copy_to_slice(&mut magic);
        if &magic != BLOB_MAGIC {
            return Err(IndexError::Corrupt("index blob has an unknown magic".into()));
        }
        let version = buf.get_u32_le();
        if version != BLOB_VERSION {
            return Err(IndexError::Corrupt(format!(
                "unsupported index blob version {version}"
            )));
        }
        let dimension = buf.get_u32_le() as usize;
        let count = buf.get_u64_le() as usize;
        if dimension == 0 {
            return Err(IndexError::Corrupt("index blob declares dimension 0".into()));
        }

        let row_len = 8 + 4 * dimension;
        if count.checked_mul(row_len) != Some(buf.remaining()) {
            return Err(IndexError::Corrupt(format!(
                "index blob declares {count} rows of dimension {dimension} but holds {} payload bytes",
                buf.remaining()
            )));
        }

        let mut index = Self::new(dimension);
        index.ids.reserve(count);
        index.data.reserve(count * dimension);
        for _ in 0..count {
            index.ids.push(buf.get_i64_le());
            for _ in 0..dimension {
                index.data.push(buf.get_f32_le());
            }
        }
        Ok(index)
    }
}

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Scales `vector` to unit L2 norm in place. Zero vectors are left untouched.
pub fn normalize_l2(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        vector.iter_mut().for_each(|v| *v /= norm);
    }
}
