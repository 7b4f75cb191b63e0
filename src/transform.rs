use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::context::{DistributionType, LazyValues, RandomContext};
use crate::errors::SketchError;

/// Which dimension of the input the sketch reduces: columnwise computes
/// `Pi * A` (fewer rows), rowwise computes `A * Pi^T` (fewer columns).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SketchDirection {
    Columnwise,
    Rowwise,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransformKind {
    Hash,
    DenseGaussian,
    DenseUniform,
    DenseRademacher,
}

/// Persisted form of a transform. The draws themselves are not stored:
/// re-opening the context at (seed, offset) and replaying the allocation
/// sequence reproduces them bit for bit.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TransformRecord {
    pub seed: u64,
    pub n: usize,
    pub s: usize,
    pub kind: TransformKind,
    #[serde(default)]
    pub offset: u64,
    #[serde(default = "default_scale")]
    pub scale: f64,
}

fn default_scale() -> f64 {
    1.0
}

#[derive(Clone, Copy, Debug)]
struct Provenance {
    seed: u64,
    offset: u64,
}

/// Hash (sparse-projection) operator: input coordinate i maps to output
/// coordinate `row_idx[i]` with sign `row_value[i]`. The conceptual S x N
/// operator matrix has exactly one nonzero per column and is never formed.
#[derive(Clone, Debug)]
pub struct HashTransform {
    n: usize,
    s: usize,
    provenance: Option<Provenance>,
    row_idx: Arc<Vec<usize>>,
    row_value: Arc<Vec<f64>>,
}

impl HashTransform {
    /// Draws `row_idx` uniformly over `[0, s)` and `row_value` from the
    /// Rademacher distribution, eagerly. Both are immutable afterwards.
    pub fn new(n: usize, s: usize, context: &mut RandomContext) -> Result<Self, SketchError> {
        if n == 0 || s == 0 {
            return Err(SketchError::Configuration(format!(
                "hash transform dimensions must be positive, got {}x{}",
                n, s
            )));
        }
        let provenance = Provenance {
            seed: context.seed(),
            offset: context.offset(),
        };
        let row_idx = context.allocate_indices(n, s)?;
        let row_value = context.allocate_values(n, DistributionType::Rademacher);
        log::debug!(
            "hash transform {} -> {} drawn at stream offset {}",
            n,
            s,
            provenance.offset
        );
        Ok(HashTransform {
            n,
            s,
            provenance: Some(provenance),
            row_idx: Arc::new(row_idx),
            row_value: Arc::new(row_value),
        })
    }

    /// Shares another instance's arrays (read-only), for applying the same
    /// operator to several matrices.
    pub fn from_data(other: &HashTransform) -> Self {
        HashTransform {
            n: other.n,
            s: other.s,
            provenance: other.provenance,
            row_idx: Arc::clone(&other.row_idx),
            row_value: Arc::clone(&other.row_value),
        }
    }

    /// Builds an operator from explicit index/value arrays. Such a
    /// transform has no seed and cannot be persisted.
    pub fn from_parts(
        n: usize,
        s: usize,
        row_idx: Vec<usize>,
        row_value: Vec<f64>,
    ) -> Result<Self, SketchError> {
        if n == 0 || s == 0 {
            return Err(SketchError::Configuration(format!(
                "hash transform dimensions must be positive, got {}x{}",
                n, s
            )));
        }
        if row_idx.len() != n || row_value.len() != n {
            return Err(SketchError::Configuration(format!(
                "expected {} index/value pairs, got {} indices and {} values",
                n,
                row_idx.len(),
                row_value.len()
            )));
        }
        if let Some(&bad) = row_idx.iter().find(|&&r| r >= s) {
            return Err(SketchError::Configuration(format!(
                "target index {} out of range for output size {}",
                bad, s
            )));
        }
        Ok(HashTransform {
            n,
            s,
            provenance: None,
            row_idx: Arc::new(row_idx),
            row_value: Arc::new(row_value),
        })
    }

    pub fn get_n(&self) -> usize {
        self.n
    }

    pub fn get_s(&self) -> usize {
        self.s
    }

    pub fn row_idx(&self) -> &[usize] {
        &self.row_idx
    }

    pub fn row_value(&self) -> &[f64] {
        &self.row_value
    }

    pub fn to_record(&self) -> Result<TransformRecord, SketchError> {
        let provenance = self.provenance.ok_or_else(|| {
            SketchError::Configuration(
                "transform built from explicit arrays has no seed to persist".to_string(),
            )
        })?;
        Ok(TransformRecord {
            seed: provenance.seed,
            n: self.n,
            s: self.s,
            kind: TransformKind::Hash,
            offset: provenance.offset,
            scale: 1.0,
        })
    }

    /// Reconstructs the operator by replaying the recorded allocation
    /// sequence; `row_idx` and `row_value` come out identical to the
    /// original's.
    pub fn from_record(record: &TransformRecord) -> Result<Self, SketchError> {
        if record.kind != TransformKind::Hash {
            return Err(SketchError::Configuration(format!(
                "record kind {:?} is not a hash transform",
                record.kind
            )));
        }
        let mut context = RandomContext::with_offset(record.seed, record.offset);
        HashTransform::new(record.n, record.s, &mut context)
    }
}

/// Dense operator: an independent random value at every (input, output)
/// pair, materialized lazily. Grid position for `value_at(i, j)` is
/// `i * s + j`; the convention is part of the persisted format.
pub struct DenseTransform {
    n: usize,
    s: usize,
    scale: f64,
    kind: TransformKind,
    provenance: Provenance,
    values: LazyValues,
}

impl DenseTransform {
    pub fn new(
        n: usize,
        s: usize,
        context: &mut RandomContext,
        dist: DistributionType,
    ) -> Result<Self, SketchError> {
        if n == 0 || s == 0 {
            return Err(SketchError::Configuration(format!(
                "dense transform dimensions must be positive, got {}x{}",
                n, s
            )));
        }
        let kind = match dist {
            DistributionType::Gaussian => TransformKind::DenseGaussian,
            DistributionType::Uniform => TransformKind::DenseUniform,
            DistributionType::Rademacher => TransformKind::DenseRademacher,
        };
        let provenance = Provenance {
            seed: context.seed(),
            offset: context.offset(),
        };
        let values = context.allocate_lazy(n * s, dist);
        log::debug!(
            "dense {:?} transform {} -> {} claimed at stream offset {}",
            kind,
            n,
            s,
            provenance.offset
        );
        Ok(DenseTransform {
            n,
            s,
            // No scaling in raw form.
            scale: 1.0,
            kind,
            provenance,
            values,
        })
    }

    /// Same operator with every entry multiplied by `scale`.
    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = scale;
        self
    }

    pub fn get_n(&self) -> usize {
        self.n
    }

    pub fn get_s(&self) -> usize {
        self.s
    }

    pub fn scale(&self) -> f64 {
        self.scale
    }

    /// Scaled entry for input coordinate `input` and output coordinate
    /// `output`, generated on first access.
    pub fn value_at(&self, input: usize, output: usize) -> f64 {
        self.scale * self.values.get(input * self.s + output)
    }

    pub fn to_record(&self) -> TransformRecord {
        TransformRecord {
            seed: self.provenance.seed,
            n: self.n,
            s: self.s,
            kind: self.kind,
            offset: self.provenance.offset,
            scale: self.scale,
        }
    }

    pub fn from_record(record: &TransformRecord) -> Result<Self, SketchError> {
        let dist = match record.kind {
            TransformKind::DenseGaussian => DistributionType::Gaussian,
            TransformKind::DenseUniform => DistributionType::Uniform,
            TransformKind::DenseRademacher => DistributionType::Rademacher,
            TransformKind::Hash => {
                return Err(SketchError::Configuration(
                    "record kind Hash is not a dense transform".to_string(),
                ))
            }
        };
        let mut context = RandomContext::with_offset(record.seed, record.offset);
        Ok(DenseTransform::new(record.n, record.s, &mut context, dist)?.with_scale(record.scale))
    }
}
