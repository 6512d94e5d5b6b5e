//! Collapse a dense dual solution to its support vectors

use crate::core::{Result, Sample};
use crate::kernel::Kernel;
use crate::optimizer::SupportVectorModel;
use crate::solver::DualState;
use std::sync::Arc;

/// Fold the dual state into one signed coefficient per sample, keep the
/// non-zero ones and emit the prediction model
///
/// `state` is consumed so the gradient cache and multiplier arrays are
/// released before the support vectors are copied out of `samples`.
pub fn sparsify(
    state: DualState,
    samples: &[Sample],
    kernel: Arc<dyn Kernel>,
    bias: f64,
) -> Result<SupportVectorModel> {
    let training_size = state.len();
    let mut coefficients = state.coefficients();
    drop(state);

    let mut indices: Vec<usize> = (0..training_size).collect();
    let mut kept = 0;
    for i in 0..training_size {
        if coefficients[i] != 0.0 {
            coefficients.swap(kept, i);
            indices.swap(kept, i);
            kept += 1;
        }
    }
    coefficients.truncate(kept);
    indices.truncate(kept);

    let support_vectors = indices
        .iter()
        .map(|&i| samples[i].features.clone())
        .collect();

    log::debug!("kept {kept} of {training_size} samples as support vectors");
    SupportVectorModel::from_parts(
        kernel,
        support_vectors,
        coefficients,
        bias,
        indices,
        training_size,
    )
}
