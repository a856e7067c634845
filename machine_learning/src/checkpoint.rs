use std::{collections::HashMap, fs, path::Path};

use bytemuck::allocation::pod_collect_to_vec;
use log::info;
use safetensors::{Dtype, SafeTensors, serialize_to_file, tensor::TensorView};

use crate::{MlErr, Result, arch::Model};

/// Writes every parameter tensor of `model` to `path` in the safetensors format.
///
/// Only the parameters are stored, keyed by their names. Parent directories are created when
/// missing.
pub fn save<M: Model + ?Sized>(model: &M, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let params = model.parameters();
    let mut tensors = Vec::with_capacity(params.len());

    for param in &params {
        let bytes: &[u8] = bytemuck::cast_slice(param.values);
        let view = TensorView::new(Dtype::F32, param.shape.clone(), bytes)?;
        tensors.push((param.name.clone(), view));
    }

    let metadata = Some(HashMap::from([(
        "classes".to_string(),
        model.class_count().to_string(),
    )]));

    serialize_to_file(tensors, &metadata, path)?;
    info!("saved {} parameters to {}", model.size(), path.display());
    Ok(())
}

/// Overwrites the parameters of `model` with the tensors stored at `path`.
///
/// # Returns
/// An error if a parameter is missing from the file or stored with another shape or dtype, in
/// which case the model may be partially overwritten.
pub fn load<M: Model + ?Sized>(model: &mut M, path: &Path) -> Result<()> {
    let buffer = fs::read(path)?;
    let stored = SafeTensors::deserialize(&buffer)?;

    for param in model.parameters_mut() {
        let tensor = stored
            .tensor(&param.name)
            .map_err(|_| MlErr::MissingParameter {
                name: param.name.clone(),
            })?;

        if tensor.dtype() != Dtype::F32 {
            return Err(MlErr::Checkpoint(format!(
                "{} is stored as {:?}, expected F32",
                param.name,
                tensor.dtype()
            )));
        }

        if tensor.shape() != param.shape.as_slice() {
            return Err(MlErr::ShapeMismatch {
                what: "checkpoint tensor",
                got: tensor.shape().to_vec(),
                expected: param.shape.clone(),
            });
        }

        // The file buffer has no alignment guarantee, so the values are copied out.
        let values: Vec<f32> = pod_collect_to_vec(tensor.data());
        param.values.copy_from_slice(&values);
    }

    info!("loaded parameters from {}", path.display());
    Ok(())
}
