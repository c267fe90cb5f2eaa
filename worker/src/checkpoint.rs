use std::{
    fs,
    path::{Path, PathBuf},
};

use machine_learning::{ParamLayout, Parameters};
use safetensors::{Dtype, SafeTensors, tensor::TensorView};
use serde::{Deserialize, Serialize};

use crate::{EpochResult, Result, WorkerErr};

/// The file holding the parameters, one f32 tensor per layout entry.
pub const MODEL_FILE: &str = "model.safetensors";
/// The file holding the metadata.
pub const META_FILE: &str = "checkpoint.json";

/// Everything about a checkpoint but the parameter values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckpointMeta {
    pub epoch: usize,
    pub rank: usize,
    pub result: EpochResult,
    /// The tensors in buffer order.
    pub layout: ParamLayout,
}

/// A snapshot of a replica's parameters at the end of an epoch.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint {
    meta: CheckpointMeta,
    values: Vec<f32>,
}

impl Checkpoint {
    /// Copies the current parameters.
    pub fn snapshot(rank: usize, result: EpochResult, params: &Parameters) -> Self {
        Self {
            meta: CheckpointMeta {
                epoch: result.epoch,
                rank,
                result,
                layout: params.layout().clone(),
            },
            values: params.values().to_vec(),
        }
    }

    pub fn epoch(&self) -> usize {
        self.meta.epoch
    }

    pub fn rank(&self) -> usize {
        self.meta.rank
    }

    pub fn meta(&self) -> &CheckpointMeta {
        &self.meta
    }

    pub fn layout(&self) -> &ParamLayout {
        &self.meta.layout
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    /// Turns the snapshot back into trainable parameters.
    pub fn into_parameters(self) -> Result<Parameters> {
        Ok(Parameters::new(self.meta.layout, self.values)?)
    }

    /// Writes the checkpoint into `dir`, creating it if needed.
    ///
    /// # Returns
    /// The directory the checkpoint was written to.
    pub fn write_to<P: AsRef<Path>>(&self, dir: P) -> Result<PathBuf> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let layout = &self.meta.layout;
        layout.validate(self.values.len())?;

        let mut views = Vec::with_capacity(layout.tensors().len());
        for (tensor, values) in layout.split(&self.values) {
            let bytes: &[u8] = bytemuck::cast_slice(values);
            let view = TensorView::new(Dtype::F32, tensor.shape.clone(), bytes)?;
            views.push((tensor.name.as_str(), view));
        }

        safetensors::serialize_to_file(
            views.iter().map(|(name, view)| (*name, view)),
            &None,
            &dir.join(MODEL_FILE),
        )?;

        let meta = serde_json::to_vec_pretty(&self.meta)?;
        fs::write(dir.join(META_FILE), meta)?;

        Ok(dir.to_path_buf())
    }

    /// Reads a checkpoint written by `write_to`.
    ///
    /// # Errors
    /// `WorkerErr::CorruptCheckpoint` if the tensors do not match the metadata.
    pub fn read_from<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        let meta: CheckpointMeta = serde_json::from_slice(&fs::read(dir.join(META_FILE))?)?;

        let bytes = fs::read(dir.join(MODEL_FILE))?;
        let tensors = SafeTensors::deserialize(&bytes)?;

        let mut values = Vec::with_capacity(meta.layout.size());
        for tensor in meta.layout.tensors() {
            let view = tensors.tensor(&tensor.name)?;
            if view.dtype() != Dtype::F32 || view.shape() != tensor.shape.as_slice() {
                return Err(WorkerErr::CorruptCheckpoint(format!(
                    "tensor {} is {:?} {:?}, expected F32 {:?}",
                    tensor.name,
                    view.dtype(),
                    view.shape(),
                    tensor.shape
                )));
            }

            values.extend(bytemuck::pod_collect_to_vec::<u8, f32>(view.data()));
        }

        Ok(Self { meta, values })
    }
}
