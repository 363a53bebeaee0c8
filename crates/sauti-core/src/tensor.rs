//! Host-side tensors exchanged with the model capabilities.
//!
//! A [`Tensor`] is a flat host buffer plus its shape and the device it is placed on.
//! Placement is carried with the data; the model runtime materializes it there.

use base64::Engine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::device::Device;
use crate::error::{Error, Result};

/// Supported element types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TensorDtype {
    Float32,
    Int64,
}

impl TensorDtype {
    pub fn size_bytes(&self) -> usize {
        match self {
            Self::Float32 => 4,
            Self::Int64 => 8,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TensorData {
    F32(Vec<f32>),
    I64(Vec<i64>),
}

impl TensorData {
    fn len(&self) -> usize {
        match self {
            TensorData::F32(v) => v.len(),
            TensorData::I64(v) => v.len(),
        }
    }

    fn dtype(&self) -> TensorDtype {
        match self {
            TensorData::F32(_) => TensorDtype::Float32,
            TensorData::I64(_) => TensorDtype::Int64,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Tensor {
    shape: Vec<usize>,
    data: TensorData,
    device: Device,
}

impl Tensor {
    pub fn new(shape: Vec<usize>, data: TensorData) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(Error::GenerationError(format!(
                "Tensor shape {:?} needs {} elements, got {}",
                shape,
                expected,
                data.len()
            )));
        }
        Ok(Self {
            shape,
            data,
            device: Device::Cpu,
        })
    }

    pub fn from_f32(shape: Vec<usize>, data: Vec<f32>) -> Result<Self> {
        Self::new(shape, TensorData::F32(data))
    }

    pub fn from_i64(shape: Vec<usize>, data: Vec<i64>) -> Result<Self> {
        Self::new(shape, TensorData::I64(data))
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn ndim(&self) -> usize {
        self.shape.len()
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn dtype(&self) -> TensorDtype {
        self.data.dtype()
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn data(&self) -> &TensorData {
        &self.data
    }

    /// Place the tensor on `device`.
    pub fn to_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }

    /// Bring the tensor back to host memory.
    pub fn to_host(self) -> Self {
        self.to_device(Device::Cpu)
    }

    /// Drop every dimension of size one.
    pub fn squeeze(mut self) -> Self {
        self.shape.retain(|&d| d != 1);
        self
    }

    /// Consume a float tensor into its flat samples.
    pub fn into_f32_vec(self) -> Result<Vec<f32>> {
        match self.data {
            TensorData::F32(v) => Ok(v),
            TensorData::I64(_) => Err(Error::GenerationError(
                "Expected a float32 tensor, got int64".to_string(),
            )),
        }
    }

    pub fn to_wire(&self) -> WireTensor {
        let bytes: Vec<u8> = match &self.data {
            TensorData::F32(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
            TensorData::I64(v) => v.iter().flat_map(|x| x.to_le_bytes()).collect(),
        };
        WireTensor {
            dtype: self.dtype(),
            shape: self.shape.clone(),
            device: self.device,
            data: base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn from_wire(wire: WireTensor) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(&wire.data)
            .map_err(|e| Error::WorkerError(format!("Failed to decode tensor: {}", e)))?;

        let width = wire.dtype.size_bytes();
        if bytes.len() % width != 0 {
            return Err(Error::WorkerError(format!(
                "Tensor payload of {} bytes is not a multiple of {}",
                bytes.len(),
                width
            )));
        }

        let data = match wire.dtype {
            TensorDtype::Float32 => TensorData::F32(
                bytes
                    .chunks_exact(4)
                    .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                    .collect(),
            ),
            TensorDtype::Int64 => TensorData::I64(
                bytes
                    .chunks_exact(8)
                    .map(|c| i64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                    .collect(),
            ),
        };

        Ok(Self::new(wire.shape, data)
            .map_err(|e| Error::WorkerError(e.to_string()))?
            .to_device(wire.device))
    }
}

/// Base64 little-endian encoding used on the worker socket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireTensor {
    pub dtype: TensorDtype,
    pub shape: Vec<usize>,
    pub device: Device,
    pub data: String,
}

/// Named model inputs produced by the preprocessor
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelInputs {
    tensors: BTreeMap<String, Tensor>,
}

impl ModelInputs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, tensor: Tensor) {
        self.tensors.insert(name.into(), tensor);
    }

    pub fn get(&self, name: &str) -> Option<&Tensor> {
        self.tensors.get(name)
    }

    pub fn len(&self) -> usize {
        self.tensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tensors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Tensor)> {
        self.tensors.iter()
    }

    /// Move every tensor onto `device`.
    pub fn to_device(self, device: Device) -> Self {
        Self {
            tensors: self
                .tensors
                .into_iter()
                .map(|(name, t)| (name, t.to_device(device)))
                .collect(),
        }
    }

    pub fn to_wire(&self) -> BTreeMap<String, WireTensor> {
        self.tensors
            .iter()
            .map(|(name, t)| (name.clone(), t.to_wire()))
            .collect()
    }
}
