use std::sync::OnceLock;

use burn::backend::ndarray::{NdArray, NdArrayDevice};
#[cfg(target_os = "macos")]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Metal};
#[cfg(not(target_os = "macos"))]
use burn::backend::wgpu::{self, WgpuDevice, graphics::Vulkan};
#[cfg(feature = "cuda")]
use burn::backend::{Cuda, cuda::CudaDevice};
use burn::tensor::{Tensor, TensorData, backend::Backend};
use ndarray::Array3;

use crate::config::ComputeDevice;

type CpuBackend = NdArray;
type WgpuBackend = wgpu::Wgpu;

/// A 3-D feature tensor resident on a specific burn backend.
#[derive(Debug, Clone)]
pub enum DeviceTensor {
    /// ndarray (CPU) backend.
    Cpu(Tensor<CpuBackend, 3>),
    /// wgpu (GPU) backend.
    Wgpu(Tensor<WgpuBackend, 3>),
    /// CUDA backend.
    #[cfg(feature = "cuda")]
    Cuda(Tensor<Cuda, 3>),
}

impl DeviceTensor {
    /// Tensor dimensions.
    pub fn dims(&self) -> [usize; 3] {
        match self {
            Self::Cpu(tensor) => tensor.dims(),
            Self::Wgpu(tensor) => tensor.dims(),
            #[cfg(feature = "cuda")]
            Self::Cuda(tensor) => tensor.dims(),
        }
    }

    /// Device kind the tensor lives on.
    pub fn device(&self) -> ComputeDevice {
        match self {
            Self::Cpu(_) => ComputeDevice::Cpu,
            Self::Wgpu(_) => ComputeDevice::Wgpu,
            #[cfg(feature = "cuda")]
            Self::Cuda(_) => ComputeDevice::Cuda,
        }
    }
}

pub(super) fn place(array: &Array3<f32>, device: ComputeDevice) -> DeviceTensor {
    match device {
        ComputeDevice::Cpu => DeviceTensor::Cpu(to_backend(array, &NdArrayDevice::default())),
        ComputeDevice::Wgpu => {
            let wgpu_device = WgpuDevice::default();
            init_wgpu(&wgpu_device);
            DeviceTensor::Wgpu(to_backend(array, &wgpu_device))
        }
        #[cfg(feature = "cuda")]
        ComputeDevice::Cuda => DeviceTensor::Cuda(to_backend(array, &CudaDevice::default())),
    }
}

/// Copy a row-major ndarray into a burn tensor on `device`.
pub(crate) fn to_backend<B: Backend>(array: &Array3<f32>, device: &B::Device) -> Tensor<B, 3> {
    let (batch, frames, bins) = array.dim();
    let values: Vec<f32> = array.iter().copied().collect();
    Tensor::from_data(TensorData::new(values, [batch, frames, bins]), device)
}

fn init_wgpu(device: &WgpuDevice) {
    static WGPU_INIT: OnceLock<()> = OnceLock::new();
    WGPU_INIT.get_or_init(|| {
        #[cfg(target_os = "macos")]
        wgpu::init_setup::<Metal>(device, Default::default());
        #[cfg(not(target_os = "macos"))]
        wgpu::init_setup::<Vulkan>(device, Default::default());
    });
}
