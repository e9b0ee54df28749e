use std::fmt;

use candle_core::{utils, Device, Result as CandleResult};
use clap::ValueEnum;

/// Requested compute device, as given on the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DevicePreference {
    Auto,
    Cpu,
    Cuda,
    Metal,
}

/// Compute backend resolved once at startup.
///
/// Weights live on this backend for the whole process and every request
/// builds its input tensors on it; nothing re-checks availability later.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComputeBackend {
    Cpu,
    Cuda(usize),
    Metal(usize),
}

impl ComputeBackend {
    pub fn detect(preference: DevicePreference) -> Self {
        match preference {
            DevicePreference::Cpu => ComputeBackend::Cpu,
            DevicePreference::Cuda => ComputeBackend::Cuda(0),
            DevicePreference::Metal => ComputeBackend::Metal(0),
            DevicePreference::Auto => {
                if utils::cuda_is_available() {
                    ComputeBackend::Cuda(0)
                } else if utils::metal_is_available() {
                    ComputeBackend::Metal(0)
                } else {
                    ComputeBackend::Cpu
                }
            }
        }
    }

    pub fn device(&self) -> CandleResult<Device> {
        match *self {
            ComputeBackend::Cpu => Ok(Device::Cpu),
            ComputeBackend::Cuda(ordinal) => Device::new_cuda(ordinal),
            ComputeBackend::Metal(ordinal) => Device::new_metal(ordinal),
        }
    }
}

impl fmt::Display for ComputeBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ComputeBackend::Cpu => write!(f, "cpu"),
            ComputeBackend::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            ComputeBackend::Metal(ordinal) => write!(f, "metal:{}", ordinal),
        }
    }
}
