//! Compute device selection.
//!
//! The device is chosen once at process start from the configured preference and the
//! accelerators the worker reports, then handed to every component that needs it.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Where tensors live and the model runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    Cuda(u32),
    Mps,
    #[default]
    Cpu,
}

impl Device {
    pub fn is_accelerator(&self) -> bool {
        !matches!(self, Device::Cpu)
    }

    /// Resolve the configured preference against the available hardware.
    pub fn select(preference: DevicePreference, info: &AcceleratorInfo) -> Result<Self> {
        debug!("Selecting device for {:?} with {:?}", preference, info);

        let device = match preference {
            DevicePreference::Auto => {
                if info.cuda_devices > 0 {
                    Device::Cuda(0)
                } else if info.mps {
                    Device::Mps
                } else {
                    Device::Cpu
                }
            }
            DevicePreference::Cuda(ordinal) => {
                if ordinal >= info.cuda_devices {
                    return Err(Error::ConfigError(format!(
                        "cuda:{} requested but {} CUDA device(s) available",
                        ordinal, info.cuda_devices
                    )));
                }
                Device::Cuda(ordinal)
            }
            DevicePreference::Mps => {
                if !info.mps {
                    return Err(Error::ConfigError(
                        "mps requested but Metal is not available".to_string(),
                    ));
                }
                Device::Mps
            }
            DevicePreference::Cpu => Device::Cpu,
        };

        info!("Selected compute device: {}", device);
        Ok(device)
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            Device::Mps => write!(f, "mps"),
            Device::Cpu => write!(f, "cpu"),
        }
    }
}

impl FromStr for Device {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "cpu" => Ok(Device::Cpu),
            "mps" => Ok(Device::Mps),
            "cuda" => Ok(Device::Cuda(0)),
            other => match other.strip_prefix("cuda:") {
                Some(ordinal) => ordinal
                    .parse()
                    .map(Device::Cuda)
                    .map_err(|_| Error::ConfigError(format!("Invalid device: {}", s))),
                None => Err(Error::ConfigError(format!("Invalid device: {}", s))),
            },
        }
    }
}

impl Serialize for Device {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Device {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Configured device preference (`auto`, `cuda`, `cuda:N`, `mps`, `cpu`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DevicePreference {
    #[default]
    Auto,
    Cuda(u32),
    Mps,
    Cpu,
}

impl FromStr for DevicePreference {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        if s.trim().eq_ignore_ascii_case("auto") {
            return Ok(DevicePreference::Auto);
        }
        Ok(match s.parse::<Device>()? {
            Device::Cuda(ordinal) => DevicePreference::Cuda(ordinal),
            Device::Mps => DevicePreference::Mps,
            Device::Cpu => DevicePreference::Cpu,
        })
    }
}

impl fmt::Display for DevicePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DevicePreference::Auto => write!(f, "auto"),
            DevicePreference::Cuda(ordinal) => write!(f, "cuda:{}", ordinal),
            DevicePreference::Mps => write!(f, "mps"),
            DevicePreference::Cpu => write!(f, "cpu"),
        }
    }
}

impl Serialize for DevicePreference {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DevicePreference {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Accelerators visible to the model runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AcceleratorInfo {
    #[serde(default)]
    pub cuda_devices: u32,
    #[serde(default)]
    pub mps: bool,
}

impl AcceleratorInfo {
    pub fn cpu_only() -> Self {
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_prefers_cuda_then_mps() {
        let cuda = AcceleratorInfo {
            cuda_devices: 2,
            mps: false,
        };
        assert_eq!(
            Device::select(DevicePreference::Auto, &cuda).unwrap(),
            Device::Cuda(0)
        );

        let mac = AcceleratorInfo {
            cuda_devices: 0,
            mps: true,
        };
        assert_eq!(Device::select(DevicePreference::Auto, &mac).unwrap(), Device::Mps);

        assert_eq!(
            Device::select(DevicePreference::Auto, &AcceleratorInfo::cpu_only()).unwrap(),
            Device::Cpu
        );
    }

    #[test]
    fn explicit_accelerator_must_exist() {
        let info = AcceleratorInfo {
            cuda_devices: 1,
            mps: false,
        };
        assert!(Device::select(DevicePreference::Cuda(1), &info).is_err());
        assert!(Device::select(DevicePreference::Mps, &info).is_err());
        assert_eq!(
            Device::select(DevicePreference::Cpu, &info).unwrap(),
            Device::Cpu
        );
    }

    #[test]
    fn parses_device_strings() {
        assert_eq!("cuda".parse::<Device>().unwrap(), Device::Cuda(0));
        assert_eq!("CUDA:3".parse::<Device>().unwrap(), Device::Cuda(3));
        assert_eq!("auto".parse::<DevicePreference>().unwrap(), DevicePreference::Auto);
        assert!("tpu".parse::<DevicePreference>().is_err());
        assert_eq!(Device::Cuda(1).to_string(), "cuda:1");
    }
}
