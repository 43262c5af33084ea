//! GPU device selection

use crate::error::{BenchError, Result};
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

/// Ordered, duplicate-free list of device indices handed to the child
/// through `CUDA_VISIBLE_DEVICES`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceList(Vec<u32>);

impl DeviceList {
    pub fn indices(&self) -> &[u32] {
        &self.0
    }

    pub fn count(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Value for `CUDA_VISIBLE_DEVICES`
    pub fn to_env_value(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for DeviceList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let joined: Vec<String> = self.0.iter().map(|d| d.to_string()).collect();
        f.write_str(&joined.join(","))
    }
}

impl FromStr for DeviceList {
    type Err = BenchError;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(BenchError::config("device list is empty"));
        }

        let mut devices = Vec::new();
        for entry in s.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                return Err(BenchError::config(format!(
                    "malformed device list '{}': empty entry",
                    s
                )));
            }
            let index: u32 = entry.parse().map_err(|_| {
                BenchError::config(format!(
                    "malformed device list '{}': '{}' is not a device index",
                    s, entry
                ))
            })?;
            if devices.contains(&index) {
                return Err(BenchError::config(format!(
                    "malformed device list '{}': device {} listed twice",
                    s, index
                )));
            }
            devices.push(index);
        }

        Ok(DeviceList(devices))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_device() {
        let list: DeviceList = "0".parse().unwrap();
        assert_eq!(list.indices(), &[0]);
        assert_eq!(list.count(), 1);
    }

    #[test]
    fn test_multiple_devices_keep_order() {
        let list: DeviceList = " 3, 1,2 ".parse().unwrap();
        assert_eq!(list.indices(), &[3, 1, 2]);
        assert_eq!(list.to_env_value(), "3,1,2");
    }

    #[test]
    fn test_malformed_lists() {
        for bad in ["", "0,,1", "0,", "gpu0", "-1", "0,0", "1.5"] {
            let err = bad.parse::<DeviceList>().unwrap_err();
            assert_eq!(err.error_code(), "CONFIGURATION_ERROR", "input {:?}", bad);
        }
    }
}
