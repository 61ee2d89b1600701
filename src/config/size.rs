//! Swap size strings: an integer followed by `M` or `G`

use crate::error::{ProvisionError, ProvisionResult};
use std::fmt;
use std::str::FromStr;

/// A validated swap size, stored in MiB
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwapSize {
    mib: u64,
}

impl SwapSize {
    /// Build a size directly from MiB
    pub fn from_mib(mib: u64) -> Self {
        Self { mib }
    }

    /// Size in MiB
    pub fn mib(&self) -> u64 {
        self.mib
    }

    /// Argument form accepted by `fallocate -l`
    pub fn fallocate_arg(&self) -> String {
        format!("{}M", self.mib)
    }
}

impl FromStr for SwapSize {
    type Err = ProvisionError;

    fn from_str(s: &str) -> ProvisionResult<Self> {
        let invalid = || ProvisionError::InvalidSwapSize(s.to_string());

        let unit = s.chars().last().ok_or_else(invalid)?;
        let digits = &s[..s.len() - unit.len_utf8()];
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return Err(invalid());
        }

        let value: u64 = digits.parse().map_err(|_| invalid())?;
        let mib = match unit {
            'G' | 'g' => value.checked_mul(1024).ok_or_else(invalid)?,
            'M' | 'm' => value,
            _ => return Err(invalid()),
        };

        Ok(Self { mib })
    }
}

impl fmt::Display for SwapSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.mib >= 1024 && self.mib % 1024 == 0 {
            write!(f, "{}G", self.mib / 1024)
        } else {
            write!(f, "{}M", self.mib)
        }
    }
}
