//! Configuration types for segment attachment

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::layout::segment_permissions;

/// How a unit's segment is backed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum BackingType {
    /// SysV shared memory keyed by `SHM_KEY_BASE + unit` (what producers expect)
    #[default]
    #[serde(rename = "sysv")]
    SysV,
    /// Memory-mapped file, for hosts or sandboxes without SysV IPC
    FileBacked,
}

impl BackingType {
    /// Check if this backing type is supported on the current platform
    pub fn is_supported(&self) -> bool {
        match self {
            BackingType::SysV => cfg!(unix),
            BackingType::FileBacked => true,
        }
    }

    /// Get a human-readable name for the backing type
    pub fn name(&self) -> &'static str {
        match self {
            BackingType::SysV => "sysv",
            BackingType::FileBacked => "file-backed",
        }
    }
}

/// Configuration for attaching a unit's segment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SegmentConfig {
    /// Backing type for the segment
    pub backing_type: BackingType,
    /// Optional file path for file-backed segments
    pub file_path: Option<PathBuf>,
    /// Whether to create the segment if it doesn't exist
    pub create: bool,
    /// Permission override; `None` derives them from the unit index
    pub permissions: Option<u32>,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            backing_type: BackingType::default(),
            file_path: None,
            create: true,
            permissions: None,
        }
    }
}

impl SegmentConfig {
    /// Create a new segment configuration
    pub fn new(backing_type: BackingType) -> Self {
        Self {
            backing_type,
            ..Default::default()
        }
    }

    /// Set the file path for file-backed segments
    pub fn with_file_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.file_path = Some(path.into());
        self
    }

    /// Set whether to create the segment if it doesn't exist
    pub fn with_create(mut self, create: bool) -> Self {
        self.create = create;
        self
    }

    /// Override the permissions derived from the unit index
    pub fn with_permissions(mut self, permissions: u32) -> Self {
        self.permissions = Some(permissions);
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> crate::Result<()> {
        use crate::error::ShmClockError;

        if !self.backing_type.is_supported() {
            return Err(ShmClockError::invalid_parameter(
                "backing_type",
                format!(
                    "Backing type {} is not supported on this platform",
                    self.backing_type.name()
                ),
            ));
        }

        if let Some(permissions) = self.permissions {
            if permissions & !0o777 != 0 {
                return Err(ShmClockError::invalid_parameter(
                    "permissions",
                    format!("Permissions {:#o} have bits outside 0o777", permissions),
                ));
            }
        }

        Ok(())
    }

    /// Permissions to create the segment with for `unit`
    pub fn permissions_for(&self, unit: u32) -> u32 {
        self.permissions.unwrap_or_else(|| segment_permissions(unit))
    }

    /// File path for a file-backed segment of `unit`
    pub fn file_path_for(&self, unit: u32) -> PathBuf {
        self.file_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/dev/shm/shmclock_ntp{}", unit)))
    }
}
