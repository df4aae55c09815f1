//! Driver configuration and TOML loading

use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    error::{Result, ShmClockError},
    segment::SegmentConfig,
};

use super::ClockControl;

/// Full configuration of one SHM unit
///
/// ```toml
/// unit = 2
///
/// [segment]
/// backing_type = "sysv"
///
/// [control]
/// time1 = 0.0
/// time2 = 30.0
/// flag4 = true
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DriverConfig {
    /// Unit index; selects the segment key
    pub unit: u32,
    /// Segment attachment settings
    pub segment: SegmentConfig,
    /// Operator settings
    pub control: ClockControl,
}

impl DriverConfig {
    /// Create a configuration for `unit` with defaults
    pub fn new(unit: u32) -> Self {
        Self {
            unit,
            ..Default::default()
        }
    }

    /// Set the segment configuration
    pub fn with_segment(mut self, segment: SegmentConfig) -> Self {
        self.segment = segment;
        self
    }

    /// Set the operator settings
    pub fn with_control(mut self, control: ClockControl) -> Self {
        self.control = control;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.segment.validate()?;

        if !self.control.time1.is_finite() {
            return Err(ShmClockError::invalid_parameter(
                "time1",
                "Fudge offset must be a finite number of seconds",
            ));
        }

        Ok(())
    }

    /// Parse a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| {
            ShmClockError::from_io(e, &format!("Failed to read {}", path.display()))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Render as TOML
    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| ShmClockError::config(format!("TOML encode error: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::BackingType;

    #[test]
    fn test_parse_full_document() {
        let config = DriverConfig::from_toml_str(
            r#"
            unit = 2

            [segment]
            backing_type = "file-backed"
            file_path = "/tmp/ntp2"

            [control]
            time1 = 0.002
            time2 = 30.0
            flag4 = true
            "#,
        )
        .unwrap();

        assert_eq!(config.unit, 2);
        assert_eq!(config.segment.backing_type, BackingType::FileBacked);
        assert_eq!(config.control.time2, 30.0);
        assert!(config.control.flag4);
        assert!(!config.control.flag1);
    }

    #[test]
    fn test_sysv_backing_name_parses_and_renders() {
        let config = DriverConfig::from_toml_str("unit = 2\n[segment]\nbacking_type = \"sysv\"\n").unwrap();
        assert_eq!(config.unit, 2);
        assert_eq!(config.segment.backing_type, BackingType::SysV);

        let text = DriverConfig::default().to_toml_string().unwrap();
        assert!(text.contains(&format!("backing_type = \"{}\"", BackingType::SysV.name())));
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = DriverConfig::from_toml_str("").unwrap();
        assert_eq!(config, DriverConfig::default());
    }

    #[test]
    fn test_unknown_backing_is_config_error() {
        let err = DriverConfig::from_toml_str("[segment]\nbacking_type = \"tape\"\n").unwrap_err();
        assert!(matches!(err, ShmClockError::Config { .. }));
    }

    #[test]
    fn test_roundtrip_through_toml() {
        let config = DriverConfig::new(4).with_control(ClockControl { flag1: true, ..Default::default() });
        let text = config.to_toml_string().unwrap();
        assert_eq!(DriverConfig::from_toml_str(&text).unwrap(), config);
    }
}
