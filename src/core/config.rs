use serde::{Serialize, Deserialize};
use std::time::Duration;
use std::path::{Path, PathBuf};

use crate::core::error::{DiagError, Result};


#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TestConfig {

    pub output_format: OutputFormat,
    pub report_format: ReportFormat,
    pub output_dir: Option<PathBuf>,
    pub verbose: bool,
    pub quiet: bool,
    pub interactive: bool,


    pub technician: Option<String>,
    pub workbench_id: Option<String>,
    pub require_identification: bool,
    pub require_elevation: bool,


    pub enabled_tests: Vec<String>,
    #[serde(with = "humantime_serde")]
    pub command_timeout: Duration,
    #[serde(with = "humantime_serde")]
    pub keyboard_timeout: Duration,
    pub keyboard_layout: KeyboardLayout,
    pub usb_test_size: u64,
    pub usb_drive: Option<PathBuf>,
    pub launch_apps: bool,
    pub camera_index: u32,
    #[serde(with = "humantime_serde")]
    pub record_duration: Duration,
    pub tone_frequency_hz: u32,
    #[serde(with = "humantime_serde")]
    pub tone_duration: Duration,
    pub instance_port: u16,
}

/// Console output style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    Text,
    Json,
}

/// Report file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    Html,
    Text,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Html => "html",
            ReportFormat::Text => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

/// Physical layout drawn and checked by the keyboard test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyboardLayout {
    Us,
    Abnt2,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {

            output_format: OutputFormat::Text,
            report_format: ReportFormat::Html,
            output_dir: None,
            verbose: false,
            quiet: false,
            interactive: true,


            technician: None,
            workbench_id: None,
            require_identification: true,
            require_elevation: true,


            enabled_tests: crate::tests::NAMES.iter().map(|name| name.to_string()).collect(),
            command_timeout: Duration::from_secs(10),
            keyboard_timeout: Duration::from_secs(5 * 60),
            keyboard_layout: KeyboardLayout::Us,
            usb_test_size: 64 * 1024 * 1024,
            usb_drive: None,
            launch_apps: true,
            camera_index: 0,
            record_duration: Duration::from_secs(3),
            tone_frequency_hz: 440,
            tone_duration: Duration::from_millis(800),
            instance_port: 12345,
        }
    }
}

impl TestConfig {

    /// Tests that need no operator, without prompts.
    pub fn unattended() -> Self {
        let mut config = Self::default();
        config.apply_preset_unattended();
        config
    }


    pub fn apply_preset_unattended(&mut self) {
        self.interactive = false;
        self.launch_apps = false;
        self.enabled_tests = ["bluetooth", "tpm", "wifi", "usb"]
            .iter()
            .map(|name| name.to_string())
            .collect();
    }


    pub fn is_enabled(&self, test_name: &str) -> bool {
        self.enabled_tests.iter().any(|name| name == test_name)
    }


    pub fn validate(&self) -> Result<()> {
        for name in &self.enabled_tests {
            if !crate::tests::NAMES.contains(&name.as_str()) {
                return Err(DiagError::ConfigError(format!("Unknown test: {}", name)));
            }
        }

        if self.usb_test_size < MIN_USB_TEST_SIZE || self.usb_test_size > MAX_USB_TEST_SIZE {
            return Err(DiagError::ConfigError(format!(
                "USB test size must be between {} and {}",
                bytesize::ByteSize::b(MIN_USB_TEST_SIZE),
                bytesize::ByteSize::b(MAX_USB_TEST_SIZE),
            )));
        }

        if self.record_duration.is_zero() || self.record_duration > Duration::from_secs(60) {
            return Err(DiagError::ConfigError(
                "Record duration must be between 1ms and 60s".to_string(),
            ));
        }

        if self.instance_port == 0 {
            return Err(DiagError::ConfigError("Instance port cannot be 0".to_string()));
        }

        Ok(())
    }


    pub fn parse_timeout(duration_str: &str) -> std::result::Result<Duration, String> {
        let duration = humantime::parse_duration(duration_str)
            .map_err(|e| format!("Invalid duration format: {}", e))?;


        if duration < Duration::from_secs(1) {
            return Err("Timeout must be at least 1 second".to_string());
        }
        if duration > Duration::from_secs(60 * 60) {
            return Err("Timeout cannot exceed 1 hour".to_string());
        }

        Ok(duration)
    }


    pub fn parse_size(size_str: &str) -> std::result::Result<u64, String> {
        let bytes = size_str
            .trim()
            .parse::<bytesize::ByteSize>()
            .map_err(|_| format!("Invalid size format: {}", size_str))?
            .as_u64();

        if !(MIN_USB_TEST_SIZE..=MAX_USB_TEST_SIZE).contains(&bytes) {
            return Err(format!(
                "Size must be between {} and {}",
                bytesize::ByteSize::b(MIN_USB_TEST_SIZE),
                bytesize::ByteSize::b(MAX_USB_TEST_SIZE),
            ));
        }

        Ok(bytes)
    }


    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(DiagError::ConfigError(format!("Config file not found: {}", path.display())));
        }

        let contents = std::fs::read_to_string(path)
            .map_err(|e| DiagError::ConfigError(format!("Failed to read config file: {}", e)))?;


        let config = if path.extension().and_then(|ext| ext.to_str()) == Some("toml") {
            toml::from_str::<Self>(&contents)
                .map_err(|e| DiagError::ConfigError(format!("Failed to parse TOML config: {}", e)))?
        } else {
            serde_json::from_str::<Self>(&contents)
                .map_err(|e| DiagError::ConfigError(format!("Failed to parse JSON config: {}", e)))?
        };

        config.validate()?;
        Ok(config)
    }
}

const MIN_USB_TEST_SIZE: u64 = 1024 * 1024;
const MAX_USB_TEST_SIZE: u64 = 4 * 1024 * 1024 * 1024;

/// Durations as humantime strings ("10s", "5m") in config files.
mod humantime_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*duration).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let value = String::deserialize(deserializer)?;
        humantime::parse_duration(&value).map_err(serde::de::Error::custom)
    }
}
