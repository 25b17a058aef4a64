//! Report files.
//!
//! A report holds who ran the bench (technician, workbench, date), the
//! hardware snapshot, and the latest result of each test. It renders as HTML,
//! plain text, JSON or CSV and is written as
//! `hardware_report_YYYYmmdd_HHMMSS.<ext>`.

pub mod csv;
pub mod html;
pub mod text;

use std::fs;
use std::path::{Path, PathBuf};

use bytesize::ByteSize;
use chrono::{DateTime, Local};
use log::info;
use serde::Serialize;
use serde_json::json;

use crate::core::config::{ReportFormat, TestConfig};
use crate::core::error::Result;
use crate::core::hardware::{DiskType, HardwareInfo};
use crate::core::runner::{Session, Summary};
use crate::core::test::TestResult;

pub const NOT_AVAILABLE: &str = "Not available";

/// Who produced the report, and when.
#[derive(Debug, Clone, Serialize)]
pub struct Identification {
    pub technician: Option<String>,
    pub workbench_id: Option<String>,
    pub date: DateTime<Local>,
}

impl Identification {
    pub fn from_config(config: &TestConfig) -> Self {
        Self {
            technician: config.technician.clone(),
            workbench_id: config.workbench_id.clone(),
            date: Local::now(),
        }
    }

    pub fn is_complete(&self) -> bool {
        is_filled(&self.technician) && is_filled(&self.workbench_id)
    }
}

fn is_filled(value: &Option<String>) -> bool {
    value.as_deref().map(|v| !v.trim().is_empty()).unwrap_or(false)
}

/// Titled group of label/value rows, shared by the text and HTML layouts.
#[derive(Debug, Clone, PartialEq)]
pub struct Section {
    pub title: &'static str,
    pub rows: Vec<(String, String)>,
}

impl Section {
    fn new(title: &'static str) -> Self {
        Self { title, rows: Vec::new() }
    }

    fn row(mut self, label: impl Into<String>, value: Option<String>) -> Self {
        self.rows
            .push((label.into(), value.unwrap_or_else(|| NOT_AVAILABLE.to_string())));
        self
    }
}

pub struct ReportGenerator<'a> {
    pub identification: Identification,
    pub hardware: Option<&'a HardwareInfo>,
    pub results: Vec<&'a TestResult>,
    pub summary: Summary,
}

impl<'a> ReportGenerator<'a> {
    pub fn new(
        identification: Identification,
        hardware: Option<&'a HardwareInfo>,
        results: Vec<&'a TestResult>,
    ) -> Self {
        let summary = Summary::from_results(results.iter().copied());
        Self {
            identification,
            hardware,
            results,
            summary,
        }
    }

    /// Report over the session's hardware snapshot and latest results.
    pub fn for_session(session: &'a Session) -> Self {
        Self::new(
            Identification::from_config(session.config()),
            session.cached_hardware(),
            session.latest_results(),
        )
    }

    pub fn render(&self, format: ReportFormat) -> Result<String> {
        match format {
            ReportFormat::Html => Ok(html::render(self)),
            ReportFormat::Text => Ok(text::render(self)),
            ReportFormat::Json => self.render_json(),
            ReportFormat::Csv => csv::render(self),
        }
    }

    fn render_json(&self) -> Result<String> {
        let value = json!({
            "identification": self.identification,
            "hardware": self.hardware,
            "results": self.results,
            "summary": self.summary,
        });
        Ok(serde_json::to_string_pretty(&value)?)
    }

    pub fn file_name(&self, format: ReportFormat) -> String {
        format!(
            "hardware_report_{}.{}",
            self.identification.date.format("%Y%m%d_%H%M%S"),
            format.extension()
        )
    }

    /// Writes the report into `dir`, creating it if needed.
    pub fn write(&self, dir: &Path, format: ReportFormat) -> Result<PathBuf> {
        fs::create_dir_all(dir)?;

        let mut path = dir.join(self.file_name(format));
        let mut n = 2;
        while path.exists() {
            let stem = self.file_name(format);
            let stem = stem.trim_end_matches(&format!(".{}", format.extension()));
            path = dir.join(format!("{}_{}.{}", stem, n, format.extension()));
            n += 1;
        }

        fs::write(&path, self.render(format)?)?;
        info!("Report written to {}", path.display());
        Ok(path)
    }

    /// Hardware grouped for display; empty when no snapshot was taken.
    pub fn hardware_sections(&self) -> Vec<Section> {
        self.hardware.map(hardware_sections).unwrap_or_default()
    }
}

/// `Documents/Hardware Reports`, falling back to the home directory, then the working directory.
pub fn default_report_dir() -> PathBuf {
    dirs::document_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("Hardware Reports")
}

fn bytes(value: u64) -> Option<String> {
    (value > 0).then(|| ByteSize(value).to_string())
}

fn yes_no(value: Option<bool>) -> Option<String> {
    value.map(|v| if v { "Yes" } else { "No" }.to_string())
}

fn disk_type(kind: DiskType) -> &'static str {
    match kind {
        DiskType::Hdd => "HDD",
        DiskType::Ssd => "SSD",
        DiskType::Nvme => "NVMe",
        DiskType::Unknown => "Unknown type",
    }
}

pub fn hardware_sections(hw: &HardwareInfo) -> Vec<Section> {
    let system = &hw.system_info;
    let os = format!("{} {}", system.os_name, system.os_version);
    let mut sections = vec![
        Section::new("System")
            .row("Computer name", Some(system.hostname.clone()).filter(|s| !s.is_empty()))
            .row("Operating system", Some(os.trim().to_string()).filter(|s| !s.is_empty()))
            .row("Kernel", Some(system.kernel_version.clone()).filter(|s| !s.is_empty()))
            .row("Architecture", Some(system.architecture.clone()).filter(|s| !s.is_empty())),
        Section::new("Motherboard")
            .row("Manufacturer", hw.motherboard.manufacturer.clone())
            .row("Model", hw.motherboard.model.clone())
            .row("Serial number", hw.motherboard.serial_number.clone()),
        Section::new("Processor")
            .row("Brand", hw.cpu_info.brand.clone())
            .row("Model", Some(hw.cpu_info.model.clone()).filter(|s| !s.is_empty()))
            .row(
                "Cores",
                Some(format!(
                    "{} physical / {} logical",
                    hw.cpu_info.physical_cores, hw.cpu_info.logical_cores
                )),
            )
            .row(
                "Frequency",
                (hw.cpu_info.frequency_mhz > 0).then(|| format!("{} MHz", hw.cpu_info.frequency_mhz)),
            ),
    ];

    let mut memory = Section::new("Memory")
        .row("Total", bytes(hw.memory_info.total_bytes))
        .row("Available", bytes(hw.memory_info.available_bytes))
        .row("Slots used", hw.memory_info.slots_used.map(|n| n.to_string()));
    for module in &hw.memory_info.modules {
        let speed = module
            .speed_mhz
            .map(|mhz| format!(" @ {} MHz", mhz))
            .unwrap_or_default();
        memory = memory.row(
            module.bank_label.clone(),
            Some(format!("{}{}", ByteSize(module.capacity_bytes), speed)),
        );
    }
    sections.push(memory);

    let mut disks = Section::new("Disks");
    for (i, disk) in hw.storage_devices.iter().enumerate() {
        disks = disks.row(
            format!("Disk {}", i + 1),
            Some(format!(
                "{} - {} ({})",
                disk.model,
                ByteSize(disk.size_bytes),
                disk_type(disk.device_type)
            )),
        );
    }
    if hw.storage_devices.is_empty() {
        disks = disks.row("Disks", None);
    }
    sections.push(disks);

    let mut gpus = Section::new("Graphics");
    for (i, gpu) in hw.gpus.iter().enumerate() {
        let mut value = gpu.name.clone();
        if let Some(ram) = gpu.adapter_ram_bytes {
            value.push_str(&format!(", {}", ByteSize(ram)));
        }
        if let Some(driver) = &gpu.driver_version {
            value.push_str(&format!(", driver {}", driver));
        }
        gpus = gpus.row(format!("GPU {}", i + 1), Some(value));
    }
    if hw.gpus.is_empty() {
        gpus = gpus.row("GPU", None);
    }
    sections.push(gpus);

    sections.push(Section::new("Display").row("Resolution", hw.display.resolution.clone()));

    sections.push(
        Section::new("TPM")
            .row("Present", yes_no(hw.tpm.present))
            .row("Ready", yes_no(hw.tpm.ready))
            .row("Version", hw.tpm.spec_version.clone())
            .row("Manufacturer", hw.tpm.manufacturer.clone())
            .row("Firmware", hw.tpm.manufacturer_version.clone()),
    );

    sections.push(
        Section::new("Bluetooth")
            .row("Adapter", hw.bluetooth.adapter.clone())
            .row("Service", hw.bluetooth.service_status.clone()),
    );

    sections.push(
        Section::new("Wi-Fi")
            .row("Adapter", hw.wifi.adapter.clone())
            .row("Status", hw.wifi.status.clone())
            .row("SSID", hw.wifi.ssid.clone()),
    );

    let mut network = Section::new("Network adapters");
    for adapter in &hw.network_adapters {
        let fields: Vec<&str> = [
            adapter.description.as_deref(),
            adapter.status.as_deref(),
            adapter.mac_address.as_deref(),
            adapter.link_speed.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect();
        network = network.row(adapter.name.clone(), Some(fields.join(" | ")).filter(|s| !s.is_empty()));
    }
    if hw.network_adapters.is_empty() {
        network = network.row("Adapters", None);
    }
    sections.push(network);

    sections
}
