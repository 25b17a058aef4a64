//! Hardware inventory.
//!
//! Portable facts (host, CPU, memory, volumes, interfaces) come from `sysinfo`.
//! On Windows the richer descriptors (board, DIMMs, physical disks, video
//! controllers, TPM, Bluetooth, Wi-Fi) come from PowerShell CIM queries. Each
//! query function here returns a `Result`; [`HardwareInfo::collect`] swallows
//! per-section failures so one missing provider never hides the rest.

use chrono::{DateTime, Utc};
use log::debug;
use serde::{Serialize, Deserialize};
use sysinfo::{Disks, Networks, System};

use crate::core::error::Result;
use crate::core::platform::{powershell_json, Shell};


#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HardwareInfo {
    pub system_info: SystemInfo,
    pub motherboard: MotherboardInfo,
    pub cpu_info: CpuInfo,
    pub memory_info: MemoryInfo,
    pub storage_devices: Vec<StorageDevice>,
    pub gpus: Vec<GpuInfo>,
    pub display: DisplayInfo,
    pub tpm: TpmInfo,
    pub bluetooth: BluetoothInfo,
    pub wifi: WifiInfo,
    pub network_adapters: Vec<NetworkAdapter>,
    pub collected_at: DateTime<Utc>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemInfo {
    pub hostname: String,
    pub os_name: String,
    pub os_version: String,
    pub kernel_version: String,
    pub architecture: String,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotherboardInfo {
    pub manufacturer: Option<String>,
    pub model: Option<String>,
    pub serial_number: Option<String>,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CpuInfo {
    pub brand: Option<String>,
    pub model: String,
    pub vendor_id: String,
    pub physical_cores: u32,
    pub logical_cores: u32,
    pub frequency_mhz: u64,
}


#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryInfo {
    pub total_bytes: u64,
    pub available_bytes: u64,
    pub slots_used: Option<usize>,
    pub modules: Vec<MemoryModule>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryModule {
    pub bank_label: String,
    pub capacity_bytes: u64,
    pub speed_mhz: Option<u32>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorageDevice {
    pub model: String,
    pub device_type: DiskType,
    pub size_bytes: u64,
    pub bus: Option<String>,
    pub mount_point: Option<String>,
}


#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DiskType {
    Hdd,
    Ssd,
    Nvme,
    Unknown,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GpuInfo {
    pub name: String,
    pub adapter_ram_bytes: Option<u64>,
    pub driver_version: Option<String>,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DisplayInfo {
    pub resolution: Option<String>,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TpmInfo {
    pub present: Option<bool>,
    pub ready: Option<bool>,
    pub spec_version: Option<String>,
    pub manufacturer: Option<String>,
    pub manufacturer_version: Option<String>,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BluetoothInfo {
    pub service_status: Option<String>,
    pub adapter: Option<String>,
}


#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WifiInfo {
    pub adapter: Option<String>,
    pub status: Option<String>,
    pub ssid: Option<String>,
}


#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkAdapter {
    pub name: String,
    pub description: Option<String>,
    pub status: Option<String>,
    pub mac_address: Option<String>,
    pub link_speed: Option<String>,
}

impl HardwareInfo {
    /// Takes a full snapshot. Sections the host cannot answer stay empty.
    pub fn collect(shell: &dyn Shell) -> Self {
        let mut system = System::new();
        system.refresh_cpu();
        system.refresh_memory();

        let system_info = collect_system_info();
        let cpu_info = collect_cpu_info(&system);
        let mut memory_info = MemoryInfo {
            total_bytes: system.total_memory(),
            available_bytes: system.available_memory(),
            slots_used: None,
            modules: Vec::new(),
        };

        if !shell.is_windows() {
            return Self {
                system_info,
                motherboard: MotherboardInfo::default(),
                cpu_info,
                memory_info,
                storage_devices: volumes_from_sysinfo(),
                gpus: Vec::new(),
                display: DisplayInfo::default(),
                tpm: TpmInfo::default(),
                bluetooth: BluetoothInfo::default(),
                wifi: WifiInfo::default(),
                network_adapters: interfaces_from_sysinfo(),
                collected_at: Utc::now(),
            };
        }

        let mut motherboard = MotherboardInfo::default();
        let mut modules = Vec::new();
        let mut storage_devices = Vec::new();
        let mut video = Vec::new();
        let mut tpm = TpmInfo::default();
        let mut bluetooth = BluetoothInfo::default();
        let mut wifi = WifiInfo::default();
        let mut network_adapters = Vec::new();

        // Every query is a separate PowerShell process, so run them side by side.
        rayon::scope(|s| {
            s.spawn(|_| motherboard = logged("motherboard", query_motherboard(shell)));
            s.spawn(|_| modules = logged("memory modules", query_memory_modules(shell)));
            s.spawn(|_| storage_devices = logged("physical disks", query_physical_disks(shell)));
            s.spawn(|_| video = logged("video controllers", query_video_controllers(shell)));
            s.spawn(|_| tpm = logged("tpm", query_tpm(shell)));
            s.spawn(|_| bluetooth = logged("bluetooth", query_bluetooth(shell)));
            s.spawn(|_| wifi = logged("wifi", query_wifi_summary(shell)));
            s.spawn(|_| network_adapters = logged("network adapters", query_net_adapters(shell, false)));
        });

        if !modules.is_empty() {
            memory_info.slots_used = Some(modules.len());
            let installed: u64 = modules.iter().map(|m| m.capacity_bytes).sum();
            if installed > 0 {
                memory_info.total_bytes = installed;
            }
            memory_info.modules = modules;
        }

        if storage_devices.is_empty() {
            storage_devices = volumes_from_sysinfo();
        }

        let display = DisplayInfo {
            resolution: video.iter().find_map(|row| row.resolution()),
        };
        let gpus = video.into_iter().filter_map(VideoControllerRow::into_gpu).collect();

        Self {
            system_info,
            motherboard,
            cpu_info,
            memory_info,
            storage_devices,
            gpus,
            display,
            tpm,
            bluetooth,
            wifi,
            network_adapters,
            collected_at: Utc::now(),
        }
    }
}

fn logged<T: Default>(section: &str, result: Result<T>) -> T {
    result.unwrap_or_else(|e| {
        debug!("Could not collect {}: {}", section, e);
        T::default()
    })
}

fn collect_system_info() -> SystemInfo {
    SystemInfo {
        hostname: System::host_name().unwrap_or_else(|| "unknown".to_string()),
        os_name: System::name().unwrap_or_else(|| "unknown".to_string()),
        os_version: System::os_version().unwrap_or_else(|| "unknown".to_string()),
        kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        architecture: std::env::consts::ARCH.to_string(),
    }
}

fn collect_cpu_info(system: &System) -> CpuInfo {
    let cpu = system.global_cpu_info();
    let (brand, model) = split_cpu_brand(cpu.brand());

    // sysinfo reports 0 for the global frequency on some platforms.
    let frequency_mhz = match cpu.frequency() {
        0 => system.cpus().first().map(|c| c.frequency()).unwrap_or(0),
        mhz => mhz,
    };

    CpuInfo {
        brand,
        model,
        vendor_id: cpu.vendor_id().to_string(),
        physical_cores: num_cpus::get_physical() as u32,
        logical_cores: num_cpus::get() as u32,
        frequency_mhz,
    }
}

fn volumes_from_sysinfo() -> Vec<StorageDevice> {
    let disks = Disks::new_with_refreshed_list();
    disks
        .iter()
        .map(|disk| StorageDevice {
            model: disk.name().to_string_lossy().into_owned(),
            device_type: match disk.kind() {
                sysinfo::DiskKind::HDD => DiskType::Hdd,
                sysinfo::DiskKind::SSD => DiskType::Ssd,
                _ => DiskType::Unknown,
            },
            size_bytes: disk.total_space(),
            bus: disk.is_removable().then(|| "Removable".to_string()),
            mount_point: Some(disk.mount_point().display().to_string()),
        })
        .collect()
}

fn interfaces_from_sysinfo() -> Vec<NetworkAdapter> {
    let networks = Networks::new_with_refreshed_list();
    let mut adapters: Vec<NetworkAdapter> = networks
        .iter()
        .map(|(name, data)| NetworkAdapter {
            name: name.clone(),
            description: None,
            status: None,
            mac_address: Some(data.mac_address().to_string()),
            link_speed: None,
        })
        .collect();
    adapters.sort_by(|a, b| a.name.cmp(&b.name));
    adapters
}

/// Splits a CPU brand string into vendor and model, dropping trademark marks.
///
/// `"Intel(R) Core(TM) i7-9700K CPU @ 3.60GHz"` becomes
/// `(Some("Intel"), "Core i7-9700K CPU @ 3.60GHz")`.
pub fn split_cpu_brand(full_name: &str) -> (Option<String>, String) {
    let cleaned = full_name
        .replace("(R)", " ")
        .replace("(r)", " ")
        .replace("(TM)", " ")
        .replace("(tm)", " ");
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");

    for vendor in ["Intel", "AMD"] {
        if cleaned.contains(vendor) {
            let model = cleaned.replacen(vendor, "", 1);
            let model = model.split_whitespace().collect::<Vec<_>>().join(" ");
            return (Some(vendor.to_string()), model);
        }
    }

    (None, cleaned)
}

/// Maps a TPM manufacturer id (hex `0x414D4400` or decimal) to the vendor name.
pub fn tpm_vendor_name(manufacturer_id: &str) -> String {
    let id = manufacturer_id.trim();
    let parsed = match id.strip_prefix("0x").or_else(|| id.strip_prefix("0X")) {
        Some(hex) => u32::from_str_radix(hex, 16).ok(),
        None => id.parse::<u32>().ok(),
    };

    let Some(code) = parsed else {
        return format!("Unknown ({})", id);
    };

    let name = match code {
        0x414D_4400 => "AMD",
        0x4154_4D4C => "Atmel",
        0x4252_434D => "Broadcom",
        0x4942_4D00 => "IBM",
        0x4946_5800 => "Infineon",
        0x494E_5443 => "Intel",
        0x4C45_4E00 => "Lenovo",
        0x4D53_4654 => "Microsoft",
        0x4E53_4D20 => "National Semiconductor",
        0x4E54_5A00 => "Nationz",
        0x4E54_4300 => "Nuvoton Technology",
        0x5143_4F4D => "Qualcomm",
        0x534D_5343 => "SMSC",
        0x5354_4D20 => "ST Microelectronics",
        0x534D_534E => "Samsung",
        0x534E_5300 => "Sinosun",
        0x5458_4E00 => "Texas Instruments",
        0x5745_4300 => "Winbond",
        0x524F_4343 => "Fuzhou Rockchip",
        _ => return format!("Unknown (0x{:08X})", code),
    };
    name.to_string()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct BaseBoardRow {
    manufacturer: Option<String>,
    product: Option<String>,
}

pub fn query_motherboard(shell: &dyn Shell) -> Result<MotherboardInfo> {
    let rows: Vec<BaseBoardRow> = powershell_json(
        shell,
        "Get-CimInstance Win32_BaseBoard | Select-Object Manufacturer, Product | ConvertTo-Json",
    )?;
    let board = rows.into_iter().next();

    let serial_number = shell
        .powershell("(Get-CimInstance Win32_BIOS).SerialNumber")
        .ok();

    Ok(MotherboardInfo {
        manufacturer: non_empty(board.as_ref().and_then(|b| b.manufacturer.clone())),
        model: non_empty(board.and_then(|b| b.product)),
        serial_number: non_empty(serial_number),
    })
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PhysicalMemoryRow {
    bank_label: Option<String>,
    device_locator: Option<String>,
    capacity: Option<u64>,
    speed: Option<u32>,
}

pub fn query_memory_modules(shell: &dyn Shell) -> Result<Vec<MemoryModule>> {
    let rows: Vec<PhysicalMemoryRow> = powershell_json(
        shell,
        "Get-CimInstance Win32_PhysicalMemory | Select-Object BankLabel, DeviceLocator, Capacity, Speed | ConvertTo-Json",
    )?;

    Ok(rows
        .into_iter()
        .enumerate()
        .map(|(i, row)| MemoryModule {
            bank_label: non_empty(row.bank_label)
                .or(non_empty(row.device_locator))
                .unwrap_or_else(|| format!("BANK {}", i)),
            capacity_bytes: row.capacity.unwrap_or(0),
            speed_mhz: row.speed.filter(|speed| *speed > 0),
        })
        .collect())
}


#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PhysicalDiskRow {
    friendly_name: Option<String>,
    size: Option<u64>,
    media_type: Option<String>,
    bus_type: Option<String>,
}

pub fn query_physical_disks(shell: &dyn Shell) -> Result<Vec<StorageDevice>> {
    let rows: Vec<PhysicalDiskRow> = powershell_json(
        shell,
        "Get-PhysicalDisk | Select-Object FriendlyName, Size, @{n='MediaType';e={[string]$_.MediaType}}, @{n='BusType';e={[string]$_.BusType}} | ConvertTo-Json",
    )?;

    Ok(rows
        .into_iter()
        .map(|row| {
            let bus = non_empty(row.bus_type);
            let device_type = match (row.media_type.as_deref(), bus.as_deref()) {
                (_, Some("NVMe")) => DiskType::Nvme,
                (Some("SSD"), _) => DiskType::Ssd,
                (Some("HDD"), _) => DiskType::Hdd,
                _ => DiskType::Unknown,
            };
            StorageDevice {
                model: non_empty(row.friendly_name).unwrap_or_else(|| "Unknown disk".to_string()),
                device_type,
                size_bytes: row.size.unwrap_or(0),
                bus,
                mount_point: None,
            }
        })
        .collect())
}


#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct VideoControllerRow {
    name: Option<String>,
    #[serde(rename = "AdapterRAM")]
    adapter_ram: Option<u64>,
    driver_version: Option<String>,
    current_horizontal_resolution: Option<u32>,
    current_vertical_resolution: Option<u32>,
}

impl VideoControllerRow {
    fn resolution(&self) -> Option<String> {
        match (self.current_horizontal_resolution, self.current_vertical_resolution) {
            (Some(w), Some(h)) if w > 0 && h > 0 => Some(format!("{}x{}", w, h)),
            _ => None,
        }
    }

    fn into_gpu(self) -> Option<GpuInfo> {
        Some(GpuInfo {
            name: non_empty(self.name)?,
            adapter_ram_bytes: self.adapter_ram.filter(|ram| *ram > 0),
            driver_version: non_empty(self.driver_version),
        })
    }
}

fn query_video_controllers(shell: &dyn Shell) -> Result<Vec<VideoControllerRow>> {
    powershell_json(
        shell,
        "Get-CimInstance Win32_VideoController | Select-Object Name, AdapterRAM, DriverVersion, CurrentHorizontalResolution, CurrentVerticalResolution | ConvertTo-Json",
    )
}


#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TpmRow {
    pub tpm_present: Option<bool>,
    pub tpm_ready: Option<bool>,
    pub tpm_enabled: Option<bool>,
    pub tpm_activated: Option<bool>,
    pub manufacturer_id: Option<u64>,
    pub manufacturer_id_txt: Option<String>,
    pub manufacturer_version: Option<String>,
}

/// Raw `Get-Tpm` answer, shared with the TPM device test.
pub fn query_get_tpm(shell: &dyn Shell) -> Result<TpmRow> {
    let rows: Vec<TpmRow> = powershell_json(
        shell,
        "Get-Tpm | Select-Object TpmPresent, TpmReady, TpmEnabled, TpmActivated, ManufacturerId, ManufacturerIdTxt, ManufacturerVersion | ConvertTo-Json",
    )?;
    Ok(rows.into_iter().next().unwrap_or_default())
}

/// `SpecVersion` from the `Win32_Tpm` provider, e.g. `"2.0, 0, 1.59"`.
pub fn query_tpm_spec_version(shell: &dyn Shell) -> Result<Option<String>> {
    let out = shell.powershell(
        "(Get-CimInstance -Namespace root/cimv2/Security/MicrosoftTpm -ClassName Win32_Tpm).SpecVersion",
    )?;
    Ok(non_empty(Some(out)))
}

pub fn query_tpm(shell: &dyn Shell) -> Result<TpmInfo> {
    let row = query_get_tpm(shell)?;
    let spec_version = query_tpm_spec_version(shell).unwrap_or(None);

    let manufacturer = match row.manufacturer_id {
        Some(id) if id > 0 => Some(tpm_vendor_name(&id.to_string())),
        _ => non_empty(row.manufacturer_id_txt),
    };

    Ok(TpmInfo {
        present: row.tpm_present,
        ready: row.tpm_ready,
        spec_version,
        manufacturer,
        manufacturer_version: non_empty(row.manufacturer_version),
    })
}


#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PnpDeviceRow {
    pub friendly_name: Option<String>,
    pub status: Option<String>,
    pub instance_id: Option<String>,
    pub class: Option<String>,
    pub manufacturer: Option<String>,
}

impl PnpDeviceRow {
    pub fn name(&self) -> String {
        non_empty(self.friendly_name.clone()).unwrap_or_else(|| "Unknown device".to_string())
    }

    pub fn is_ok(&self) -> bool {
        self.status.as_deref().map(|s| s.eq_ignore_ascii_case("OK")).unwrap_or(false)
    }

    pub fn instance_id(&self) -> &str {
        self.instance_id.as_deref().unwrap_or("")
    }
}

/// Present PnP devices of the given classes.
pub fn query_pnp_devices(shell: &dyn Shell, classes: &[&str]) -> Result<Vec<PnpDeviceRow>> {
    let class_list = classes
        .iter()
        .map(|c| format!("'{}'", c))
        .collect::<Vec<_>>()
        .join(",");
    let script = format!(
        "Get-PnpDevice -PresentOnly -Class {} -ErrorAction SilentlyContinue | Select-Object FriendlyName, Status, InstanceId, Class, Manufacturer | ConvertTo-Json",
        class_list
    );
    powershell_json(shell, &script)
}

pub fn query_bluetooth(shell: &dyn Shell) -> Result<BluetoothInfo> {
    let service_status = shell
        .powershell("(Get-Service bthserv -ErrorAction SilentlyContinue).Status")
        .ok();

    let devices = query_pnp_devices(shell, &["Bluetooth"]).unwrap_or_default();
    let adapter = devices
        .iter()
        .find(|d| is_bluetooth_radio(d.instance_id()))
        .map(PnpDeviceRow::name);

    Ok(BluetoothInfo {
        service_status: non_empty(service_status),
        adapter,
    })
}

/// Radios sit on a hardware bus; enumerator and paired-device nodes live under `BTH*`.
pub fn is_bluetooth_radio(instance_id: &str) -> bool {
    !instance_id.is_empty() && !instance_id.to_ascii_uppercase().starts_with("BTH")
}


#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct NetAdapterRow {
    pub name: Option<String>,
    pub interface_description: Option<String>,
    pub status: Option<String>,
    pub mac_address: Option<String>,
    pub link_speed: Option<String>,
    #[serde(rename = "ifIndex")]
    pub if_index: Option<u32>,
}

pub fn query_net_adapter_rows(shell: &dyn Shell, wireless_only: bool) -> Result<Vec<NetAdapterRow>> {
    let filter = if wireless_only {
        "| Where-Object { $_.InterfaceDescription -match 'Wi-?Fi|Wireless|802\\.11' } "
    } else {
        ""
    };
    let script = format!(
        "Get-NetAdapter {}| Select-Object Name, InterfaceDescription, Status, MacAddress, LinkSpeed, ifIndex | ConvertTo-Json",
        filter
    );
    powershell_json(shell, &script)
}

fn query_net_adapters(shell: &dyn Shell, wireless_only: bool) -> Result<Vec<NetworkAdapter>> {
    Ok(query_net_adapter_rows(shell, wireless_only)?
        .into_iter()
        .map(|row| NetworkAdapter {
            name: non_empty(row.name).unwrap_or_else(|| "Unknown".to_string()),
            description: non_empty(row.interface_description),
            status: non_empty(row.status),
            mac_address: non_empty(row.mac_address),
            link_speed: non_empty(row.link_speed),
        })
        .collect())
}

/// Fields of interest from `netsh wlan show interfaces`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WlanInterface {
    pub ssid: Option<String>,
    pub signal: Option<String>,
    pub state: Option<String>,
}

/// Parses `netsh wlan show interfaces`, in English or Portuguese.
pub fn parse_netsh_interfaces(output: &str) -> WlanInterface {
    let mut wlan = WlanInterface::default();

    for line in output.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        let value = value.trim();
        if value.is_empty() {
            continue;
        }

        match key {
            "SSID" if wlan.ssid.is_none() => wlan.ssid = Some(value.to_string()),
            "Signal" | "Sinal" if wlan.signal.is_none() => wlan.signal = Some(value.to_string()),
            "State" | "Estado" if wlan.state.is_none() => wlan.state = Some(value.to_string()),
            _ => {}
        }
    }

    wlan
}

pub fn query_wlan_interface(shell: &dyn Shell) -> Result<WlanInterface> {
    let output = shell.run("netsh", &["wlan", "show", "interfaces"])?;
    Ok(parse_netsh_interfaces(&output.stdout))
}

fn query_wifi_summary(shell: &dyn Shell) -> Result<WifiInfo> {
    let adapter = query_net_adapter_rows(shell, true)?.into_iter().next();
    let Some(adapter) = adapter else {
        return Ok(WifiInfo::default());
    };
    let wlan = query_wlan_interface(shell).unwrap_or_default();

    Ok(WifiInfo {
        adapter: non_empty(adapter.interface_description),
        status: non_empty(adapter.status),
        ssid: wlan.ssid,
    })
}
