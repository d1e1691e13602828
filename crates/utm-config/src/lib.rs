// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Support for virtual machines created by UTM with its Apple
//! Virtualization backend.
//!
//! A UTM VM is a `.utm` bundle directory holding a `config.plist` and a
//! `Data` directory with the VM's disk images and firmware stores. This
//! crate decodes the plist into [`UtmConfig`] and converts it into a
//! [`VirtualMachineConfiguration`] (see [`spec`]).

use std::path::{Path, PathBuf};

use diavirt_types::VirtualMachineConfiguration;
use serde_derive::{Deserialize, Serialize};
use thiserror::Error;

pub mod bundle;
pub mod spec;

pub use spec::{HostInfo, UtmToSpecError};

/// The name of the configuration document at the root of a bundle.
pub const CONFIG_FILE_NAME: &str = "config.plist";

/// The contents of a UTM bundle's `config.plist`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct UtmConfig {
    /// The virtualization backend the bundle was created for.
    #[serde(rename = "Backend")]
    pub backend: String,

    #[serde(rename = "ConfigurationVersion")]
    pub configuration_version: u32,

    #[serde(rename = "Display")]
    pub displays: Vec<DisplaySettings>,

    #[serde(rename = "Drive")]
    pub drives: Vec<Drive>,

    #[serde(rename = "Information")]
    pub information: Information,

    #[serde(rename = "Network")]
    pub networks: Vec<Network>,

    #[serde(rename = "Serial")]
    pub serial_ports: Vec<Serial>,

    #[serde(rename = "System")]
    pub system: System,

    #[serde(rename = "Virtualization")]
    pub virtualization: Virtualization,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplaySettings {
    #[serde(rename = "DynamicResolution")]
    pub dynamic_resolution: bool,

    #[serde(rename = "HeightPixels")]
    pub height_pixels: u32,

    #[serde(rename = "PixelsPerInch")]
    pub pixels_per_inch: u32,

    #[serde(rename = "WidthPixels")]
    pub width_pixels: u32,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Drive {
    #[serde(rename = "Identifier")]
    pub identifier: String,

    /// The image's file name within the bundle's `Data` directory. Removable
    /// drives with nothing inserted have none.
    #[serde(
        rename = "ImageName",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub image_name: Option<String>,

    #[serde(rename = "Nvme")]
    pub is_nvme: bool,

    #[serde(rename = "ReadOnly")]
    pub is_read_only: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Information {
    #[serde(rename = "Icon")]
    pub icon: String,

    #[serde(rename = "IconCustom")]
    pub is_icon_custom: bool,

    #[serde(rename = "Name")]
    pub name: String,

    #[serde(rename = "UUID")]
    pub uuid: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Network {
    #[serde(rename = "MacAddress")]
    pub mac_address: String,

    /// `Shared` or `Bridged`.
    #[serde(rename = "Mode")]
    pub mode: String,

    /// The host interface to bridge onto. Only meaningful in `Bridged` mode.
    #[serde(
        rename = "BridgeInterface",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub bridge_interface: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Serial {
    #[serde(rename = "Mode")]
    pub mode: String,

    #[serde(
        rename = "Terminal",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub terminal: Option<Terminal>,
}

/// How UTM renders a serial console. Carried along but unused here.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Terminal {
    #[serde(rename = "BackgroundColor")]
    pub background_color: String,

    #[serde(rename = "CursorBlink")]
    pub cursor_blink: bool,

    #[serde(rename = "Font")]
    pub font: String,

    #[serde(rename = "FontSize")]
    pub font_size: u32,

    #[serde(rename = "ForegroundColor")]
    pub foreground_color: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct System {
    #[serde(rename = "Architecture")]
    pub architecture: String,

    #[serde(rename = "Boot")]
    pub boot: BootSettings,

    /// The number of vCPUs. Zero means "as many as the host has".
    #[serde(rename = "CPUCount")]
    pub cpu_count: usize,

    #[serde(
        rename = "GenericPlatform",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub generic_platform: Option<GenericPlatform>,

    #[serde(
        rename = "MacPlatform",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub mac_platform: Option<MacPlatform>,

    /// Guest memory in MiB.
    #[serde(rename = "MemorySize")]
    pub memory_size: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootSettings {
    #[serde(
        rename = "EfiVariableStoragePath",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub efi_variable_storage_path: Option<String>,

    #[serde(rename = "OperatingSystem")]
    pub operating_system: String,

    #[serde(rename = "UEFIBoot")]
    pub uefi_boot: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GenericPlatform {
    // UTM writes this one key in lower camel case.
    #[serde(rename = "machineIdentifier")]
    pub machine_identifier: plist::Data,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MacPlatform {
    /// The auxiliary storage file's name within the bundle's `Data`
    /// directory.
    #[serde(rename = "AuxiliaryStoragePath")]
    pub auxiliary_storage_path: String,

    #[serde(rename = "HardwareModel")]
    pub hardware_model: plist::Data,

    #[serde(rename = "MachineIdentifier")]
    pub machine_identifier: plist::Data,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Virtualization {
    #[serde(rename = "Audio")]
    pub audio_enabled: bool,

    #[serde(rename = "Balloon")]
    pub balloon_enabled: bool,

    #[serde(rename = "ClipboardSharing")]
    pub clipboard_sharing_enabled: bool,

    #[serde(rename = "Entropy")]
    pub entropy_enabled: bool,

    /// `Generic`, `Mac` or `Disabled`.
    #[serde(rename = "Keyboard")]
    pub keyboard: String,

    /// `Mouse`, `Trackpad` or `Disabled`.
    #[serde(rename = "Pointer")]
    pub pointer: String,

    #[serde(rename = "Rosetta", default, skip_serializing_if = "Option::is_none")]
    pub rosetta_enabled: Option<bool>,
}

/// Errors which may be returned when reading a UTM configuration.
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("Cannot parse plist: {0}")]
    Plist(#[from] plist::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Parses a `config.plist` file (XML or binary) into a configuration object.
pub fn parse<P: AsRef<Path>>(path: P) -> Result<UtmConfig, ParseError> {
    let contents = std::fs::read(path.as_ref())?;
    from_bytes(&contents)
}

/// Parses an in-memory plist document into a configuration object.
pub fn from_bytes(bytes: &[u8]) -> Result<UtmConfig, ParseError> {
    let cfg = plist::from_bytes::<UtmConfig>(bytes)?;
    Ok(cfg)
}

/// Errors which may be returned when importing a UTM bundle.
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("failed to read UTM configuration {path:?}")]
    Decode {
        path: PathBuf,
        #[source]
        source: ParseError,
    },

    #[error("cannot import UTM virtual machine {path:?}")]
    Translate {
        path: PathBuf,
        #[source]
        source: UtmToSpecError,
    },
}

/// Reads the configuration of the bundle at `bundle_root` and converts it
/// into a diavirt configuration.
pub fn import_bundle(
    bundle_root: &Path,
    host: &HostInfo,
    log: &slog::Logger,
) -> Result<VirtualMachineConfiguration, ImportError> {
    let config_path = bundle_root.join(CONFIG_FILE_NAME);
    let config = parse(&config_path)
        .map_err(|source| ImportError::Decode { path: config_path, source })?;

    slog::debug!(log, "parsed UTM configuration";
        "name" => &config.information.name,
        "uuid" => &config.information.uuid,
        "backend" => &config.backend,
        "version" => config.configuration_version);

    let spec = spec::translate(&config, bundle_root, host, log).map_err(
        |source| ImportError::Translate {
            path: bundle_root.to_path_buf(),
            source,
        },
    )?;

    slog::info!(log, "imported UTM virtual machine";
        "name" => &config.information.name,
        "cpus" => spec.cpu_core_count.get(),
        "memory" => spec.memory_size_in_bytes,
        "disks" => spec.storage_devices.len(),
        "nics" => spec.network_devices.len());

    match spec.to_json_pretty() {
        Ok(json) => slog::debug!(log, "diavirt configuration"; "json" => json),
        Err(e) => {
            slog::warn!(log, "cannot render diavirt configuration";
                "error" => %e)
        }
    }

    Ok(spec)
}

#[cfg(test)]
mod test {
    use super::*;

    const LINUX_PLIST: &str = include_str!("../tests/data/linux.plist");
    const MACOS_PLIST: &str = include_str!("../tests/data/macos.plist");

    #[test]
    fn parse_generic_platform_config() {
        let cfg = from_bytes(LINUX_PLIST.as_bytes()).unwrap();

        assert_eq!(cfg.backend, "Apple");
        assert_eq!(cfg.configuration_version, 4);
        assert_eq!(cfg.information.name, "Debian");
        assert_eq!(cfg.system.architecture, "aarch64");
        assert_eq!(cfg.system.cpu_count, 0);
        assert_eq!(cfg.system.memory_size, 4096);
        assert!(cfg.system.boot.uefi_boot);
        assert_eq!(cfg.system.boot.efi_variable_storage_path, None);
        assert!(cfg.system.mac_platform.is_none());

        let generic = cfg.system.generic_platform.as_ref().unwrap();
        assert_eq!(
            Vec::from(generic.machine_identifier.clone()),
            vec![0, 1, 2, 3, 4, 5, 6, 7]
        );

        assert_eq!(cfg.displays.len(), 1);
        assert_eq!(cfg.displays[0].width_pixels, 1280);
        assert_eq!(cfg.displays[0].height_pixels, 800);

        assert_eq!(cfg.drives.len(), 2);
        assert_eq!(
            cfg.drives[0].image_name.as_deref(),
            Some("6B0F7A2E-5E8C-4D4B-9D0B-3C9A1D2E4F60.img")
        );
        assert!(cfg.drives[0].is_nvme);
        assert_eq!(cfg.drives[1].image_name, None);
        assert!(cfg.drives[1].is_read_only);

        assert_eq!(cfg.networks.len(), 2);
        assert_eq!(cfg.networks[0].mode, "Shared");
        assert_eq!(cfg.networks[1].mode, "Bridged");
        assert_eq!(cfg.networks[1].bridge_interface.as_deref(), Some("en0"));

        assert_eq!(cfg.serial_ports.len(), 2);
        assert_eq!(
            cfg.serial_ports[0].terminal.as_ref().map(|t| t.font_size),
            Some(12)
        );
        assert_eq!(cfg.serial_ports[1].terminal, None);

        assert_eq!(cfg.virtualization.keyboard, "Generic");
        assert_eq!(cfg.virtualization.pointer, "Mouse");
        assert_eq!(cfg.virtualization.rosetta_enabled, Some(false));
    }

    #[test]
    fn parse_mac_platform_config() {
        let cfg = from_bytes(MACOS_PLIST.as_bytes()).unwrap();

        assert!(cfg.system.generic_platform.is_none());
        let mac = cfg.system.mac_platform.as_ref().unwrap();
        assert_eq!(mac.auxiliary_storage_path, "AuxiliaryStorage");
        assert_eq!(Vec::from(mac.hardware_model.clone()), b"diavirt-hwm");
        assert_eq!(cfg.system.boot.operating_system, "macOS");
        assert!(!cfg.system.boot.uefi_boot);
        assert_eq!(cfg.virtualization.rosetta_enabled, None);
    }

    #[test]
    fn config_can_be_serialized_as_plist() {
        let cfg = from_bytes(LINUX_PLIST.as_bytes()).unwrap();
        let mut serialized = Vec::new();
        plist::to_writer_xml(&mut serialized, &cfg).unwrap();
        let deserialized = from_bytes(&serialized).unwrap();
        assert_eq!(cfg, deserialized);
    }

    #[test]
    fn missing_required_key_is_rejected() {
        let raw = LINUX_PLIST.replace("<key>CPUCount</key>", "<key>Cores</key>");
        assert!(matches!(
            from_bytes(raw.as_bytes()),
            Err(ParseError::Plist(_))
        ));
    }

    #[test]
    fn wrong_value_shape_is_rejected() {
        let raw = LINUX_PLIST.replace(
            "<key>MemorySize</key>\n\t\t<integer>4096</integer>",
            "<key>MemorySize</key>\n\t\t<string>4 GB</string>",
        );
        assert_ne!(raw, LINUX_PLIST);
        assert!(from_bytes(raw.as_bytes()).is_err());
    }

    #[test]
    fn negative_cpu_count_is_rejected() {
        let raw = LINUX_PLIST.replace(
            "<key>CPUCount</key>\n\t\t<integer>0</integer>",
            "<key>CPUCount</key>\n\t\t<integer>-2</integer>",
        );
        assert_ne!(raw, LINUX_PLIST);
        assert!(from_bytes(raw.as_bytes()).is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let res = parse(dir.path().join(CONFIG_FILE_NAME));
        assert!(matches!(res, Err(ParseError::Io(_))));
    }
}
