// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Functions for converting a [`super::UtmConfig`] into a diavirt
//! [`VirtualMachineConfiguration`].

use std::num::NonZeroUsize;
use std::path::Path;

use diavirt_types::{
    BootLoader, BridgedNetworkAttachment, DiskImageAttachment, EfiBootLoader,
    EfiVariableStore, EntropyDevice, GenericPlatform, GraphicsDevice,
    KeyboardDevice, MacGraphicsDevice, MacGraphicsDisplay, MacKeyboardDevice,
    MacOsBootLoader, MacPlatform, MacTrackpadDevice, MemoryBalloonDevice,
    NatNetworkAttachment, NetworkAttachment, NetworkDevice, NvmeBlockDevice,
    Platform, PointingDevice, SerialAttachment, SerialPort,
    StdioSerialAttachment, StorageAttachment, StorageController,
    StorageDevice, UsbKeyboardDevice, UsbScreenCoordinatePointingDevice,
    VirtioBlockDevice, VirtioConsoleDevice, VirtioEntropyDevice,
    VirtioGraphicsDevice, VirtioGraphicsScanout, VirtioNetworkDevice,
    VirtioTraditionalMemoryBalloonDevice, VirtualMachineConfiguration,
    WireSerialAttachment,
};
use thiserror::Error;

use crate::bundle::data_path;

/// The EFI variable store UTM uses when the configuration does not name one.
pub const DEFAULT_EFI_VARIABLE_STORE: &str = "efi_vars.fd";

const MIB: u64 = 1024 * 1024;

#[derive(Debug, Error)]
pub enum UtmToSpecError {
    #[error("booting a generic platform without UEFI is not supported")]
    LinuxBootUnsupported,

    #[error("configuration has neither a generic nor a Mac platform")]
    UnknownPlatform,

    #[error("keyboard backend {0:?} is not supported")]
    UnsupportedKeyboard(String),

    #[error("pointing device backend {0:?} is not supported")]
    UnsupportedPointer(String),

    #[error("network {index} has unsupported mode {mode:?}")]
    UnsupportedNetworkMode { index: usize, mode: String },

    #[error("network {index} is bridged but names no host interface")]
    MissingBridgeInterface { index: usize },

    #[error("memory size of {0} MiB does not fit in 64 bits of bytes")]
    MemorySizeOverflow(u64),
}

/// Facts about the host that a conversion may depend on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HostInfo {
    /// The number of processors available to this process.
    pub cpu_count: NonZeroUsize,
}

impl HostInfo {
    pub fn detect() -> Self {
        let cpu_count = std::thread::available_parallelism()
            .unwrap_or(NonZeroUsize::MIN);
        Self { cpu_count }
    }
}

/// Converts `config`, read from the bundle at `bundle_root`, into a diavirt
/// configuration. Resource names in `config` are resolved against the
/// bundle's `Data` directory.
pub fn translate(
    config: &super::UtmConfig,
    bundle_root: &Path,
    host: &HostInfo,
    log: &slog::Logger,
) -> Result<VirtualMachineConfiguration, UtmToSpecError> {
    let ParsedPlatform { platform, boot_loader, graphics } =
        parse_platform_from_config(config, bundle_root)?;

    let storage_devices = config
        .drives
        .iter()
        .filter_map(|drive| {
            let device =
                parse_storage_device_from_config(drive, bundle_root);
            if device.is_none() {
                slog::debug!(log, "skipping drive with no image";
                    "identifier" => &drive.identifier);
            }
            device
        })
        .collect();

    let serial_ports =
        (0..config.serial_ports.len()).map(serial_port_for_index).collect();

    let virt = &config.virtualization;
    let mut entropy_devices = Vec::new();
    if virt.entropy_enabled {
        entropy_devices.push(EntropyDevice::Virtio(VirtioEntropyDevice {}));
    }

    let mut memory_balloon_devices = Vec::new();
    if virt.balloon_enabled {
        memory_balloon_devices.push(MemoryBalloonDevice::VirtioTraditional(
            VirtioTraditionalMemoryBalloonDevice {},
        ));
    }

    let keyboard_devices =
        parse_keyboard_from_config(&virt.keyboard)?.into_iter().collect();
    let pointing_devices =
        parse_pointer_from_config(&virt.pointer)?.into_iter().collect();

    let network_devices = config
        .networks
        .iter()
        .enumerate()
        .map(|(index, net)| parse_network_device_from_config(index, net))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(VirtualMachineConfiguration {
        cpu_core_count: cpu_core_count(config.system.cpu_count, host),
        memory_size_in_bytes: memory_size_in_bytes(config.system.memory_size)?,
        boot_loader,
        platform,
        storage_devices,
        serial_ports,
        entropy_devices,
        memory_balloon_devices,
        network_devices,
        graphics_devices: vec![graphics],
        directory_sharing_devices: Vec::new(),
        socket_devices: Vec::new(),
        keyboard_devices,
        pointing_devices,
        mac_restore_image: None,
        start_options: None,
    })
}

/// UTM stores a CPU count of zero to mean "use every host CPU".
fn cpu_core_count(configured: usize, host: &HostInfo) -> NonZeroUsize {
    NonZeroUsize::new(configured).unwrap_or(host.cpu_count)
}

fn memory_size_in_bytes(mib: u64) -> Result<u64, UtmToSpecError> {
    mib.checked_mul(MIB).ok_or(UtmToSpecError::MemorySizeOverflow(mib))
}

fn resolve(bundle_root: &Path, name: &str) -> String {
    data_path(bundle_root, name).to_string_lossy().into_owned()
}

struct ParsedPlatform {
    platform: Platform,
    boot_loader: BootLoader,
    graphics: GraphicsDevice,
}

/// Picks the platform, the boot loader and the graphics device together:
/// the platform decides which of the others are usable.
fn parse_platform_from_config(
    config: &super::UtmConfig,
    bundle_root: &Path,
) -> Result<ParsedPlatform, UtmToSpecError> {
    let system = &config.system;

    if let Some(generic) = &system.generic_platform {
        if !system.boot.uefi_boot {
            return Err(UtmToSpecError::LinuxBootUnsupported);
        }

        let store_name = system
            .boot
            .efi_variable_storage_path
            .as_deref()
            .filter(|name| !name.is_empty())
            .unwrap_or(DEFAULT_EFI_VARIABLE_STORE);

        let scanouts = config
            .displays
            .iter()
            .map(|display| VirtioGraphicsScanout {
                width_in_pixels: display.width_pixels,
                height_in_pixels: display.height_pixels,
            })
            .collect();

        return Ok(ParsedPlatform {
            platform: Platform::Generic(GenericPlatform {
                enable_nested_virtualization: None,
                machine_identifier_path: None,
                machine_identifier_data: Some(
                    generic.machine_identifier.clone().into(),
                ),
            }),
            boot_loader: BootLoader::Efi(EfiBootLoader {
                efi_variable_store: EfiVariableStore {
                    variable_store_path: resolve(bundle_root, store_name),
                },
            }),
            graphics: GraphicsDevice::Virtio(VirtioGraphicsDevice {
                scanouts,
            }),
        });
    }

    if let Some(mac) = &system.mac_platform {
        let displays = config
            .displays
            .iter()
            .map(|display| MacGraphicsDisplay {
                width_in_pixels: display.width_pixels,
                height_in_pixels: display.height_pixels,
                pixels_per_inch: display.pixels_per_inch,
            })
            .collect();

        return Ok(ParsedPlatform {
            platform: Platform::Mac(MacPlatform {
                auxiliary_storage_path: resolve(
                    bundle_root,
                    &mac.auxiliary_storage_path,
                ),
                machine_identifier_path: None,
                machine_identifier_data: None,
                hardware_model_data: Some(mac.hardware_model.clone().into()),
            }),
            boot_loader: BootLoader::MacOs(MacOsBootLoader {}),
            graphics: GraphicsDevice::Mac(MacGraphicsDevice { displays }),
        });
    }

    Err(UtmToSpecError::UnknownPlatform)
}

/// Returns `None` for drives that have no image to attach.
fn parse_storage_device_from_config(
    drive: &super::Drive,
    bundle_root: &Path,
) -> Option<StorageDevice> {
    let image_name = drive.image_name.as_deref()?;

    let controller = if drive.is_nvme {
        StorageController::NvmeBlock(NvmeBlockDevice {})
    } else {
        StorageController::VirtioBlock(VirtioBlockDevice {
            block_device_identifier: None,
        })
    };

    Some(StorageDevice {
        controller,
        attachment: Some(StorageAttachment::DiskImage(DiskImageAttachment {
            image_file_path: resolve(bundle_root, image_name),
            is_read_only: Some(drive.is_read_only),
            auto_create_size_in_bytes: None,
        })),
    })
}

/// The first serial port is wired to stdio; the rest are exposed under
/// `serialN` tags.
fn serial_port_for_index(index: usize) -> SerialPort {
    let attachment = if index == 0 {
        SerialAttachment::Stdio(StdioSerialAttachment {})
    } else {
        SerialAttachment::Wire(WireSerialAttachment {
            tag: format!("serial{index}"),
        })
    };

    SerialPort { attachment, virtio_console_device: VirtioConsoleDevice {} }
}

fn parse_keyboard_from_config(
    backend: &str,
) -> Result<Option<KeyboardDevice>, UtmToSpecError> {
    match backend {
        "Generic" => Ok(Some(KeyboardDevice::Usb(UsbKeyboardDevice {}))),
        "Mac" => Ok(Some(KeyboardDevice::Mac(MacKeyboardDevice {}))),
        "Disabled" => Ok(None),
        _ => Err(UtmToSpecError::UnsupportedKeyboard(backend.to_owned())),
    }
}

fn parse_pointer_from_config(
    backend: &str,
) -> Result<Option<PointingDevice>, UtmToSpecError> {
    match backend {
        "Mouse" => Ok(Some(PointingDevice::UsbScreenCoordinate(
            UsbScreenCoordinatePointingDevice {},
        ))),
        "Trackpad" => {
            Ok(Some(PointingDevice::MacTrackpad(MacTrackpadDevice {})))
        }
        "Disabled" => Ok(None),
        _ => Err(UtmToSpecError::UnsupportedPointer(backend.to_owned())),
    }
}

fn parse_network_device_from_config(
    index: usize,
    net: &super::Network,
) -> Result<NetworkDevice, UtmToSpecError> {
    let attachment = match net.mode.as_str() {
        "Shared" => NetworkAttachment::Nat(NatNetworkAttachment {}),
        "Bridged" => {
            let interface = net
                .bridge_interface
                .clone()
                .ok_or(UtmToSpecError::MissingBridgeInterface { index })?;
            NetworkAttachment::Bridged(BridgedNetworkAttachment { interface })
        }
        _ => {
            return Err(UtmToSpecError::UnsupportedNetworkMode {
                index,
                mode: net.mode.clone(),
            })
        }
    };

    Ok(NetworkDevice {
        virtio_network_device: VirtioNetworkDevice {
            mac_address: Some(net.mac_address.clone()),
        },
        attachment,
    })
}
