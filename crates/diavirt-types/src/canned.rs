// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! A ready-made macOS VM, used when the caller has no configuration of its
//! own.

use std::num::NonZeroUsize;
use std::path::Path;

use crate::*;

const GIB: u64 = 1024 * 1024 * 1024;
const CPUS: NonZeroUsize = match NonZeroUsize::new(4) {
    Some(n) => n,
    None => unreachable!(),
};

/// Returns the stock macOS configuration, sharing the current user's home
/// directory with the guest.
pub fn canned_mac() -> VirtualMachineConfiguration {
    canned_mac_with_home(dirs::home_dir().as_deref())
}

/// Returns the stock macOS configuration. If `home` is `None`, the home
/// directory share is left out.
pub fn canned_mac_with_home(home: Option<&Path>) -> VirtualMachineConfiguration {
    let directory_sharing_devices = home
        .map(|home| DirectorySharingDevice {
            virtio_file_system_device: Some(VirtioFileSystemDevice {
                tag: "MacHome".to_string(),
            }),
            directory_share: DirectoryShare::Single(SingleDirectoryShare {
                directory: SharedDirectory {
                    path: home.to_string_lossy().into_owned(),
                    is_read_only: Some(true),
                },
            }),
        })
        .into_iter()
        .collect();

    VirtualMachineConfiguration {
        cpu_core_count: CPUS,
        memory_size_in_bytes: 6 * GIB,
        boot_loader: BootLoader::MacOs(MacOsBootLoader {}),
        platform: Platform::Mac(MacPlatform {
            auxiliary_storage_path: "macaux.bin".to_string(),
            machine_identifier_path: Some("macid.bin".to_string()),
            machine_identifier_data: None,
            hardware_model_data: None,
        }),
        storage_devices: vec![StorageDevice {
            controller: StorageController::VirtioBlock(VirtioBlockDevice {
                block_device_identifier: Some(String::new()),
            }),
            attachment: Some(StorageAttachment::DiskImage(
                DiskImageAttachment {
                    image_file_path: "root.img".to_string(),
                    is_read_only: Some(false),
                    auto_create_size_in_bytes: Some(128 * GIB),
                },
            )),
        }],
        serial_ports: vec![],
        entropy_devices: vec![],
        memory_balloon_devices: vec![MemoryBalloonDevice::VirtioTraditional(
            VirtioTraditionalMemoryBalloonDevice {},
        )],
        network_devices: vec![NetworkDevice {
            virtio_network_device: VirtioNetworkDevice { mac_address: None },
            attachment: NetworkAttachment::Nat(NatNetworkAttachment {}),
        }],
        graphics_devices: vec![GraphicsDevice::Mac(MacGraphicsDevice {
            displays: vec![MacGraphicsDisplay {
                width_in_pixels: 1920,
                height_in_pixels: 1080,
                pixels_per_inch: 80,
            }],
        })],
        directory_sharing_devices,
        socket_devices: vec![],
        keyboard_devices: vec![KeyboardDevice::Usb(UsbKeyboardDevice {})],
        pointing_devices: vec![PointingDevice::UsbScreenCoordinate(
            UsbScreenCoordinatePointingDevice {},
        )],
        mac_restore_image: Some(MacRestoreImage::LatestSupported(
            LatestSupportedRestoreImage {},
        )),
        start_options: Some(StartOptions::default()),
    }
}
