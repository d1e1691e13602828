// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Device configuration data: components that define VM properties that are
//! visible to a VM's guest software.
//!
//! Devices that pair a guest-visible front end with a host-side attachment
//! are serialized as one flat object holding both keys. Those records go
//! through a private `*Repr` type with one optional field per key, so that
//! decoding can insist on exactly one key from each exclusive group.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{at_most_one, exactly_one, VariantError};

//
// Storage
//

/// A block device that presents a virtio-block interface to the guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtioBlockDevice {
    /// The identifier the guest sees for this disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub block_device_identifier: Option<String>,
}

/// A block device that presents an NVMe interface to the guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NvmeBlockDevice {}

/// A block device that presents a USB mass storage interface to the guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsbMassStorageDevice {}

/// The interface through which the guest reaches a storage device.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageController {
    VirtioBlock(VirtioBlockDevice),
    NvmeBlock(NvmeBlockDevice),
    UsbMassStorage(UsbMassStorageDevice),
}

/// A storage backend backed by a disk image in the host's file system.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiskImageAttachment {
    /// A path to the image file that backs the disk.
    pub image_file_path: String,

    /// Indicates whether the storage is read-only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,

    /// If set and the image does not exist, the launcher creates a sparse
    /// image of this size before attaching it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_size_in_bytes: Option<u64>,
}

/// A storage backend served by a remote NBD server.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkBlockDeviceAttachment {
    pub network_block_device_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_forced_read_only: Option<bool>,
}

/// What backs a storage device on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StorageAttachment {
    DiskImage(DiskImageAttachment),
    NetworkBlockDevice(NetworkBlockDeviceAttachment),
}

/// A storage device: a controller plus, optionally, its backing store.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "StorageDeviceRepr", into = "StorageDeviceRepr")]
pub struct StorageDevice {
    pub controller: StorageController,
    pub attachment: Option<StorageAttachment>,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct StorageDeviceRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtio_block_device: Option<VirtioBlockDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nvme_block_device: Option<NvmeBlockDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    usb_mass_storage_device: Option<UsbMassStorageDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    disk_image_attachment: Option<DiskImageAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    network_block_device_attachment: Option<NetworkBlockDeviceAttachment>,
}

impl TryFrom<StorageDeviceRepr> for StorageDevice {
    type Error = VariantError;

    fn try_from(repr: StorageDeviceRepr) -> Result<Self, Self::Error> {
        let controller = exactly_one(
            "storage device",
            [
                (
                    "virtioBlockDevice",
                    repr.virtio_block_device
                        .map(StorageController::VirtioBlock),
                ),
                (
                    "nvmeBlockDevice",
                    repr.nvme_block_device.map(StorageController::NvmeBlock),
                ),
                (
                    "usbMassStorageDevice",
                    repr.usb_mass_storage_device
                        .map(StorageController::UsbMassStorage),
                ),
            ],
        )?;

        let attachment = at_most_one(
            "storage device",
            [
                (
                    "diskImageAttachment",
                    repr.disk_image_attachment
                        .map(StorageAttachment::DiskImage),
                ),
                (
                    "networkBlockDeviceAttachment",
                    repr.network_block_device_attachment
                        .map(StorageAttachment::NetworkBlockDevice),
                ),
            ],
        )?;

        Ok(Self { controller, attachment })
    }
}

impl From<StorageDevice> for StorageDeviceRepr {
    fn from(device: StorageDevice) -> Self {
        let mut repr = StorageDeviceRepr {
            virtio_block_device: None,
            nvme_block_device: None,
            usb_mass_storage_device: None,
            disk_image_attachment: None,
            network_block_device_attachment: None,
        };

        match device.controller {
            StorageController::VirtioBlock(dev) => {
                repr.virtio_block_device = Some(dev)
            }
            StorageController::NvmeBlock(dev) => {
                repr.nvme_block_device = Some(dev)
            }
            StorageController::UsbMassStorage(dev) => {
                repr.usb_mass_storage_device = Some(dev)
            }
        }

        match device.attachment {
            Some(StorageAttachment::DiskImage(att)) => {
                repr.disk_image_attachment = Some(att)
            }
            Some(StorageAttachment::NetworkBlockDevice(att)) => {
                repr.network_block_device_attachment = Some(att)
            }
            None => {}
        }

        repr
    }
}

//
// Serial ports
//

/// Connects a serial port to this process's standard input and output.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StdioSerialAttachment {}

/// Connects a serial port to a named endpoint that the launcher exposes
/// to other host processes.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct WireSerialAttachment {
    pub tag: String,
}

/// A virtio console device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioConsoleDevice {}

/// Where a serial port's bytes go on the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SerialAttachment {
    Stdio(StdioSerialAttachment),
    Wire(WireSerialAttachment),
}

/// A serial port device.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "SerialPortRepr", into = "SerialPortRepr")]
pub struct SerialPort {
    pub attachment: SerialAttachment,
    pub virtio_console_device: VirtioConsoleDevice,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct SerialPortRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    stdio_serial_attachment: Option<StdioSerialAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    wire_serial_attachment: Option<WireSerialAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtio_console_device: Option<VirtioConsoleDevice>,
}

impl TryFrom<SerialPortRepr> for SerialPort {
    type Error = VariantError;

    fn try_from(repr: SerialPortRepr) -> Result<Self, Self::Error> {
        let attachment = exactly_one(
            "serial port",
            [
                (
                    "stdioSerialAttachment",
                    repr.stdio_serial_attachment.map(SerialAttachment::Stdio),
                ),
                (
                    "wireSerialAttachment",
                    repr.wire_serial_attachment.map(SerialAttachment::Wire),
                ),
            ],
        )?;

        let virtio_console_device = exactly_one(
            "serial port",
            [("virtioConsoleDevice", repr.virtio_console_device)],
        )?;

        Ok(Self { attachment, virtio_console_device })
    }
}

impl From<SerialPort> for SerialPortRepr {
    fn from(port: SerialPort) -> Self {
        let (stdio_serial_attachment, wire_serial_attachment) =
            match port.attachment {
                SerialAttachment::Stdio(att) => (Some(att), None),
                SerialAttachment::Wire(att) => (None, Some(att)),
            };

        SerialPortRepr {
            stdio_serial_attachment,
            wire_serial_attachment,
            virtio_console_device: Some(port.virtio_console_device),
        }
    }
}

//
// Single-variant device lists
//

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioEntropyDevice {}

/// A source of host entropy for the guest.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum EntropyDevice {
    #[serde(rename = "virtioEntropyDevice")]
    Virtio(VirtioEntropyDevice),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioTraditionalMemoryBalloonDevice {}

/// A device through which the host can reclaim guest memory.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum MemoryBalloonDevice {
    #[serde(rename = "virtioTraditionalMemoryBalloonDevice")]
    VirtioTraditional(VirtioTraditionalMemoryBalloonDevice),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioSocketDevice {}

/// A vsock device.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum SocketDevice {
    #[serde(rename = "virtioSocketDevice")]
    Virtio(VirtioSocketDevice),
}

//
// Networking
//

/// A network card that presents a virtio-net interface to the guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtioNetworkDevice {
    /// The card's MAC address. If unset, the launcher picks a random
    /// locally administered address.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_address: Option<String>,
}

/// Shares the host's connectivity with the guest through NAT.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct NatNetworkAttachment {}

/// Bridges the guest onto a physical host interface.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct BridgedNetworkAttachment {
    /// The BSD name of the host interface, e.g. `en0`.
    pub interface: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NetworkAttachment {
    Nat(NatNetworkAttachment),
    Bridged(BridgedNetworkAttachment),
}

/// A network device.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "NetworkDeviceRepr", into = "NetworkDeviceRepr")]
pub struct NetworkDevice {
    pub virtio_network_device: VirtioNetworkDevice,
    pub attachment: NetworkAttachment,
}

#[derive(Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
struct NetworkDeviceRepr {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    virtio_network_device: Option<VirtioNetworkDevice>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nat_network_attachment: Option<NatNetworkAttachment>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bridged_network_attachment: Option<BridgedNetworkAttachment>,
}

impl TryFrom<NetworkDeviceRepr> for NetworkDevice {
    type Error = VariantError;

    fn try_from(repr: NetworkDeviceRepr) -> Result<Self, Self::Error> {
        let virtio_network_device = exactly_one(
            "network device",
            [("virtioNetworkDevice", repr.virtio_network_device)],
        )?;

        let attachment = exactly_one(
            "network device",
            [
                (
                    "natNetworkAttachment",
                    repr.nat_network_attachment.map(NetworkAttachment::Nat),
                ),
                (
                    "bridgedNetworkAttachment",
                    repr.bridged_network_attachment
                        .map(NetworkAttachment::Bridged),
                ),
            ],
        )?;

        Ok(Self { virtio_network_device, attachment })
    }
}

impl From<NetworkDevice> for NetworkDeviceRepr {
    fn from(device: NetworkDevice) -> Self {
        let (nat_network_attachment, bridged_network_attachment) =
            match device.attachment {
                NetworkAttachment::Nat(att) => (Some(att), None),
                NetworkAttachment::Bridged(att) => (None, Some(att)),
            };

        NetworkDeviceRepr {
            virtio_network_device: Some(device.virtio_network_device),
            nat_network_attachment,
            bridged_network_attachment,
        }
    }
}

//
// Graphics
//

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacGraphicsDisplay {
    pub width_in_pixels: u32,
    pub height_in_pixels: u32,
    pub pixels_per_inch: u32,
}

/// The Apple paravirtualized GPU. Only usable on the Mac platform.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MacGraphicsDevice {
    pub displays: Vec<MacGraphicsDisplay>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtioGraphicsScanout {
    pub width_in_pixels: u32,
    pub height_in_pixels: u32,
}

/// A virtio-gpu device.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioGraphicsDevice {
    pub scanouts: Vec<VirtioGraphicsScanout>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum GraphicsDevice {
    #[serde(rename = "macGraphicsDevice")]
    Mac(MacGraphicsDevice),

    #[serde(rename = "virtioGraphicsDevice")]
    Virtio(VirtioGraphicsDevice),
}

//
// Directory sharing
//

/// A virtio-fs device. The tag is the name the guest mounts it by.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct VirtioFileSystemDevice {
    pub tag: String,
}

/// A host directory exposed to the guest.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SharedDirectory {
    pub path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_read_only: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct SingleDirectoryShare {
    pub directory: SharedDirectory,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MultipleDirectoryShare {
    /// Shared directories keyed by the name they appear under in the guest.
    pub directories: BTreeMap<String, SharedDirectory>,
}

/// Exposes the Rosetta translation runtime to a Linux guest.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct RosettaDirectoryShare {}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum DirectoryShare {
    #[serde(rename = "singleDirectoryShare")]
    Single(SingleDirectoryShare),

    #[serde(rename = "multipleDirectoryShare")]
    Multiple(MultipleDirectoryShare),

    #[serde(rename = "rosettaDirectoryShare")]
    Rosetta(RosettaDirectoryShare),
}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectorySharingDevice {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub virtio_file_system_device: Option<VirtioFileSystemDevice>,

    pub directory_share: DirectoryShare,
}

//
// Input
//

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsbKeyboardDevice {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MacKeyboardDevice {}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum KeyboardDevice {
    #[serde(rename = "usbKeyboardDevice")]
    Usb(UsbKeyboardDevice),

    #[serde(rename = "macKeyboardDevice")]
    Mac(MacKeyboardDevice),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct UsbScreenCoordinatePointingDevice {}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MacTrackpadDevice {}

#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum PointingDevice {
    #[serde(rename = "usbScreenCoordinatePointingDevice")]
    UsbScreenCoordinate(UsbScreenCoordinatePointingDevice),

    #[serde(rename = "macTrackpadDevice")]
    MacTrackpad(MacTrackpadDevice),
}
