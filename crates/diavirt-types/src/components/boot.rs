// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Firmware-facing configuration: how the VM boots and which platform it
//! presents to guest software. Every VM has exactly one boot loader and
//! exactly one platform.

use serde::{Deserialize, Serialize};

/// Boots a Linux kernel directly, without firmware.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinuxBootLoader {
    /// Path to the kernel image on the host.
    pub kernel_file_path: String,

    /// Path to an initial ramdisk, if the kernel needs one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_ramdisk_path: Option<String>,

    /// The kernel command line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command_line: Option<String>,
}

/// Boots macOS through the platform's own boot ROM.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct MacOsBootLoader {}

/// The file in which UEFI firmware persists its variables between boots.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfiVariableStore {
    pub variable_store_path: String,
}

/// Boots through UEFI firmware.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EfiBootLoader {
    pub efi_variable_store: EfiVariableStore,
}

/// The VM's boot loader.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum BootLoader {
    #[serde(rename = "linuxBootLoader")]
    Linux(LinuxBootLoader),

    #[serde(rename = "macOSBootLoader")]
    MacOs(MacOsBootLoader),

    #[serde(rename = "efiBootLoader")]
    Efi(EfiBootLoader),
}

/// A platform for guests that are not macOS.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenericPlatform {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_nested_virtualization: Option<bool>,

    /// Host path of a file holding the machine identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_identifier_path: Option<String>,

    /// The machine identifier itself. Takes the place of
    /// `machine_identifier_path` when the identifier is known up front.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::base64_opt"
    )]
    pub machine_identifier_data: Option<Vec<u8>>,
}

/// The Apple silicon Mac platform.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacPlatform {
    /// Host path of the auxiliary storage (NVRAM) image.
    pub auxiliary_storage_path: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub machine_identifier_path: Option<String>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::base64_opt"
    )]
    pub machine_identifier_data: Option<Vec<u8>>,

    /// Opaque hardware model descriptor, as produced by the hypervisor when
    /// the guest was installed.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::base64_opt"
    )]
    pub hardware_model_data: Option<Vec<u8>>,
}

/// The platform presented to the guest. Determines which boot loaders and
/// graphics devices make sense for the VM.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum Platform {
    #[serde(rename = "genericPlatform")]
    Generic(GenericPlatform),

    #[serde(rename = "macPlatform")]
    Mac(MacPlatform),
}

/// Installs the newest macOS release the host supports.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct LatestSupportedRestoreImage {}

/// Installs macOS from an IPSW on the host.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FileRestoreImage {
    pub restore_image_path: String,
}

/// Where a fresh macOS guest gets installed from.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub enum MacRestoreImage {
    #[serde(rename = "latestSupportedRestoreImage")]
    LatestSupported(LatestSupportedRestoreImage),

    #[serde(rename = "fileRestoreImage")]
    File(FileRestoreImage),
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MacOsStartOptions {
    #[serde(
        default,
        rename = "startUpFromMacOSRecovery",
        skip_serializing_if = "Option::is_none"
    )]
    pub start_up_from_macos_recovery: Option<bool>,
}

/// Options applied when the VM is started rather than when it is built.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct StartOptions {
    #[serde(
        default,
        rename = "macOSStartOptions",
        skip_serializing_if = "Option::is_none"
    )]
    pub macos_start_options: Option<MacOsStartOptions>,
}
