// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The diavirt virtual machine configuration: the document a launcher
//! consumes to build and boot a VM.
//!
//! Every choice between mutually exclusive options (boot loader, platform,
//! device front ends and their attachments) is an enum, so a configuration
//! that selects zero or several of them cannot be built. On the wire each
//! choice is expressed by which key is present, and decoding enforces the
//! same rule.

use std::io;
use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod canned;
pub mod components;

pub use components::boot::*;
pub use components::devices::*;

/// A complete description of a virtual machine.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineConfiguration {
    /// The number of virtual CPUs attached to this VM.
    pub cpu_core_count: NonZeroUsize,

    /// The amount of guest RAM attached to this VM.
    pub memory_size_in_bytes: u64,

    pub boot_loader: BootLoader,
    pub platform: Platform,

    #[serde(default)]
    pub storage_devices: Vec<StorageDevice>,
    #[serde(default)]
    pub serial_ports: Vec<SerialPort>,
    #[serde(default)]
    pub entropy_devices: Vec<EntropyDevice>,
    #[serde(default)]
    pub memory_balloon_devices: Vec<MemoryBalloonDevice>,
    #[serde(default)]
    pub network_devices: Vec<NetworkDevice>,
    #[serde(default)]
    pub graphics_devices: Vec<GraphicsDevice>,
    #[serde(default)]
    pub directory_sharing_devices: Vec<DirectorySharingDevice>,
    #[serde(default)]
    pub socket_devices: Vec<SocketDevice>,
    #[serde(default)]
    pub keyboard_devices: Vec<KeyboardDevice>,
    #[serde(default)]
    pub pointing_devices: Vec<PointingDevice>,

    /// The image to install macOS from. Only meaningful for a Mac platform
    /// whose disk has not been installed yet.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mac_restore_image: Option<MacRestoreImage>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_options: Option<StartOptions>,
}

impl VirtualMachineConfiguration {
    /// Encodes this configuration as pretty-printed JSON.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Writes this configuration to `writer` as pretty-printed JSON,
    /// followed by a newline.
    pub fn write_json_pretty<W: io::Write>(
        &self,
        mut writer: W,
    ) -> io::Result<()> {
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.write_all(b"\n")
    }

    /// Decodes a configuration previously produced by
    /// [`Self::to_json_pretty`] (or written by hand).
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Errors raised when a serialized record does not select exactly the
/// options it is required to.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum VariantError {
    #[error("{record} requires one of {expected:?}, but none was present")]
    Missing { record: &'static str, expected: Vec<&'static str> },

    #[error("{record} allows only one of {found:?}")]
    Conflicting { record: &'static str, found: Vec<&'static str> },
}

/// Picks the single populated candidate, if any. More than one populated
/// candidate is an error.
pub(crate) fn at_most_one<T, const N: usize>(
    record: &'static str,
    candidates: [(&'static str, Option<T>); N],
) -> Result<Option<T>, VariantError> {
    let mut found = Vec::new();
    let mut selected = None;
    for (key, value) in candidates {
        if let Some(value) = value {
            found.push(key);
            selected = Some(value);
        }
    }

    if found.len() > 1 {
        return Err(VariantError::Conflicting { record, found });
    }

    Ok(selected)
}

/// Like [`at_most_one`], but a candidate must be populated.
pub(crate) fn exactly_one<T, const N: usize>(
    record: &'static str,
    candidates: [(&'static str, Option<T>); N],
) -> Result<T, VariantError> {
    let expected: Vec<&'static str> =
        candidates.iter().map(|(key, _)| *key).collect();
    at_most_one(record, candidates)?
        .ok_or(VariantError::Missing { record, expected })
}

/// (De)serializes optional binary data as a base64 string.
pub(crate) mod base64_opt {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(
        data: &Option<Vec<u8>>,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match data {
            Some(bytes) => serializer.serialize_some(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(
        deserializer: D,
    ) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(de::Error::custom))
            .transpose()
    }
}
