// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

use diavirt_types::*;
use utm_config::bundle::BundleLocator;
use utm_config::{
    import_bundle, HostInfo, ImportError, ParseError, UtmToSpecError,
};

const LINUX_PLIST: &str = include_str!("data/linux.plist");
const MACOS_PLIST: &str = include_str!("data/macos.plist");

fn test_log() -> slog::Logger {
    slog::Logger::root(slog::Discard, slog::o!())
}

fn host() -> HostInfo {
    HostInfo { cpu_count: NonZeroUsize::new(10).unwrap() }
}

/// Lays out a bundle named `name` under `dir` holding `config`.
fn make_bundle(dir: &Path, name: &str, config: &str) -> PathBuf {
    let bundle = dir.join(name);
    std::fs::create_dir_all(bundle.join("Data")).unwrap();
    std::fs::write(bundle.join(utm_config::CONFIG_FILE_NAME), config).unwrap();
    bundle
}

fn data_file(bundle: &Path, name: &str) -> String {
    bundle.join("Data").join(name).to_string_lossy().into_owned()
}

#[test]
fn import_generic_platform_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = make_bundle(dir.path(), "Debian.utm", LINUX_PLIST);

    let spec = import_bundle(&bundle, &host(), &test_log()).unwrap();

    // CPUCount is 0 in the fixture.
    assert_eq!(spec.cpu_core_count.get(), 10);
    assert_eq!(spec.memory_size_in_bytes, 4096 * 1024 * 1024);

    assert_eq!(
        spec.boot_loader,
        BootLoader::Efi(EfiBootLoader {
            efi_variable_store: EfiVariableStore {
                variable_store_path: data_file(&bundle, "efi_vars.fd"),
            },
        })
    );
    assert_eq!(
        spec.platform,
        Platform::Generic(GenericPlatform {
            enable_nested_virtualization: None,
            machine_identifier_path: None,
            machine_identifier_data: Some(vec![0, 1, 2, 3, 4, 5, 6, 7]),
        })
    );

    // The second drive has no image and is dropped.
    assert_eq!(
        spec.storage_devices,
        vec![StorageDevice {
            controller: StorageController::NvmeBlock(NvmeBlockDevice {}),
            attachment: Some(StorageAttachment::DiskImage(
                DiskImageAttachment {
                    image_file_path: data_file(
                        &bundle,
                        "6B0F7A2E-5E8C-4D4B-9D0B-3C9A1D2E4F60.img"
                    ),
                    is_read_only: Some(false),
                    auto_create_size_in_bytes: None,
                }
            )),
        }]
    );

    assert_eq!(spec.serial_ports.len(), 2);
    assert_eq!(
        spec.serial_ports[1].attachment,
        SerialAttachment::Wire(WireSerialAttachment {
            tag: "serial1".to_string()
        })
    );

    assert_eq!(
        spec.network_devices,
        vec![
            NetworkDevice {
                virtio_network_device: VirtioNetworkDevice {
                    mac_address: Some("5A:94:EF:E4:0C:EE".to_string()),
                },
                attachment: NetworkAttachment::Nat(NatNetworkAttachment {}),
            },
            NetworkDevice {
                virtio_network_device: VirtioNetworkDevice {
                    mac_address: Some("5A:94:EF:E4:0C:EF".to_string()),
                },
                attachment: NetworkAttachment::Bridged(
                    BridgedNetworkAttachment { interface: "en0".to_string() }
                ),
            },
        ]
    );

    assert_eq!(spec.entropy_devices.len(), 1);
    assert_eq!(spec.memory_balloon_devices.len(), 1);
    assert_eq!(
        spec.keyboard_devices,
        vec![KeyboardDevice::Usb(UsbKeyboardDevice {})]
    );
    assert_eq!(
        spec.pointing_devices,
        vec![PointingDevice::UsbScreenCoordinate(
            UsbScreenCoordinatePointingDevice {}
        )]
    );
}

#[test]
fn import_mac_platform_bundle() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = make_bundle(dir.path(), "Sonoma.utm", MACOS_PLIST);

    let spec = import_bundle(&bundle, &host(), &test_log()).unwrap();

    assert_eq!(spec.cpu_core_count.get(), 6);
    assert_eq!(spec.memory_size_in_bytes, 8589934592);
    assert_eq!(spec.boot_loader, BootLoader::MacOs(MacOsBootLoader {}));
    assert_eq!(
        spec.platform,
        Platform::Mac(MacPlatform {
            auxiliary_storage_path: data_file(&bundle, "AuxiliaryStorage"),
            machine_identifier_path: None,
            machine_identifier_data: None,
            hardware_model_data: Some(b"diavirt-hwm".to_vec()),
        })
    );
    assert_eq!(
        spec.graphics_devices,
        vec![GraphicsDevice::Mac(MacGraphicsDevice {
            displays: vec![MacGraphicsDisplay {
                width_in_pixels: 1920,
                height_in_pixels: 1200,
                pixels_per_inch: 144,
            }],
        })]
    );
    assert!(spec.serial_ports.is_empty());
    assert!(spec.entropy_devices.is_empty());
    assert!(spec.memory_balloon_devices.is_empty());
}

#[test]
fn import_by_name_through_locator() {
    let dir = tempfile::tempdir().unwrap();
    make_bundle(dir.path(), "Debian.utm", LINUX_PLIST);

    let locator = BundleLocator::new(dir.path());
    let bundle = locator.locate("Debian");
    assert_eq!(bundle, dir.path().join("Debian.utm"));

    let spec = import_bundle(&bundle, &host(), &test_log()).unwrap();
    assert_eq!(spec.storage_devices.len(), 1);
}

#[test]
fn import_is_idempotent_and_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = make_bundle(dir.path(), "Debian.utm", LINUX_PLIST);

    let first = import_bundle(&bundle, &host(), &test_log()).unwrap();
    let second = import_bundle(&bundle, &host(), &test_log()).unwrap();
    assert_eq!(first, second);

    let json = first.to_json_pretty().unwrap();
    let decoded = VirtualMachineConfiguration::from_json(&json).unwrap();
    assert_eq!(first, decoded);
}

#[test]
fn missing_config_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let err =
        import_bundle(&dir.path().join("Nope.utm"), &host(), &test_log())
            .unwrap_err();
    assert!(matches!(
        err,
        ImportError::Decode { source: ParseError::Io(_), .. }
    ));
}

#[test]
fn malformed_config_is_a_decode_error() {
    let dir = tempfile::tempdir().unwrap();
    let bundle = make_bundle(dir.path(), "Broken.utm", "<plist><dict>");
    let err = import_bundle(&bundle, &host(), &test_log()).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Decode { source: ParseError::Plist(_), .. }
    ));
}

#[test]
fn unsupported_network_mode_fails_the_import() {
    let dir = tempfile::tempdir().unwrap();
    let config = LINUX_PLIST.replace(
        "<string>Shared</string>",
        "<string>Flerp</string>",
    );
    let bundle = make_bundle(dir.path(), "Flerp.utm", &config);

    let err = import_bundle(&bundle, &host(), &test_log()).unwrap_err();
    match err {
        ImportError::Translate {
            path,
            source: UtmToSpecError::UnsupportedNetworkMode { index, mode },
        } => {
            assert_eq!(path, bundle);
            assert_eq!(index, 0);
            assert_eq!(mode, "Flerp");
        }
        other => panic!("unexpected error {other:?}"),
    }
}

#[test]
fn legacy_boot_fails_the_import() {
    let dir = tempfile::tempdir().unwrap();
    let config = LINUX_PLIST.replace(
        "<key>UEFIBoot</key>\n\t\t\t<true/>",
        "<key>UEFIBoot</key>\n\t\t\t<false/>",
    );
    assert_ne!(config, LINUX_PLIST);
    let bundle = make_bundle(dir.path(), "Legacy.utm", &config);

    let err = import_bundle(&bundle, &host(), &test_log()).unwrap_err();
    assert!(matches!(
        err,
        ImportError::Translate {
            source: UtmToSpecError::LinuxBootUnsupported,
            ..
        }
    ));
}
