// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Locating UTM bundles and the resources inside them.

use std::path::{Path, PathBuf};

use thiserror::Error;

/// The directory, relative to a bundle root, that holds disk images,
/// auxiliary storage and EFI variable stores.
pub const DATA_DIR: &str = "Data";

/// The file extension of a UTM bundle directory.
pub const BUNDLE_EXTENSION: &str = "utm";

/// Where sandboxed UTM keeps its VMs, relative to the user's home directory.
const UTM_DOCUMENTS: &str = "Library/Containers/com.utmapp.UTM/Data/Documents";

/// Returns the path of the resource `name` inside the bundle at
/// `bundle_root`. The resource does not need to exist.
pub fn data_path(bundle_root: &Path, name: &str) -> PathBuf {
    bundle_root.join(DATA_DIR).join(name)
}

#[derive(Debug, Error)]
pub enum LocateError {
    #[error("cannot determine the current user's home directory")]
    NoHomeDirectory,
}

/// Resolves the names users give for VMs to bundle paths.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BundleLocator {
    documents: PathBuf,
}

impl BundleLocator {
    /// A locator that looks up bare VM names in `documents`.
    pub fn new<P: Into<PathBuf>>(documents: P) -> Self {
        Self { documents: documents.into() }
    }

    /// A locator for UTM's documents directory under `home`.
    pub fn for_home(home: &Path) -> Self {
        Self::new(home.join(UTM_DOCUMENTS))
    }

    /// A locator for the current user's UTM documents directory.
    pub fn from_env() -> Result<Self, LocateError> {
        let home = dirs::home_dir().ok_or(LocateError::NoHomeDirectory)?;
        Ok(Self::for_home(&home))
    }

    /// The directory bare VM names are looked up in.
    pub fn documents(&self) -> &Path {
        &self.documents
    }

    /// Maps `vm` to a bundle root. Anything that looks like a path (it
    /// contains a `/` or ends in `.utm`) is used as given; anything else is
    /// taken to be the name of a VM in the documents directory.
    pub fn locate(&self, vm: &str) -> PathBuf {
        let suffix = format!(".{BUNDLE_EXTENSION}");
        if vm.contains('/') || vm.ends_with(&suffix) {
            return PathBuf::from(vm);
        }

        self.documents.join(format!("{vm}{suffix}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn data_path_appends_data_dir() {
        assert_eq!(
            data_path(Path::new("/vms/Debian.utm"), "efi_vars.fd"),
            PathBuf::from("/vms/Debian.utm/Data/efi_vars.fd")
        );
        assert_eq!(
            data_path(Path::new("relative.utm"), "disk.img"),
            PathBuf::from("relative.utm/Data/disk.img")
        );
    }

    #[test]
    fn locate_bare_name_in_documents() {
        let locator = BundleLocator::for_home(Path::new("/Users/alice"));
        assert_eq!(
            locator.locate("Debian"),
            PathBuf::from(
                "/Users/alice/Library/Containers/com.utmapp.UTM/Data/Documents/Debian.utm"
            )
        );
    }

    #[test]
    fn documents_for_home() {
        let locator = BundleLocator::for_home(Path::new("/Users/alice"));
        assert_eq!(
            locator.documents(),
            Path::new(
                "/Users/alice/Library/Containers/com.utmapp.UTM/Data/Documents"
            )
        );
        assert_eq!(
            BundleLocator::new("/srv/vms").documents(),
            Path::new("/srv/vms")
        );
    }

    #[test]
    fn locate_paths_verbatim() {
        let locator = BundleLocator::new("/unused");
        assert_eq!(
            locator.locate("./vms/Debian"),
            PathBuf::from("./vms/Debian")
        );
        assert_eq!(locator.locate("Debian.utm"), PathBuf::from("Debian.utm"));
        assert_eq!(
            locator.locate("/Volumes/External/Sonoma.utm"),
            PathBuf::from("/Volumes/External/Sonoma.utm")
        );
    }

    #[test]
    fn locate_does_not_treat_infix_extension_as_path() {
        let locator = BundleLocator::new("/docs");
        assert_eq!(
            locator.locate("my.utm.backup"),
            PathBuf::from("/docs/my.utm.backup.utm")
        );
    }
}
