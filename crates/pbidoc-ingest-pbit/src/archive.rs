//! Archive lifecycle: `.pbit` package ⇄ `.zip` container.
//!
//! A report template is a ZIP archive with a different extension. The package
//! is renamed into container form for the duration of a run and renamed back
//! afterwards. [`ArchiveLease`] ties the restore to scope: an explicit
//! [`ArchiveLease::restore`] reports failures, and dropping an unrestored
//! lease still attempts it.
//!
//! Every rename failure is fatal to the run.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};

use zip::result::ZipError;
use zip::ZipArchive;

use crate::error::IngestError;
use crate::paths::{first_free_path, CONTAINER_INFIX};

/// Visual layout document inside the package.
pub const LAYOUT_ENTRY: &str = "Report/Layout";

/// Tabular model document inside the package.
pub const MODEL_ENTRY: &str = "DataModelSchema";

/// Raw (still UTF-16LE encoded) package documents.
#[derive(Debug, Clone, Default)]
pub struct PackageDocuments {
    pub layout: Vec<u8>,
    pub model: Vec<u8>,
}

#[derive(Debug)]
pub struct ArchiveLease {
    package: PathBuf,
    container: PathBuf,
    restored: bool,
    /// An explicit restore was attempted; `Drop` leaves the outcome alone.
    settled: bool,
}

impl ArchiveLease {
    /// Put the package into container form.
    ///
    /// `container` is the preferred container path. If it is already taken,
    /// the first free `_vNN` alternate is used instead and the existing file
    /// is left alone. If the package is missing but `container` exists (a run
    /// interrupted before restoring), that container is adopted and restored
    /// to the package path at the end.
    pub fn acquire(package: &Path, container: &Path) -> Result<Self, IngestError> {
        if !package.exists() {
            if container.exists() {
                tracing::warn!(
                    package = %package.display(),
                    container = %container.display(),
                    "package missing; adopting container left by an earlier run"
                );
                return Ok(Self {
                    package: package.to_path_buf(),
                    container: container.to_path_buf(),
                    restored: false,
                    settled: false,
                });
            }
            return Err(IngestError::io(
                "open package",
                package,
                std::io::Error::new(std::io::ErrorKind::NotFound, "no such file"),
            ));
        }

        let target = first_free_path(container, CONTAINER_INFIX);
        if target != container {
            tracing::info!(
                occupied = %container.display(),
                alternate = %target.display(),
                "container path taken; using alternate"
            );
        }
        fs::rename(package, &target).map_err(|e| IngestError::io("rename package", package, e))?;
        tracing::info!(from = %package.display(), to = %target.display(), "package renamed to container");

        Ok(Self {
            package: package.to_path_buf(),
            container: target,
            restored: false,
            settled: false,
        })
    }

    pub fn package_path(&self) -> &Path {
        &self.package
    }

    pub fn container_path(&self) -> &Path {
        &self.container
    }

    fn open_archive(&self) -> Result<ZipArchive<File>, IngestError> {
        let file = File::open(&self.container)
            .map_err(|e| IngestError::io("open container", &self.container, e))?;
        ZipArchive::new(file).map_err(|err| match err {
            ZipError::Io(e) => IngestError::io("read container", &self.container, e),
            other => IngestError::ArchiveFormat {
                path: self.container.clone(),
                reason: other.to_string(),
            },
        })
    }

    /// Read one named entry into memory.
    pub fn read_entry(&self, name: &str) -> Result<Vec<u8>, IngestError> {
        let mut archive = self.open_archive()?;
        read_from(&mut archive, &self.container, name)
    }

    /// Read the layout and model documents.
    pub fn read_documents(&self) -> Result<PackageDocuments, IngestError> {
        let mut archive = self.open_archive()?;
        Ok(PackageDocuments {
            layout: read_from(&mut archive, &self.container, LAYOUT_ENTRY)?,
            model: read_from(&mut archive, &self.container, MODEL_ENTRY)?,
        })
    }

    /// Copy the named entries below `dir`, keeping their archive paths.
    pub fn extract_entries_to(&self, dir: &Path, entries: &[&str]) -> Result<Vec<PathBuf>, IngestError> {
        let mut archive = self.open_archive()?;
        let mut written = Vec::with_capacity(entries.len());
        for entry in entries {
            let bytes = read_from(&mut archive, &self.container, entry)?;
            let dest = dir.join(entry);
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent).map_err(|e| IngestError::io("create directory", parent, e))?;
            }
            fs::write(&dest, bytes).map_err(|e| IngestError::io("write entry", &dest, e))?;
            written.push(dest);
        }
        Ok(written)
    }

    /// Rename the container back to the package path.
    ///
    /// A failure is reported here only; the lease does not retry on drop.
    pub fn restore(mut self) -> Result<PathBuf, IngestError> {
        self.settle()?;
        Ok(self.package.clone())
    }

    fn settle(&mut self) -> Result<(), IngestError> {
        self.settled = true;
        self.restore_in_place()
    }

    fn restore_in_place(&mut self) -> Result<(), IngestError> {
        if self.restored {
            return Ok(());
        }
        if self.package.exists() {
            return Err(IngestError::io(
                "restore package",
                &self.package,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "package path is occupied; container left in place",
                ),
            ));
        }
        fs::rename(&self.container, &self.package)
            .map_err(|e| IngestError::io("restore package", &self.container, e))?;
        self.restored = true;
        tracing::info!(to = %self.package.display(), "package restored");
        Ok(())
    }
}

impl Drop for ArchiveLease {
    fn drop(&mut self) {
        if self.settled {
            return;
        }
        if let Err(err) = self.restore_in_place() {
            tracing::error!(error = %err, "failed to restore package on drop");
        }
    }
}

fn read_from(archive: &mut ZipArchive<File>, path: &Path, name: &str) -> Result<Vec<u8>, IngestError> {
    let mut entry = archive.by_name(name).map_err(|err| match err {
        ZipError::FileNotFound => IngestError::MissingEntry {
            path: path.to_path_buf(),
            entry: name.to_string(),
        },
        ZipError::Io(e) => IngestError::io("read container", path, e),
        other => IngestError::ArchiveFormat {
            path: path.to_path_buf(),
            reason: other.to_string(),
        },
    })?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry
        .read_to_end(&mut bytes)
        .map_err(|e| IngestError::io("read entry", path, e))?;
    Ok(bytes)
}
