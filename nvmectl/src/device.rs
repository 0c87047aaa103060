// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Open device handle plus its cached file metadata.

use crate::ioctl;
use anyhow::Context;
use anyhow::bail;
use std::fs;
use std::os::unix::fs::FileTypeExt;
use std::path::Path;
use std::path::PathBuf;

/// An open NVMe device node, threaded explicitly through every operation.
///
/// A character device (`/dev/nvme0`) addresses the whole controller; a
/// block device (`/dev/nvme0n1`) is scoped to one namespace and can report
/// its own namespace id.
#[derive(Debug)]
pub struct DeviceContext {
    file: fs::File,
    path: PathBuf,
    file_type: fs::FileType,
}

impl DeviceContext {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let file =
            fs::File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
        let meta = file
            .metadata()
            .with_context(|| format!("failed to stat {}", path.display()))?;
        let file_type = meta.file_type();
        if !file_type.is_char_device() && !file_type.is_block_device() {
            bail!("{} is not a block or character device", path.display());
        }
        tracing::debug!(path = %path.display(), block = file_type.is_block_device(), "opened device");
        Ok(Self {
            file,
            path: path.to_owned(),
            file_type,
        })
    }

    pub fn file(&self) -> &fs::File {
        &self.file
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Display name for diagnostics.
    pub fn name(&self) -> String {
        self.path.display().to_string()
    }

    pub fn is_block(&self) -> bool {
        self.file_type.is_block_device()
    }

    /// The namespace id this block device is bound to.
    pub fn namespace_id(&self) -> Result<u32, ioctl::CommandError> {
        ioctl::query_namespace_id(&self.file)
    }

    /// Resolves the namespace id for a namespace-scoped command: an explicit
    /// nonzero id wins, a block device is asked for its own, and a character
    /// device without an explicit id is an error.
    pub fn resolve_nsid(&self, explicit: u32) -> anyhow::Result<u32> {
        if explicit != 0 {
            return Ok(explicit);
        }
        if !self.is_block() {
            bail!(
                "{}: non-block device requires --namespace-id",
                self.path.display()
            );
        }
        self.namespace_id()
            .with_context(|| format!("{}: failed to return namespace id", self.path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn regular_files_are_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"not a device").unwrap();
        let err = DeviceContext::open(file.path()).unwrap_err();
        assert!(
            err.to_string().contains("not a block or character device"),
            "{err}"
        );
    }

    #[test]
    fn missing_nodes_report_the_path() {
        let err = DeviceContext::open(Path::new("/dev/does-not-exist-nvme99")).unwrap_err();
        assert!(err.to_string().contains("failed to open"), "{err}");
    }
}
