// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Bundle artifacts on disk: `bundles/{function}/{version}/bundle.js`.

use crate::store::RegistryError;
use fp_core::FunctionId;
use sha2::{Digest, Sha256};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

pub struct BundleStore {
    root: PathBuf,
}

impl BundleStore {
    pub fn new(root: PathBuf) -> Result<Self, RegistryError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundle_path(&self, function: &FunctionId, version: &str) -> PathBuf {
        self.root.join(function.as_str()).join(version).join("bundle.js")
    }

    /// Write the bundle bytes with an atomic rename and return the final
    /// path plus the hex SHA-256 of the contents.
    pub fn store(
        &self,
        function: &FunctionId,
        version: &str,
        bytes: &[u8],
    ) -> Result<(PathBuf, String), RegistryError> {
        let path = self.bundle_path(function, version);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = path.with_extension("js.tmp");
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, &path)?;
        Ok((path, checksum(bytes)))
    }
}

fn checksum(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    digest.iter().fold(String::with_capacity(64), |mut hex, byte| {
        let _ = write!(hex, "{:02x}", byte);
        hex
    })
}

#[cfg(test)]
#[path = "bundles_tests.rs"]
mod tests;
