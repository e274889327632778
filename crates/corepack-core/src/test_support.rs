//! Fakes shared by the unit tests.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use corepack_schema::{HashAlgorithm, Integrity, PackageManager};
use flate2::Compression;
use flate2::write::GzEncoder;

use crate::registry::{Dist, PackageMetadata, Registry, RegistryError, VersionMetadata};
use crate::{Config, Context, NullReporter};

/// In-memory registry counting how often it is hit.
#[derive(Default)]
pub(crate) struct FakeRegistry {
    packages: Mutex<HashMap<String, PackageMetadata>>,
    tarballs: Mutex<HashMap<String, Bytes>>,
    pub(crate) metadata_calls: AtomicUsize,
    pub(crate) fetch_calls: AtomicUsize,
}

impl FakeRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Advertise versions without tarballs.
    pub(crate) fn publish_versions(&self, package: &str, versions: &[&str], latest: &str) {
        let mut packages = self.packages.lock().unwrap();
        let metadata = packages.entry(package.to_string()).or_default();
        for version in versions {
            metadata.versions.insert(
                (*version).to_string(),
                VersionMetadata {
                    dist: Dist {
                        tarball: tarball_url(package, version),
                        integrity: None,
                    },
                },
            );
        }
        metadata
            .dist_tags
            .insert("latest".to_string(), latest.to_string());
    }

    /// Publish a release with a real tarball and registry integrity.
    pub(crate) fn publish(&self, package: &str, version: &str, tarball: Vec<u8>) {
        let url = tarball_url(package, version);
        let sri = sri(&tarball);
        self.tarballs.lock().unwrap().insert(url.clone(), Bytes::from(tarball));

        let mut packages = self.packages.lock().unwrap();
        let metadata = packages.entry(package.to_string()).or_default();
        metadata.versions.insert(
            version.to_string(),
            VersionMetadata {
                dist: Dist {
                    tarball: url,
                    integrity: Some(sri),
                },
            },
        );
        metadata
            .dist_tags
            .insert("latest".to_string(), version.to_string());
    }

    /// Serve `bytes` at `url` without any metadata.
    pub(crate) fn serve(&self, url: &str, bytes: Vec<u8>) {
        self.tarballs
            .lock()
            .unwrap()
            .insert(url.to_string(), Bytes::from(bytes));
    }

    pub(crate) fn fetches(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Registry for FakeRegistry {
    async fn package_metadata(&self, package: &str) -> Result<PackageMetadata, RegistryError> {
        self.metadata_calls.fetch_add(1, Ordering::SeqCst);
        self.packages
            .lock()
            .unwrap()
            .get(package)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(package.to_string()))
    }

    async fn fetch(&self, url: &str) -> Result<Bytes, RegistryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        self.tarballs
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| RegistryError::Status {
                url: url.to_string(),
                status: 404,
            })
    }
}

pub(crate) fn tarball_url(package: &str, version: &str) -> String {
    format!("https://registry.test/{package}/-/{version}.tgz")
}

pub(crate) fn sri(bytes: &[u8]) -> String {
    use base64::Engine;
    let digest = HashAlgorithm::Sha512.digest(bytes);
    format!(
        "sha512-{}",
        base64::engine::general_purpose::STANDARD.encode(digest)
    )
}

/// Suffix-form integrity of `bytes`, as it would appear in a descriptor.
pub(crate) fn integrity(bytes: &[u8]) -> Integrity {
    Integrity::compute(HashAlgorithm::Sha512, bytes)
}

/// Entries of an npm-style tarball for `manager` whose binaries are shell
/// scripts printing `version`.
fn manager_entries(manager: PackageManager, version: &str) -> Vec<(String, Vec<u8>, u32)> {
    let bins: Vec<_> = manager.binaries().iter().map(|b| b.as_str()).collect();
    let bin_map = bins
        .iter()
        .map(|b| format!("\"{b}\": \"bin/{b}.sh\""))
        .collect::<Vec<_>>()
        .join(", ");
    let manifest =
        format!("{{\"name\": \"{manager}\", \"version\": \"{version}\", \"bin\": {{{bin_map}}}}}");
    let script = format!("#!/bin/sh\necho {version}\n");

    let mut entries = vec![("package/package.json".to_string(), manifest.into_bytes(), 0o644)];
    for bin in bins {
        entries.push((format!("package/bin/{bin}.sh"), script.clone().into_bytes(), 0o755));
    }
    entries
}

pub(crate) fn manager_tarball(manager: PackageManager, version: &str) -> Vec<u8> {
    gzip(&tar_bytes(&manager_entries(manager, version)))
}

/// A well-formed gzip stream whose tar payload stops partway through the
/// second entry, as a download cut short would.
pub(crate) fn interrupted_tarball(manager: PackageManager, version: &str) -> Vec<u8> {
    let mut raw = tar_bytes(&manager_entries(manager, version));
    // header + one data block for package.json, then the next header
    raw.truncate(3 * 512 + 10);
    gzip(&raw)
}

/// Build an uncompressed tar from `(path, contents, mode)` triples.
pub(crate) fn tar_bytes(entries: &[(String, Vec<u8>, u32)]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (path, data, mode) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(*mode);
        header.set_cksum();
        builder.append_data(&mut header, path, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap()
}

pub(crate) fn gzip(bytes: &[u8]) -> Vec<u8> {
    use std::io::Write;
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).unwrap();
    encoder.finish().unwrap()
}

pub(crate) fn serve_url(file: &str) -> String {
    format!("https://downloads.test/{file}")
}

/// A context rooted at `home` with a fake registry and no output.
pub(crate) fn context(registry: Arc<FakeRegistry>, home: &Path) -> Context {
    Context::new(Config::new(home), registry, Arc::new(NullReporter))
}
