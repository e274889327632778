//! Shared harness: a scratch cache root, a project directory and a mock npm
//! registry serving package managers whose binaries are shell scripts.

#![allow(dead_code)]

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use base64::Engine;
use flate2::Compression;
use flate2::write::GzEncoder;
use mockito::{Matcher, Mock, ServerGuard};
use sha2::{Digest, Sha512};
use tempfile::TempDir;

/// Test context that sets up a temporary corepack home and project
pub struct TestContext {
    temp_dir: TempDir,
    pub home: PathBuf,
    pub project: PathBuf,
    pub server: ServerGuard,
    mocks: Vec<Mock>,
}

impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let home = temp_dir.path().join("corepack");
        let project = temp_dir.path().join("project");
        std::fs::create_dir_all(&project).expect("failed to create project dir");

        Self {
            temp_dir,
            home,
            project,
            server: mockito::Server::new(),
            mocks: Vec::new(),
        }
    }

    pub fn root(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn corepack(&self) -> Command {
        self.command(env!("CARGO_BIN_EXE_corepack"))
    }

    /// `program` in the project directory with this context's environment.
    pub fn command(&self, program: impl AsRef<std::ffi::OsStr>) -> Command {
        let mut cmd = Command::new(program);
        cmd.current_dir(&self.project)
            .env("COREPACK_HOME", &self.home)
            .env("COREPACK_NPM_REGISTRY", self.server.url())
            .env_remove("COREPACK_ENABLE_NETWORK")
            .env_remove("COREPACK_ENABLE_STRICT")
            .env_remove("RUST_LOG");
        cmd
    }

    /// `corepack <args>` run to completion.
    pub fn run(&self, args: &[&str]) -> Output {
        self.corepack().args(args).output().expect("failed to run corepack")
    }

    pub fn pin(&self, spec: &str) {
        std::fs::write(
            self.project.join("package.json"),
            format!("{{\"name\": \"app\", \"packageManager\": \"{spec}\"}}"),
        )
        .expect("failed to write package.json");
    }

    /// Publish a single `version` of `package`, shipping `bins`.
    pub fn publish(&mut self, package: &str, version: &str, bins: &[&str]) {
        let tarball = manager_tarball(package, version, bins);
        let tarball_path = format!("/tarballs/{}-{version}.tgz", package.replace('/', "-"));
        let mut versions = serde_json::Map::new();
        versions.insert(
            version.to_string(),
            serde_json::json!({
                "dist": {
                    "tarball": format!("{}{tarball_path}", self.server.url()),
                    "integrity": sri(&tarball),
                }
            }),
        );
        let metadata = serde_json::json!({
            "name": package,
            "dist-tags": { "latest": version },
            "versions": versions,
        });

        let metadata_path = format!("^/{}$", package.replace('/', "%2[fF]"));
        self.mocks.push(
            self.server
                .mock("GET", Matcher::Regex(metadata_path))
                .with_header("content-type", "application/json")
                .with_body(metadata.to_string())
                .create(),
        );
        self.mocks.push(
            self.server
                .mock("GET", tarball_path.as_str())
                .with_body(tarball)
                .create(),
        );
    }
}

pub fn stdout(output: &Output) -> String {
    String::from_utf8_lossy(&output.stdout).into_owned()
}

pub fn stderr(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

fn sri(bytes: &[u8]) -> String {
    let digest = Sha512::digest(bytes);
    format!(
        "sha512-{}",
        base64::engine::general_purpose::STANDARD.encode(digest)
    )
}

/// An npm-style tarball whose `bins` are scripts printing `version`.
fn manager_tarball(package: &str, version: &str, bins: &[&str]) -> Vec<u8> {
    let bin_map: serde_json::Map<String, serde_json::Value> = bins
        .iter()
        .map(|b| ((*b).to_string(), format!("bin/{b}.sh").into()))
        .collect();
    let manifest = serde_json::json!({
        "name": package,
        "version": version,
        "bin": bin_map,
    });
    let script = format!("#!/bin/sh\necho {version}\n");

    let mut builder = tar::Builder::new(Vec::new());
    append(&mut builder, "package/package.json", manifest.to_string().as_bytes(), 0o644);
    for bin in bins {
        append(&mut builder, &format!("package/bin/{bin}.sh"), script.as_bytes(), 0o755);
    }
    let raw = builder.into_inner().expect("failed to finish tar");

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(&raw).expect("failed to gzip");
    encoder.finish().expect("failed to gzip")
}

fn append(builder: &mut tar::Builder<Vec<u8>>, path: &str, data: &[u8], mode: u32) {
    let mut header = tar::Header::new_gnu();
    header.set_size(data.len() as u64);
    header.set_mode(mode);
    header.set_cksum();
    builder
        .append_data(&mut header, path, data)
        .expect("failed to append tar entry");
}
