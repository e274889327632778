//! Transparent dispatch: run the right package manager for a project.
//!
//! The effective descriptor comes from, in order: an explicit
//! `corepack <binary>@<range>`, the project manifest, the activated
//! "last known good" version, the embedded default.

use std::ffi::OsString;
use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::ExitStatus;

use corepack_schema::{Binary, Descriptor, PackageManager};
use serde_json::Value;
use tracing::{debug, trace};

use crate::defaults::transparent_version;
use crate::error::IoContext;
use crate::install::ensure_package_manager;
use crate::manifest::{Lookup, MANIFEST_NAME, load_spec};
use crate::resolver::resolve_descriptor;
use crate::state::activation::{FallbackSource, activate_package_manager, fallback_descriptor};
use crate::{Config, Context, Error, Reporter, Result};

/// A request to run `binary` with `args` from `cwd`.
#[derive(Debug, Clone)]
pub struct Invocation {
    /// The binary that was invoked.
    pub binary: Binary,
    /// A descriptor given on the command line (`corepack yarn@2 ...`).
    pub explicit: Option<Descriptor>,
    /// Arguments forwarded to the package manager.
    pub args: Vec<OsString>,
    /// Where the manifest search starts.
    pub cwd: PathBuf,
}

/// Why a particular descriptor was chosen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorSource {
    /// Given on the command line.
    Explicit,
    /// The `packageManager` field of this manifest.
    Manifest(PathBuf),
    /// The activated default.
    Activation,
    /// The built-in default.
    Embedded,
    /// A transparent command run in a project pinned to another manager.
    Transparent,
}

/// The descriptor an invocation will run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// What to resolve and run.
    pub descriptor: Descriptor,
    /// Where it came from.
    pub source: DescriptorSource,
}

/// Decide which descriptor runs `invocation`, applying the wrong-manager
/// guard.
pub fn plan(config: &Config, reporter: &dyn Reporter, invocation: &Invocation) -> Result<Plan> {
    let manager = invocation.binary.manager();

    let (descriptor, source) = match &invocation.explicit {
        Some(descriptor) => (descriptor.clone(), DescriptorSource::Explicit),
        None => match load_spec(&invocation.cwd)? {
            Lookup::Found {
                descriptor,
                manifest,
            } => (descriptor, DescriptorSource::Manifest(manifest)),
            Lookup::NoSpec { .. } | Lookup::NoProject { .. } => fallback(config, manager),
        },
    };

    if descriptor.manager == manager {
        return Ok(Plan { descriptor, source });
    }

    let args: Vec<&str> = invocation
        .args
        .iter()
        .map(|arg| arg.to_str().unwrap_or_default())
        .collect();
    if invocation.binary.is_transparent(&args) {
        debug!(
            "{} is transparent; running {manager} despite {descriptor}",
            invocation.binary
        );
        return Ok(Plan {
            descriptor: Descriptor::exact(manager, transparent_version(manager)),
            source: DescriptorSource::Transparent,
        });
    }

    let manifest = match source {
        DescriptorSource::Manifest(manifest) => manifest,
        _ => invocation.cwd.join(MANIFEST_NAME),
    };
    if !config.strict {
        reporter.warning(&format!(
            "{} pins {descriptor}; running {} anyway because COREPACK_ENABLE_STRICT=0",
            manifest.display(),
            invocation.binary
        ));
        let (descriptor, source) = fallback(config, manager);
        return Ok(Plan { descriptor, source });
    }

    Err(Error::WrongPackageManager {
        invoked: invocation.binary,
        pinned: descriptor.manager,
        manifest,
    })
}

fn fallback(config: &Config, manager: PackageManager) -> (Descriptor, DescriptorSource) {
    match fallback_descriptor(config, manager) {
        (descriptor, FallbackSource::Activation) => (descriptor, DescriptorSource::Activation),
        (descriptor, FallbackSource::Embedded) => (descriptor, DescriptorSource::Embedded),
    }
}

/// Run `invocation` to completion and return the exit code to use.
pub async fn run(ctx: &Context, invocation: Invocation) -> Result<i32> {
    let plan = plan(&ctx.config, ctx.reporter.as_ref(), &invocation)?;
    debug!("running {} via {:?}", plan.descriptor, plan.source);

    let locator = resolve_descriptor(ctx, &plan.descriptor).await?;
    let record = ensure_package_manager(ctx, &locator).await?;
    if plan.source == DescriptorSource::Embedded {
        activate_package_manager(ctx, &locator).await?;
    }

    let entry = entry_point(&record.location, invocation.binary)?;
    let (program, mut args) = command_for(&entry)?;
    args.extend(invocation.args);
    execute(&program, args, &invocation.cwd).await
}

/// The script `binary` maps to in the installed `package.json`.
pub fn entry_point(location: &Path, binary: Binary) -> Result<PathBuf> {
    let manifest_path = location.join(MANIFEST_NAME);
    let text = fs::read_to_string(&manifest_path).at(&manifest_path)?;
    let manifest: Value = serde_json::from_str(&text).map_err(|e| Error::Manifest {
        path: manifest_path.clone(),
        reason: e.to_string(),
    })?;

    let relative = match manifest.get("bin") {
        Some(Value::String(path)) => Some(path.as_str()),
        Some(Value::Object(map)) => map.get(binary.as_str()).and_then(Value::as_str),
        _ => None,
    };
    let relative = relative.ok_or_else(|| Error::Execution {
        program: binary.to_string(),
        reason: format!("{} has no bin entry for it", manifest_path.display()),
    })?;
    Ok(location.join(relative))
}

/// How to launch `entry`: JavaScript goes through `node`, anything else is
/// executed directly.
fn command_for(entry: &Path) -> Result<(PathBuf, Vec<OsString>)> {
    if !is_javascript(entry) {
        return Ok((entry.to_path_buf(), Vec::new()));
    }
    let node = which::which("node").map_err(|e| Error::Execution {
        program: "node".to_string(),
        reason: e.to_string(),
    })?;
    Ok((node, vec![entry.as_os_str().to_os_string()]))
}

fn is_javascript(entry: &Path) -> bool {
    if matches!(
        entry.extension().and_then(|ext| ext.to_str()),
        Some("js" | "cjs" | "mjs")
    ) {
        return true;
    }
    let Ok(file) = fs::File::open(entry) else {
        return false;
    };
    let mut first_line = String::new();
    if BufReader::new(file).read_line(&mut first_line).is_err() {
        return false;
    }
    first_line.starts_with("#!") && first_line.contains("node")
}

/// Spawn `program` with inherited stdio and wait for it.
///
/// Ctrl-C reaches the child through the terminal's process group; the shim
/// keeps waiting so the child decides how to exit.
async fn execute(program: &Path, args: Vec<OsString>, cwd: &Path) -> Result<i32> {
    trace!("exec {} {args:?}", program.display());
    let mut child = tokio::process::Command::new(program)
        .args(&args)
        .current_dir(cwd)
        .spawn()
        .map_err(|e| Error::Execution {
            program: program.display().to_string(),
            reason: e.to_string(),
        })?;

    let mut watch_interrupts = true;
    let status = loop {
        tokio::select! {
            status = child.wait() => {
                break status.map_err(|e| Error::Execution {
                    program: program.display().to_string(),
                    reason: e.to_string(),
                })?;
            }
            signal = tokio::signal::ctrl_c(), if watch_interrupts => {
                match signal {
                    Ok(()) => debug!("interrupt received; waiting for the child"),
                    Err(_) => watch_interrupts = false,
                }
            }
        }
    };
    Ok(exit_code(status))
}

fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NullReporter;
    use crate::defaults::default_version;
    use crate::test_support::{FakeRegistry, context, manager_tarball};
    use corepack_schema::Locator;
    use std::sync::Arc;

    fn invocation(binary: Binary, cwd: &Path, args: &[&str]) -> Invocation {
        Invocation {
            binary,
            explicit: None,
            args: args.iter().map(OsString::from).collect(),
            cwd: cwd.to_path_buf(),
        }
    }

    fn pin(dir: &Path, spec: &str) {
        fs::write(
            dir.join(MANIFEST_NAME),
            format!("{{\"packageManager\": \"{spec}\"}}"),
        )
        .unwrap();
    }

    #[test]
    fn test_manifest_beats_activation_and_defaults() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        pin(work.path(), "yarn@1.22.4");
        let config = Config::new(home.path());

        let plan = plan(&config, &NullReporter, &invocation(Binary::Yarn, work.path(), &["--version"]))
            .unwrap();
        assert_eq!(plan.descriptor.to_string(), "yarn@1.22.4");
        assert_eq!(
            plan.source,
            DescriptorSource::Manifest(work.path().join(MANIFEST_NAME))
        );
    }

    #[test]
    fn test_explicit_beats_manifest() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        pin(work.path(), "npm@6.14.2");
        let config = Config::new(home.path());

        let mut inv = invocation(Binary::Yarn, work.path(), &["--version"]);
        inv.explicit = Some(Descriptor::parse("yarn@2.2.2", "CLI arguments").unwrap());
        let plan = plan(&config, &NullReporter, &inv).unwrap();
        assert_eq!(plan.descriptor.to_string(), "yarn@2.2.2");
        assert_eq!(plan.source, DescriptorSource::Explicit);
    }

    #[test]
    fn test_wrong_manager_is_refused() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        pin(work.path(), "npm@6.14.2");
        let config = Config::new(home.path());

        let err = plan(&config, &NullReporter, &invocation(Binary::Yarn, work.path(), &["--version"]))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::WrongPackageManager {
                invoked: Binary::Yarn,
                pinned: PackageManager::Npm,
                ..
            }
        ));
        assert!(err.to_string().contains("npm"));
    }

    #[test]
    fn test_transparent_commands_cross_managers() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        pin(work.path(), "npm@6.14.2");
        let config = Config::new(home.path());

        let plan = plan(
            &config,
            &NullReporter,
            &invocation(Binary::Yarn, work.path(), &["dlx", "cat@0.2.0"]),
        )
        .unwrap();
        assert_eq!(plan.source, DescriptorSource::Transparent);
        assert_eq!(
            plan.descriptor,
            Descriptor::exact(PackageManager::Yarn, transparent_version(PackageManager::Yarn))
        );
    }

    #[test]
    fn test_lenient_mode_falls_back() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        pin(work.path(), "npm@6.14.2");
        let mut config = Config::new(home.path());
        config.strict = false;

        let plan = plan(&config, &NullReporter, &invocation(Binary::Pnpm, work.path(), &["install"]))
            .unwrap();
        assert_eq!(plan.source, DescriptorSource::Embedded);
        assert_eq!(
            plan.descriptor,
            Descriptor::exact(PackageManager::Pnpm, default_version(PackageManager::Pnpm))
        );
    }

    #[test]
    fn test_entry_point_from_bin_field() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join(MANIFEST_NAME),
            r#"{"bin": {"npm": "bin/npm-cli.js", "npx": "bin/npx-cli.js"}}"#,
        )
        .unwrap();
        assert_eq!(
            entry_point(dir.path(), Binary::Npx).unwrap(),
            dir.path().join("bin/npx-cli.js")
        );
        assert!(matches!(
            entry_point(dir.path(), Binary::Yarn),
            Err(Error::Execution { .. })
        ));

        fs::write(dir.path().join(MANIFEST_NAME), r#"{"bin": "cli.js"}"#).unwrap();
        assert_eq!(
            entry_point(dir.path(), Binary::Pnpm).unwrap(),
            dir.path().join("cli.js")
        );
    }

    #[test]
    fn test_javascript_detection() {
        let dir = tempfile::tempdir().unwrap();
        let shebang = dir.path().join("yarn");
        fs::write(&shebang, "#!/usr/bin/env node\nrequire('./lib')\n").unwrap();
        let shell = dir.path().join("yarn.sh");
        fs::write(&shell, "#!/bin/sh\necho hi\n").unwrap();

        assert!(is_javascript(&shebang));
        assert!(is_javascript(Path::new("pnpm.cjs")));
        assert!(!is_javascript(&shell));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_run_propagates_exit_code_and_activates_default() {
        let home = tempfile::tempdir().unwrap();
        let work = tempfile::tempdir().unwrap();
        let registry = Arc::new(FakeRegistry::new());
        registry.publish(
            "pnpm",
            "9.15.4",
            manager_tarball(PackageManager::Pnpm, "9.15.4"),
        );
        let ctx = context(registry, home.path());

        let code = run(&ctx, invocation(Binary::Pnpm, work.path(), &["--version"]))
            .await
            .unwrap();
        assert_eq!(code, 0);
        assert_eq!(
            crate::state::activation::activated(&ctx.config, PackageManager::Pnpm),
            Some(Locator::version(PackageManager::Pnpm, semver::Version::new(9, 15, 4)))
        );
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_child_exit_codes_pass_through() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fail.sh");
        fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        assert_eq!(execute(&script, Vec::new(), dir.path()).await.unwrap(), 3);

        let missing = dir.path().join("missing");
        assert!(matches!(
            execute(&missing, Vec::new(), dir.path()).await,
            Err(Error::Execution { .. })
        ));
    }
}
