//! Running the Go toolchain, arbitrary commands, and shells against the
//! vendor store.
//!
//! The child's environment is computed up front as an explicit map and handed
//! to [`Command::env_clear`] + [`Command::envs`]. This process's own
//! environment is only ever read.

use crate::config::{SearchPathMode, Settings};
use crate::error::{BunchError, Result};
use crate::vendor::VendorStore;
use std::collections::BTreeMap;
use std::ffi::{OsStr, OsString};
use std::path::PathBuf;
use std::process::{Command, ExitStatus};

pub const ORIGINAL_GOPATH: &str = "BUNCH_ORIGINAL_GOPATH";
pub const ORIGINAL_PATH: &str = "BUNCH_ORIGINAL_PATH";
/// Set inside every sandbox; the shim checks it to avoid recursing.
pub const VENDOR_MARKER: &str = "BUNCH_VENDOR";

pub type EnvMap = BTreeMap<OsString, OsString>;

#[derive(Debug, Clone)]
pub struct Sandbox {
    vendor: PathBuf,
    mode: SearchPathMode,
    toolchain: String,
}

impl Sandbox {
    pub fn new(store: &VendorStore, settings: &Settings) -> Result<Self> {
        Ok(Self {
            vendor: std::path::absolute(store.root())?,
            mode: settings.search_path,
            toolchain: settings.toolchain.clone(),
        })
    }

    /// The child environment derived from `parent`.
    pub fn environment<I, K, V>(&self, parent: I) -> EnvMap
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<OsString>,
        V: Into<OsString>,
    {
        let mut env: EnvMap = parent
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();

        let parent_gopath = env.get(OsStr::new("GOPATH")).cloned();
        let gopath = match (self.mode, &parent_gopath) {
            (SearchPathMode::Prepend, Some(global)) if !global.is_empty() => {
                prepend_path(self.vendor.clone().into_os_string(), global)
            }
            _ => self.vendor.clone().into_os_string(),
        };
        if let Some(global) = parent_gopath {
            env.insert(ORIGINAL_GOPATH.into(), global);
        }
        env.insert("GOPATH".into(), gopath);

        let bin = self.vendor.join("bin").into_os_string();
        let path = match env.get(OsStr::new("PATH")).cloned() {
            Some(old) => {
                env.insert(ORIGINAL_PATH.into(), old.clone());
                prepend_path(bin, &old)
            }
            None => bin,
        };
        env.insert("PATH".into(), path);

        env.entry("GO111MODULE".into()).or_insert_with(|| "off".into());
        env.insert(VENDOR_MARKER.into(), self.vendor.clone().into_os_string());
        env
    }

    /// A command that will run `program` inside the sandbox.
    pub fn command(&self, program: impl AsRef<OsStr>, args: &[String]) -> Command {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .envs(self.environment(std::env::vars_os()));
        cmd
    }

    /// `go <args>` with the vendored GOPATH.
    pub fn run_toolchain(&self, args: &[String]) -> Result<i32> {
        launch(&self.toolchain, self.command(&self.toolchain, args))
    }

    /// An arbitrary program with the vendored GOPATH.
    pub fn exec(&self, program: &str, args: &[String]) -> Result<i32> {
        launch(program, self.command(program, args))
    }

    /// An interactive `$SHELL` (or `/bin/sh`) with the vendored GOPATH.
    pub fn shell(&self) -> Result<i32> {
        let shell = login_shell(std::env::var_os("SHELL"));
        let label = shell.to_string_lossy().into_owned();
        tracing::debug!(shell = %label, vendor = %self.vendor.display(), "starting shell");
        launch(&label, self.command(&shell, &[]))
    }
}

fn prepend_path(first: OsString, rest: &OsStr) -> OsString {
    let mut paths = vec![PathBuf::from(first.clone())];
    paths.extend(std::env::split_paths(rest));
    match std::env::join_paths(paths) {
        Ok(joined) => joined,
        Err(e) => {
            tracing::warn!(error = %e, "cannot join search path, using vendor store only");
            first
        }
    }
}

fn login_shell(shell: Option<OsString>) -> OsString {
    shell
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "/bin/sh".into())
}

fn launch(program: &str, mut cmd: Command) -> Result<i32> {
    let status = cmd.status().map_err(|source| BunchError::EnvironmentLaunch {
        program: program.to_string(),
        source,
    })?;
    Ok(exit_code(status))
}

/// Exit code to propagate; a signal `n` maps to `128 + n` like a shell would.
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

/// Shell function that routes `toolchain` through `exe` inside projects.
///
/// Meant for `eval "$(bunch shim)"` in a POSIX shell profile.
pub fn shim(toolchain: &str, exe: &str) -> String {
    format!(
        r#"{toolchain}() {{
  if [ -z "${VENDOR_MARKER}" ] && [ -f {manifest} ]; then
    "{exe}" go "$@"
  else
    command {toolchain} "$@"
  fi
}}
"#,
        manifest = crate::manifest::MANIFEST_FILE,
    )
}
