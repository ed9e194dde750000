//! Locates a Chromium executable before launch.
//!
//! [`candidate_directories`] is a pure function of the host description, and
//! all disk access goes through [`FileProbe`], so discovery is testable without
//! a filesystem or a browser.

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use crate::application::{error::ConfigurationError, render::BinaryLocation};

/// Executable names looked up inside a candidate directory, in order.
pub const EXECUTABLE_NAMES: &[&str] = &[
    "chromium",
    "headless_shell",
    "chromium-browser",
    "chrome",
    "google-chrome",
];

/// Where the renderer is running. Each context has its own install layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostContext {
    FunctionHost,
    Server,
    Batch,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    pub context: HostContext,
    /// Operator-supplied executable; bypasses directory discovery.
    pub explicit_executable: Option<PathBuf>,
    /// Root of the deployed package (function hosts unpack next to it).
    pub package_root: Option<PathBuf>,
    pub working_dir: PathBuf,
}

/// Candidate install directories, most specific first.
pub fn candidate_directories(env: &HostEnvironment) -> Vec<PathBuf> {
    let mut candidates = Vec::new();
    match env.context {
        HostContext::FunctionHost => {
            if let Some(root) = &env.package_root {
                candidates.push(root.join("chromium"));
                candidates.push(root.join("bin"));
            }
            candidates.push(env.working_dir.join("chromium"));
            candidates.push(env.working_dir.join("bin"));
            candidates.push(PathBuf::from("/opt/chromium"));
            candidates.push(PathBuf::from("/opt/bin"));
        }
        HostContext::Server | HostContext::Batch => {
            if let Some(root) = &env.package_root {
                candidates.push(root.join("chromium"));
            }
            candidates.push(env.working_dir.join("bin"));
            candidates.push(env.working_dir.join(".chromium"));
            candidates.push(PathBuf::from("/usr/lib/chromium"));
            candidates.push(PathBuf::from("/opt/google/chrome"));
            candidates.push(PathBuf::from("/usr/bin"));
        }
    }
    let mut seen = HashSet::new();
    candidates.retain(|candidate| seen.insert(candidate.clone()));
    candidates
}

pub trait FileProbe: Send + Sync {
    fn is_dir(&self, path: &Path) -> bool;
    fn is_executable(&self, path: &Path) -> bool;
}

/// Probe backed by the real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiskProbe;

impl FileProbe for DiskProbe {
    fn is_dir(&self, path: &Path) -> bool {
        path.is_dir()
    }

    fn is_executable(&self, path: &Path) -> bool {
        let Ok(metadata) = std::fs::metadata(path) else {
            return false;
        };
        if !metadata.is_file() {
            return false;
        }
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            metadata.permissions().mode() & 0o111 != 0
        }
        #[cfg(not(unix))]
        {
            true
        }
    }
}

/// Extract the concrete executable from an install directory.
pub fn executable_in(directory: &Path, probe: &dyn FileProbe) -> Option<PathBuf> {
    EXECUTABLE_NAMES
        .iter()
        .map(|name| directory.join(name))
        .find(|path| probe.is_executable(path))
}

/// Resolve the browser for this invocation. Every failure is fatal: there is
/// no fallback browser.
pub fn resolve_executable(
    env: &HostEnvironment,
    probe: &dyn FileProbe,
) -> Result<BinaryLocation, ConfigurationError> {
    if let Some(path) = &env.explicit_executable {
        return if probe.is_executable(path) {
            Ok(BinaryLocation::new(path.clone()))
        } else {
            Err(ConfigurationError::ExplicitExecutableMissing { path: path.clone() })
        };
    }

    let candidates = candidate_directories(env);
    let Some(directory) = candidates.iter().find(|dir| probe.is_dir(dir)) else {
        return Err(ConfigurationError::BrowserNotFound {
            searched: candidates,
        });
    };

    executable_in(directory, probe)
        .map(BinaryLocation::new)
        .ok_or_else(|| ConfigurationError::ExecutableNotFound {
            directory: directory.clone(),
        })
}

/// Binds a host description to a probe; resolves afresh on every call.
pub struct BinaryResolver {
    env: HostEnvironment,
    probe: Box<dyn FileProbe>,
}

impl BinaryResolver {
    pub fn new(env: HostEnvironment, probe: Box<dyn FileProbe>) -> Self {
        Self { env, probe }
    }

    pub fn on_disk(env: HostEnvironment) -> Self {
        Self::new(env, Box::new(DiskProbe))
    }

    pub fn environment(&self) -> &HostEnvironment {
        &self.env
    }

    pub fn resolve(&self) -> Result<BinaryLocation, ConfigurationError> {
        resolve_executable(&self.env, self.probe.as_ref())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// In-memory probe: a set of directories and a set of executables.
    #[derive(Default)]
    pub(crate) struct MemoryProbe {
        pub dirs: HashSet<PathBuf>,
        pub executables: HashSet<PathBuf>,
    }

    impl MemoryProbe {
        pub(crate) fn with(dirs: &[&str], executables: &[&str]) -> Self {
            Self {
                dirs: dirs.iter().map(PathBuf::from).collect(),
                executables: executables.iter().map(PathBuf::from).collect(),
            }
        }
    }

    impl FileProbe for MemoryProbe {
        fn is_dir(&self, path: &Path) -> bool {
            self.dirs.contains(path)
        }

        fn is_executable(&self, path: &Path) -> bool {
            self.executables.contains(path)
        }
    }

    fn function_host() -> HostEnvironment {
        HostEnvironment {
            context: HostContext::FunctionHost,
            explicit_executable: None,
            package_root: Some(PathBuf::from("/var/task")),
            working_dir: PathBuf::from("/var/task"),
        }
    }

    #[test]
    fn function_host_prefers_vendored_engine() {
        let dirs = candidate_directories(&function_host());
        assert_eq!(dirs.first(), Some(&PathBuf::from("/var/task/chromium")));
        assert!(dirs.contains(&PathBuf::from("/opt/chromium")));
    }

    #[test]
    fn server_candidates_end_with_system_bin() {
        let env = HostEnvironment {
            context: HostContext::Server,
            explicit_executable: None,
            package_root: None,
            working_dir: PathBuf::from("/srv/app"),
        };
        let dirs = candidate_directories(&env);
        assert_eq!(dirs.first(), Some(&PathBuf::from("/srv/app/bin")));
        assert_eq!(dirs.last(), Some(&PathBuf::from("/usr/bin")));
    }

    #[test]
    fn first_existing_directory_wins() {
        let probe = MemoryProbe::with(
            &["/var/task/bin", "/opt/chromium"],
            &["/var/task/bin/headless_shell", "/opt/chromium/chromium"],
        );
        let location = resolve_executable(&function_host(), &probe).expect("resolved");
        assert_eq!(location.path, PathBuf::from("/var/task/bin/headless_shell"));
    }

    #[test]
    fn existing_directory_without_executable_is_fatal() {
        let probe = MemoryProbe::with(&["/var/task/chromium"], &["/opt/chromium/chromium"]);
        let err = resolve_executable(&function_host(), &probe).expect_err("no executable");
        assert_eq!(
            err,
            ConfigurationError::ExecutableNotFound {
                directory: PathBuf::from("/var/task/chromium")
            }
        );
    }

    #[test]
    fn nothing_installed_lists_every_candidate() {
        let err = resolve_executable(&function_host(), &MemoryProbe::default())
            .expect_err("nothing installed");
        match err {
            ConfigurationError::BrowserNotFound { searched } => {
                assert_eq!(searched, candidate_directories(&function_host()));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn explicit_executable_bypasses_discovery() {
        let mut env = function_host();
        env.explicit_executable = Some(PathBuf::from("/usr/local/bin/chrome"));

        let probe = MemoryProbe::with(&[], &["/usr/local/bin/chrome"]);
        let location = resolve_executable(&env, &probe).expect("explicit");
        assert_eq!(location.path, PathBuf::from("/usr/local/bin/chrome"));

        let err = resolve_executable(&env, &MemoryProbe::default()).expect_err("missing");
        assert!(matches!(err, ConfigurationError::ExplicitExecutableMissing { .. }));
    }

    #[cfg(unix)]
    #[test]
    fn disk_probe_requires_execute_bit() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::TempDir::new().expect("temp dir");
        let binary = dir.path().join("chromium");
        std::fs::write(&binary, "#!/bin/sh\n").expect("write");
        assert!(!DiskProbe.is_executable(&binary));

        let mut perms = std::fs::metadata(&binary).expect("metadata").permissions();
        perms.set_mode(0o755);
        std::fs::set_permissions(&binary, perms).expect("chmod");
        assert!(DiskProbe.is_executable(&binary));
        assert!(DiskProbe.is_dir(dir.path()));
        assert_eq!(executable_in(dir.path(), &DiskProbe), Some(binary));
    }
}
