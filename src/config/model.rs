// src/config/model.rs

use std::path::{Path, PathBuf};

use serde::Deserialize;

/// Configuration as read from `Packline.toml`, before validation.
///
/// ```toml
/// [project]
/// root = "."
/// app_dir = "app"
/// target = "win"
///
/// [native]
/// module = "better-sqlite3"
///
/// [discovery]
/// sentinel = "server.js"
/// marker = "dotenv"
///
/// [signing]
/// enabled = true
/// ```
///
/// All sections are optional and have defaults matching a typical
/// electron-builder project layout.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub native: NativeSection,

    #[serde(default)]
    pub discovery: DiscoverySection,

    #[serde(default)]
    pub signing: SigningSection,

    #[serde(default)]
    pub log: LogSection,

    #[serde(default)]
    pub tools: ToolsSection,
}

/// Validated configuration. Obtain one via `ConfigFile::try_from(raw)` or
/// [`crate::config::load_and_validate`].
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub native: NativeSection,
    pub discovery: DiscoverySection,
    pub signing: SigningSection,
    pub log: LogSection,
    pub tools: ToolsSection,
}

impl ConfigFile {
    /// Wrap a raw config without running validation.
    pub fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            native: raw.native,
            discovery: raw.discovery,
            signing: raw.signing,
            log: raw.log,
            tools: raw.tools,
        }
    }

    /// Resolve a relative `[project].root` against `base` (usually the
    /// directory holding the config file).
    pub fn anchor_to(&mut self, base: &Path) {
        if self.project.root.is_relative() {
            self.project.root = base.join(&self.project.root);
        }
    }

    pub fn project_root(&self) -> &Path {
        &self.project.root
    }

    pub fn app_dir(&self) -> PathBuf {
        self.project.root.join(&self.project.app_dir)
    }

    pub fn dist_dir(&self) -> PathBuf {
        self.project.root.join(&self.project.dist_dir)
    }

    pub fn packaged_root(&self) -> PathBuf {
        self.project.root.join(&self.project.packaged_dir)
    }

    pub fn log_dir(&self) -> PathBuf {
        self.project.root.join(&self.log.dir)
    }

    /// The compiled native binary whose freshness proves a rebuild happened.
    pub fn native_artifact(&self) -> PathBuf {
        self.app_dir().join(&self.native.artifact)
    }

    /// Dependency tree copied into the package when the packaged one is
    /// incomplete.
    pub fn dependency_source(&self) -> PathBuf {
        self.app_dir().join(&self.discovery.dependency_dir)
    }
}

/// `[project]` section. Relative paths are relative to `root`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_root")]
    pub root: PathBuf,

    /// Sub-project holding the application sources and its own
    /// `package.json`.
    #[serde(default = "default_app_dir")]
    pub app_dir: PathBuf,

    #[serde(default = "default_dist_dir")]
    pub dist_dir: PathBuf,

    /// Unpacked app produced by `--dir` and consumed by `--prepackaged`.
    #[serde(default = "default_packaged_dir")]
    pub packaged_dir: PathBuf,

    /// Platform flag passed to the packaging tool (`--win`, `--mac`, ...).
    #[serde(default = "default_target")]
    pub target: String,

    /// Installer format built from the unpacked app.
    #[serde(default = "default_installer_target")]
    pub installer_target: String,

    /// Glob (relative to `dist_dir`) matching the produced installers.
    #[serde(default = "default_installer_pattern")]
    pub installer_pattern: String,

    /// Files (relative to `root`) that must exist before a build starts.
    #[serde(default = "default_required_files")]
    pub required_files: Vec<PathBuf>,
}

fn default_root() -> PathBuf {
    PathBuf::from(".")
}

fn default_app_dir() -> PathBuf {
    PathBuf::from("app")
}

fn default_dist_dir() -> PathBuf {
    PathBuf::from("dist")
}

fn default_packaged_dir() -> PathBuf {
    PathBuf::from("dist/win-unpacked")
}

fn default_target() -> String {
    "win".to_string()
}

fn default_installer_target() -> String {
    "nsis".to_string()
}

fn default_installer_pattern() -> String {
    "*.exe".to_string()
}

fn default_required_files() -> Vec<PathBuf> {
    vec![PathBuf::from("package.json"), PathBuf::from("electron/main.js")]
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            root: default_root(),
            app_dir: default_app_dir(),
            dist_dir: default_dist_dir(),
            packaged_dir: default_packaged_dir(),
            target: default_target(),
            installer_target: default_installer_target(),
            installer_pattern: default_installer_pattern(),
            required_files: default_required_files(),
        }
    }
}

/// `[native]` section: the native module rebuilt against the runtime ABI.
#[derive(Debug, Clone, Deserialize)]
pub struct NativeSection {
    #[serde(default = "default_native_module")]
    pub module: String,

    /// Compiled binary, relative to the app directory.
    #[serde(default = "default_native_artifact")]
    pub artifact: PathBuf,
}

fn default_native_module() -> String {
    "better-sqlite3".to_string()
}

fn default_native_artifact() -> PathBuf {
    PathBuf::from("node_modules/better-sqlite3/build/Release/better_sqlite3.node")
}

impl Default for NativeSection {
    fn default() -> Self {
        Self {
            module: default_native_module(),
            artifact: default_native_artifact(),
        }
    }
}

/// `[discovery]` section: how the packaged app and its dependencies are
/// located and judged complete.
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoverySection {
    /// File that marks the application root inside the package.
    #[serde(default = "default_sentinel")]
    pub sentinel: String,

    #[serde(default = "default_dependency_dir")]
    pub dependency_dir: PathBuf,

    /// Dependency whose presence means the dependency directory is complete.
    #[serde(default = "default_marker")]
    pub marker: String,

    /// Sub-path the marker must contain for the final verification.
    #[serde(default = "default_marker_contains")]
    pub marker_contains: String,
}

fn default_sentinel() -> String {
    "server.js".to_string()
}

fn default_dependency_dir() -> PathBuf {
    PathBuf::from("node_modules")
}

fn default_marker() -> String {
    "dotenv".to_string()
}

fn default_marker_contains() -> String {
    "lib".to_string()
}

impl Default for DiscoverySection {
    fn default() -> Self {
        Self {
            sentinel: default_sentinel(),
            dependency_dir: default_dependency_dir(),
            marker: default_marker(),
            marker_contains: default_marker_contains(),
        }
    }
}

/// `[signing]` section. The passphrase is deliberately not configurable
/// here; it only comes from the command line or the environment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SigningSection {
    #[serde(default)]
    pub enabled: bool,

    /// Certificate reference (`CSC_LINK`), e.g. a path to a `.pfx` file.
    #[serde(default)]
    pub certificate: Option<String>,
}

/// `[log]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct LogSection {
    /// Directory for `build_<timestamp>.log` files, relative to the project
    /// root.
    #[serde(default = "default_log_dir")]
    pub dir: PathBuf,

    /// How often the CLI drains the build log.
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_poll_interval_ms() -> u64 {
    50
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            dir: default_log_dir(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

/// `[tools]` section: program names, for wrappers or pinned installs.
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    #[serde(default = "default_node")]
    pub node: String,

    #[serde(default = "default_npm")]
    pub npm: String,

    #[serde(default = "default_npx")]
    pub npx: String,
}

fn default_node() -> String {
    "node".to_string()
}

fn default_npm() -> String {
    "npm".to_string()
}

fn default_npx() -> String {
    "npx".to_string()
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            node: default_node(),
            npm: default_npm(),
            npx: default_npx(),
        }
    }
}
