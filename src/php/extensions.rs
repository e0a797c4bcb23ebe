//! Runtime loading of shared PHP extensions.
//!
//! Extensions are `<extension_dir>/<name>.so` files opened with
//! `dlopen(RTLD_NOW | RTLD_GLOBAL)` and validated by looking up the
//! `get_module` entry point every Zend extension exports.

use std::collections::BTreeMap;
use std::ffi::{CStr, CString};
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::{debug, info, warn};

/// Required and optional extension names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionConfig {
    pub required: Vec<String>,
    pub optional: Vec<String>,
}

impl ExtensionConfig {
    pub fn is_empty(&self) -> bool {
        self.required.is_empty() && self.optional.is_empty()
    }
}

/// Extension loading errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionError {
    /// `<name>.so` does not exist in the extension directory.
    NotFound { name: String, path: PathBuf },
    /// Name is empty or contains a path separator or NUL byte.
    InvalidName(String),
    /// `dlopen` failed.
    Open { name: String, message: String },
    /// The library does not export `get_module`.
    MissingEntryPoint { name: String },
}

impl fmt::Display for ExtensionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExtensionError::NotFound { name, path } => {
                write!(f, "required extension {}: not found at {}", name, path.display())
            }
            ExtensionError::InvalidName(name) => write!(f, "invalid extension name: {:?}", name),
            ExtensionError::Open { name, message } => {
                write!(f, "failed to load extension {}: {}", name, message)
            }
            ExtensionError::MissingEntryPoint { name } => {
                write!(f, "extension {} has no get_module function", name)
            }
        }
    }
}

impl std::error::Error for ExtensionError {}

/// Default extension directory for a PHP version.
pub fn default_extension_dir(version: &str) -> PathBuf {
    PathBuf::from(format!("/usr/local/lib/php/{}/extensions", version))
}

/// Loads configured extensions and remembers which ones succeeded.
///
/// Library handles are never closed; [`unload_all`](Self::unload_all) only
/// clears the bookkeeping.
#[derive(Debug)]
pub struct ExtensionManager {
    version: String,
    extension_dir: PathBuf,
    config: ExtensionConfig,
    loaded: RwLock<BTreeMap<String, PathBuf>>,
}

impl ExtensionManager {
    pub fn new(version: &str, config: ExtensionConfig) -> Self {
        Self {
            version: version.to_string(),
            extension_dir: default_extension_dir(version),
            config,
            loaded: RwLock::new(BTreeMap::new()),
        }
    }

    /// Override the extension directory.
    pub fn with_extension_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.extension_dir = dir.into();
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn extension_dir(&self) -> &Path {
        &self.extension_dir
    }

    pub fn config(&self) -> &ExtensionConfig {
        &self.config
    }

    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<String, PathBuf>> {
        self.loaded.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<String, PathBuf>> {
        self.loaded.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Load every configured extension.
    ///
    /// Stops at the first required extension that fails. Optional
    /// extensions that fail are logged and skipped.
    pub fn load_extensions(&self) -> Result<(), ExtensionError> {
        for name in &self.config.required {
            self.load_extension(name)?;
        }

        for name in &self.config.optional {
            if let Err(e) = self.load_extension(name) {
                warn!(extension = %name, error = %e, "Optional extension not available");
            }
        }

        let loaded = self.loaded_extensions();
        if !loaded.is_empty() {
            info!(extensions = ?loaded, dir = %self.extension_dir.display(), "PHP extensions loaded");
        }
        Ok(())
    }

    /// Load a single extension by name. Already-loaded names are a no-op.
    pub fn load_extension(&self, name: &str) -> Result<(), ExtensionError> {
        if name.is_empty() || name.contains(['/', '\\', '\0']) {
            return Err(ExtensionError::InvalidName(name.to_string()));
        }
        if self.is_loaded(name) {
            return Ok(());
        }

        let path = self.extension_dir.join(format!("{}.so", name));
        if !path.is_file() {
            return Err(ExtensionError::NotFound {
                name: name.to_string(),
                path,
            });
        }

        open_extension(name, &path)?;
        debug!(extension = %name, path = %path.display(), "Extension opened");

        self.write().insert(name.to_string(), path);
        Ok(())
    }

    pub fn is_loaded(&self, name: &str) -> bool {
        self.read().contains_key(name)
    }

    /// Loaded extension names, sorted.
    pub fn loaded_extensions(&self) -> Vec<String> {
        self.read().keys().cloned().collect()
    }

    /// Forget every loaded extension.
    pub fn unload_all(&self) {
        self.write().clear();
    }
}

/// dlopen the library and check for `get_module`.
fn open_extension(name: &str, path: &Path) -> Result<(), ExtensionError> {
    let open_err = |message: String| ExtensionError::Open {
        name: name.to_string(),
        message,
    };

    let c_path = CString::new(path.as_os_str().as_encoded_bytes())
        .map_err(|_| ExtensionError::InvalidName(name.to_string()))?;

    // SAFETY: c_path is a valid NUL-terminated string; the returned handle
    // is either null or owned by the dynamic loader for the process lifetime.
    let handle = unsafe { libc::dlopen(c_path.as_ptr(), libc::RTLD_NOW | libc::RTLD_GLOBAL) };
    if handle.is_null() {
        return Err(open_err(last_dl_error()));
    }

    // SAFETY: handle is a live handle from dlopen above; the symbol name is a
    // static NUL-terminated string.
    let symbol = unsafe { libc::dlsym(handle, c"get_module".as_ptr()) };
    if symbol.is_null() {
        // SAFETY: handle came from dlopen and nothing from it is in use.
        unsafe { libc::dlclose(handle) };
        return Err(ExtensionError::MissingEntryPoint {
            name: name.to_string(),
        });
    }

    Ok(())
}

fn last_dl_error() -> String {
    // SAFETY: dlerror returns null or a thread-local NUL-terminated string.
    let err = unsafe { libc::dlerror() };
    if err.is_null() {
        return "unknown dlopen error".to_string();
    }
    // SAFETY: non-null pointer from dlerror, valid until the next dl* call.
    unsafe { CStr::from_ptr(err) }.to_string_lossy().into_owned()
}
