//! Project-level PHP concerns: version selection, entry point and
//! framework detection, shared extension loading.

pub mod detector;
pub mod extensions;
pub mod selector;

pub use detector::{detect_entry_point, detect_framework, Framework};
pub use extensions::{ExtensionConfig, ExtensionError, ExtensionManager};
pub use selector::{is_supported, select_version, DEFAULT_VERSION, SUPPORTED_VERSIONS};
