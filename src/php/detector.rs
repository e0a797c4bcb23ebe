//! Entry point and framework detection.

use std::fmt;
use std::path::Path;

/// Entry point candidates in priority order.
pub const ENTRY_POINT_CANDIDATES: &[&str] = &[
    "public/index.php",
    "index.php",
    "app.php",
    "frontend.php",
    "main.php",
];

/// Used when no candidate exists.
pub const DEFAULT_ENTRY_POINT: &str = "index.php";

/// Find the script every request is routed to, relative to `doc_root`.
pub fn detect_entry_point(doc_root: &Path, explicit: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() && !explicit.eq_ignore_ascii_case("auto") {
        return explicit.to_string();
    }

    ENTRY_POINT_CANDIDATES
        .iter()
        .find(|c| doc_root.join(c).exists())
        .unwrap_or(&DEFAULT_ENTRY_POINT)
        .to_string()
}

/// Recognized project layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framework {
    Laravel,
    Symfony,
    WordPress,
    Drupal,
    Generic,
}

impl Framework {
    pub fn as_str(&self) -> &'static str {
        match self {
            Framework::Laravel => "laravel",
            Framework::Symfony => "symfony",
            Framework::WordPress => "wordpress",
            Framework::Drupal => "drupal",
            Framework::Generic => "generic",
        }
    }
}

impl fmt::Display for Framework {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identify the framework from marker files under `root`.
pub fn detect_framework(root: &Path) -> Framework {
    let markers: [(&str, Framework); 4] = [
        ("artisan", Framework::Laravel),
        ("bin/console", Framework::Symfony),
        ("wp-config.php", Framework::WordPress),
        ("core/lib/Drupal.php", Framework::Drupal),
    ];

    markers
        .iter()
        .find(|(marker, _)| root.join(marker).exists())
        .map(|(_, fw)| *fw)
        .unwrap_or(Framework::Generic)
}
