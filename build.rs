use std::env;
use std::process::Command;

fn main() {
    println!("cargo:rerun-if-changed=build.rs");
    println!("cargo:rerun-if-env-changed=PHP_CONFIG");

    // Short git hash when available, empty otherwise (e.g. Docker builds without .git)
    let build_version = Command::new("git")
        .args(["rev-parse", "--short=8", "HEAD"])
        .output()
        .ok()
        .filter(|o| o.status.success())
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();
    println!("cargo:rustc-env=BUILD_VERSION={}", build_version);

    // Only link PHP when the "php-embed" feature is enabled
    if env::var("CARGO_FEATURE_PHP_EMBED").is_err() {
        return;
    }

    // php-config for official images, php-config84 for Alpine
    let php_config = env::var("PHP_CONFIG").unwrap_or_else(|_| {
        if Command::new("php-config").arg("--version").output().is_ok() {
            "php-config".to_string()
        } else {
            "php-config84".to_string()
        }
    });

    let ldflags = Command::new(&php_config)
        .arg("--ldflags")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    let libs = Command::new(&php_config)
        .arg("--libs")
        .output()
        .map(|o| String::from_utf8_lossy(&o.stdout).trim().to_string())
        .unwrap_or_default();

    for flag in ldflags.split_whitespace() {
        if let Some(path) = flag.strip_prefix("-L") {
            println!("cargo:rustc-link-search=native={}", path);
        }
    }

    println!("cargo:rustc-link-search=native=/usr/lib");
    println!("cargo:rustc-link-search=native=/usr/local/lib");

    println!("cargo:rustc-link-lib=dylib=php");

    for flag in libs.split_whitespace() {
        if let Some(lib) = flag.strip_prefix("-l") {
            if lib != "php" {
                println!("cargo:rustc-link-lib={}", lib);
            }
        }
    }
}
