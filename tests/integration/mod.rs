//! Integration tests for php_embed_bridge
//!
//! Each test starts its own server in-process on an ephemeral port, with a
//! temporary document root. No external services are needed.
//!
//! Run with: cargo test --test integration

mod helpers;

mod bridge_isolation;
mod http_fallback;
mod http_scripted;
mod shutdown;
