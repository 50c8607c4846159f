//! HTTP API: JSON routes over the sharded inventory catalog.

pub mod app;

/// Environment variable holding the listen address.
pub const BIND_ENV: &str = "SHARDCAT_BIND";

pub const DEFAULT_BIND: &str = "0.0.0.0:8080";
