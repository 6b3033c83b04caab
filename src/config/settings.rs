// src/config/settings.rs
//! Typed extraction of the configuration keys this core recognizes,
//! read out of an [`super::ini::IniContext`].

use super::ini::IniContext;
use crate::error::{CoreError, CoreResult};

/// The subset of a tracker/storage `.conf` file the network I/O core
/// itself consumes. Anything else in the file (storage paths, replication
/// settings, HTTP server options beyond anti-steal) belongs to the
/// application layer above this core, and is left in the [`IniContext`]
/// for it to read directly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    /// Capacity of the task pool (`max_connections`).
    pub max_connections: usize,
    /// Task data-buffer floor (`min_buff_size`).
    pub min_buff_size: usize,
    /// Task data-buffer ceiling (`max_buff_size`).
    pub max_buff_size: usize,
    /// Number of I/O worker threads (`work_threads`).
    pub work_threads: usize,
    /// Outbound connect timeout, seconds (`connect_timeout`).
    pub connect_timeout_secs: u64,
    /// Idle/read/write timeout, seconds (`network_timeout`).
    pub network_timeout_secs: u64,
    /// Anti-leech token TTL, seconds (`http.anti_steal.token_ttl`), if the
    /// anti-steal feature is configured at all.
    pub anti_steal_token_ttl: Option<u64>,
    /// Anti-leech secret key (`http.anti_steal.secret_key`).
    pub anti_steal_secret_key: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            max_connections: 256,
            min_buff_size: 8 * 1024,
            max_buff_size: 256 * 1024,
            work_threads: 4,
            connect_timeout_secs: 5,
            network_timeout_secs: 30,
            anti_steal_token_ttl: None,
            anti_steal_secret_key: None,
        }
    }
}

fn parse_usize(ctx: &IniContext, key: &str, default: usize) -> CoreResult<usize> {
    match ctx.get_global(key) {
        Some(v) => v
            .parse::<usize>()
            .map_err(|_| CoreError::InvalidArgument(format!("{key} = {v:?} is not a non-negative integer"))),
        None => Ok(default),
    }
}

fn parse_u64(ctx: &IniContext, key: &str, default: u64) -> CoreResult<u64> {
    match ctx.get_global(key) {
        Some(v) => v
            .parse::<u64>()
            .map_err(|_| CoreError::InvalidArgument(format!("{key} = {v:?} is not a non-negative integer"))),
        None => Ok(default),
    }
}

impl Settings {
    /// Extracts recognized keys from `ctx`, falling back to [`Settings::default`]
    /// for anything absent. Fails with `InvalidArgument` on a malformed value
    /// or an inconsistent `min_buff_size`/`max_buff_size` pair — configuration
    /// errors at init are fatal to the process, so the caller should
    /// propagate this straight out of `main`.
    pub fn from_ini(ctx: &IniContext) -> CoreResult<Self> {
        let defaults = Self::default();
        let settings = Self {
            max_connections: parse_usize(ctx, "max_connections", defaults.max_connections)?,
            min_buff_size: parse_usize(ctx, "min_buff_size", defaults.min_buff_size)?,
            max_buff_size: parse_usize(ctx, "max_buff_size", defaults.max_buff_size)?,
            work_threads: parse_usize(ctx, "work_threads", defaults.work_threads)?,
            connect_timeout_secs: parse_u64(ctx, "connect_timeout", defaults.connect_timeout_secs)?,
            network_timeout_secs: parse_u64(ctx, "network_timeout", defaults.network_timeout_secs)?,
            anti_steal_token_ttl: match ctx.get_global("http.anti_steal.token_ttl") {
                Some(v) => Some(
                    v.parse::<u64>()
                        .map_err(|_| CoreError::InvalidArgument(format!("http.anti_steal.token_ttl = {v:?} is not an integer")))?,
                ),
                None => None,
            },
            anti_steal_secret_key: ctx.get_global("http.anti_steal.secret_key").map(str::to_string),
        };

        if settings.max_connections == 0 {
            return Err(CoreError::InvalidArgument("max_connections must be > 0".into()));
        }
        if settings.min_buff_size == 0 {
            return Err(CoreError::InvalidArgument("min_buff_size must be > 0".into()));
        }
        if settings.max_buff_size < settings.min_buff_size {
            return Err(CoreError::InvalidArgument(
                "max_buff_size must be >= min_buff_size".into(),
            ));
        }
        if settings.work_threads == 0 {
            return Err(CoreError::InvalidArgument("work_threads must be > 0".into()));
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_when_keys_absent() {
        let ctx = IniContext::new();
        let settings = Settings::from_ini(&ctx).unwrap();
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn recognized_keys_override_defaults() {
        let ctx = IniContext::parse(
            "max_connections = 1000\nmin_buff_size = 4096\nmax_buff_size = 4096\nwork_threads = 8\nconnect_timeout = 10\nnetwork_timeout = 60\nhttp.anti_steal.token_ttl = 600\nhttp.anti_steal.secret_key = topsecret\n",
        )
        .unwrap();
        let settings = Settings::from_ini(&ctx).unwrap();
        assert_eq!(settings.max_connections, 1000);
        assert_eq!(settings.min_buff_size, 4096);
        assert_eq!(settings.max_buff_size, 4096);
        assert_eq!(settings.work_threads, 8);
        assert_eq!(settings.connect_timeout_secs, 10);
        assert_eq!(settings.network_timeout_secs, 60);
        assert_eq!(settings.anti_steal_token_ttl, Some(600));
        assert_eq!(settings.anti_steal_secret_key.as_deref(), Some("topsecret"));
    }

    #[test]
    fn rejects_max_buff_size_below_min() {
        let ctx = IniContext::parse("min_buff_size = 8192\nmax_buff_size = 1024\n").unwrap();
        assert!(Settings::from_ini(&ctx).is_err());
    }

    #[test]
    fn rejects_zero_max_connections() {
        let ctx = IniContext::parse("max_connections = 0\n").unwrap();
        assert!(Settings::from_ini(&ctx).is_err());
    }

    #[test]
    fn rejects_non_integer_value() {
        let ctx = IniContext::parse("work_threads = four\n").unwrap();
        assert!(Settings::from_ini(&ctx).is_err());
    }
}
