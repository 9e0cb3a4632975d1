//! Process-wide runtime limits, read from the environment once.

use std::sync::OnceLock;

pub const ENV_STORE_MAX_ENTRIES: &str = "BOFRT_STORE_MAX_ENTRIES";
pub const ENV_OUTPUT_MAX_BYTES: &str = "BOFRT_OUTPUT_MAX_BYTES";
pub const ENV_FORMAT_MAX_HINT: &str = "BOFRT_FORMAT_MAX_HINT";
pub const ENV_ALLOW_TOKEN_SWAP: &str = "BOFRT_ALLOW_TOKEN_SWAP";

const DEFAULT_STORE_MAX_ENTRIES: u32 = 4096;
const DEFAULT_OUTPUT_MAX_BYTES: u32 = 16 * 1024 * 1024;
const DEFAULT_FORMAT_MAX_HINT: u32 = 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RuntimeConfig {
    pub store_max_entries: u32,
    pub output_max_bytes: u32,
    /// Ceiling on capacity hints arriving over the C ABI. Builders still grow
    /// past it on demand; only the up-front reservation is capped.
    pub format_max_hint: u32,
    pub allow_token_swap: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            store_max_entries: DEFAULT_STORE_MAX_ENTRIES,
            output_max_bytes: DEFAULT_OUTPUT_MAX_BYTES,
            format_max_hint: DEFAULT_FORMAT_MAX_HINT,
            allow_token_swap: true,
        }
    }
}

impl RuntimeConfig {
    pub fn from_env() -> Self {
        let cfg = Self {
            store_max_entries: env_u32_nonzero(ENV_STORE_MAX_ENTRIES, DEFAULT_STORE_MAX_ENTRIES),
            output_max_bytes: env_u32_nonzero(ENV_OUTPUT_MAX_BYTES, DEFAULT_OUTPUT_MAX_BYTES),
            format_max_hint: env_u32_nonzero(ENV_FORMAT_MAX_HINT, DEFAULT_FORMAT_MAX_HINT),
            allow_token_swap: env_bool(ENV_ALLOW_TOKEN_SWAP, true),
        };
        log::debug!("runtime config: {cfg:?}");
        cfg
    }

    pub fn global() -> &'static RuntimeConfig {
        static GLOBAL: OnceLock<RuntimeConfig> = OnceLock::new();
        GLOBAL.get_or_init(Self::from_env)
    }

    /// Clamps a requested capacity hint to the configured ceiling.
    pub fn clamp_hint(&self, requested: usize) -> usize {
        requested.min(self.format_max_hint as usize)
    }
}

pub fn env_bool(name: &str, default: bool) -> bool {
    std::env::var(name)
        .ok()
        .and_then(|v| match v.as_str() {
            "1" | "true" | "TRUE" | "yes" | "YES" => Some(true),
            "0" | "false" | "FALSE" | "no" | "NO" => Some(false),
            _ => None,
        })
        .unwrap_or(default)
}

pub fn env_u32_nonzero(name: &str, default: u32) -> u32 {
    std::env::var(name)
        .ok()
        .and_then(|v| v.trim().parse::<u32>().ok())
        .filter(|&v| v != 0)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn defaults_without_environment() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::remove_var(ENV_STORE_MAX_ENTRIES);
        std::env::remove_var(ENV_ALLOW_TOKEN_SWAP);
        let cfg = RuntimeConfig::from_env();
        assert_eq!(cfg.store_max_entries, 4096);
        assert!(cfg.allow_token_swap);
    }

    #[test]
    fn overrides_and_rejects_garbage() {
        let _lock = ENV_LOCK.lock().unwrap();
        std::env::set_var(ENV_STORE_MAX_ENTRIES, "12");
        std::env::set_var(ENV_OUTPUT_MAX_BYTES, "0");
        std::env::set_var(ENV_FORMAT_MAX_HINT, "lots");
        std::env::set_var(ENV_ALLOW_TOKEN_SWAP, "no");
        let cfg = RuntimeConfig::from_env();
        std::env::remove_var(ENV_STORE_MAX_ENTRIES);
        std::env::remove_var(ENV_OUTPUT_MAX_BYTES);
        std::env::remove_var(ENV_FORMAT_MAX_HINT);
        std::env::remove_var(ENV_ALLOW_TOKEN_SWAP);

        assert_eq!(cfg.store_max_entries, 12);
        assert_eq!(cfg.output_max_bytes, DEFAULT_OUTPUT_MAX_BYTES);
        assert_eq!(cfg.format_max_hint, DEFAULT_FORMAT_MAX_HINT);
        assert!(!cfg.allow_token_swap);
    }

    #[test]
    fn clamp_hint() {
        let cfg = RuntimeConfig {
            format_max_hint: 10,
            ..RuntimeConfig::default()
        };
        assert_eq!(cfg.clamp_hint(4), 4);
        assert_eq!(cfg.clamp_hint(1 << 30), 10);
    }
}
