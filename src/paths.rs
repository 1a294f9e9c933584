//! Where zlink keeps its files
//!
//! Both directories resolve the same way, first match wins:
//!
//! | | config (`config.toml`) | state (`state.toml`) |
//! |---|---|---|
//! | override | `ZLINK_CONFIG_DIR` | `ZLINK_STATE_DIR` |
//! | XDG | `$XDG_CONFIG_HOME/zlink` | `$XDG_STATE_HOME/zlink` |
//! | default | `~/.config/zlink` | `~/.local/state/zlink` |
//!
//! Empty variables are ignored. `--config` replaces the config file path
//! outright.

use anyhow::{Context, Result};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

pub const ENV_CONFIG_DIR: &str = "ZLINK_CONFIG_DIR";
pub const ENV_STATE_DIR: &str = "ZLINK_STATE_DIR";

const APP_DIR: &str = "zlink";
const CONFIG_FILE: &str = "config.toml";
const STATE_FILE: &str = "state.toml";

/// One row of the resolution table above
struct DirRule {
    override_var: &'static str,
    xdg_var: &'static str,
    home_relative: &'static [&'static str],
}

const CONFIG_DIR: DirRule = DirRule {
    override_var: ENV_CONFIG_DIR,
    xdg_var: "XDG_CONFIG_HOME",
    home_relative: &[".config"],
};

const STATE_DIR: DirRule = DirRule {
    override_var: ENV_STATE_DIR,
    xdg_var: "XDG_STATE_HOME",
    home_relative: &[".local", "state"],
};

impl DirRule {
    fn resolve(&self) -> Result<PathBuf> {
        if let Some(dir) = env_value(self.override_var) {
            let path = expand(&dir);
            log::debug!("{} -> {}", self.override_var, path.display());
            return Ok(path);
        }

        let base = match env_value(self.xdg_var) {
            Some(xdg) => PathBuf::from(xdg),
            None => {
                let home = dirs::home_dir().context("Could not determine home directory")?;
                self.home_relative.iter().fold(home, |path, part| path.join(part))
            }
        };
        Ok(base.join(APP_DIR))
    }
}

fn env_value(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

pub fn config_dir() -> Result<PathBuf> {
    CONFIG_DIR.resolve()
}

pub fn state_dir() -> Result<PathBuf> {
    STATE_DIR.resolve()
}

/// Config file path, honoring a `--config` override
pub fn config_file(override_path: Option<&Path>) -> Result<PathBuf> {
    match override_path {
        Some(path) => Ok(expand(&path.to_string_lossy())),
        None => Ok(config_dir()?.join(CONFIG_FILE)),
    }
}

pub fn state_file() -> Result<PathBuf> {
    Ok(state_dir()?.join(STATE_FILE))
}

/// Expand `~` and `$VARS`; an unknown variable leaves the path as written
pub fn expand(path: &str) -> PathBuf {
    let expanded = shellexpand::full(path).unwrap_or(Cow::Borrowed(path));
    PathBuf::from(expanded.as_ref())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    /// Run `f` with `vars` set (`Some`) or removed (`None`), then restore them.
    ///
    /// Each variable is touched by a single test only, so parallel tests
    /// never observe each other's values.
    fn with_env<R>(vars: &[(&str, Option<&str>)], f: impl FnOnce() -> R) -> R {
        let saved: Vec<(&str, Option<String>)> =
            vars.iter().map(|(key, _)| (*key, env::var(key).ok())).collect();
        for (key, value) in vars {
            // SAFETY: no other test reads or writes this variable
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
        let result = f();
        for (key, value) in saved {
            // SAFETY: as above
            unsafe {
                match value {
                    Some(v) => env::set_var(key, v),
                    None => env::remove_var(key),
                }
            }
        }
        result
    }

    #[test]
    fn test_config_dir_override() {
        with_env(&[(ENV_CONFIG_DIR, Some("/srv/zlink"))], || {
            assert_eq!(config_dir().unwrap(), PathBuf::from("/srv/zlink"));
            assert_eq!(
                config_file(None).unwrap(),
                PathBuf::from("/srv/zlink/config.toml")
            );
        });

        let home = dirs::home_dir().unwrap();
        with_env(&[(ENV_CONFIG_DIR, Some("~/ops/zlink"))], || {
            assert_eq!(config_dir().unwrap(), home.join("ops").join("zlink"));
        });

        with_env(&[(ENV_CONFIG_DIR, Some("  "))], || {
            assert_ne!(config_dir().unwrap(), PathBuf::from("  "));
        });
    }

    #[test]
    fn test_state_dir_falls_back_to_xdg() {
        with_env(
            &[(ENV_STATE_DIR, None), ("XDG_STATE_HOME", Some("/var/lib/xdg"))],
            || {
                assert_eq!(state_dir().unwrap(), PathBuf::from("/var/lib/xdg/zlink"));
                assert_eq!(
                    state_file().unwrap(),
                    PathBuf::from("/var/lib/xdg/zlink/state.toml")
                );
            },
        );
    }

    #[test]
    fn test_config_file_override_wins() {
        let path = Path::new("/etc/zlink/prod.toml");
        assert_eq!(config_file(Some(path)).unwrap(), path);
    }

    #[test]
    fn test_expand() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(expand("~/zlink/state.toml"), home.join("zlink").join("state.toml"));
        assert_eq!(expand("/etc/zlink"), PathBuf::from("/etc/zlink"));
    }
}
