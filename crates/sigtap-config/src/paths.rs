//! Platform-specific locations of module configuration files.
//!
//! - **User**: `~/.config/sigtap/modules/` (Linux), `~/Library/Application Support/sigtap/modules/` (macOS), `%APPDATA%\sigtap\modules\` (Windows)
//! - **System**: `/etc/sigtap/modules/` (Unix), `%PROGRAMDATA%\sigtap\modules\` (Windows)

use crate::error::ConfigError;
use crate::module_config::ModuleConfig;
use std::path::PathBuf;

const APP_NAME: &str = "sigtap";
const MODULES_SUBDIR: &str = "modules";

/// Per-user module configuration directory.
///
/// Falls back to `./sigtap/modules` if the config directory cannot be
/// determined.
pub fn user_modules_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_NAME)
        .join(MODULES_SUBDIR)
}

/// System-wide module configuration directory.
pub fn system_modules_dir() -> PathBuf {
    #[cfg(unix)]
    {
        PathBuf::from("/etc").join(APP_NAME).join(MODULES_SUBDIR)
    }
    #[cfg(not(unix))]
    {
        dirs::data_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_NAME)
            .join(MODULES_SUBDIR)
    }
}

/// Find a module configuration by path or module name.
///
/// An existing file path wins. Otherwise `<name>.toml` is looked up in the
/// user directory, then the system directory.
pub fn find_module_config(name: &str) -> Option<PathBuf> {
    let path = PathBuf::from(name);
    if path.is_file() {
        return Some(path);
    }

    let filename = if name.ends_with(".toml") {
        name.to_string()
    } else {
        format!("{name}.toml")
    };

    [user_modules_dir(), system_modules_dir()]
        .into_iter()
        .map(|dir| dir.join(&filename))
        .find(|p| p.is_file())
}

/// Locate and load a module configuration.
///
/// # Errors
///
/// [`ConfigError::NotFound`] if no file matches, or any load error.
pub fn load_module_config(name: &str) -> Result<ModuleConfig, ConfigError> {
    let path = find_module_config(name).ok_or_else(|| ConfigError::NotFound(name.to_string()))?;
    ModuleConfig::load(path)
}
