//! Configuration for coursegen.
//!
//! [`load_and_apply`] merges XDG `config.toml` and the project `.env` into the process
//! environment with priority **existing env > .env > XDG**; [`Settings::from_env`] then
//! reads the typed settings. With the `tracing-init` feature, [`tracing_init::init`]
//! installs the shared log subscriber.

mod dotenv;
mod settings;
#[cfg(feature = "tracing-init")]
pub mod tracing_init;
mod xdg_toml;

use std::path::Path;
use thiserror::Error;

pub use settings::{
    Settings, DEFAULT_MAX_CONCURRENCY, DEFAULT_MAX_CYCLES, DEFAULT_MODEL, DEFAULT_RAG_MODE,
};

#[derive(Error, Debug)]
pub enum LoadError {
    #[error("xdg config path: {0}")]
    XdgPath(String),
    #[error("read xdg config: {0}")]
    XdgRead(std::io::Error),
    #[error("parse xdg toml: {0}")]
    XdgParse(#[from] toml::de::Error),
    #[error("read .env: {0}")]
    DotenvRead(std::io::Error),
    #[error("invalid value for {key} ({value:?}): {reason}")]
    Invalid {
        key: String,
        value: String,
        reason: String,
    },
}

/// Sets environment variables from the config sources, only for keys the process
/// environment does not already have.
///
/// For a missing key the `.env` value (current directory, or `override_dir`) is used,
/// else the value from `$XDG_CONFIG_HOME/<app_name>/config.toml`.
pub fn load_and_apply(app_name: &str, override_dir: Option<&Path>) -> Result<(), LoadError> {
    let xdg_map = xdg_toml::load_env_map(app_name)?;
    let dotenv_map = dotenv::load_env_map(override_dir).map_err(LoadError::DotenvRead)?;

    let mut merged = xdg_map;
    merged.extend(dotenv_map);
    for (key, value) in merged {
        if std::env::var_os(&key).is_none() {
            std::env::set_var(&key, value);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    fn write_xdg(root: &Path, content: &str) {
        let app_dir = root.join("coursegen");
        std::fs::create_dir_all(&app_dir).unwrap();
        std::fs::write(app_dir.join("config.toml"), content).unwrap();
    }

    #[test]
    fn existing_env_wins() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "CONFIG_TEST_EXISTING=from_dotenv\n").unwrap();
        env::set_var("CONFIG_TEST_EXISTING", "from_env");
        load_and_apply("config-crate-nonexistent-app-xyz", Some(dir.path())).unwrap();
        assert_eq!(env::var("CONFIG_TEST_EXISTING").as_deref(), Ok("from_env"));
        env::remove_var("CONFIG_TEST_EXISTING");
    }

    #[test]
    fn dotenv_only_when_no_xdg() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(".env"), "CONFIG_TEST_DOTENV_ONLY=yes\n").unwrap();
        env::remove_var("CONFIG_TEST_DOTENV_ONLY");
        load_and_apply("config-crate-nonexistent-app-xyz", Some(dir.path())).unwrap();
        assert_eq!(env::var("CONFIG_TEST_DOTENV_ONLY").as_deref(), Ok("yes"));
        env::remove_var("CONFIG_TEST_DOTENV_ONLY");
    }

    /// **Scenario**: Precedence between `.env` and XDG, typed sections, and a broken file.
    /// One test, since `XDG_CONFIG_HOME` is process-wide.
    #[test]
    fn xdg_sources_and_precedence() {
        let prev_xdg = env::var_os("XDG_CONFIG_HOME");
        let xdg_dir = tempfile::tempdir().unwrap();
        env::set_var("XDG_CONFIG_HOME", xdg_dir.path());

        write_xdg(
            xdg_dir.path(),
            "[env]\nCONFIG_TEST_PRIORITY = \"from_xdg\"\nCONFIG_TEST_XDG_ONLY = \"from_xdg\"\n\n[models]\nwriter = \"qwen-plus\"\n",
        );
        let dotenv_dir = tempfile::tempdir().unwrap();
        std::fs::write(dotenv_dir.path().join(".env"), "CONFIG_TEST_PRIORITY=from_dotenv\n").unwrap();
        for key in ["CONFIG_TEST_PRIORITY", "CONFIG_TEST_XDG_ONLY", "COURSEGEN_WRITER_MODEL"] {
            env::remove_var(key);
        }

        let applied = load_and_apply("coursegen", Some(dotenv_dir.path()));
        let priority = env::var("CONFIG_TEST_PRIORITY").ok();
        let xdg_only = env::var("CONFIG_TEST_XDG_ONLY").ok();
        let writer = env::var("COURSEGEN_WRITER_MODEL").ok();
        for key in ["CONFIG_TEST_PRIORITY", "CONFIG_TEST_XDG_ONLY", "COURSEGEN_WRITER_MODEL"] {
            env::remove_var(key);
        }

        write_xdg(xdg_dir.path(), "invalid [[[\n");
        let broken = load_and_apply("coursegen", Some(dotenv_dir.path()));

        match prev_xdg {
            Some(v) => env::set_var("XDG_CONFIG_HOME", v),
            None => env::remove_var("XDG_CONFIG_HOME"),
        }

        assert!(applied.is_ok());
        assert_eq!(priority.as_deref(), Some("from_dotenv"));
        assert_eq!(xdg_only.as_deref(), Some("from_xdg"));
        assert_eq!(writer.as_deref(), Some("qwen-plus"));
        assert!(matches!(broken, Err(LoadError::XdgParse(_))));
    }
}
