use crate::error::KdeDevError;
use dirs::config_dir;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "KDE_DEV_CONFIG";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    pub version: u32,
    pub paths: Paths,
    pub container: Container,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    /// Container home, bound by distrobox as the user's home inside the box.
    pub home_dir: PathBuf,
    /// Receives the install prefix written by kde-builder.
    pub kde_dir: PathBuf,
    /// Build configuration, relative to the invocation directory.
    pub build_config: PathBuf,
    pub x11_script: PathBuf,
    pub sessions_dir: PathBuf,
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Container {
    pub name: String,
    pub image: String,
    pub additional_packages: Vec<String>,
    pub desktop_file: PathBuf,
    pub required_tools: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: 1,
            paths: Paths::default(),
            container: Container::default(),
        }
    }
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            home_dir: PathBuf::from("/var/local/kde-dev/home"),
            kde_dir: PathBuf::from("/var/local/kde-dev/kde"),
            build_config: PathBuf::from("kde-builder.yaml"),
            x11_script: PathBuf::from("/etc/profile.d/set_tmp_x11_permissions.sh"),
            sessions_dir: PathBuf::from("/usr/share/wayland-sessions/"),
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Self {
            name: "kde-dev".to_string(),
            image: "ghcr.io/ledif/ublue-kde-dev:latest".to_string(),
            additional_packages: vec!["systemd".to_string()],
            desktop_file: PathBuf::from(
                "/usr/local/share/wayland-sessions/plasmawayland-dev6.desktop",
            ),
            required_tools: vec![
                "sudo".to_string(),
                "distrobox".to_string(),
                "podman".to_string(),
            ],
        }
    }
}

impl Paths {
    pub fn config_dir(&self) -> PathBuf {
        self.home_dir.join(".config")
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.home_dir.join(".cache")
    }

    /// Where the build configuration lands inside the container home.
    pub fn build_config_target(&self) -> PathBuf {
        let name = self
            .build_config
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("kde-builder.yaml"));
        self.config_dir().join(name)
    }
}

impl Container {
    pub fn desktop_file_name(&self) -> String {
        self.desktop_file
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "plasmawayland-dev6.desktop".to_string())
    }
}

/// Explicit `KDE_DEV_CONFIG` must exist; the per-user default is optional.
pub fn resolve_settings_path() -> Result<Option<PathBuf>, KdeDevError> {
    if let Ok(path) = env::var(CONFIG_ENV) {
        let path = PathBuf::from(path);
        if !path.exists() {
            return Err(KdeDevError::Config(format!(
                "{CONFIG_ENV} points to {}, which does not exist",
                path.display()
            )));
        }
        return Ok(Some(path));
    }
    let candidate = config_dir().map(|dir| dir.join("kde-dev/config.yaml"));
    Ok(candidate.filter(|path| path.exists()))
}

pub fn load_settings() -> Result<Settings, KdeDevError> {
    match resolve_settings_path()? {
        Some(path) => read_settings(&path),
        None => Ok(Settings::default()),
    }
}

pub fn read_settings(path: &Path) -> Result<Settings, KdeDevError> {
    let content = fs::read_to_string(path)?;
    read_settings_from_str(&content).map_err(|err| {
        KdeDevError::Config(format!("{} is invalid: {err}", path.display()))
    })
}

pub fn read_settings_from_str(content: &str) -> Result<Settings, KdeDevError> {
    let settings: Settings = serde_yaml::from_str(content)?;
    if settings.version != 1 {
        return Err(KdeDevError::Config(format!(
            "unsupported config version {}",
            settings.version
        )));
    }
    validate_settings(&settings)?;
    Ok(settings)
}

fn validate_settings(settings: &Settings) -> Result<(), KdeDevError> {
    for (field, path) in [
        ("paths.home_dir", &settings.paths.home_dir),
        ("paths.kde_dir", &settings.paths.kde_dir),
        ("paths.x11_script", &settings.paths.x11_script),
        ("paths.sessions_dir", &settings.paths.sessions_dir),
        ("container.desktop_file", &settings.container.desktop_file),
    ] {
        if !path.is_absolute() {
            return Err(KdeDevError::Config(format!(
                "{field} must be an absolute path, got {}",
                path.display()
            )));
        }
    }
    if settings.container.name.trim().is_empty() {
        return Err(KdeDevError::Config(
            "container.name must not be empty".to_string(),
        ));
    }
    if settings.container.image.trim().is_empty() {
        return Err(KdeDevError::Config(
            "container.image must not be empty".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn defaults_match_host_layout() {
        let settings = Settings::default();
        assert_eq!(
            settings.paths.home_dir,
            PathBuf::from("/var/local/kde-dev/home")
        );
        assert_eq!(
            settings.paths.kde_dir,
            PathBuf::from("/var/local/kde-dev/kde")
        );
        assert_eq!(
            settings.paths.build_config_target(),
            PathBuf::from("/var/local/kde-dev/home/.config/kde-builder.yaml")
        );
        assert_eq!(settings.container.name, "kde-dev");
        assert_eq!(
            settings.container.desktop_file_name(),
            "plasmawayland-dev6.desktop"
        );
    }

    #[test]
    fn partial_yaml_keeps_remaining_defaults() {
        let yaml = r#"
version: 1
container:
  name: kde-dev-test
"#;
        let settings = read_settings_from_str(yaml).expect("settings");
        assert_eq!(settings.container.name, "kde-dev-test");
        assert_eq!(
            settings.container.image,
            "ghcr.io/ledif/ublue-kde-dev:latest"
        );
        assert_eq!(settings.paths, Paths::default());
    }

    #[test]
    fn unknown_field_errors() {
        let yaml = r#"
version: 1
paths:
  home: /tmp/home
"#;
        assert!(read_settings_from_str(yaml).is_err());
    }

    #[test]
    fn unsupported_version_errors() {
        let err = read_settings_from_str("version: 2\n").expect_err("version 2");
        assert!(err.to_string().contains("unsupported config version 2"));
    }

    #[test]
    fn relative_home_dir_rejected() {
        let yaml = "version: 1\npaths:\n  home_dir: relative/home\n";
        let err = read_settings_from_str(yaml).expect_err("relative path");
        assert!(err.to_string().contains("paths.home_dir"));
    }

    #[test]
    fn read_settings_reports_file_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.yaml");
        fs::write(&path, "version: 1\nbogus: true\n").unwrap();
        let err = read_settings(&path).expect_err("invalid file");
        assert!(err.to_string().contains("config.yaml is invalid"));
    }
}
