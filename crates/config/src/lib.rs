//! Layered configuration for the cache2 tool.
//!
//! Sources, later ones overriding earlier ones:
//!
//! 1. Built-in defaults
//! 2. `config.{toml,yaml,yml,json}` in the platform config directory, or a
//!    single explicitly named file
//! 3. `CACHE2_*` environment variables (e.g. `CACHE2_PROFILE=default-release`)

pub mod error;

use crate::error::{ErrorKind, Result};
use cache2_profile::ProfilePattern;
use directories::ProjectDirs;
use exn::ResultExt;
use figment::Figment;
use figment::providers::{Env, Format as _, Json, Serialized, Toml, Yaml};
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::instrument;

const ENV_PREFIX: &str = "CACHE2_";

/// How decoded entries are written out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// One `name: value` line per field
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

impl Format {
    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Text => "text",
            Format::Json => "json",
        }
    }
}

impl Display for Format {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Format {
    type Err = crate::error::Error;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Ok(Format::Text),
            "json" => Ok(Format::Json),
            _ => exn::bail!(ErrorKind::Invalid {
                field: "format",
                value: s.to_string(),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Cache root to use instead of searching the usual locations
    pub cache_root: Option<PathBuf>,
    /// Profile folder pattern, matched as `*.<profile>`
    pub profile: String,
    pub format: Format,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            cache_root: None,
            profile: "*".to_string(),
            format: Format::default(),
        }
    }
}

impl Config {
    /// Load configuration from defaults, a config file and the environment.
    ///
    /// With `file` set, only that file is read (and it must exist);
    /// otherwise any `config.*` in the platform config directory is used.
    #[instrument]
    pub fn load(file: Option<&Path>) -> Result<Self> {
        let figment = match file {
            Some(file) => Self::defaults().merge(Self::file_provider(file)?),
            None => Self::with_default_files(Self::defaults()),
        };
        Self::extract(figment.merge(Env::prefixed(ENV_PREFIX)))
    }

    /// The profile setting, compiled.
    pub fn profile_pattern(&self) -> Result<ProfilePattern> {
        ProfilePattern::new(&self.profile).or_raise(|| ErrorKind::Invalid {
            field: "profile",
            value: self.profile.clone(),
        })
    }

    /// Platform directory searched for `config.*`.
    pub fn default_dir() -> Option<PathBuf> {
        ProjectDirs::from("", "", "cache2").map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn defaults() -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
    }

    fn with_default_files(figment: Figment) -> Figment {
        match Self::default_dir() {
            Some(dir) => figment
                .merge(Toml::file(dir.join("config.toml")))
                .merge(Yaml::file(dir.join("config.yaml")))
                .merge(Yaml::file(dir.join("config.yml")))
                .merge(Json::file(dir.join("config.json"))),
            None => figment,
        }
    }

    fn file_provider(file: &Path) -> Result<Figment> {
        if !file.is_file() {
            exn::bail!(ErrorKind::NotFound(file.to_path_buf()));
        }
        let extension = file.extension().and_then(|ext| ext.to_str()).map(str::to_lowercase);
        Ok(match extension.as_deref() {
            Some("toml") => Figment::from(Toml::file(file)),
            Some("yaml" | "yml") => Figment::from(Yaml::file(file)),
            Some("json") => Figment::from(Json::file(file)),
            _ => exn::bail!(ErrorKind::UnsupportedFile(file.to_path_buf())),
        })
    }

    fn extract(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract().or_raise(|| ErrorKind::Load)?;
        config.profile_pattern()?;
        tracing::debug!(profile = %config.profile, format = %config.format, "Loaded configuration");
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.cache_root, None);
        assert_eq!(config.profile, "*");
        assert_eq!(config.format, Format::Text);
    }

    #[rstest]
    #[case("text", Format::Text)]
    #[case("TXT", Format::Text)]
    #[case("json", Format::Json)]
    #[case("Json", Format::Json)]
    fn format_from_str(#[case] input: &str, #[case] expected: Format) {
        assert_eq!(input.parse::<Format>().unwrap(), expected);
    }

    #[test]
    fn format_from_str_invalid() {
        let err = "xml".parse::<Format>().unwrap_err();
        assert!(matches!(&*err, ErrorKind::Invalid { field: "format", .. }));
    }

    #[test]
    fn explicit_toml_file() {
        Jail::expect_with(|jail| {
            jail.create_file("cache2.toml", "profile = \"default-release\"\nformat = \"json\"\ncache_root = \"/tmp/ff\"\n")?;
            let config = Config::load(Some(Path::new("cache2.toml"))).unwrap();
            assert_eq!(config.profile, "default-release");
            assert_eq!(config.format, Format::Json);
            assert_eq!(config.cache_root.as_deref(), Some(Path::new("/tmp/ff")));
            Ok(())
        });
    }

    #[test]
    fn explicit_yaml_file_with_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("cache2.yaml", "profile: default\nformat: json\n")?;
            jail.set_env("CACHE2_PROFILE", "dev-edition-default");
            let config = Config::load(Some(Path::new("cache2.yaml"))).unwrap();
            assert_eq!(config.profile, "dev-edition-default");
            assert_eq!(config.format, Format::Json);
            Ok(())
        });
    }

    #[test]
    fn explicit_file_missing() {
        Jail::expect_with(|_| {
            let err = Config::load(Some(Path::new("nope.toml"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::NotFound(_)));
            Ok(())
        });
    }

    #[test]
    fn explicit_file_unsupported() {
        Jail::expect_with(|jail| {
            jail.create_file("cache2.ini", "profile=default")?;
            let err = Config::load(Some(Path::new("cache2.ini"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::UnsupportedFile(_)));
            Ok(())
        });
    }

    #[test]
    fn invalid_profile_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("cache2.json", r#"{"profile": "../escape"}"#)?;
            let err = Config::load(Some(Path::new("cache2.json"))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Invalid { field: "profile", .. }));
            Ok(())
        });
    }

    #[test]
    fn invalid_format_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("CACHE2_FORMAT", "xml");
            let err = Config::load(Some(&write_empty(jail))).unwrap_err();
            assert!(matches!(&*err, ErrorKind::Load));
            Ok(())
        });
    }

    fn write_empty(jail: &mut Jail) -> PathBuf {
        jail.create_file("empty.toml", "").unwrap();
        PathBuf::from("empty.toml")
    }
}
