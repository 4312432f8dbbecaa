//! Runtime settings, read from the environment (and `.env` via dotenvy).
//!
//! | Variable                  | Default             |
//! |---------------------------|---------------------|
//! | `LDIFGEN_PORT`            | `3000`              |
//! | `LDIFGEN_MAX_ERRORS`      | `100`               |
//! | `LDIFGEN_ENCODING`        | `utf-8`             |
//! | `LDIFGEN_BASE_DN`         | `dc=example,dc=com` |
//! | `LDIFGEN_SCHEMA_DIR`      | unset               |
//! | `LDIFGEN_ALLOWED_ORIGINS` | unset (any origin)  |

use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::jobs::GenerationOptions;
use crate::ldif::DEFAULT_BASE_DN;
use crate::parser::Encoding;
use crate::pipeline::DEFAULT_MAX_ERRORS;

pub const DEFAULT_PORT: u16 = 3000;

#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    pub port: u16,
    pub max_errors: usize,
    pub encoding: Encoding,
    pub base_dn: String,
    /// Extra `*.json` schemas registered at startup.
    pub schema_dir: Option<PathBuf>,
    /// CORS allow-list. Empty allows any origin.
    pub allowed_origins: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            max_errors: DEFAULT_MAX_ERRORS,
            encoding: Encoding::Utf8,
            base_dn: DEFAULT_BASE_DN.to_string(),
            schema_dir: None,
            allowed_origins: Vec::new(),
        }
    }
}

impl Settings {
    /// Load `.env` if present, then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build settings from any key lookup. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let defaults = Self::default();

        Ok(Self {
            port: parse_var("LDIFGEN_PORT", get("LDIFGEN_PORT"))?.unwrap_or(defaults.port),
            max_errors: parse_var("LDIFGEN_MAX_ERRORS", get("LDIFGEN_MAX_ERRORS"))?.unwrap_or(defaults.max_errors),
            encoding: match get("LDIFGEN_ENCODING") {
                Some(value) => value.parse().map_err(|e: crate::error::ParseError| ConfigError::InvalidValue {
                    key: "LDIFGEN_ENCODING",
                    value,
                    message: e.to_string(),
                })?,
                None => defaults.encoding,
            },
            base_dn: get("LDIFGEN_BASE_DN").unwrap_or(defaults.base_dn),
            schema_dir: get("LDIFGEN_SCHEMA_DIR").map(PathBuf::from),
            allowed_origins: get("LDIFGEN_ALLOWED_ORIGINS")
                .map(|list| {
                    list.split(',')
                        .map(str::trim)
                        .filter(|origin| !origin.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or_default(),
        })
    }

    /// Generation defaults derived from these settings.
    pub fn generation_options(&self) -> GenerationOptions {
        GenerationOptions {
            base_dn: self.base_dn.clone(),
            max_errors: self.max_errors,
            encoding: self.encoding,
            ..GenerationOptions::default()
        }
    }
}

fn parse_var<T>(key: &'static str, value: Option<String>) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value
        .map(|raw| {
            raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
                key,
                message: e.to_string(),
                value: raw,
            })
        })
        .transpose()
}
