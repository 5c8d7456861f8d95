//! Tenant and credential configuration.
//!
//! Credentials are a bearer token plus the tenant it belongs to. They can be
//! loaded from a TOML file (written by an external login flow) or from the
//! `ATLAS_API_TOKEN` / `ATLAS_TENANT` environment variables.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::error::{AtlasError, Result};

/// Environment variable holding the bearer token.
pub const TOKEN_ENV_VAR: &str = "ATLAS_API_TOKEN";
/// Environment variable selecting the tenant (defaults to `production`).
pub const TENANT_ENV_VAR: &str = "ATLAS_TENANT";

/// API credentials for one Atlas tenant.
#[derive(Debug, Deserialize, Clone)]
pub struct Credentials {
    #[serde(default = "default_tenant")]
    pub tenant: String,
    pub token: String,
}

fn default_tenant() -> String {
    "production".to_string()
}

impl Credentials {
    /// Build credentials directly from a token and tenant name.
    pub fn new(token: impl Into<String>, tenant: impl Into<String>) -> Result<Self> {
        let creds = Self {
            tenant: tenant.into(),
            token: token.into(),
        };
        creds.validate()?;
        Ok(creds)
    }

    /// Read credentials from the environment.
    pub fn from_env() -> Result<Self> {
        let token = std::env::var(TOKEN_ENV_VAR).map_err(|_| {
            AtlasError::Config(format!(
                "could not find an authorization token; set {} to authorize this client",
                TOKEN_ENV_VAR
            ))
        })?;
        let tenant = std::env::var(TENANT_ENV_VAR).unwrap_or_else(|_| default_tenant());
        Self::new(token, tenant)
    }

    /// Default credentials file location:
    /// `$XDG_CONFIG_HOME/atlas/credentials.toml` when the variable is set,
    /// otherwise `~/.config/atlas/credentials.toml`.
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = match std::env::var_os("XDG_CONFIG_HOME") {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => {
                let home = std::env::var_os("HOME").ok_or_else(|| {
                    AtlasError::Config(
                        "could not determine a home directory for the credentials file"
                            .to_string(),
                    )
                })?;
                PathBuf::from(home).join(".config")
            }
        };
        Ok(config_dir.join("atlas").join("credentials.toml"))
    }

    /// Load credentials from the default location. Written there by an
    /// external login flow.
    pub fn load_default() -> Result<Self> {
        Self::load(&Self::default_path()?)
    }

    /// Load credentials from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            AtlasError::Config(format!(
                "failed to read credentials file {}: {}",
                path.display(),
                e
            ))
        })?;
        let creds: Credentials = toml::from_str(&content)
            .map_err(|e| AtlasError::Config(format!("failed to parse credentials file: {}", e)))?;
        creds.validate()?;
        Ok(creds)
    }

    fn validate(&self) -> Result<()> {
        if self.token.is_empty() {
            return Err(AtlasError::Config(
                "authorization token must not be empty".to_string(),
            ));
        }
        match self.tenant.as_str() {
            "production" | "staging" => Ok(()),
            other => Err(AtlasError::Config(format!(
                "invalid tenant `{}`; must be production or staging",
                other
            ))),
        }
    }

    /// Base URL of the Atlas API for this tenant.
    pub fn api_base(&self) -> String {
        match self.tenant.as_str() {
            "staging" => "https://staging-api-atlas.nomic.ai".to_string(),
            _ => "https://api-atlas.nomic.ai".to_string(),
        }
    }

    /// Base URL of the Atlas web frontend (used for map links).
    pub fn web_base(&self) -> String {
        match self.tenant.as_str() {
            "staging" => "https://staging-atlas.nomic.ai".to_string(),
            _ => "https://atlas.nomic.ai".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn load_from_toml() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("credentials.toml");
        std::fs::write(&path, "tenant = \"staging\"\ntoken = \"tok-123\"\n").unwrap();

        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.tenant, "staging");
        assert_eq!(creds.token, "tok-123");
        assert_eq!(creds.api_base(), "https://staging-api-atlas.nomic.ai");
        assert_eq!(creds.web_base(), "https://staging-atlas.nomic.ai");
    }

    #[test]
    fn tenant_defaults_to_production() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("credentials.toml");
        std::fs::write(&path, "token = \"tok-123\"\n").unwrap();

        let creds = Credentials::load(&path).unwrap();
        assert_eq!(creds.tenant, "production");
        assert_eq!(creds.api_base(), "https://api-atlas.nomic.ai");
    }

    #[test]
    fn load_default_honors_xdg_config_home() {
        let tmp = tempfile::TempDir::new().unwrap();
        std::fs::create_dir_all(tmp.path().join("atlas")).unwrap();
        std::fs::write(
            tmp.path().join("atlas").join("credentials.toml"),
            "token = \"tok-xdg\"\n",
        )
        .unwrap();
        std::env::set_var("XDG_CONFIG_HOME", tmp.path());

        let path = Credentials::default_path().unwrap();
        assert_eq!(path, tmp.path().join("atlas").join("credentials.toml"));
        let creds = Credentials::load_default().unwrap();
        assert_eq!(creds.token, "tok-xdg");

        std::env::remove_var("XDG_CONFIG_HOME");
    }

    #[test]
    fn invalid_tenant_rejected() {
        let err = Credentials::new("tok", "local").unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }

    #[test]
    fn empty_token_rejected() {
        let err = Credentials::new("", "production").unwrap_err();
        assert!(matches!(err, AtlasError::Config(_)));
    }
}
