//! Profile storage: named credential/config sets under `~/.mls/`.
//!
//! Two TOML files hold one table per profile name:
//! - `~/.mls/config` - region, output format, endpoint URL
//! - `~/.mls/credentials` - API key pair, workspace id, workspace API key

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

const CONFIG_FILE: &str = "config";
const CREDENTIALS_FILE: &str = "credentials";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct ConfigSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    region: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint_url: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct CredentialsSection {
    #[serde(default, alias = "mls_apikey_id", skip_serializing_if = "Option::is_none")]
    key_id: Option<String>,
    #[serde(default, alias = "mls_apikey_secret", skip_serializing_if = "Option::is_none")]
    key_secret: Option<String>,
    #[serde(default, alias = "workspace_id", skip_serializing_if = "Option::is_none")]
    x_workspace_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x_api_key: Option<String>,
}

/// A resolved profile. Immutable once handed to a client.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Profile {
    pub name: String,
    pub key_id: String,
    pub key_secret: String,
    pub x_workspace_id: String,
    pub x_api_key: String,
    pub region: Option<String>,
    pub output: Option<String>,
    pub endpoint_url: Option<String>,
}

impl Profile {
    fn from_sections(name: &str, config: ConfigSection, credentials: CredentialsSection) -> Self {
        Self {
            name: name.to_string(),
            key_id: credentials.key_id.unwrap_or_default(),
            key_secret: credentials.key_secret.unwrap_or_default(),
            x_workspace_id: credentials.x_workspace_id.unwrap_or_default(),
            x_api_key: credentials.x_api_key.unwrap_or_default(),
            region: non_empty(config.region),
            output: non_empty(config.output),
            endpoint_url: non_empty(config.endpoint_url),
        }
    }

    fn split(&self) -> (ConfigSection, CredentialsSection) {
        (
            ConfigSection {
                region: non_empty(self.region.clone()),
                output: non_empty(self.output.clone()),
                endpoint_url: non_empty(self.endpoint_url.clone()),
            },
            CredentialsSection {
                key_id: Some(self.key_id.clone()),
                key_secret: Some(self.key_secret.clone()),
                x_workspace_id: Some(self.x_workspace_id.clone()),
                x_api_key: Some(self.x_api_key.clone()),
            },
        )
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Reads and writes the profile files in one directory.
#[derive(Debug, Clone)]
pub struct ProfileStore {
    dir: PathBuf,
}

impl ProfileStore {
    /// The store under the user's home directory (`~/.mls`).
    pub fn default_location() -> Result<Self> {
        let home = dirs::home_dir()
            .ok_or_else(|| ApiError::Config("could not determine home directory".to_string()))?;
        Ok(Self::at(home.join(".mls")))
    }

    pub fn at(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load an existing profile. A profile absent from both files is an error.
    pub fn read_profile(&self, name: &str) -> Result<Profile> {
        let mut configs: BTreeMap<String, ConfigSection> = read_toml(&self.dir.join(CONFIG_FILE))?;
        let mut credentials: BTreeMap<String, CredentialsSection> =
            read_toml(&self.dir.join(CREDENTIALS_FILE))?;

        let config = configs.remove(name);
        let creds = credentials.remove(name);
        if config.is_none() && creds.is_none() {
            return Err(ApiError::Config(format!(
                "no profile section named '{}' (run `mls configure --profile {}`)",
                name, name
            )));
        }

        Ok(Profile::from_sections(
            name,
            config.unwrap_or_default(),
            creds.unwrap_or_default(),
        ))
    }

    /// Load a profile, or an empty one with the given name if it does not exist yet.
    pub fn prepare_profile(&self, name: &str) -> Result<Profile> {
        match self.read_profile(name) {
            Ok(profile) => Ok(profile),
            Err(ApiError::Config(_)) => Ok(Profile {
                name: name.to_string(),
                ..Default::default()
            }),
            Err(e) => Err(e),
        }
    }

    /// Write a profile, keeping every other profile in the files untouched.
    pub fn save_profile(&self, profile: &Profile) -> Result<()> {
        let config_path = self.dir.join(CONFIG_FILE);
        let credentials_path = self.dir.join(CREDENTIALS_FILE);

        let mut configs: BTreeMap<String, ConfigSection> = read_toml(&config_path)?;
        let mut credentials: BTreeMap<String, CredentialsSection> = read_toml(&credentials_path)?;

        let (config, creds) = profile.split();
        configs.insert(profile.name.clone(), config);
        credentials.insert(profile.name.clone(), creds);

        fs::create_dir_all(&self.dir)?;
        write_toml(&credentials_path, &credentials)?;
        write_toml(&config_path, &configs)?;
        Ok(())
    }
}

fn read_toml<T>(path: &Path) -> Result<BTreeMap<String, T>>
where
    T: for<'de> Deserialize<'de>,
{
    if !path.exists() {
        return Ok(BTreeMap::new());
    }
    let content = fs::read_to_string(path)?;
    toml::from_str(&content)
        .map_err(|e| ApiError::Config(format!("failed to parse {}: {}", path.display(), e)))
}

fn write_toml<T: Serialize>(path: &Path, value: &BTreeMap<String, T>) -> Result<()> {
    let content = toml::to_string(value)
        .map_err(|e| ApiError::Config(format!("failed to serialize {}: {}", path.display(), e)))?;
    fs::write(path, content)?;
    Ok(())
}

/// Mask a secret, leaving only its last character visible.
pub fn mask_secret(secret: &str) -> String {
    let chars: Vec<char> = secret.chars().collect();
    match chars.last() {
        None => String::new(),
        Some(last) if chars.len() > 12 => format!("...{}{}", "*".repeat(8), last),
        Some(last) => format!("{}{}", "*".repeat(chars.len() - 1), last),
    }
}

/// Prompt for every profile field, keeping the current value on empty input.
pub fn configure_profile<R: BufRead, W: Write>(
    store: &ProfileStore,
    name: &str,
    input: &mut R,
    output: &mut W,
) -> Result<Profile> {
    let mut profile = store.prepare_profile(name)?;

    profile.key_id = prompt(input, output, "API key ID", &profile.key_id, true)?;
    profile.key_secret = prompt(input, output, "API key secret", &profile.key_secret, true)?;
    profile.x_workspace_id = prompt(input, output, "Workspace ID", &profile.x_workspace_id, true)?;
    profile.x_api_key = prompt(input, output, "Workspace API key", &profile.x_api_key, true)?;

    let region = profile.region.clone().unwrap_or_default();
    profile.region = Some(prompt(input, output, "Default region name", &region, false)?);
    let out = profile.output.clone().unwrap_or_default();
    profile.output = Some(prompt(
        input,
        output,
        "Default output format [json|text]",
        &out,
        false,
    )?);

    store.save_profile(&profile)?;
    Ok(store.read_profile(name)?)
}

fn prompt<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    label: &str,
    current: &str,
    secret: bool,
) -> Result<String> {
    let shown = if secret {
        mask_secret(current)
    } else {
        current.to_string()
    };
    write!(output, "{} [{}]: ", label, shown)?;
    output.flush()?;

    let mut line = String::new();
    input.read_line(&mut line)?;
    let entered = line.trim();
    Ok(if entered.is_empty() {
        current.to_string()
    } else {
        entered.to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use tempfile::TempDir;

    #[test]
    fn test_mask_secret() {
        assert_eq!(mask_secret(""), "");
        assert_eq!(mask_secret("abcd"), "***d");
        assert_eq!(mask_secret("0123456789abcdef"), "...********f");
    }

    #[test]
    fn test_missing_profile_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::at(dir.path());
        let err = store.read_profile("default").unwrap_err();
        assert!(matches!(err, ApiError::Config(_)));
    }

    #[test]
    fn test_legacy_field_names() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("credentials"),
            "[dev]\nmls_apikey_id = \"id\"\nmls_apikey_secret = \"secret\"\nworkspace_id = \"ws\"\nx_api_key = \"key\"\n",
        )
        .unwrap();
        fs::write(dir.path().join("config"), "[dev]\nregion = \"A100-MT\"\noutput = \"text\"\n").unwrap();

        let profile = ProfileStore::at(dir.path()).read_profile("dev").unwrap();
        assert_eq!(profile.key_id, "id");
        assert_eq!(profile.key_secret, "secret");
        assert_eq!(profile.x_workspace_id, "ws");
        assert_eq!(profile.x_api_key, "key");
        assert_eq!(profile.region.as_deref(), Some("A100-MT"));
        assert_eq!(profile.output.as_deref(), Some("text"));
        assert_eq!(profile.endpoint_url, None);
    }

    #[test]
    fn test_save_keeps_other_profiles() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::at(dir.path());
        let first = Profile {
            name: "first".to_string(),
            key_id: "a".to_string(),
            ..Default::default()
        };
        let second = Profile {
            name: "second".to_string(),
            key_id: "b".to_string(),
            region: Some("DGX2-MT".to_string()),
            ..Default::default()
        };
        store.save_profile(&first).unwrap();
        store.save_profile(&second).unwrap();

        assert_eq!(store.read_profile("first").unwrap().key_id, "a");
        assert_eq!(
            store.read_profile("second").unwrap().region.as_deref(),
            Some("DGX2-MT")
        );
    }

    #[test]
    fn test_configure_keeps_current_on_empty_input() {
        let dir = TempDir::new().unwrap();
        let store = ProfileStore::at(dir.path().join("nested"));
        store
            .save_profile(&Profile {
                name: "default".to_string(),
                key_id: "old-id".to_string(),
                key_secret: "old-secret".to_string(),
                ..Default::default()
            })
            .unwrap();

        let mut input = Cursor::new("\nnew-secret\nws\nkey\nA100-MT\njson\n");
        let mut output = Vec::new();
        let profile = configure_profile(&store, "default", &mut input, &mut output).unwrap();

        assert_eq!(profile.key_id, "old-id");
        assert_eq!(profile.key_secret, "new-secret");
        assert_eq!(profile.region.as_deref(), Some("A100-MT"));
        let prompts = String::from_utf8(output).unwrap();
        assert!(prompts.contains("API key ID [*****d]"));
    }
}
