use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::aggregate::roles::{
    RoleTypeTable, DEFAULT_HYBRID_ROLES, DEFAULT_NON_TECH_ROLES, DEFAULT_TECH_ROLES,
};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub roles: RolesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_candidates_location")]
    pub candidates: String,
    #[serde(default = "default_activity_location")]
    pub activity: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CacheConfig {
    /// Refetch the sheets once the cached report is this old. Unset means
    /// only an explicit reload refreshes it.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    #[serde(default)]
    pub seasonality_year: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RolesConfig {
    #[serde(default = "default_tech_roles")]
    pub tech: Vec<String>,
    #[serde(default = "default_non_tech_roles")]
    pub non_tech: Vec<String>,
    #[serde(default = "default_hybrid_roles")]
    pub hybrid: Vec<String>,
}

impl RolesConfig {
    pub fn table(&self) -> RoleTypeTable {
        RoleTypeTable::from_lists(&self.tech, &self.non_tech, &self.hybrid)
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub candidates: Option<String>,
    pub activity: Option<String>,
    pub seasonality_year: Option<i32>,
}

impl Config {
    pub fn default_path() -> PathBuf {
        let home = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        home.join(".config/recruitment-analytics/config.toml")
    }

    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = path
            .map(|p| p.to_path_buf())
            .unwrap_or_else(Self::default_path);
        if !path.exists() {
            return Ok(Self::default());
        }
        let data = fs::read_to_string(&path)
            .with_context(|| format!("failed reading config: {}", path.display()))?;
        let parsed: Self = toml::from_str(&data)
            .with_context(|| format!("failed parsing TOML config: {}", path.display()))?;
        Ok(parsed)
    }

    pub fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(candidates) = overrides.candidates {
            self.data.candidates = candidates;
        }
        if let Some(activity) = overrides.activity {
            self.data.activity = activity;
        }
        if let Some(year) = overrides.seasonality_year {
            self.report.seasonality_year = Some(year);
        }
    }

    pub fn write_template(path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed creating config directory: {}", parent.display())
            })?;
        }
        fs::write(path, Self::default_template())
            .with_context(|| format!("failed writing config template: {}", path.display()))
    }

    pub fn default_template() -> String {
        let quote = |items: &[&str]| {
            items
                .iter()
                .map(|item| format!("  \"{item}\","))
                .collect::<Vec<_>>()
                .join("\n")
        };
        format!(
            r#"[data]
# CSV exports of the two sheets: a local path or an http(s) URL.
candidates = "{candidates}"
activity = "{activity}"

[http]
timeout_secs = {timeout}
connect_timeout_secs = {connect}

[cache]
# max_age_secs = 3600

[report]
# seasonality_year = 2022

[server]
host = "{host}"
port = {port}

[roles]
tech = [
{tech}
]
non_tech = [
{non_tech}
]
hybrid = [
{hybrid}
]
"#,
            candidates = default_candidates_location(),
            activity = default_activity_location(),
            timeout = default_timeout_secs(),
            connect = default_connect_timeout_secs(),
            host = default_host(),
            port = default_port(),
            tech = quote(DEFAULT_TECH_ROLES),
            non_tech = quote(DEFAULT_NON_TECH_ROLES),
            hybrid = quote(DEFAULT_HYBRID_ROLES),
        )
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            candidates: default_candidates_location(),
            activity: default_activity_location(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for RolesConfig {
    fn default() -> Self {
        Self {
            tech: default_tech_roles(),
            non_tech: default_non_tech_roles(),
            hybrid: default_hybrid_roles(),
        }
    }
}

fn default_candidates_location() -> String {
    "CandidateDetails.csv".to_string()
}

fn default_activity_location() -> String {
    "RecruitingActivity.csv".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3002
}

fn owned(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn default_tech_roles() -> Vec<String> {
    owned(DEFAULT_TECH_ROLES)
}

fn default_non_tech_roles() -> Vec<String> {
    owned(DEFAULT_NON_TECH_ROLES)
}

fn default_hybrid_roles() -> Vec<String> {
    owned(DEFAULT_HYBRID_ROLES)
}
