use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

const CONFIG_SCHEMA_VERSION: u32 = 2;
const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
const DEFAULT_CAPTCHA_THRESHOLD: u8 = 150;
pub const DEFAULT_BASE_URL: &str = "https://www.hebgb.gov.cn";
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows; U; Windows NT 6.1; en-US) AppleWebKit/534.16 (KHTML, like Gecko) Chrome/10.0.648.133 Safari/534.16";
pub const DEFAULT_ACCEPT_LANGUAGE: &str = "zh-CN,zh;q=0.9";
pub const DEFAULT_CREDENTIALS_FILE: &str = "userinfo.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StudyConfig {
    pub schema_version: u32,
    pub base_url: String,
    pub user_agent: String,
    pub accept_language: String,
    pub credentials_path: String,
    /// `0` leaves requests unbounded.
    pub request_timeout_secs: u64,
    pub captcha: CaptchaConfig,
    pub ffprobe_path: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptchaMode {
    #[default]
    Auto,
    Tesseract,
    Manual,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptchaConfig {
    pub mode: CaptchaMode,
    pub threshold: u8,
    pub tesseract_path: String,
}

/// Values the CLI may force over the file and environment.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub credentials_path: Option<PathBuf>,
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self {
            schema_version: CONFIG_SCHEMA_VERSION,
            base_url: DEFAULT_BASE_URL.to_string(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            accept_language: DEFAULT_ACCEPT_LANGUAGE.to_string(),
            credentials_path: DEFAULT_CREDENTIALS_FILE.to_string(),
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            captcha: CaptchaConfig::default(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

impl Default for CaptchaConfig {
    fn default() -> Self {
        Self {
            mode: CaptchaMode::Auto,
            threshold: DEFAULT_CAPTCHA_THRESHOLD,
            tesseract_path: "tesseract".to_string(),
        }
    }
}

impl StudyConfig {
    pub fn load_or_init() -> Result<Self> {
        Self::load_or_init_at(&config_path())
    }

    pub fn load_or_init_at(cfg_path: &Path) -> Result<Self> {
        if cfg_path.exists() {
            let raw = fs::read_to_string(cfg_path)
                .with_context(|| format!("failed to read {}", cfg_path.display()))?;
            let mut parsed: StudyConfig = serde_json::from_str(&raw)
                .with_context(|| format!("invalid JSON in {}", cfg_path.display()))?;
            if parsed.normalize_and_migrate() {
                parsed.save_to(cfg_path)?;
            }
            Ok(parsed)
        } else {
            let cfg = StudyConfig::default();
            cfg.save_to(cfg_path)?;
            Ok(cfg)
        }
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("failed to create config directory {}", parent.display())
            })?;
        }

        let data = serde_json::to_string_pretty(self)?;
        fs::write(path, data).with_context(|| format!("failed to write {}", path.display()))?;
        Ok(())
    }

    /// Environment first, then CLI overrides on top.
    pub fn with_overrides(mut self, overrides: &Overrides) -> Self {
        if let Some(url) = env_string("HEBGB_BASE_URL") {
            self.base_url = url;
        }
        if let Some(path) = env_string("HEBGB_CREDENTIALS") {
            self.credentials_path = path;
        }
        if let Some(path) = env_string("HEBGB_FFPROBE") {
            self.ffprobe_path = path;
        }
        if let Some(path) = &overrides.credentials_path {
            self.credentials_path = path.display().to_string();
        }
        self.base_url = self.base_url.trim_end_matches('/').to_string();
        self
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_secs > 0).then(|| Duration::from_secs(self.request_timeout_secs))
    }

    pub fn credentials_file(&self) -> PathBuf {
        PathBuf::from(&self.credentials_path)
    }

    fn normalize_and_migrate(&mut self) -> bool {
        let mut changed = false;
        let defaults = StudyConfig::default();

        if self.schema_version < CONFIG_SCHEMA_VERSION {
            self.schema_version = CONFIG_SCHEMA_VERSION;
            changed = true;
        }

        for (value, fallback) in [
            (&mut self.base_url, &defaults.base_url),
            (&mut self.user_agent, &defaults.user_agent),
            (&mut self.accept_language, &defaults.accept_language),
            (&mut self.credentials_path, &defaults.credentials_path),
            (&mut self.ffprobe_path, &defaults.ffprobe_path),
            (
                &mut self.captcha.tesseract_path,
                &defaults.captcha.tesseract_path,
            ),
        ] {
            if normalize_required_string(value, fallback) {
                changed = true;
            }
        }

        let trimmed_base = self.base_url.trim_end_matches('/').to_string();
        if trimmed_base != self.base_url {
            self.base_url = trimmed_base;
            changed = true;
        }

        if self.captcha.threshold == 0 {
            self.captcha.threshold = DEFAULT_CAPTCHA_THRESHOLD;
            changed = true;
        }

        changed
    }
}

pub fn study_home() -> PathBuf {
    if let Some(custom) = env_string("HEBGB_HOME") {
        return PathBuf::from(custom);
    }

    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".hebgb-study")
}

pub fn config_path() -> PathBuf {
    study_home().join("config.json")
}

pub fn lock_path() -> PathBuf {
    study_home().join("hebgb-study.lock")
}

fn env_string(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn normalize_required_string(value: &mut String, fallback: &str) -> bool {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        *value = fallback.to_string();
        return true;
    }
    if trimmed != value {
        *value = trimmed.to_string();
        return true;
    }
    false
}
