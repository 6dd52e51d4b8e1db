use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::captcha::CaptchaSolver;
use crate::error::{StudyError, StudyResult};
use crate::portal::Portal;
use crate::ui;

const CAPTCHA_REJECTED_MARKER: &str = "验证码错误";
const LOGIN_REJECTED_MARKER: &str = "错误";

#[derive(Deserialize)]
struct CredentialRecord {
    #[serde(default)]
    uname: String,
    #[serde(default)]
    upass: String,
}

#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Reads the first account from a `userinfo.json` style file:
/// `[{"uname": "...", "upass": "..."}]`.
pub fn load_credentials(path: &Path) -> StudyResult<Credentials> {
    let raw = fs::read_to_string(path).map_err(|err| match err.kind() {
        ErrorKind::NotFound => {
            StudyError::Credential(format!("credentials file {} not found", path.display()))
        }
        _ => StudyError::Credential(format!("cannot read {}: {err}", path.display())),
    })?;
    parse_credentials(&raw).map_err(|reason| {
        StudyError::Credential(format!("{} is malformed: {reason}", path.display()))
    })
}

fn parse_credentials(raw: &str) -> Result<Credentials, String> {
    let records: Vec<CredentialRecord> =
        serde_json::from_str(raw).map_err(|err| format!("invalid JSON ({err})"))?;
    let Some(first) = records.into_iter().next() else {
        return Err("no account entries".to_string());
    };
    let username = first.uname.trim().to_string();
    if username.is_empty() || first.upass.is_empty() {
        return Err("account entry needs both uname and upass".to_string());
    }
    Ok(Credentials {
        username,
        password: first.upass,
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginVerdict {
    Accepted,
    CaptchaRejected(String),
    CredentialsRejected(String),
}

/// The login endpoint answers with a plain message; failures mention 错误.
pub fn classify_login_response(body: &str) -> LoginVerdict {
    let message = body.trim().to_string();
    if body.contains(CAPTCHA_REJECTED_MARKER) {
        LoginVerdict::CaptchaRejected(message)
    } else if body.contains(LOGIN_REJECTED_MARKER) {
        LoginVerdict::CredentialsRejected(message)
    } else {
        LoginVerdict::Accepted
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LearnerSummary {
    pub real_name: String,
    pub year: String,
    pub required_hours: String,
    pub completed_hours: String,
    pub required_compulsory_hours: String,
    pub completed_compulsory_hours: String,
}

impl LearnerSummary {
    pub fn lines(&self) -> Vec<String> {
        vec![
            format!("- 欢迎您，{} 同志！", self.real_name),
            format!(
                "- 您 {} 年度要求总学时为 {} 学时，已完成学时 {} 学时",
                self.year, self.required_hours, self.completed_hours
            ),
            format!(
                "- 要求必修总学时为 {} 学时，已完成必修总学时 {} 学时",
                self.required_compulsory_hours, self.completed_compulsory_hours
            ),
        ]
    }
}

pub fn parse_learner_summary(body: &str) -> Option<LearnerSummary> {
    let value: Value = serde_json::from_str(body).ok()?;
    let field = |key: &str| value_text(value.get(key));
    let real_name = field("realname");
    if real_name.is_empty() {
        return None;
    }
    Some(LearnerSummary {
        real_name,
        year: field("year"),
        required_hours: field("yqzxs"),
        completed_hours: field("ywczxs"),
        required_compulsory_hours: field("yqbxxs"),
        completed_compulsory_hours: field("ywcbxxs"),
    })
}

/// Portal JSON mixes numbers and strings for the same fields.
pub(crate) fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(text)) => text.trim().to_string(),
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    }
}

/// Captcha fetch, solve, form login, then the learner summary. The summary
/// is informational; failing to read it only warns.
pub fn login(
    portal: &Portal,
    credentials: &Credentials,
    solver: &mut dyn CaptchaSolver,
) -> StudyResult<Option<LearnerSummary>> {
    ui::info("# 正在尝试获取登录验证码...");
    let image = portal
        .fetch_captcha()
        .map_err(|err| StudyError::Captcha(format!("captcha fetch failed: {err}")))?;

    ui::info(&format!("# 正在识别验证码 ({})...", solver.name()));
    let code = solver.solve(&image)?;
    ui::info(&format!("# 识别结果：{code}"));

    ui::info("# 正在尝试登录...");
    let body = portal
        .login(&credentials.username, &credentials.password, &code)
        .map_err(|err| StudyError::Authentication(format!("login request failed: {err}")))?;
    match classify_login_response(&body) {
        LoginVerdict::CaptchaRejected(message) => {
            return Err(StudyError::Authentication(format!("captcha rejected: {message}")));
        }
        LoginVerdict::CredentialsRejected(message) => {
            return Err(StudyError::Authentication(format!(
                "credentials rejected: {message}"
            )));
        }
        LoginVerdict::Accepted => debug!(username = %credentials.username, "login accepted"),
    }

    match portal.login_check() {
        Ok(body) => {
            let summary = parse_learner_summary(&body);
            if summary.is_none() {
                warn!("login check returned no learner summary");
            }
            Ok(summary)
        }
        Err(err) => {
            warn!(error = %err, "login check failed");
            Ok(None)
        }
    }
}
