use std::io::Read;

use thiserror::Error;
use tracing::debug;

use crate::config::StudyConfig;
use crate::util::epoch_millis;

const CAPTCHA_PATH: &str = "/portal/login_imgcode.do";
const LOGIN_PATH: &str = "/portal/login_ajax.do";
const LOGIN_CHECK_PATH: &str = "/portal/checkIsLogin.do";
const COURSE_LIST_PATH: &str = "/student/course_myselect.do";
const STUDY_PAGE_PATH: &str = "/portal/study_play.do";
const MANIFEST_PATH: &str = "/portal/getManifest.do";
const VIDEO_URL_PATH: &str = "/portal/getUrlBypf.do";
const SEEK_PATH: &str = "/portal/seekNew.do";
const MAX_BODY_BYTES: u64 = 4 * 1024 * 1024;

const PAGE_ACCEPT: &str = "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,image/apng,*/*;q=0.8,application/signed-exchange;v=b3;q=0.9";

#[derive(Debug, Error)]
pub enum PortalError {
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("request to {url} failed: {message}")]
    Transport { url: String, message: String },
    #[error("response from {url} exceeds {limit} bytes")]
    TooLarge { url: String, limit: u64 },
    #[error("failed to read response from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: std::io::Error,
    },
}

pub type PortalResult<T> = std::result::Result<T, PortalError>;

/// Headers for one class of request. Built at the call site and applied to
/// exactly one request; the agent itself only carries cookies, the user
/// agent and the timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    headers: Vec<(&'static str, String)>,
}

impl RequestContext {
    fn base(accept_language: &str) -> Self {
        Self {
            headers: vec![("Accept-Language", accept_language.to_string())],
        }
    }

    /// Captcha image and login form: referred from the portal front page.
    pub fn captcha(base_url: &str, accept_language: &str) -> Self {
        Self::base(accept_language).with("Referer", format!("{base_url}/index.html"))
    }

    /// Full HTML page loads.
    pub fn page(base_url: &str, referer: &str, accept_language: &str) -> Self {
        Self::base(accept_language)
            .with("Accept", PAGE_ACCEPT.to_string())
            .with("Origin", base_url.to_string())
            .with("Referer", referer.to_string())
    }

    /// Same-origin AJAX calls issued from the study page.
    pub fn xhr(referer: &str, accept_language: &str) -> Self {
        Self::base(accept_language)
            .with("Accept", "*/*".to_string())
            .with("X-Requested-With", "XMLHttpRequest".to_string())
            .with("Sec-Fetch-Dest", "empty".to_string())
            .with("Sec-Fetch-Mode", "cors".to_string())
            .with("Sec-Fetch-Site", "same-origin".to_string())
            .with("Referer", referer.to_string())
    }

    fn with(mut self, name: &'static str, value: String) -> Self {
        self.headers.retain(|(existing, _)| !existing.eq_ignore_ascii_case(name));
        self.headers.push((name, value));
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    fn apply(&self, mut request: ureq::Request) -> ureq::Request {
        for (name, value) in &self.headers {
            request = request.set(name, value);
        }
        request
    }
}

/// Blocking client for the training portal. One instance per run; the
/// login cookies live in its agent.
pub struct Portal {
    agent: ureq::Agent,
    base_url: String,
    accept_language: String,
}

impl Portal {
    pub fn new(config: &StudyConfig) -> Self {
        let mut builder = ureq::AgentBuilder::new().user_agent(&config.user_agent);
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        Self {
            agent: builder.build(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            accept_language: config.accept_language.clone(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub fn study_page_url(&self, course_id: &str) -> String {
        format!("{}?id={}", self.url(STUDY_PAGE_PATH), course_id)
    }

    pub fn fetch_captcha(&self) -> PortalResult<Vec<u8>> {
        let url = self.url(CAPTCHA_PATH);
        let ctx = RequestContext::captcha(&self.base_url, &self.accept_language);
        let response = finish(&url, ctx.apply(self.agent.get(&url)).call())?;
        read_bytes(&url, response)
    }

    pub fn login(&self, username: &str, password: &str, captcha: &str) -> PortalResult<String> {
        let url = self.url(LOGIN_PATH);
        let ctx = RequestContext::captcha(&self.base_url, &self.accept_language);
        let result = ctx.apply(self.agent.post(&url)).send_form(&[
            ("username", username),
            ("passwd", password),
            ("imgcode", captcha),
        ]);
        read_text(&url, finish(&url, result)?)
    }

    pub fn login_check(&self) -> PortalResult<String> {
        let url = self.url(LOGIN_CHECK_PATH);
        let ctx = RequestContext::captcha(&self.base_url, &self.accept_language);
        let result = ctx
            .apply(self.agent.get(&url))
            .query("_", &epoch_millis().to_string())
            .call();
        read_text(&url, finish(&url, result)?)
    }

    pub fn course_listing(&self) -> PortalResult<String> {
        let url = self.url(COURSE_LIST_PATH);
        let referer = self.url("/index.html");
        let ctx = RequestContext::page(&self.base_url, &referer, &self.accept_language);
        let result = ctx
            .apply(self.agent.get(&url))
            .query("searchType", "2")
            .query("menu", "course")
            .call();
        read_text(&url, finish(&url, result)?)
    }

    pub fn study_page(&self, course_id: &str) -> PortalResult<String> {
        let url = self.study_page_url(course_id);
        let ctx = RequestContext::page(&self.base_url, &url, &self.accept_language);
        read_text(&url, finish(&url, ctx.apply(self.agent.get(&url)).call())?)
    }

    pub fn manifest(&self, course_id: &str, is_gkk: &str) -> PortalResult<String> {
        let url = self.url(MANIFEST_PATH);
        let ctx = RequestContext::xhr(&self.study_page_url(course_id), &self.accept_language);
        let result = ctx
            .apply(self.agent.get(&url))
            .query("id", course_id)
            .query("is_gkk", is_gkk)
            .query("_", &epoch_millis().to_string())
            .call();
        read_text(&url, finish(&url, result)?)
    }

    pub fn video_url(
        &self,
        course_id: &str,
        course_no: &str,
        is_gkk: &str,
    ) -> PortalResult<String> {
        let url = self.url(VIDEO_URL_PATH);
        let ctx = RequestContext::xhr(&self.study_page_url(course_id), &self.accept_language);
        let result = ctx
            .apply(self.agent.get(&url))
            .query("path", "sco1")
            .query("fileName", "1.mp4")
            .query("course_no", course_no)
            .query("is_gkk", is_gkk)
            .query("_", &epoch_millis().to_string())
            .call();
        read_text(&url, finish(&url, result)?)
    }

    pub fn seek(&self, course_id: &str, form: &[(&str, &str)]) -> PortalResult<String> {
        let url = self.url(SEEK_PATH);
        let ctx = RequestContext::xhr(&self.study_page_url(course_id), &self.accept_language);
        let result = ctx.apply(self.agent.post(&url)).send_form(form);
        read_text(&url, finish(&url, result)?)
    }
}

fn finish(
    url: &str,
    result: std::result::Result<ureq::Response, ureq::Error>,
) -> PortalResult<ureq::Response> {
    match result {
        Ok(response) => {
            debug!(url, status = response.status(), "portal response");
            Ok(response)
        }
        Err(ureq::Error::Status(status, _)) => Err(PortalError::Status {
            url: url.to_string(),
            status,
        }),
        Err(ureq::Error::Transport(transport)) => Err(PortalError::Transport {
            url: url.to_string(),
            message: transport.to_string(),
        }),
    }
}

fn read_bytes(url: &str, response: ureq::Response) -> PortalResult<Vec<u8>> {
    read_limited(url, response.into_reader(), MAX_BODY_BYTES)
}

/// The whole body, or `TooLarge` past `limit` bytes.
fn read_limited(url: &str, reader: impl Read, limit: u64) -> PortalResult<Vec<u8>> {
    let mut bytes = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut bytes)
        .map_err(|source| PortalError::Body {
            url: url.to_string(),
            source,
        })?;
    if bytes.len() as u64 > limit {
        return Err(PortalError::TooLarge {
            url: url.to_string(),
            limit,
        });
    }
    Ok(bytes)
}

fn read_text(url: &str, response: ureq::Response) -> PortalResult<String> {
    let bytes = read_bytes(url, response)?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// A [`Portal`] aimed at a local mock server.
#[cfg(test)]
pub(crate) mod mock {
    use tokio::runtime::Runtime;
    use wiremock::{Mock, MockServer, Request};

    use super::Portal;
    use crate::config::StudyConfig;

    pub(crate) struct MockPortal {
        server: MockServer,
        runtime: Runtime,
    }

    impl MockPortal {
        pub(crate) fn start() -> Self {
            let runtime = Runtime::new().expect("tokio runtime");
            let server = runtime.block_on(MockServer::start());
            Self { server, runtime }
        }

        pub(crate) fn mount(&self, mock: Mock) {
            self.runtime.block_on(mock.mount(&self.server));
        }

        pub(crate) fn portal(&self) -> Portal {
            Portal::new(&StudyConfig {
                base_url: self.server.uri(),
                request_timeout_secs: 5,
                ..StudyConfig::default()
            })
        }

        pub(crate) fn requests(&self) -> Vec<Request> {
            self.runtime
                .block_on(self.server.received_requests())
                .unwrap_or_default()
        }
    }

    pub(crate) fn header<'a>(request: &'a Request, name: &str) -> Option<&'a str> {
        request.headers.get(name).and_then(|value| value.to_str().ok())
    }
}
