use std::process::{Command, Stdio};

use scraper::Html;
use serde_json::Value;
use tracing::debug;

use crate::auth::value_text;
use crate::course::{Course, selector};
use crate::error::{StudyError, StudyResult};
use crate::portal::Portal;

/// SCO key the portal's player reports progress under. Every course is
/// packaged as a single `sco1` resource.
pub const DEFAULT_SCO_REFERENCE: &str = "res01";

/// What a course needs before its progress can be simulated.
/// `duration_seconds == 0` means the video length could not be determined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub duration_seconds: u64,
    pub reference_id: String,
}

pub trait DurationResolver {
    fn resolve(&mut self, course: &Course) -> StudyResult<ResolvedMedia>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyPageFields {
    pub course_id: String,
    pub is_gkk: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    pub course_no: String,
    pub is_gkk: String,
}

pub fn parse_study_page(html: &str) -> Option<StudyPageFields> {
    let doc = Html::parse_document(html);
    let hidden = |id: &str| {
        let sel = selector(&format!("input[type=\"hidden\"]#{id}"))?;
        doc.select(&sel)
            .next()
            .map(|input| input.value().attr("value").unwrap_or_default().trim().to_string())
    };
    let course_id = hidden("course_id").filter(|value| !value.is_empty())?;
    Some(StudyPageFields {
        course_id,
        is_gkk: hidden("is_gkk").unwrap_or_default(),
    })
}

pub fn parse_manifest(body: &str) -> Option<Manifest> {
    let value: Value = serde_json::from_str(body).ok()?;
    let course_no = value_text(value.get("course_no"));
    if course_no.is_empty() {
        return None;
    }
    Some(Manifest {
        course_no,
        is_gkk: value_text(value.get("is_gkk")),
    })
}

/// Whole seconds of the first video stream in `ffprobe -show_streams` JSON;
/// `0` when there is no video stream or its duration is not a number.
pub fn parse_ffprobe_duration(json: &str) -> u64 {
    let Ok(value) = serde_json::from_str::<Value>(json) else {
        return 0;
    };
    let Some(streams) = value.get("streams").and_then(Value::as_array) else {
        return 0;
    };
    let Some(video) = streams
        .iter()
        .find(|stream| stream.get("codec_type").and_then(Value::as_str) == Some("video"))
    else {
        return 0;
    };
    let seconds = match video.get("duration") {
        Some(Value::String(text)) => text.trim().parse::<f64>().ok(),
        Some(Value::Number(number)) => number.as_f64(),
        _ => None,
    };
    match seconds {
        Some(secs) if secs.is_finite() && secs > 0.0 => secs.trunc() as u64,
        _ => 0,
    }
}

pub struct FfprobeProber {
    program: String,
}

impl FfprobeProber {
    pub fn new(program: &str) -> Self {
        Self {
            program: program.to_string(),
        }
    }

    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("-version")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .map(|s| s.success())
            .unwrap_or(false)
    }

    pub fn probe_duration(&self, media_url: &str) -> StudyResult<u64> {
        let output = Command::new(&self.program)
            .args(["-v", "error", "-print_format", "json", "-show_streams"])
            .arg(media_url)
            .stdin(Stdio::null())
            .output()
            .map_err(|err| {
                StudyError::CourseAcquisition(format!("failed to run {}: {err}", self.program))
            })?;
        if !output.status.success() {
            return Err(StudyError::CourseAcquisition(format!(
                "{} could not open {media_url}: {}",
                self.program,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(parse_ffprobe_duration(&String::from_utf8_lossy(&output.stdout)))
    }
}

/// Study page, manifest, video URL, then a media probe of that URL.
pub struct PortalDurationResolver<'a> {
    portal: &'a Portal,
    prober: FfprobeProber,
}

impl<'a> PortalDurationResolver<'a> {
    pub fn new(portal: &'a Portal, prober: FfprobeProber) -> Self {
        Self { portal, prober }
    }
}

impl DurationResolver for PortalDurationResolver<'_> {
    fn resolve(&mut self, course: &Course) -> StudyResult<ResolvedMedia> {
        let acquisition = |step: &str, err: &dyn std::fmt::Display| {
            StudyError::CourseAcquisition(format!("{} ({step}): {err}", course.name))
        };

        let page = self
            .portal
            .study_page(&course.course_id)
            .map_err(|err| acquisition("study page", &err))?;
        let fields = parse_study_page(&page).ok_or_else(|| {
            StudyError::CourseAcquisition(format!("{}: study page has no course_id", course.name))
        })?;

        let body = self
            .portal
            .manifest(&fields.course_id, &fields.is_gkk)
            .map_err(|err| acquisition("manifest", &err))?;
        let manifest = parse_manifest(&body).ok_or_else(|| {
            StudyError::CourseAcquisition(format!("{}: manifest has no course_no", course.name))
        })?;
        debug!(course_no = %manifest.course_no, is_gkk = %manifest.is_gkk, "manifest resolved");

        let video_url = self
            .portal
            .video_url(&fields.course_id, &manifest.course_no, &manifest.is_gkk)
            .map_err(|err| acquisition("video url", &err))?
            .trim()
            .to_string();
        if video_url.is_empty() {
            return Err(StudyError::CourseAcquisition(format!(
                "{}: portal returned an empty video url",
                course.name
            )));
        }

        let duration_seconds = self.prober.probe_duration(&video_url)?;
        debug!(%video_url, duration_seconds, "video probed");
        Ok(ResolvedMedia {
            duration_seconds,
            reference_id: DEFAULT_SCO_REFERENCE.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::portal::mock::MockPortal;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, ResponseTemplate};

    const STUDY_PAGE: &str = r#"<form>
        <input type="hidden" id="course_id" value="9001"/>
        <input type="hidden" id="is_gkk" value="0"/>
    </form>"#;

    /// Mounts the study page, manifest and video url steps; `failing` gets
    /// a 500 instead.
    fn handshake(failing: Option<&str>) -> MockPortal {
        let mock = MockPortal::start();
        let steps = [
            ("/portal/study_play.do", STUDY_PAGE),
            ("/portal/getManifest.do", r#"{"course_no":"CN42","is_gkk":"0"}"#),
            ("/portal/getUrlBypf.do", "https://cdn.test/sco1/1.mp4\n"),
        ];
        for (step, body) in steps {
            let response = if failing == Some(step) {
                ResponseTemplate::new(500)
            } else {
                ResponseTemplate::new(200).set_body_string(body)
            };
            mock.mount(Mock::given(method("GET")).and(path(step)).respond_with(response));
        }
        mock
    }

    fn resolve_with(mock: &MockPortal, ffprobe: &str) -> StudyResult<ResolvedMedia> {
        let portal = mock.portal();
        let mut resolver = PortalDurationResolver::new(&portal, FfprobeProber::new(ffprobe));
        resolver.resolve(&Course::new("C1", "9001", "2001"))
    }

    #[cfg(unix)]
    fn fake_ffprobe(dir: &std::path::Path, output: &str) -> String {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.join("ffprobe");
        std::fs::write(&script, format!("#!/bin/sh\ncat <<'JSON'\n{output}\nJSON\n"))
            .expect("write script");
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755))
            .expect("chmod");
        script.display().to_string()
    }

    #[test]
    fn failing_handshake_step_is_an_acquisition_error() {
        for (step, label) in [
            ("/portal/study_play.do", "study page"),
            ("/portal/getManifest.do", "manifest"),
            ("/portal/getUrlBypf.do", "video url"),
        ] {
            let mock = handshake(Some(step));
            let err = resolve_with(&mock, "hebgb-no-such-ffprobe-binary").expect_err(step);
            assert!(
                matches!(err, StudyError::CourseAcquisition(ref msg) if msg.contains(label)),
                "{step}: {err}"
            );
        }
    }

    #[test]
    fn handshake_passes_ids_between_steps() {
        let mock = MockPortal::start();
        mock.mount(
            Mock::given(method("GET"))
                .and(path("/portal/study_play.do"))
                .and(query_param("id", "9001"))
                .respond_with(ResponseTemplate::new(200).set_body_string(STUDY_PAGE)),
        );
        mock.mount(
            Mock::given(method("GET"))
                .and(path("/portal/getManifest.do"))
                .and(query_param("id", "9001"))
                .and(query_param("is_gkk", "0"))
                .respond_with(
                    ResponseTemplate::new(200).set_body_string(r#"{"course_no":"CN42","is_gkk":"0"}"#),
                ),
        );
        mock.mount(
            Mock::given(method("GET"))
                .and(path("/portal/getUrlBypf.do"))
                .and(query_param("path", "sco1"))
                .and(query_param("fileName", "1.mp4"))
                .and(query_param("course_no", "CN42"))
                .respond_with(ResponseTemplate::new(200).set_body_string("   ")),
        );

        let err = resolve_with(&mock, "hebgb-no-such-ffprobe-binary").expect_err("empty url");
        assert!(
            matches!(err, StudyError::CourseAcquisition(ref msg) if msg.contains("empty video url")),
            "{err}"
        );
    }

    #[test]
    fn missing_ffprobe_after_handshake_is_an_acquisition_error() {
        let mock = handshake(None);
        let err = resolve_with(&mock, "hebgb-no-such-ffprobe-binary").expect_err("no ffprobe");
        assert!(matches!(err, StudyError::CourseAcquisition(_)), "{err}");
    }

    #[cfg(unix)]
    #[test]
    fn ffprobe_duration_flows_back_from_the_chain() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let ffprobe = fake_ffprobe(
            tmp.path(),
            r#"{"streams":[{"codec_type":"video","duration":"1234.5"}]}"#,
        );
        let media = resolve_with(&handshake(None), &ffprobe).expect("resolved");
        assert_eq!(media.duration_seconds, 1234);
        assert_eq!(media.reference_id, DEFAULT_SCO_REFERENCE);
    }

    #[cfg(unix)]
    #[test]
    fn audio_only_media_resolves_to_zero_not_an_error() {
        let tmp = tempfile::TempDir::new().expect("temp dir");
        let ffprobe = fake_ffprobe(
            tmp.path(),
            r#"{"streams":[{"codec_type":"audio","duration":"60.0"}]}"#,
        );
        let media = resolve_with(&handshake(None), &ffprobe).expect("resolved");
        assert_eq!(media.duration_seconds, 0);
    }

    #[test]
    fn study_page_hidden_inputs() {
        let html = r#"<form>
            <input type="hidden" id="course_id" value=" 9001 "/>
            <input type="hidden" id="is_gkk" value="0"/>
        </form>"#;
        let fields = parse_study_page(html).expect("fields");
        assert_eq!(fields.course_id, "9001");
        assert_eq!(fields.is_gkk, "0");
    }

    #[test]
    fn study_page_without_course_id_is_rejected() {
        assert_eq!(parse_study_page("<html></html>"), None);
        let html = r#"<input type="hidden" id="course_id" value=""/>"#;
        assert_eq!(parse_study_page(html), None);
    }

    #[test]
    fn study_page_missing_flag_defaults_empty() {
        let html = r#"<input type="hidden" id="course_id" value="5"/>"#;
        assert_eq!(parse_study_page(html).expect("fields").is_gkk, "");
    }

    #[test]
    fn manifest_numbers_and_strings() {
        let manifest = parse_manifest(r#"{"course_no":123456,"is_gkk":"1"}"#).expect("manifest");
        assert_eq!(manifest.course_no, "123456");
        assert_eq!(manifest.is_gkk, "1");
        assert_eq!(parse_manifest(r#"{"is_gkk":"1"}"#), None);
        assert_eq!(parse_manifest("error"), None);
    }

    #[test]
    fn ffprobe_video_stream_duration_is_truncated() {
        let json = r#"{"streams":[
            {"codec_type":"audio","duration":"9999.0"},
            {"codec_type":"video","duration":"1234.987"}
        ]}"#;
        assert_eq!(parse_ffprobe_duration(json), 1234);
    }

    #[test]
    fn ffprobe_without_usable_video_is_zero() {
        for json in [
            r#"{"streams":[{"codec_type":"audio","duration":"10"}]}"#,
            r#"{"streams":[{"codec_type":"video"}]}"#,
            r#"{"streams":[{"codec_type":"video","duration":"N/A"}]}"#,
            r#"{"streams":[]}"#,
            "garbage",
        ] {
            assert_eq!(parse_ffprobe_duration(json), 0, "{json}");
        }
    }

    #[test]
    fn missing_ffprobe_is_an_acquisition_error() {
        let prober = FfprobeProber::new("hebgb-no-such-ffprobe-binary");
        assert!(!prober.is_available());
        let err = prober.probe_duration("https://portal.test/1.mp4").expect_err("no binary");
        assert!(matches!(err, StudyError::CourseAcquisition(_)));
    }
}
