use serde_json::{Map, Value, json};
use tracing::debug;

use crate::course::Course;
use crate::error::{StudyError, StudyResult};
use crate::portal::Portal;
use crate::probe::DEFAULT_SCO_REFERENCE;

/// Longest stretch of playback the tracker accepts in one report.
pub const MAX_CHUNK_SECONDS: u64 = 480;
/// Heartbeat granularity the player reports for a full chunk.
pub const FULL_CHUNK_SESSION_TIME: u64 = 30;
/// What the player reports for the trailing partial chunk, whatever its size.
pub const PARTIAL_CHUNK_SESSION_TIME: u64 = 2;

/// One progress report. Built right before submission and dropped after.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub playhead_position: u64,
    pub session_time: u64,
    pub chunk_seconds: u64,
    pub timestamp: String,
}

impl Checkpoint {
    pub fn new(playhead_position: u64, chunk_seconds: u64, timestamp: String) -> Self {
        let session_time = if chunk_seconds == MAX_CHUNK_SECONDS {
            FULL_CHUNK_SESSION_TIME
        } else {
            PARTIAL_CHUNK_SESSION_TIME
        };
        Self {
            playhead_position,
            session_time,
            chunk_seconds,
            timestamp,
        }
    }
}

/// Delivers checkpoints to the tracker. `Ok` carries the acknowledgement
/// body; any failure is a `CheckpointSubmission` error.
pub trait CheckpointTransport {
    fn submit(&mut self, course: &Course, checkpoint: &Checkpoint) -> StudyResult<String>;
}

/// The SCORM-ish blob the player posts as `serializeSco`.
pub fn serialize_sco(reference_id: &str, checkpoint: &Checkpoint) -> String {
    let mut sco = Map::new();
    sco.insert(
        reference_id.to_string(),
        json!({
            "lesson_location": checkpoint.playhead_position.to_string(),
            "session_time": checkpoint.session_time,
            "last_learn_time": checkpoint.timestamp,
        }),
    );
    sco.insert("last_study_sco".to_string(), json!(reference_id));
    Value::Object(sco).to_string()
}

pub fn seek_form(course: &Course, checkpoint: &Checkpoint) -> Vec<(&'static str, String)> {
    let reference = course
        .reference_id
        .as_deref()
        .unwrap_or(DEFAULT_SCO_REFERENCE);
    vec![
        ("id", course.course_id.clone()),
        ("serializeSco", serialize_sco(reference, checkpoint)),
        ("duration", MAX_CHUNK_SECONDS.to_string()),
        ("study_course", course.chapter_id.clone()),
    ]
}

pub struct PortalCheckpointTransport<'a> {
    portal: &'a Portal,
}

impl<'a> PortalCheckpointTransport<'a> {
    pub fn new(portal: &'a Portal) -> Self {
        Self { portal }
    }
}

impl CheckpointTransport for PortalCheckpointTransport<'_> {
    fn submit(&mut self, course: &Course, checkpoint: &Checkpoint) -> StudyResult<String> {
        let form = seek_form(course, checkpoint);
        let pairs: Vec<(&str, &str)> = form.iter().map(|(k, v)| (*k, v.as_str())).collect();
        let ack = self
            .portal
            .seek(&course.course_id, &pairs)
            .map_err(|err| {
                StudyError::CheckpointSubmission(format!(
                    "{} at {}s: {err}",
                    course.name, checkpoint.playhead_position
                ))
            })?;
        debug!(
            course = %course.course_id,
            location = checkpoint.playhead_position,
            ack = %ack.trim(),
            "checkpoint acknowledged"
        );
        Ok(ack)
    }
}
