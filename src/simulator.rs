//! Replays a course's playback as a series of checkpoint reports.
//!
//! The duration is cut into chunks of at most [`MAX_CHUNK_SECONDS`]; each
//! chunk is preceded by a short pause and reported at the playhead position
//! where it starts. The first failed report ends the course.

use std::thread;
use std::time::Duration;

use crate::checkpoint::{Checkpoint, CheckpointTransport, MAX_CHUNK_SECONDS};
use crate::course::Course;
use crate::error::StudyResult;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::util::now_local;

/// Pause before a full chunk, in pacer units.
pub const FULL_CHUNK_PAUSE: u64 = 3;
/// Pause before the trailing partial chunk, in pacer units.
pub const PARTIAL_CHUNK_PAUSE: u64 = 2;

/// Blocking delay source. Production sleeps whole seconds.
pub trait Pacer {
    fn pause(&mut self, units: u64);
}

#[derive(Debug, Default)]
pub struct SleepPacer;

impl Pacer for SleepPacer {
    fn pause(&mut self, units: u64) {
        thread::sleep(Duration::from_secs(units));
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SimulationReport {
    pub checkpoints: usize,
    pub seconds_reported: u64,
}

/// Chunk sizes for `duration_seconds`: full chunks, then the remainder.
pub fn plan_chunks(duration_seconds: u64) -> Vec<u64> {
    let mut chunks = Vec::new();
    let mut remaining = duration_seconds;
    while remaining > 0 {
        let chunk = remaining.min(MAX_CHUNK_SECONDS);
        chunks.push(chunk);
        remaining -= chunk;
    }
    chunks
}

pub fn simulate(
    course: &Course,
    duration_seconds: u64,
    transport: &mut dyn CheckpointTransport,
    pacer: &mut dyn Pacer,
    progress: &mut dyn ProgressSink,
) -> StudyResult<SimulationReport> {
    let mut report = SimulationReport::default();
    let mut current_location = 0u64;

    progress.emit(ProgressEvent::CourseStarted {
        name: course.name.clone(),
        total_seconds: duration_seconds,
    });

    for chunk in plan_chunks(duration_seconds) {
        pacer.pause(if chunk == MAX_CHUNK_SECONDS {
            FULL_CHUNK_PAUSE
        } else {
            PARTIAL_CHUNK_PAUSE
        });

        let checkpoint = Checkpoint::new(current_location, chunk, now_local());
        transport.submit(course, &checkpoint)?;

        current_location += chunk;
        report.checkpoints += 1;
        report.seconds_reported += chunk;
        progress.emit(ProgressEvent::ChunkSubmitted {
            name: course.name.clone(),
            advance: chunk,
            location: current_location,
            total_seconds: duration_seconds,
        });
    }

    progress.emit(ProgressEvent::CourseFinished {
        name: course.name.clone(),
    });
    Ok(report)
}
