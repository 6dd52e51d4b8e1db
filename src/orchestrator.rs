use rand::Rng;
use tracing::info;

use crate::checkpoint::CheckpointTransport;
use crate::course::Course;
use crate::error::{StudyError, StudyResult};
use crate::probe::DurationResolver;
use crate::progress::{ProgressEvent, ProgressSink};
use crate::simulator::{Pacer, simulate};

pub const MIN_COURSE_DELAY: u64 = 1;
pub const MAX_COURSE_DELAY: u64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    pub courses_completed: usize,
    pub checkpoints: usize,
    pub seconds_reported: u64,
}

/// One pause per course, all drawn before the batch starts so a seeded
/// source fixes the whole schedule.
pub fn plan_delays<R: Rng + ?Sized>(count: usize, rng: &mut R) -> Vec<u64> {
    (0..count)
        .map(|_| rng.gen_range(MIN_COURSE_DELAY..=MAX_COURSE_DELAY))
        .collect()
}

/// Plays a batch of courses strictly one after another.
pub struct BatchRunner<'a> {
    resolver: &'a mut dyn DurationResolver,
    transport: &'a mut dyn CheckpointTransport,
    pacer: &'a mut dyn Pacer,
    progress: &'a mut dyn ProgressSink,
}

impl<'a> BatchRunner<'a> {
    pub fn new(
        resolver: &'a mut dyn DurationResolver,
        transport: &'a mut dyn CheckpointTransport,
        pacer: &'a mut dyn Pacer,
        progress: &'a mut dyn ProgressSink,
    ) -> Self {
        Self {
            resolver,
            transport,
            pacer,
            progress,
        }
    }

    /// Resolves, simulates and then rests after each course in order. The
    /// first error ends the batch; later courses are never touched.
    pub fn run_batch<R: Rng + ?Sized>(
        &mut self,
        courses: &mut [Course],
        rng: &mut R,
    ) -> StudyResult<BatchReport> {
        if courses.is_empty() {
            return Err(StudyError::CourseAcquisition(
                "no courses selected to learn".to_string(),
            ));
        }

        let delays = plan_delays(courses.len(), rng);
        let total_courses = courses.len();
        let mut report = BatchReport::default();
        self.progress.emit(ProgressEvent::BatchStarted { total_courses });

        for (course, delay) in courses.iter_mut().zip(delays) {
            let media = self.resolver.resolve(course)?;
            if media.duration_seconds == 0 {
                return Err(StudyError::CourseDuration(format!(
                    "{} (course {}) has no readable video duration",
                    course.name, course.course_id
                )));
            }
            course.mark_resolved(media.duration_seconds, &media.reference_id);
            info!(
                course = %course.course_id,
                duration = media.duration_seconds,
                delay,
                "course resolved"
            );

            let outcome = simulate(
                course,
                media.duration_seconds,
                &mut *self.transport,
                &mut *self.pacer,
                &mut *self.progress,
            )?;
            report.checkpoints += outcome.checkpoints;
            report.seconds_reported += outcome.seconds_reported;

            self.pacer.pause(delay);
            report.courses_completed += 1;
            self.progress.emit(ProgressEvent::BatchAdvanced {
                completed: report.courses_completed,
                total_courses,
            });
        }

        Ok(report)
    }
}
