/// Progress notifications emitted while a batch plays through.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    BatchStarted {
        total_courses: usize,
    },
    CourseStarted {
        name: String,
        total_seconds: u64,
    },
    ChunkSubmitted {
        name: String,
        advance: u64,
        location: u64,
        total_seconds: u64,
    },
    CourseFinished {
        name: String,
    },
    BatchAdvanced {
        completed: usize,
        total_courses: usize,
    },
}

pub trait ProgressSink {
    fn emit(&mut self, event: ProgressEvent);
}

/// Discards every event.
#[derive(Debug, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn emit(&mut self, _event: ProgressEvent) {}
}

/// Keeps every event; handy when a caller wants to inspect a run afterwards.
#[derive(Debug, Default)]
pub struct RecordedProgress {
    pub events: Vec<ProgressEvent>,
}

impl ProgressSink for RecordedProgress {
    fn emit(&mut self, event: ProgressEvent) {
        self.events.push(event);
    }
}
