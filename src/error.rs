use thiserror::Error;

/// Fatal conditions of a study run. Every variant unwinds to the top of the
/// run and maps to one stable process exit code.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StudyError {
    #[error("credentials unavailable: {0}")]
    Credential(String),
    #[error("captcha unavailable: {0}")]
    Captcha(String),
    #[error("login rejected: {0}")]
    Authentication(String),
    #[error("course acquisition failed: {0}")]
    CourseAcquisition(String),
    #[error("course duration unavailable: {0}")]
    CourseDuration(String),
    #[error("checkpoint submission failed: {0}")]
    CheckpointSubmission(String),
}

impl StudyError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Credential(_) => 10,
            Self::Authentication(_) => 11,
            Self::Captcha(_) => 12,
            Self::CourseDuration(_) => 14,
            Self::CourseAcquisition(_) => 15,
            Self::CheckpointSubmission(_) => 16,
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            Self::Credential(_) => "credential",
            Self::Authentication(_) => "authentication",
            Self::Captcha(_) => "captcha",
            Self::CourseDuration(_) => "course-duration",
            Self::CourseAcquisition(_) => "course-acquisition",
            Self::CheckpointSubmission(_) => "checkpoint-submission",
        }
    }
}

pub type StudyResult<T> = std::result::Result<T, StudyError>;
