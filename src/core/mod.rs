pub mod auth_service;
pub mod grading;
pub mod upload_service;

pub use auth_service::AuthService;
pub use grading::{Grader, GradingClient, GradingJob, GradingOutcome};
pub use upload_service::{AttemptLedger, LabCatalogue, UploadService};
