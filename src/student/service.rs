use std::future::Future;

use thiserror::Error;

use super::client::{StudentClient, StudentError, StudentFinder};
use super::report::{RenderError, ReportRenderer, TextReportRenderer};

#[derive(Error, Debug)]
pub enum ReportError {
    #[error(transparent)]
    Fetch(#[from] StudentError),

    #[error("Failed to build report: {0}")]
    Render(#[from] RenderError),
}

impl ReportError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ReportError::Fetch(StudentError::NotFound(_)))
    }
}

/// A rendered report ready to send
#[derive(Debug, Clone)]
pub struct Report {
    pub content: Vec<u8>,
    pub content_type: &'static str,
    pub file_extension: &'static str,
}

/// Report generation as consumed by the HTTP layer
pub trait ReportGenerator: Send + Sync {
    fn generate_report(&self, id: i64) -> impl Future<Output = Result<Report, ReportError>> + Send;
}

/// Fetches a student and renders it
pub struct ReportService<F = StudentClient, R = TextReportRenderer> {
    finder: F,
    renderer: R,
}

impl<F: StudentFinder, R: ReportRenderer> ReportService<F, R> {
    pub fn new(finder: F, renderer: R) -> Self {
        Self { finder, renderer }
    }

    async fn build(&self, id: i64) -> Result<Report, ReportError> {
        let student = self.finder.get(id).await?;

        let content = self.renderer.render(&student).map_err(|e| {
            tracing::error!(student_id = id, error = %e, "Report rendering failed");
            e
        })?;

        Ok(Report {
            content,
            content_type: self.renderer.content_type(),
            file_extension: self.renderer.file_extension(),
        })
    }
}

impl<F: StudentFinder, R: ReportRenderer> ReportGenerator for ReportService<F, R> {
    fn generate_report(&self, id: i64) -> impl Future<Output = Result<Report, ReportError>> + Send {
        self.build(id)
    }
}
