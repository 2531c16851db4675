// Student reports
// Fetches students from the upstream API and renders them as reports

mod client;
mod models;
mod report;
mod service;

pub use client::{StudentClient, StudentError, StudentFinder};
pub use models::Student;
pub use report::{RenderError, ReportRenderer, TextReportRenderer};
pub use service::{Report, ReportError, ReportGenerator, ReportService};
