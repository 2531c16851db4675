// Report rendering

use std::fmt::Write;

use chrono::Utc;
use serde_json::Value;
use thiserror::Error;

use super::models::Student;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Failed to format report: {0}")]
    Format(#[from] std::fmt::Error),
}

/// Turns a student into a downloadable document
pub trait ReportRenderer: Send + Sync {
    fn render(&self, student: &Student) -> Result<Vec<u8>, RenderError>;

    /// MIME type of rendered documents
    fn content_type(&self) -> &'static str;

    /// File extension for downloads, without the dot
    fn file_extension(&self) -> &'static str;
}

/// Plain-text report
#[derive(Debug, Clone, Default)]
pub struct TextReportRenderer;

impl ReportRenderer for TextReportRenderer {
    fn render(&self, student: &Student) -> Result<Vec<u8>, RenderError> {
        let mut out = String::new();

        writeln!(out, "STUDENT REPORT")?;
        writeln!(out, "==============")?;
        writeln!(out, "Generated: {}", Utc::now().to_rfc3339())?;
        writeln!(out)?;
        writeln!(out, "ID:    {}", student.id)?;
        writeln!(out, "Name:  {}", student.name.as_deref().unwrap_or("-"))?;
        writeln!(out, "Email: {}", student.email.as_deref().unwrap_or("-"))?;
        writeln!(out, "Class: {}", student.class.as_deref().unwrap_or("-"))?;

        if !student.extra.is_empty() {
            writeln!(out)?;
            writeln!(out, "Details")?;
            writeln!(out, "-------")?;

            let mut fields: Vec<_> = student.extra.iter().collect();
            fields.sort_by(|a, b| a.0.cmp(b.0));
            for (key, value) in fields {
                writeln!(out, "{}: {}", key, display_value(value))?;
            }
        }

        Ok(out.into_bytes())
    }

    fn content_type(&self) -> &'static str {
        "text/plain; charset=utf-8"
    }

    fn file_extension(&self) -> &'static str {
        "txt"
    }
}

/// Strings print bare, everything else as compact JSON
fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "-".to_string(),
        other => other.to_string(),
    }
}
