//! Result reporter: turns an `ExecutionResult` into the text a tool call
//! returns.

use crate::executor::{ExecutionResult, ExecutionStatus};

const RULE_WIDTH: usize = 60;

/// Cut `text` to at most `limit` characters, marking what was dropped.
pub fn truncate_text(text: &str, limit: usize) -> String {
    let total = text.chars().count();
    if total <= limit {
        return text.to_string();
    }
    let kept: String = text.chars().take(limit).collect();
    format!("{}... [truncated {} chars]", kept, total - limit)
}

/// Text content plus the protocol error flag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub text: String,
    pub is_error: bool,
}

#[derive(Debug, Clone)]
pub struct ResultReporter {
    max_output_chars: usize,
}

impl ResultReporter {
    pub fn new(max_output_chars: usize) -> Self {
        Self { max_output_chars }
    }

    pub fn format(&self, result: &ExecutionResult) -> Report {
        let rule = "=".repeat(RULE_WIDTH);
        let status = match result.status {
            ExecutionStatus::Success => "SUCCESS",
            ExecutionStatus::Error => "ERROR",
        };

        let mut lines = vec![
            rule.clone(),
            format!("Execution Status: {}", status),
            rule,
        ];
        if let Some(description) = &result.description {
            lines.push(format!("Description: {}", description));
        }

        if !result.stdout_text.is_empty() {
            lines.push(String::new());
            lines.push("Output:".to_string());
            lines.push(self.section(&result.stdout_text));
        }
        if !result.warnings.is_empty() {
            lines.push(String::new());
            lines.push("Warnings:".to_string());
            lines.push(self.section(&result.warnings));
        }
        if let Some(value) = &result.return_value_repr {
            lines.push(String::new());
            lines.push("Return value:".to_string());
            lines.push(value.clone());
        }

        if let Some(error) = &result.error {
            lines.push(String::new());
            lines.push(format!("Exception Type: {}", error.kind));
            lines.push(format!("Error Message: {}", error.message));
            if !error.traceback.is_empty() {
                lines.push(String::new());
                lines.push("Traceback:".to_string());
                lines.push(error.traceback.trim_end().to_string());
            }
        }

        if !result.abandoned_commits.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "Abandoned commits: {}",
                result.abandoned_commits.join(", ")
            ));
        }

        Report {
            text: lines.join("\n"),
            is_error: !result.is_success(),
        }
    }

    fn section(&self, text: &str) -> String {
        truncate_text(text.trim_end_matches('\n'), self.max_output_chars)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiscript::FaultReport;
    use pretty_assertions::assert_eq;

    fn result(status: ExecutionStatus) -> ExecutionResult {
        ExecutionResult {
            status,
            description: None,
            stdout_text: String::new(),
            warnings: String::new(),
            return_value_repr: None,
            error: None,
            records: Vec::new(),
            abandoned_commits: Vec::new(),
            duration_ms: 1,
        }
    }

    #[test]
    fn test_truncate_counts_characters() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("ééééé", 2), "éé... [truncated 3 chars]");
    }

    #[test]
    fn test_success_layout() {
        let mut ok = result(ExecutionStatus::Success);
        ok.description = Some("sum".to_string());
        ok.stdout_text = "hi\n".to_string();
        ok.return_value_repr = Some("4".to_string());

        let report = ResultReporter::new(100).format(&ok);
        assert!(!report.is_error);
        let rule = "=".repeat(60);
        assert_eq!(
            report.text,
            format!(
                "{rule}\nExecution Status: SUCCESS\n{rule}\nDescription: sum\n\nOutput:\nhi\n\nReturn value:\n4"
            )
        );
    }

    #[test]
    fn test_empty_success_is_not_an_error() {
        let report = ResultReporter::new(100).format(&result(ExecutionStatus::Success));
        assert!(!report.is_error);
        assert!(report.text.contains("Execution Status: SUCCESS"));
    }

    #[test]
    fn test_error_layout() {
        let mut failed = result(ExecutionStatus::Error);
        failed.error = Some(FaultReport {
            kind: "NameError".to_string(),
            message: "name 'x' is not defined".to_string(),
            traceback: "Traceback (most recent call last):\n  line 1\n".to_string(),
        });
        failed.abandoned_commits = vec!["c1".to_string()];

        let report = ResultReporter::new(100).format(&failed);
        assert!(report.is_error);
        assert!(report.text.contains("Exception Type: NameError"));
        assert!(report.text.contains("Error Message: name 'x' is not defined"));
        assert!(report.text.contains("Traceback:\nTraceback (most recent call last):"));
        assert!(report.text.ends_with("Abandoned commits: c1"));
    }

    #[test]
    fn test_long_output_is_truncated() {
        let mut ok = result(ExecutionStatus::Success);
        ok.stdout_text = "abcdefghij\n".to_string();
        let report = ResultReporter::new(4).format(&ok);
        assert!(report.text.contains("Output:\nabcd... [truncated 6 chars]"));
    }
}
