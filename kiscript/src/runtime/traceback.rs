use std::fmt::Write as _;

use serde::Serialize;

use super::error::RuntimeError;
use crate::parser::ParseError;

/// Name used for the top-level frame.
pub const MODULE_FRAME: &str = "<module>";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceFrame {
    pub function: String,
    pub line: usize,
}

/// A fault that ended a script run: what went wrong and where.
#[derive(Debug, Clone, PartialEq)]
pub struct Fault {
    pub kind: String,
    pub message: String,
    /// Outermost frame first.
    pub frames: Vec<TraceFrame>,
    /// Pre-rendered detail for faults with no frames (syntax errors).
    pub detail: Option<String>,
}

impl Fault {
    pub fn from_runtime(error: &RuntimeError, frames: Vec<TraceFrame>) -> Self {
        Fault {
            kind: error.kind().to_string(),
            message: error.to_string(),
            frames,
            detail: None,
        }
    }

    pub fn from_parse(error: &ParseError) -> Self {
        Fault {
            kind: "SyntaxError".to_string(),
            message: error.to_string(),
            frames: Vec::new(),
            detail: Some(error.rendered()),
        }
    }

    /// Traceback text in most-recent-call-last order, quoting source lines.
    pub fn render(&self, source: &str) -> String {
        let mut out = String::new();
        if let Some(detail) = &self.detail {
            let _ = writeln!(out, "{detail}");
        }
        if !self.frames.is_empty() {
            out.push_str("Traceback (most recent call last):\n");
            for frame in &self.frames {
                let _ = writeln!(out, "  line {}, in {}", frame.line, frame.function);
                if let Some(text) = source_line(source, frame.line) {
                    let _ = writeln!(out, "    {text}");
                }
            }
        }
        let _ = write!(out, "{}: {}", self.kind, self.message);
        out
    }
}

fn source_line(source: &str, line: usize) -> Option<&str> {
    line.checked_sub(1)
        .and_then(|index| source.lines().nth(index))
        .map(str::trim)
        .filter(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_quotes_source_lines() {
        let source = "def helper() {\n    return undefined_name\n}\nhelper()";
        let fault = Fault::from_runtime(
            &RuntimeError::UndefinedName {
                name: "undefined_name".into(),
            },
            vec![
                TraceFrame {
                    function: MODULE_FRAME.into(),
                    line: 4,
                },
                TraceFrame {
                    function: "helper".into(),
                    line: 2,
                },
            ],
        );
        assert_eq!(
            fault.render(source),
            "Traceback (most recent call last):\n  line 4, in <module>\n    helper()\n  line 2, in helper\n    return undefined_name\nNameError: name 'undefined_name' is not defined"
        );
    }
}
