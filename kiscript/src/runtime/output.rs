use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// One chunk of text written by `print` or `warn`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OutputRecord {
    pub seq: usize,
    pub stream: OutputStream,
    pub text: String,
}

/// Ordered output of one script run. Scripts never touch process stdio.
#[derive(Debug, Default, Clone)]
pub struct OutputLog {
    records: Vec<OutputRecord>,
    total_bytes: usize,
}

impl OutputLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, stream: OutputStream, text: impl Into<String>) {
        let text = text.into();
        self.total_bytes += text.len();
        self.records.push(OutputRecord {
            seq: self.records.len(),
            stream,
            text,
        });
    }

    pub fn records(&self) -> &[OutputRecord] {
        &self.records
    }

    pub fn into_records(self) -> Vec<OutputRecord> {
        self.records
    }

    /// Bytes written so far across both streams.
    pub fn total_len(&self) -> usize {
        self.total_bytes
    }

    pub fn text(&self, stream: OutputStream) -> String {
        self.records
            .iter()
            .filter(|r| r.stream == stream)
            .map(|r| r.text.as_str())
            .collect()
    }

    pub fn stdout_text(&self) -> String {
        self.text(OutputStream::Stdout)
    }

    pub fn stderr_text(&self) -> String {
        self.text(OutputStream::Stderr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_records_keep_order_per_stream() {
        let mut log = OutputLog::new();
        log.push(OutputStream::Stdout, "a\n");
        log.push(OutputStream::Stderr, "careful\n");
        log.push(OutputStream::Stdout, "b\n");

        assert_eq!(log.stdout_text(), "a\nb\n");
        assert_eq!(log.stderr_text(), "careful\n");
        let seqs: Vec<_> = log.records().iter().map(|r| r.seq).collect();
        assert_eq!(seqs, vec![0, 1, 2]);
        assert_eq!(log.total_len(), 12);
    }
}
