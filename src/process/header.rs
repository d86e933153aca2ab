//! Header hunting: exports often carry banner rows, report metadata or
//! blank lines above the real header, so its position is discovered, not
//! assumed.

use csv::ReaderBuilder;
use std::collections::HashSet;
use tracing::{debug, trace, warn};

use crate::config::Rules;
use crate::process::utils::clean_str;

/// A parsed table: header cells plus the data rows below them.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectedTable {
    pub delimiter: char,
    /// Line index (0-based) of the header inside the decoded text.
    pub header_row_index: usize,
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
    /// Records the CSV reader could not parse; they are skipped.
    pub malformed_rows: usize,
}

pub struct HeaderHunter {
    anchors: HashSet<String>,
    scan_lines: usize,
    delimiters: Vec<char>,
}

impl HeaderHunter {
    pub fn new(rules: &Rules) -> Self {
        Self {
            anchors: rules.header_anchors().into_iter().map(clean_str).collect(),
            scan_lines: rules.header.scan_lines,
            delimiters: rules.header.delimiters.clone(),
        }
    }

    /// `(header_row_index, delimiter)`. Pure: the same text always yields
    /// the same answer.
    pub fn detect(&self, text: &str) -> (usize, char) {
        for (idx, line) in text.lines().take(self.scan_lines).enumerate() {
            if self.is_anchor_line(line) {
                let delimiter = self
                    .delimiters
                    .iter()
                    .copied()
                    .find(|d| line.contains(*d))
                    .unwrap_or_else(|| self.sniff(text));
                trace!(idx, delimiter = ?delimiter, "anchor line found");
                return (idx, delimiter);
            }
        }
        debug!("no anchor line in scan window, sniffing from line 0");
        (0, self.sniff(text))
    }

    /// Detect, then parse everything from the header line down.
    pub fn parse(&self, text: &str) -> DetectedTable {
        let (header_row_index, delimiter) = self.detect(text);
        let offset = line_offset(text, header_row_index);

        let mut rdr = ReaderBuilder::new()
            .delimiter(delimiter as u8)
            .has_headers(false)
            .flexible(true)
            .from_reader(text[offset..].as_bytes());

        let mut headers: Option<Vec<String>> = None;
        let mut rows = Vec::new();
        let mut malformed_rows = 0;

        for (idx, result) in rdr.records().enumerate() {
            let record = match result {
                Ok(r) => r,
                Err(e) => {
                    warn!(record = idx, "CSV parse error: {}", e);
                    malformed_rows += 1;
                    continue;
                }
            };
            if record.iter().all(|c| c.trim().is_empty()) {
                continue;
            }
            match headers {
                None => headers = Some(record.iter().map(clean_str).collect()),
                Some(_) => rows.push(record.iter().map(str::to_string).collect()),
            }
        }

        DetectedTable {
            delimiter,
            header_row_index,
            headers: headers.unwrap_or_default(),
            rows,
            malformed_rows,
        }
    }

    fn is_anchor_line(&self, line: &str) -> bool {
        line.split(|c: char| self.delimiters.contains(&c))
            .map(clean_str)
            .any(|cell| self.anchors.contains(&cell))
    }

    /// Delimiter seen on the most leading lines; ties go to the earlier
    /// entry in the priority list. Defaults to comma.
    fn sniff(&self, text: &str) -> char {
        let lines: Vec<&str> = text
            .lines()
            .filter(|l| !l.trim().is_empty())
            .take(self.scan_lines)
            .collect();
        let mut best: Option<(char, usize)> = None;
        for &d in &self.delimiters {
            let hits = lines.iter().filter(|l| l.contains(d)).count();
            if hits > 0 && best.map_or(true, |(_, h)| hits > h) {
                best = Some((d, hits));
            }
        }
        best.map(|(d, _)| d).unwrap_or(',')
    }
}

/// Byte offset where line `idx` starts, consistent with `str::lines`.
fn line_offset(text: &str, idx: usize) -> usize {
    text.split_inclusive('\n').take(idx).map(str::len).sum()
}
