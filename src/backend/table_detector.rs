//! Table detection over plain text lines.
//!
//! [`StreamTableDetector`] finds tables by whitespace alignment on character
//! columns: a line is split into segments at runs
//! of two or more spaces, segment start offsets are bucketed, and runs of
//! consecutive lines whose segments line up on shared offsets become a table.
//!
//! [`DelimitedTableExtractor`] is an independent method that only looks at
//! explicit `|` or tab delimiters.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use crate::error::Result;
use crate::model::TableData;

use super::{PageTextSource, SecondaryTableExtractor};

const TAB_WIDTH: usize = 8;

/// Table detector configuration.
#[derive(Debug, Clone)]
pub struct TableDetectorConfig {
    /// Minimum number of rows to consider as table
    pub min_rows: usize,
    /// Minimum number of columns to consider as table
    pub min_columns: usize,
    /// Maximum number of columns (above this, likely word-level splitting)
    pub max_columns: usize,
    /// Minimum fraction of a row's segments that must start on a column
    pub min_alignment_ratio: f32,
    /// Minimum gap between columns (characters)
    pub min_column_gap: usize,
    /// Offsets within this many characters share a bucket
    pub bucket_size: usize,
}

impl Default for TableDetectorConfig {
    fn default() -> Self {
        Self {
            min_rows: 2,
            min_columns: 2,
            max_columns: 12,
            min_alignment_ratio: 0.5,
            min_column_gap: 3,
            bucket_size: 2,
        }
    }
}

/// A run of text on one line, with its character offset.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Segment {
    offset: usize,
    text: String,
}

fn segment_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // Words joined by single spaces; two or more spaces end a segment.
    RE.get_or_init(|| Regex::new(r"\S+(?: \S+)*").expect("valid segment regex"))
}

fn expand_tabs(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut col = 0;
    for ch in line.chars() {
        if ch == '\t' {
            let pad = TAB_WIDTH - col % TAB_WIDTH;
            out.extend(std::iter::repeat(' ').take(pad));
            col += pad;
        } else {
            out.push(ch);
            col += 1;
        }
    }
    out
}

fn split_segments(line: &str) -> Vec<Segment> {
    let line = expand_tabs(line);
    segment_regex()
        .find_iter(&line)
        .map(|m| Segment {
            offset: line[..m.start()].chars().count(),
            text: m.as_str().to_string(),
        })
        .collect()
}

/// Detects whitespace-aligned tables in page text.
#[derive(Debug, Clone, Default)]
pub struct StreamTableDetector {
    config: TableDetectorConfig,
}

impl StreamTableDetector {
    /// Create a new table detector with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new table detector with custom configuration.
    pub fn with_config(config: TableDetectorConfig) -> Self {
        Self { config }
    }

    /// Detect tables in `text`, top to bottom.
    pub fn detect(&self, text: &str) -> Vec<TableData> {
        let rows: Vec<Vec<Segment>> = text.lines().map(split_segments).collect();
        if rows.len() < self.config.min_rows {
            return vec![];
        }

        let columns = self.detect_columns(&rows);
        log::debug!(
            "StreamTableDetector: {} lines, columns at {:?}",
            rows.len(),
            columns
        );
        if columns.len() < self.config.min_columns {
            return vec![];
        }

        let mut tables = Vec::new();
        for (start, end) in self.find_table_regions(&rows, &columns) {
            let region = &rows[start..=end];

            // Re-detect columns for this specific table region
            let region_columns = self.detect_columns(region);
            if region_columns.len() < self.config.min_columns {
                continue;
            }
            if region_columns.len() > self.config.max_columns {
                log::debug!(
                    "StreamTableDetector: skipping region, too many columns ({} > {})",
                    region_columns.len(),
                    self.config.max_columns
                );
                continue;
            }

            tables.push(
                region
                    .iter()
                    .map(|row| self.to_cells(row, &region_columns))
                    .collect(),
            );
        }
        tables
    }

    /// Find offsets shared by enough multi-segment rows.
    fn detect_columns(&self, rows: &[Vec<Segment>]) -> Vec<usize> {
        let multi: Vec<&Vec<Segment>> = rows.iter().filter(|r| r.len() >= 2).collect();
        if multi.len() < self.config.min_rows {
            return vec![];
        }

        let bucket = self.config.bucket_size.max(1);
        let mut edge_counts: HashMap<usize, usize> = HashMap::new();
        for row in &multi {
            // Count each bucket once per row
            let buckets: HashSet<usize> = row.iter().map(|s| s.offset / bucket).collect();
            for b in buckets {
                *edge_counts.entry(b).or_insert(0) += 1;
            }
        }

        let min_occurrences =
            ((multi.len() as f32 * self.config.min_alignment_ratio) as usize).max(2);

        let mut edges: Vec<usize> = edge_counts
            .into_iter()
            .filter(|(_, count)| *count >= min_occurrences)
            .map(|(b, _)| b * bucket)
            .collect();
        edges.sort_unstable();

        let mut merged: Vec<usize> = Vec::new();
        for edge in edges {
            match merged.last() {
                Some(&last) if edge - last < self.config.min_column_gap => {}
                _ => merged.push(edge),
            }
        }
        merged
    }

    fn find_table_regions(&self, rows: &[Vec<Segment>], columns: &[usize]) -> Vec<(usize, usize)> {
        let mut regions = Vec::new();
        let mut start: Option<usize> = None;

        for (i, row) in rows.iter().enumerate() {
            if self.is_aligned(row, columns) {
                start.get_or_insert(i);
                continue;
            }
            if let Some(s) = start.take() {
                if i - s >= self.config.min_rows {
                    regions.push((s, i - 1));
                }
            }
        }
        if let Some(s) = start {
            if rows.len() - s >= self.config.min_rows {
                regions.push((s, rows.len() - 1));
            }
        }
        regions
    }

    fn is_aligned(&self, row: &[Segment], columns: &[usize]) -> bool {
        // A single segment aligns trivially with column 0; that is prose.
        if row.len() < 2 {
            return false;
        }
        let tolerance = self.config.bucket_size;
        let aligned = row
            .iter()
            .filter(|s| columns.iter().any(|c| s.offset.abs_diff(*c) <= tolerance))
            .count();
        aligned as f32 / row.len() as f32 >= self.config.min_alignment_ratio
    }

    fn to_cells(&self, row: &[Segment], columns: &[usize]) -> Vec<Option<String>> {
        let tolerance = self.config.bucket_size;
        let mut cells: Vec<Vec<&str>> = vec![Vec::new(); columns.len()];
        for seg in row {
            let idx = columns
                .iter()
                .rposition(|c| *c <= seg.offset + tolerance)
                .unwrap_or(0);
            cells[idx].push(&seg.text);
        }
        cells
            .into_iter()
            .map(|parts| (!parts.is_empty()).then(|| parts.join(" ")))
            .collect()
    }
}

/// Splits explicitly delimited rows (`a | b | c` or tab-separated) into tables.
///
/// Reads page text through its own [`PageTextSource`], so it stays
/// independent of the primary backend's text layer.
pub struct DelimitedTableExtractor<S> {
    source: S,
    min_rows: usize,
}

impl<S: PageTextSource> DelimitedTableExtractor<S> {
    /// Create an extractor reading text from `source`.
    pub fn new(source: S) -> Self {
        Self {
            source,
            min_rows: 2,
        }
    }

    /// Set the minimum number of consecutive delimited rows.
    pub fn with_min_rows(mut self, min_rows: usize) -> Self {
        self.min_rows = min_rows.max(1);
        self
    }

    /// Find delimited tables in `text`.
    pub fn detect(&self, text: &str) -> Vec<TableData> {
        let mut tables = Vec::new();
        let mut current: TableData = Vec::new();
        let mut current_delim: Option<char> = None;

        for line in text.lines() {
            let delim = delimiter_of(line);
            if delim.is_none() || delim != current_delim {
                self.flush(&mut current, &mut tables);
            }
            current_delim = delim;

            let Some(d) = delim else { continue };
            if is_rule_line(line) {
                continue;
            }
            current.push(split_delimited(line, d));
        }
        self.flush(&mut current, &mut tables);
        tables
    }

    fn flush(&self, current: &mut TableData, tables: &mut Vec<TableData>) {
        if current.len() >= self.min_rows {
            tables.push(std::mem::take(current));
        } else {
            current.clear();
        }
    }
}

fn delimiter_of(line: &str) -> Option<char> {
    let trimmed = line.trim();
    if trimmed.matches('|').count() >= 2 || (trimmed.starts_with('|') && trimmed.len() > 1) {
        Some('|')
    } else if trimmed.contains('\t') {
        Some('\t')
    } else {
        None
    }
}

/// Markdown-style separator rows such as `|---|:---:|`.
fn is_rule_line(line: &str) -> bool {
    let trimmed = line.trim();
    !trimmed.is_empty()
        && trimmed.contains('-')
        && trimmed
            .chars()
            .all(|c| matches!(c, '|' | '-' | ':' | '+' | ' '))
}

fn split_delimited(line: &str, delim: char) -> Vec<Option<String>> {
    let mut trimmed = line.trim();
    if delim == '|' {
        trimmed = trimmed.strip_prefix('|').unwrap_or(trimmed);
        trimmed = trimmed.strip_suffix('|').unwrap_or(trimmed);
    }
    trimmed
        .split(delim)
        .map(|cell| {
            let cell = cell.trim();
            (!cell.is_empty()).then(|| cell.to_string())
        })
        .collect()
}

impl<S: PageTextSource> SecondaryTableExtractor for DelimitedTableExtractor<S> {
    fn name(&self) -> &str {
        "delimited"
    }

    fn extract_tables_for_page(&self, path: &Path, page_index: u32) -> Result<Vec<TableData>> {
        let text = self.source.extract_page_text(path, page_index)?;
        Ok(self.detect(&text))
    }
}
