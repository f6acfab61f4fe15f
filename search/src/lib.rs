use anyhow::Result;
use melodex_core::topk::{clamp_num_of_answers, DEFAULT_NUM_OF_ANSWERS};
use melodex_core::{parse_record, Answer, ScoringMode};
use serde::Serialize;
use std::io::{BufRead, Seek, Write};
use std::num::IntErrorKind;

pub mod scan;

pub use scan::{query_corpus, QueryOutcome, MAX_JOBS};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Titles separated by spaces, best first.
    #[default]
    Plain,
    /// One JSON object per query.
    Json,
}

#[derive(Debug, Clone)]
pub struct SearchConfig {
    pub num_of_answers: u16,
    pub mode: ScoringMode,
    pub include_query_id: bool,
    pub format: OutputFormat,
    pub jobs: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            num_of_answers: DEFAULT_NUM_OF_ANSWERS,
            mode: ScoringMode::Weighted,
            include_query_id: false,
            format: OutputFormat::Plain,
            jobs: 1,
        }
    }
}

/// Interprets a raw answer-count setting such as `FNM_NUM_OF_ANSWERS`.
///
/// Reads like C `strtoul`: leading whitespace and an optional sign, then the
/// longest run of decimal digits; trailing text is ignored. A negative value
/// wraps and so clamps to `u16::MAX`, as do values too large for the heap.
/// Unset, zero and digit-less values fall back to the default.
pub fn parse_num_of_answers(raw: Option<&str>) -> u16 {
    let Some(raw) = raw else {
        return DEFAULT_NUM_OF_ANSWERS;
    };
    let text = raw.trim_start();
    let (negative, text) = match text.as_bytes().first() {
        Some(b'-') => (true, &text[1..]),
        Some(b'+') => (false, &text[1..]),
        _ => (false, text),
    };
    let digits = text.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        tracing::warn!(value = raw, "ignoring non-numeric answer count");
        return DEFAULT_NUM_OF_ANSWERS;
    }
    let n = match text[..digits].parse::<u64>() {
        Ok(n) => n,
        Err(e) if *e.kind() == IntErrorKind::PosOverflow => return u16::MAX,
        Err(_) => return DEFAULT_NUM_OF_ANSWERS,
    };
    if digits < text.len() {
        tracing::warn!(value = raw, used = n, "ignoring trailing text in answer count");
    }
    if negative {
        clamp_num_of_answers(Some(n.wrapping_neg()))
    } else {
        clamp_num_of_answers(Some(n))
    }
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub queries: u64,
    pub failed: u64,
}

#[derive(Serialize)]
struct QueryReport<'a> {
    query: &'a str,
    scanned: u64,
    answers: &'a [Answer],
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// Answers every query read from `queries` against `corpus`, one output line
/// per query.
///
/// A malformed query line is reported and skipped. A scan that ends early
/// still prints the answers gathered so far. Both count as failed queries.
/// Only errors writing to `out` abort the run.
pub fn run<C, Q, W>(corpus: &mut C, queries: Q, out: &mut W, cfg: &SearchConfig) -> Result<RunSummary>
where
    C: BufRead + Seek,
    Q: BufRead,
    W: Write,
{
    let mut summary = RunSummary::default();
    for line in queries.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        summary.queries += 1;
        let query = match parse_record(&line) {
            Ok(q) => q,
            Err(e) => {
                tracing::error!(error = %e, "invalid query");
                summary.failed += 1;
                continue;
            }
        };

        let outcome = query_corpus(corpus, &query, cfg.num_of_answers, cfg.mode, cfg.jobs);
        if let Some(e) = &outcome.error {
            tracing::error!(query = %query.title, scanned = outcome.scanned, error = %e, "corpus scan aborted");
            summary.failed += 1;
        } else {
            tracing::debug!(query = %query.title, scanned = outcome.scanned, "query done");
        }

        let answers = outcome.ranker.finalize();
        match cfg.format {
            OutputFormat::Plain => write_plain(out, cfg.include_query_id.then_some(query.title.as_str()), &answers)?,
            OutputFormat::Json => {
                let report = QueryReport {
                    query: &query.title,
                    scanned: outcome.scanned,
                    answers: &answers,
                    error: outcome.error.as_ref().map(ToString::to_string),
                };
                serde_json::to_writer(&mut *out, &report)?;
                writeln!(out)?;
            }
        }
        out.flush()?;
    }
    Ok(summary)
}

fn write_plain<W: Write>(out: &mut W, query_id: Option<&str>, answers: &[Answer]) -> std::io::Result<()> {
    let mut fields = query_id.into_iter().chain(answers.iter().map(|a| a.title.as_str()));
    if let Some(first) = fields.next() {
        write!(out, "{first}")?;
    }
    for field in fields {
        write!(out, " {field}")?;
    }
    writeln!(out)
}
