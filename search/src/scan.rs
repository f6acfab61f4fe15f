//! One pass over the corpus for one query.

use melodex_core::{parse_record, similarity, Error, Melody, Record, Result, Score, ScoringMode, TopKRanker};
use std::io::{BufRead, Seek, SeekFrom};
use std::thread;

/// Corpus lines handed to each worker per batch.
const LINES_PER_WORKER: usize = 512;
/// Upper bound on worker threads per scan.
pub const MAX_JOBS: usize = 256;

#[derive(Debug)]
pub struct QueryOutcome {
    pub ranker: TopKRanker,
    /// Corpus records scored before the scan ended.
    pub scanned: u64,
    /// The error that ended the scan early, if any.
    pub error: Option<Error>,
}

fn score_line(line: &str, query: &Melody<'_>, mode: ScoringMode) -> Result<(Record, Score)> {
    let record = parse_record(line)?;
    let sim = similarity(query, &Melody::from(&record))?;
    Ok((record, Score::new(sim, mode)))
}

/// Scores every corpus record against `query`, keeping the best `k`.
///
/// The corpus is rewound first. The scan stops at the first record that
/// cannot be parsed or aligned; answers from earlier records are kept.
/// With `jobs > 1` batches of records are scored on scoped worker threads and
/// the per-worker rankers merged, which ranks exactly like the sequential scan.
/// `jobs` is clamped to [`MAX_JOBS`].
pub fn query_corpus<C: BufRead + Seek>(
    corpus: &mut C,
    query: &Record,
    k: u16,
    mode: ScoringMode,
    jobs: usize,
) -> QueryOutcome {
    let mut outcome = QueryOutcome { ranker: TopKRanker::new(k), scanned: 0, error: None };
    if let Err(e) = corpus.seek(SeekFrom::Start(0)) {
        outcome.error = Some(e.into());
        return outcome;
    }
    let query = Melody::from(query);
    let jobs = jobs.min(MAX_JOBS);
    if jobs > 1 {
        scan_parallel(corpus, &query, mode, k, jobs, &mut outcome);
    } else {
        scan_sequential(corpus, &query, mode, &mut outcome);
    }
    outcome
}

fn scan_sequential<C: BufRead>(corpus: &mut C, query: &Melody<'_>, mode: ScoringMode, outcome: &mut QueryOutcome) {
    let mut line = String::new();
    loop {
        line.clear();
        match corpus.read_line(&mut line) {
            Ok(0) => return,
            Ok(_) => {}
            Err(e) => {
                outcome.error = Some(e.into());
                return;
            }
        }
        if line.trim().is_empty() {
            continue;
        }
        match score_line(&line, query, mode) {
            Ok((record, score)) => {
                outcome.ranker.insert_at(outcome.scanned, &record.title, score);
                outcome.scanned += 1;
            }
            Err(e) => {
                outcome.error = Some(e);
                return;
            }
        }
    }
}

/// Result of one worker over a contiguous slice of a batch.
struct Partial {
    ranker: TopKRanker,
    scanned: u64,
    error: Option<Error>,
}

fn score_slice(lines: &[String], first: u64, query: &Melody<'_>, mode: ScoringMode, k: u16) -> Partial {
    let mut part = Partial { ranker: TopKRanker::new(k), scanned: 0, error: None };
    for (i, line) in lines.iter().enumerate() {
        match score_line(line, query, mode) {
            Ok((record, score)) => {
                part.ranker.insert_at(first + i as u64, &record.title, score);
                part.scanned += 1;
            }
            Err(e) => {
                part.error = Some(e);
                break;
            }
        }
    }
    part
}

fn read_batch<C: BufRead>(corpus: &mut C, limit: usize, batch: &mut Vec<String>) -> std::io::Result<()> {
    batch.clear();
    while batch.len() < limit {
        let mut line = String::new();
        if corpus.read_line(&mut line)? == 0 {
            break;
        }
        if !line.trim().is_empty() {
            batch.push(line);
        }
    }
    Ok(())
}

fn scan_parallel<C: BufRead>(
    corpus: &mut C,
    query: &Melody<'_>,
    mode: ScoringMode,
    k: u16,
    jobs: usize,
    outcome: &mut QueryOutcome,
) {
    let batch_len = jobs.saturating_mul(LINES_PER_WORKER);
    let mut batch = Vec::with_capacity(batch_len);
    loop {
        if let Err(e) = read_batch(corpus, batch_len, &mut batch) {
            outcome.error = Some(e.into());
            return;
        }
        if batch.is_empty() {
            return;
        }
        let chunk_len = batch.len().div_ceil(jobs);
        let base = outcome.scanned;
        let partials: Vec<Partial> = thread::scope(|s| {
            let handles: Vec<_> = batch
                .chunks(chunk_len)
                .enumerate()
                .map(|(n, lines)| {
                    let first = base + (n * chunk_len) as u64;
                    s.spawn(move || score_slice(lines, first, query, mode, k))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(part) => part,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        });

        // Slices are contiguous, so everything after the first failing slice
        // lies past the failing record and is dropped.
        for part in partials {
            outcome.ranker.merge(part.ranker);
            outcome.scanned += part.scanned;
            if part.error.is_some() {
                outcome.error = part.error;
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn titles(outcome: &QueryOutcome) -> Vec<String> {
        outcome.ranker.finalize().into_iter().map(|a| a.title).collect()
    }

    #[test]
    fn rewinds_between_queries() {
        let mut corpus = Cursor::new("p:A***abcde\np:B***fghij\n");
        let q = Record::pitch("q", "abcde");
        let first = query_corpus(&mut corpus, &q, 10, ScoringMode::Weighted, 1);
        let second = query_corpus(&mut corpus, &q, 10, ScoringMode::Weighted, 1);
        assert_eq!(first.scanned, 2);
        assert_eq!(titles(&first), titles(&second));
    }

    #[test]
    fn malformed_corpus_record_stops_scan_but_keeps_earlier_answers() {
        let mut corpus = Cursor::new("p:A***abcde\ngarbage\np:B***abcde\n");
        let q = Record::pitch("q", "abcde");
        let outcome = query_corpus(&mut corpus, &q, 10, ScoringMode::Weighted, 1);
        assert_eq!(titles(&outcome), vec!["A"]);
        assert!(matches!(outcome.error, Some(Error::MalformedRecord(_))));
    }

    #[test]
    fn parallel_scan_matches_sequential() {
        let mut text = String::new();
        for i in 0..3000 {
            let pitch: String = (0..8).map(|j| (b'a' + ((i * 7 + j * 3) % 6) as u8) as char).collect();
            text.push_str(&format!("p:T{i}***{pitch}\n"));
        }
        let q = Record::pitch("q", "adbecf");
        let seq = query_corpus(&mut Cursor::new(text.clone()), &q, 25, ScoringMode::Weighted, 1);
        let par = query_corpus(&mut Cursor::new(text), &q, 25, ScoringMode::Weighted, 4);
        assert_eq!(seq.scanned, 3000);
        assert_eq!(par.scanned, 3000);
        assert_eq!(titles(&seq), titles(&par));
    }

    #[test]
    fn parallel_scan_stops_at_first_failing_record() {
        let mut text = String::new();
        for i in 0..2000 {
            if i == 1500 {
                text.push_str("pi:Broken***abc***Ss\n");
            }
            text.push_str(&format!("p:T{i}***abcde\n"));
        }
        let q = Record::pitch("q", "abcde");
        let seq = query_corpus(&mut Cursor::new(text.clone()), &q, 5, ScoringMode::Weighted, 1);
        let par = query_corpus(&mut Cursor::new(text), &q, 5, ScoringMode::Weighted, 3);
        assert_eq!(seq.scanned, 1500);
        assert_eq!(par.scanned, 1500);
        assert!(matches!(par.error, Some(Error::InvalidSequence(_))));
        assert_eq!(titles(&seq), titles(&par));
    }

    #[test]
    fn oversized_job_count_is_clamped() {
        let q = Record::pitch("q", "abcde");
        let text = "p:A***abcde\np:B***abcdf\n";
        let outcome = query_corpus(&mut Cursor::new(text), &q, 10, ScoringMode::Weighted, usize::MAX / 256);
        assert!(outcome.error.is_none());
        assert_eq!(outcome.scanned, 2);
        assert_eq!(titles(&outcome), vec!["A", "B"]);
        let outcome = query_corpus(&mut Cursor::new(text), &q, 10, ScoringMode::Weighted, usize::MAX);
        assert_eq!(titles(&outcome), vec!["A", "B"]);
    }
}
