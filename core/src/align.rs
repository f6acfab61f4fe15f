//! Local alignment of pitch and IOI symbol sequences.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Weight of pitch similarity against IOI similarity in the weighted score.
pub const R: f64 = 38.0;
pub const IOI_SYMBOLS: &[u8; 5] = b"SsRlL";

const PITCH_MATCH: i64 = 1;
const PITCH_MISMATCH: i64 = -1;
const GAP: i64 = -2;

#[rustfmt::skip]
const IOI_MATRIX: [[i64; 5]; 5] = [
    [ 1,  0, -3, -3, -3],
    [ 0,  2, -2, -3, -3],
    [-3, -2,  3, -2, -3],
    [-3, -3, -2,  2,  0],
    [-3, -3, -3,  0,  1],
];

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMode {
    /// `R² · pitch² + ioi²`
    #[default]
    Weighted,
    /// `pitch + ioi`
    Additive,
}

/// A pitch sequence with its optional co-indexed IOI sequence.
#[derive(Debug, Clone, Copy)]
pub struct Melody<'a> {
    pub pitch: &'a str,
    pub ioi: Option<&'a str>,
}

impl<'a> Melody<'a> {
    pub fn new(pitch: &'a str, ioi: Option<&'a str>) -> Self {
        Self { pitch, ioi }
    }
}

impl<'a> From<&'a crate::record::Record> for Melody<'a> {
    fn from(r: &'a crate::record::Record) -> Self {
        Self { pitch: &r.pitch, ioi: r.ioi.as_deref() }
    }
}

/// Raw pass maxima of one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Similarity {
    pub pitch: u32,
    /// `None` when either side carries no IOI sequence.
    pub ioi: Option<u32>,
}

impl Similarity {
    pub fn combined(&self, mode: ScoringMode) -> f64 {
        let pitch = self.pitch as f64;
        let ioi = self.ioi.unwrap_or(0) as f64;
        match mode {
            ScoringMode::Weighted => R * R * pitch * pitch + ioi * ioi,
            ScoringMode::Additive => pitch + ioi,
        }
    }
}

/// DP table for one comparison, row-major with one padding row and column.
struct Matrix {
    cells: Vec<i64>,
    cols: usize,
}

impl Matrix {
    fn new(rows: usize, cols: usize) -> Result<Self> {
        let len = rows
            .checked_mul(cols)
            .ok_or_else(|| Error::AllocationFailure(format!("alignment matrix {rows}x{cols} overflows")))?;
        let mut cells = Vec::new();
        cells.try_reserve_exact(len).map_err(|e| Error::alloc("alignment matrix", e))?;
        cells.resize(len, 0);
        Ok(Self { cells, cols })
    }

    fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Runs the local-alignment recurrence and returns the best cell.
    fn fill<T, F>(&mut self, a: &[T], b: &[T], substitute: F) -> i64
    where
        F: Fn(&T, &T) -> i64,
    {
        let cols = self.cols;
        let mut best = 0;
        for r in 1..=a.len() {
            for c in 1..=b.len() {
                let diag = self.cells[(r - 1) * cols + c - 1] + substitute(&a[r - 1], &b[c - 1]);
                let up = self.cells[(r - 1) * cols + c] + GAP;
                let left = self.cells[r * cols + c - 1] + GAP;
                let cell = diag.max(up).max(left).max(0);
                self.cells[r * cols + c] = cell;
                best = best.max(cell);
            }
        }
        best
    }
}

fn ioi_rank(symbol: char) -> Result<usize> {
    u8::try_from(symbol)
        .ok()
        .and_then(|b| IOI_SYMBOLS.iter().position(|&s| s == b))
        .ok_or(Error::SymbolOutOfAlphabet { symbol })
}

fn ioi_ranks(seq: &str) -> Result<Vec<usize>> {
    seq.chars().map(ioi_rank).collect()
}

fn check_pair(side: &str, pitch: &[char], ioi: Option<&str>) -> Result<()> {
    if pitch.is_empty() {
        return Err(Error::InvalidSequence(format!("{side} pitch sequence is empty")));
    }
    if let Some(ioi) = ioi {
        let ioi_len = ioi.chars().count();
        if ioi_len != pitch.len() {
            return Err(Error::InvalidSequence(format!(
                "{side} pitch and IOI sequences differ in length ({} vs {ioi_len})",
                pitch.len()
            )));
        }
    }
    Ok(())
}

/// Aligns `query` against `candidate`.
///
/// The pitch pass always runs. The IOI pass runs when both sides carry IOI
/// symbols. The table is sized to the pair and dropped on return.
pub fn similarity(query: &Melody<'_>, candidate: &Melody<'_>) -> Result<Similarity> {
    let q_pitch: Vec<char> = query.pitch.chars().collect();
    let c_pitch: Vec<char> = candidate.pitch.chars().collect();
    check_pair("query", &q_pitch, query.ioi)?;
    check_pair("candidate", &c_pitch, candidate.ioi)?;

    let ioi = match (query.ioi, candidate.ioi) {
        (Some(q), Some(c)) => Some((ioi_ranks(q)?, ioi_ranks(c)?)),
        _ => None,
    };

    let mut matrix = Matrix::new(q_pitch.len() + 1, c_pitch.len() + 1)?;
    let pitch = matrix.fill(&q_pitch, &c_pitch, |a, b| if a == b { PITCH_MATCH } else { PITCH_MISMATCH });

    let ioi = ioi.map(|(q, c)| {
        matrix.clear();
        matrix.fill(&q, &c, |&a, &b| IOI_MATRIX[a][b])
    });

    Ok(Similarity { pitch: pitch as u32, ioi: ioi.map(|v| v as u32) })
}

/// Pitch-only similarity of two symbol strings.
pub fn pitch_similarity(a: &str, b: &str) -> Result<u32> {
    similarity(&Melody::new(a, None), &Melody::new(b, None)).map(|s| s.pitch)
}

/// IOI-only similarity of two IOI strings.
pub fn ioi_similarity(a: &str, b: &str) -> Result<u32> {
    let a_ranks = ioi_ranks(a)?;
    let b_ranks = ioi_ranks(b)?;
    if a_ranks.is_empty() || b_ranks.is_empty() {
        return Err(Error::InvalidSequence("IOI sequence is empty".into()));
    }
    let mut matrix = Matrix::new(a_ranks.len() + 1, b_ranks.len() + 1)?;
    Ok(matrix.fill(&a_ranks, &b_ranks, |&x, &y| IOI_MATRIX[x][y]) as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_pitch_scores_length() {
        assert_eq!(pitch_similarity("abcdefg", "abcdefg").unwrap(), 7);
    }

    #[test]
    fn disjoint_pitch_scores_zero() {
        assert_eq!(pitch_similarity("abcde", "zzzzz").unwrap(), 0);
    }

    #[test]
    fn local_alignment_finds_embedded_run() {
        // "cdef" inside noise on both sides
        assert_eq!(pitch_similarity("xxcdefxx", "yycdefyyy").unwrap(), 4);
        assert_eq!(pitch_similarity("abcde", "abcdf").unwrap(), 4);
    }

    #[test]
    fn mismatch_can_bridge_two_runs() {
        // abc + mismatch + efg = 3 - 1 + 3
        assert_eq!(pitch_similarity("abcxefg", "abcyefg").unwrap(), 5);
    }

    #[test]
    fn ioi_substitution_matrix_is_symmetric() {
        for i in 0..5 {
            for j in 0..5 {
                assert_eq!(IOI_MATRIX[i][j], IOI_MATRIX[j][i]);
            }
        }
    }

    #[test]
    fn ioi_pass_uses_substitution_scores() {
        assert_eq!(ioi_similarity("R", "R").unwrap(), 3);
        assert_eq!(ioi_similarity("SsRlL", "SsRlL").unwrap(), 1 + 2 + 3 + 2 + 1);
        assert_eq!(ioi_similarity("S", "L").unwrap(), 0);
    }

    #[test]
    fn weighted_and_additive_scores() {
        let q = Melody::new("abcde", Some("SsRlL"));
        let sim = similarity(&q, &q).unwrap();
        assert_eq!(sim, Similarity { pitch: 5, ioi: Some(9) });
        assert_eq!(sim.combined(ScoringMode::Weighted), R * R * 25.0 + 81.0);
        assert_eq!(sim.combined(ScoringMode::Additive), 14.0);
    }

    #[test]
    fn missing_ioi_side_scores_pitch_only() {
        let q = Melody::new("abcde", Some("SsRlL"));
        let c = Melody::new("abcde", None);
        let sim = similarity(&q, &c).unwrap();
        assert_eq!(sim.ioi, None);
        assert_eq!(sim.combined(ScoringMode::Weighted), R * R * 25.0);
    }

    #[test]
    fn score_is_symmetric() {
        let pairs = [
            (Melody::new("abacabad", Some("SsRlLSsR")), Melody::new("cabadaba", Some("RlLSsRlL"))),
            (Melody::new("aaaa", Some("SSSS")), Melody::new("aaaaaaaa", Some("SsSsSsSs"))),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(&a, &b).unwrap(), similarity(&b, &a).unwrap());
        }
    }

    #[test]
    fn rejects_empty_and_mismatched_pairs() {
        let ok = Melody::new("abc", Some("SsR"));
        assert!(matches!(similarity(&Melody::new("", None), &ok), Err(Error::InvalidSequence(_))));
        assert!(matches!(similarity(&ok, &Melody::new("abc", Some("Ss"))), Err(Error::InvalidSequence(_))));
    }

    #[test]
    fn rejects_unknown_ioi_symbol() {
        let q = Melody::new("abc", Some("SsX"));
        assert!(matches!(similarity(&q, &q), Err(Error::SymbolOutOfAlphabet { symbol: 'X' })));
    }
}
