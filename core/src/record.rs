use crate::error::{Error, Result};
use lazy_static::lazy_static;
use regex::Regex;

/// Field delimiter inside a record.
pub const SEPARATOR: &str = "***";

lazy_static! {
    static ref RECORD: Regex = Regex::new(r"^(?P<tag>pi|p):(?P<title>.*?)\*\*\*(?P<rest>.*)$").expect("valid regex");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    /// `p:` pitch-only record.
    Pitch,
    /// `pi:` pitch record with co-indexed IOI symbols.
    PitchIoi,
}

/// One corpus or query line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    pub kind: RecordKind,
    pub title: String,
    pub pitch: String,
    pub ioi: Option<String>,
}

impl Record {
    pub fn pitch(title: &str, pitch: &str) -> Self {
        Self { kind: RecordKind::Pitch, title: title.to_string(), pitch: pitch.to_string(), ioi: None }
    }

    pub fn pitch_ioi(title: &str, pitch: &str, ioi: &str) -> Self {
        Self {
            kind: RecordKind::PitchIoi,
            title: title.to_string(),
            pitch: pitch.to_string(),
            ioi: Some(ioi.to_string()),
        }
    }
}

/// Parses `p:<title>***<pitch>` or `pi:<title>***<pitch>***<ioi>`.
///
/// Trailing line terminators are ignored. Any other shape is a
/// [`Error::MalformedRecord`].
pub fn parse_record(line: &str) -> Result<Record> {
    let line = line.trim_end_matches(['\n', '\r']);
    let caps = RECORD
        .captures(line)
        .ok_or_else(|| Error::MalformedRecord(format!("missing type tag or delimiter: {line:?}")))?;
    let title = &caps["title"];
    let rest = &caps["rest"];
    match &caps["tag"] {
        "p" => Ok(Record::pitch(title, rest)),
        _ => {
            let (pitch, ioi) = rest
                .split_once(SEPARATOR)
                .ok_or_else(|| Error::MalformedRecord(format!("missing IOI field: {line:?}")))?;
            Ok(Record::pitch_ioi(title, pitch, ioi))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_only_record() {
        let r = parse_record("p:Yesterday***abcde\n").unwrap();
        assert_eq!(r, Record::pitch("Yesterday", "abcde"));
    }

    #[test]
    fn pitch_ioi_record() {
        let r = parse_record("pi:Tune 7***abc***SsR\r\n").unwrap();
        assert_eq!(r.kind, RecordKind::PitchIoi);
        assert_eq!(r.title, "Tune 7");
        assert_eq!(r.pitch, "abc");
        assert_eq!(r.ioi.as_deref(), Some("SsR"));
    }

    #[test]
    fn title_stops_at_first_delimiter() {
        let r = parse_record("p:a*b***xy").unwrap();
        assert_eq!(r.title, "a*b");
        assert_eq!(r.pitch, "xy");
    }

    #[test]
    fn rejects_missing_tag_or_delimiter() {
        for line in ["", "x:t***abc", "t***abc", "p:title-only", "pi:t***abc", "P:t***abc"] {
            assert!(matches!(parse_record(line), Err(Error::MalformedRecord(_))), "{line:?}");
        }
    }
}
