use crate::error::{Error, Result};
use crate::index::{ngram_id, DocId, GramId, NGramIndex, NUM_GRAMS};
use crate::varint;
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

/// Width of one pointer-file entry.
pub const POS_SIZE: usize = 4;
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaFile {
    pub num_docs: u32,
    /// Grams with a non-empty posting list.
    pub num_grams: u64,
    pub postings_bytes: u64,
    pub nibbles: u64,
    pub created_at: String,
    pub version: u32,
}

impl MetaFile {
    pub fn new(num_docs: u32, stats: &SaveStats) -> Self {
        let created_at = match time::OffsetDateTime::now_utc().format(&time::format_description::well_known::Rfc3339) {
            Ok(stamp) => stamp,
            Err(e) => {
                tracing::warn!(error = %e, "could not format index timestamp; leaving created_at empty");
                String::new()
            }
        };
        Self {
            num_docs,
            num_grams: stats.non_empty,
            postings_bytes: stats.postings_bytes,
            nibbles: stats.nibbles,
            created_at,
            version: FORMAT_VERSION,
        }
    }
}

/// File names of one index, all sharing a base name.
#[derive(Debug, Clone)]
pub struct IndexPaths {
    pub base: PathBuf,
}

impl IndexPaths {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self { base: base.as_ref().to_path_buf() }
    }
    fn with_suffix(&self, suffix: &str) -> PathBuf {
        let mut name = self.base.clone().into_os_string();
        name.push(suffix);
        PathBuf::from(name)
    }
    pub fn pointers(&self) -> PathBuf { self.with_suffix(".fipp") }
    pub fn postings(&self) -> PathBuf { self.with_suffix(".filp") }
    pub fn titles(&self) -> PathBuf { self.with_suffix(".fdl") }
    pub fn meta(&self) -> PathBuf { self.with_suffix(".meta.json") }

    /// Creates the directory holding the index files, if any.
    pub fn create_parent(&self) -> Result<()> {
        match self.base.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => {
                fs::create_dir_all(dir).map_err(|e| Error::file(dir, e))
            }
            _ => Ok(()),
        }
    }
}

/// Totals from one [`save_index`] run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SaveStats {
    pub entries: u64,
    pub non_empty: u64,
    pub postings_bytes: u64,
    pub nibbles: u64,
}

/// Tracks how many bytes went through the inner writer.
struct CountingWriter<W> {
    inner: W,
    written: u64,
}

impl<W: Write> Write for CountingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.written += n as u64;
        Ok(n)
    }
    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

/// Writes the pointer and postings files for `index`.
///
/// Gram ids are visited in ascending order and never stored: the i-th pointer
/// belongs to gram i. Posting lists are sorted in place before they are
/// written.
pub fn save_index<P: Write, L: Write>(index: &mut NGramIndex, mut pointers: P, postings: L) -> Result<SaveStats> {
    let mut postings = CountingWriter { inner: postings, written: 0 };
    let mut stats = SaveStats::default();

    for id in 0..NUM_GRAMS as GramId {
        let offset = postings.written;
        if offset > u32::MAX as u64 {
            return Err(Error::Io(io::Error::new(
                io::ErrorKind::Other,
                format!("postings offset {offset} does not fit in {POS_SIZE} bytes"),
            )));
        }
        stats.nibbles += varint::write_fixed(&mut pointers, offset, POS_SIZE)? as u64;

        index.sort_postings(id);
        let list = index.posting_list(id);
        if !list.is_empty() {
            stats.non_empty += 1;
        }
        stats.nibbles += varint::write_varint(&mut postings, list.len() as u64)? as u64;
        for &doc in list {
            stats.nibbles += varint::write_varint(&mut postings, doc as u64)? as u64;
        }
        stats.entries += 1;
    }
    pointers.flush()?;
    postings.flush()?;
    stats.postings_bytes = postings.written;
    Ok(stats)
}

/// Appends one line to the title lookup.
pub fn write_title<W: Write>(w: &mut W, title: &str) -> io::Result<()> {
    writeln!(w, "{title}")
}

pub fn save_meta(paths: &IndexPaths, meta: &MetaFile) -> Result<()> {
    let path = paths.meta();
    let f = File::create(&path).map_err(|e| Error::file(&path, e))?;
    let mut w = BufWriter::new(f);
    serde_json::to_writer_pretty(&mut w, meta).map_err(|e| Error::file(&path, e.into()))?;
    w.flush().map_err(|e| Error::file(&path, e))?;
    Ok(())
}

pub fn load_meta(paths: &IndexPaths) -> Result<MetaFile> {
    let path = paths.meta();
    let f = File::open(&path).map_err(|e| Error::file(&path, e))?;
    serde_json::from_reader(BufReader::new(f))
        .map_err(|e| Error::CorruptIndex(format!("{}: {e}", path.display())))
}

/// Read side of a saved index.
pub struct IndexReader {
    pointers: Vec<u8>,
    postings: Vec<u8>,
    titles: Vec<String>,
}

impl IndexReader {
    pub fn open(paths: &IndexPaths) -> Result<Self> {
        let pointers = read_file(&paths.pointers())?;
        let postings = read_file(&paths.postings())?;
        let titles_path = paths.titles();
        let f = File::open(&titles_path).map_err(|e| Error::file(&titles_path, e))?;
        let titles = BufReader::new(f)
            .lines()
            .collect::<io::Result<Vec<_>>>()
            .map_err(|e| Error::file(&titles_path, e))?;
        let reader = Self::from_parts(pointers, postings, titles)?;
        tracing::debug!(base = %paths.base.display(), docs = reader.num_docs(), "opened index");
        Ok(reader)
    }

    pub fn from_parts(pointers: Vec<u8>, postings: Vec<u8>, titles: Vec<String>) -> Result<Self> {
        if pointers.len() != NUM_GRAMS * POS_SIZE {
            return Err(Error::CorruptIndex(format!(
                "pointer file holds {} bytes, expected {}",
                pointers.len(),
                NUM_GRAMS * POS_SIZE
            )));
        }
        Ok(Self { pointers, postings, titles })
    }

    pub fn num_docs(&self) -> usize {
        self.titles.len()
    }

    pub fn title(&self, doc: DocId) -> Option<&str> {
        self.titles.get(doc as usize).map(String::as_str)
    }

    /// Decodes the posting list of gram `id`.
    pub fn postings_for_id(&self, id: GramId) -> Result<Vec<DocId>> {
        let at = id as usize * POS_SIZE;
        let offset = self
            .pointers
            .get(at..at + POS_SIZE)
            .and_then(|b| varint::decode_fixed(b, POS_SIZE))
            .ok_or_else(|| Error::CorruptIndex(format!("no pointer for gram id {id}")))?;
        let mut rest = self
            .postings
            .get(offset as usize..)
            .ok_or_else(|| Error::CorruptIndex(format!("offset {offset} past end of postings")))?;

        let mut next = || -> Result<u64> {
            let (value, used) = varint::decode(rest)
                .ok_or_else(|| Error::CorruptIndex(format!("bad varint in list of gram id {id}")))?;
            rest = &rest[used..];
            Ok(value)
        };
        let count = next()?;
        let mut docs = Vec::new();
        docs.try_reserve(count.min(self.postings.len() as u64) as usize)
            .map_err(|e| Error::alloc("decoded posting list", e))?;
        for _ in 0..count {
            let doc = next()?;
            let doc = DocId::try_from(doc)
                .map_err(|_| Error::CorruptIndex(format!("document ordinal {doc} out of range")))?;
            docs.push(doc);
        }
        Ok(docs)
    }

    pub fn postings(&self, gram: &str) -> Result<Vec<DocId>> {
        self.postings_for_id(ngram_id(gram)?)
    }

    /// Titles of the documents containing `gram`, in ordinal order.
    pub fn documents_containing(&self, gram: &str) -> Result<Vec<&str>> {
        self.postings(gram)?
            .into_iter()
            .map(|doc| {
                self.title(doc)
                    .ok_or_else(|| Error::CorruptIndex(format!("document ordinal {doc} has no title")))
            })
            .collect()
    }
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::file(path, e))
}
