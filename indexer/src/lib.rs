use anyhow::{Context, Result};
use melodex_core::persist::{save_index, save_meta, write_title, IndexPaths, IndexReader, MetaFile};
use melodex_core::record::parse_record;
use melodex_core::{DocId, NGramIndex};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{self, BufRead, BufWriter, Write};
use std::path::Path;

const PROGRESS_EVERY: u32 = 100;
const WRITE_BUFFER: usize = 1 << 20;

#[derive(Debug, Clone, Serialize)]
pub struct BuildSummary {
    pub num_docs: u32,
    pub num_grams: u64,
    pub postings_bytes: u64,
    pub nibbles: u64,
}

/// Builds an index named by `paths` from the records in `corpus`.
///
/// Every `p:` and `pi:` record becomes a document numbered in corpus order;
/// its pitch string is indexed and its title appended to the title lookup.
/// Blank lines are skipped. Any malformed record or unindexable melody aborts
/// the build.
///
/// All index files are truncated and any old meta file removed before the
/// corpus is read, so a failed build never leaves titles from one corpus next
/// to postings from another.
pub fn build_index<R: BufRead>(corpus: R, paths: &IndexPaths) -> Result<BuildSummary> {
    paths.create_parent()?;
    remove_stale(&paths.meta())?;
    let pointers_path = paths.pointers();
    let postings_path = paths.postings();
    let titles_path = paths.titles();
    let pointers = create(&pointers_path)?;
    let postings = create(&postings_path)?;
    let mut titles = BufWriter::new(create(&titles_path)?);

    tracing::info!("initializing index structure");
    let mut index = NGramIndex::new()?;
    let mut next_doc: DocId = 0;

    for (line_no, line) in corpus.lines().enumerate() {
        let line = line.with_context(|| format!("reading corpus line {}", line_no + 1))?;
        if line.trim().is_empty() {
            continue;
        }
        let record = parse_record(&line).with_context(|| format!("corpus line {}", line_no + 1))?;
        let doc = next_doc;
        index
            .index_sequence(&record.pitch, doc)
            .with_context(|| format!("indexing {:?} (line {})", record.title, line_no + 1))?;
        write_title(&mut titles, &record.title).with_context(|| format!("writing {}", titles_path.display()))?;

        next_doc = next_doc.checked_add(1).context("document ordinals exhausted")?;
        if doc % PROGRESS_EVERY == 0 {
            tracing::debug!(docs = next_doc, grams = index.non_empty_grams(), "indexing");
        }
    }
    titles.flush().with_context(|| format!("writing {}", titles_path.display()))?;
    tracing::info!(num_docs = next_doc, num_grams = index.non_empty_grams(), "ingested documents");

    tracing::info!(pointers = %pointers_path.display(), postings = %postings_path.display(), "writing index");
    let stats = save_index(
        &mut index,
        BufWriter::with_capacity(WRITE_BUFFER, pointers),
        BufWriter::with_capacity(WRITE_BUFFER, postings),
    )
    .with_context(|| format!("writing {} and {}", pointers_path.display(), postings_path.display()))?;
    tracing::info!(postings_bytes = stats.postings_bytes, nibbles = stats.nibbles, "index written");
    drop(index);
    save_meta(paths, &MetaFile::new(next_doc, &stats))?;

    Ok(BuildSummary {
        num_docs: next_doc,
        num_grams: stats.non_empty,
        postings_bytes: stats.postings_bytes,
        nibbles: stats.nibbles,
    })
}

fn create(path: &Path) -> Result<File> {
    File::create(path).with_context(|| format!("creating {}", path.display()))
}

fn remove_stale(path: &Path) -> Result<()> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("removing {}", path.display())),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupResult {
    pub gram: String,
    pub documents: Vec<LookupHit>,
}

#[derive(Debug, Clone, Serialize)]
pub struct LookupHit {
    pub doc_id: DocId,
    pub title: String,
}

/// Lists the documents of a saved index that contain `gram`.
pub fn lookup(paths: &IndexPaths, gram: &str) -> Result<LookupResult> {
    let reader = IndexReader::open(paths)?;
    let documents = reader
        .postings(gram)?
        .into_iter()
        .map(|doc_id| {
            let title = reader
                .title(doc_id)
                .with_context(|| format!("document {doc_id} missing from {}", paths.titles().display()))?;
            Ok(LookupHit { doc_id, title: title.to_string() })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(LookupResult { gram: gram.to_string(), documents })
}
