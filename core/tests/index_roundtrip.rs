use melodex_core::index::{ngram_id, NGramIndex, GRAM_LEN};
use melodex_core::persist::{load_meta, save_index, save_meta, write_title, IndexPaths, IndexReader, MetaFile};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use tempfile::tempdir;

const DOCS: &[(&str, &str)] = &[
    ("Ode", "abcdeabcdeabcde"),
    ("Air", "cdefgh"),
    ("Jig", "yxwvutabcde"),
    ("Hum", "abc"),
    ("Reel", "bcdefbcdef"),
];

#[test]
fn saved_postings_hold_each_document_once_in_order() {
    let dir = tempdir().unwrap();
    let paths = IndexPaths::new(dir.path().join("idx"));

    let mut index = NGramIndex::new().unwrap();
    let mut titles = BufWriter::new(File::create(paths.titles()).unwrap());
    for (doc, (title, melody)) in DOCS.iter().enumerate() {
        index.index_sequence(melody, doc as u32).unwrap();
        write_title(&mut titles, title).unwrap();
    }
    drop(titles);

    let stats = save_index(
        &mut index,
        BufWriter::new(File::create(paths.pointers()).unwrap()),
        BufWriter::new(File::create(paths.postings()).unwrap()),
    )
    .unwrap();
    save_meta(&paths, &MetaFile::new(DOCS.len() as u32, &stats)).unwrap();

    let mut expected: BTreeMap<String, Vec<u32>> = BTreeMap::new();
    for (doc, (_, melody)) in DOCS.iter().enumerate() {
        let chars: Vec<char> = melody.chars().collect();
        for w in chars.windows(GRAM_LEN) {
            let list = expected.entry(w.iter().collect()).or_default();
            if !list.contains(&(doc as u32)) {
                list.push(doc as u32);
            }
        }
    }

    let reader = IndexReader::open(&paths).unwrap();
    assert_eq!(reader.num_docs(), DOCS.len());
    for (gram, docs) in &expected {
        assert_eq!(&reader.postings(gram).unwrap(), docs, "gram {gram}");
    }
    assert_eq!(reader.documents_containing("abcde").unwrap(), vec!["Ode", "Jig"]);
    assert_eq!(reader.documents_containing("bcdef").unwrap(), vec!["Reel"]);
    assert!(reader.postings("aaaaa").unwrap().is_empty());

    let meta = load_meta(&paths).unwrap();
    assert_eq!(meta.num_docs, DOCS.len() as u32);
    assert_eq!(meta.num_grams, expected.len() as u64);
    assert_eq!(meta.postings_bytes, std::fs::metadata(paths.postings()).unwrap().len());
    assert!(ngram_id(expected.keys().next().unwrap()).is_ok());
}
