use crate::error::{Error, Result};

pub type DocId = u32;
pub type GramId = u32;

/// Pitch-contour symbols in canonical order.
pub const ALPHABET: &[u8; 25] = b"abcdefghijklmnopqrstuvwxy";
pub const GRAM_LEN: usize = 5;
/// 25^5
pub const NUM_GRAMS: usize = 9_765_625;

const EMPTY: u32 = u32::MAX;

fn symbol_rank(symbol: u8) -> Option<u32> {
    ALPHABET.iter().position(|&s| s == symbol).map(|p| p as u32)
}

/// Maps a 5-symbol gram to its base-25 id, leftmost symbol most significant.
pub fn ngram_id(gram: &str) -> Result<GramId> {
    if gram.chars().count() != GRAM_LEN {
        return Err(Error::InvalidSequence(format!("gram {gram:?} is not {GRAM_LEN} symbols long")));
    }
    gram.chars().try_fold(0u32, |id, ch| -> Result<GramId> {
        let rank = u8::try_from(ch).ok().and_then(symbol_rank).ok_or(Error::SymbolOutOfAlphabet { symbol: ch })?;
        Ok(id * ALPHABET.len() as u32 + rank)
    })
}

/// Inverse of [`ngram_id`]. Returns `None` for ids outside `0..NUM_GRAMS`.
pub fn ngram_from_id(id: GramId) -> Option<String> {
    if id as usize >= NUM_GRAMS {
        return None;
    }
    let radix = ALPHABET.len() as u32;
    let mut buf = [0u8; GRAM_LEN];
    let mut rest = id;
    for slot in buf.iter_mut().rev() {
        *slot = ALPHABET[(rest % radix) as usize];
        rest /= radix;
    }
    Some(buf.iter().map(|&b| b as char).collect())
}

/// In-memory n-gram inverted index.
///
/// Every possible gram owns one slot in a dense table; a slot points into the
/// list arena once the gram has been seen. Posting lists keep insertion order
/// until [`NGramIndex::sort_postings`] runs at write time.
pub struct NGramIndex {
    slots: Vec<u32>,
    lists: Vec<Vec<DocId>>,
}

impl NGramIndex {
    pub fn new() -> Result<Self> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(NUM_GRAMS).map_err(|e| Error::alloc("n-gram slot table", e))?;
        slots.resize(NUM_GRAMS, EMPTY);
        Ok(Self { slots, lists: Vec::new() })
    }

    /// Records that `doc` contains `gram`. Idempotent per (gram, doc).
    pub fn put(&mut self, gram: &str, doc: DocId) -> Result<()> {
        let id = ngram_id(gram)?;
        self.put_id(id, doc)
    }

    pub fn put_id(&mut self, id: GramId, doc: DocId) -> Result<()> {
        let slot = self
            .slots
            .get_mut(id as usize)
            .ok_or_else(|| Error::InvalidSequence(format!("gram id {id} out of range")))?;
        if *slot == EMPTY {
            self.lists.try_reserve(1).map_err(|e| Error::alloc("posting list arena", e))?;
            *slot = self.lists.len() as u32;
            self.lists.push(Vec::new());
        }
        let list = &mut self.lists[*slot as usize];
        // Ordinals arrive in corpus order, so the tail check settles most repeats.
        if list.last() == Some(&doc) || list.contains(&doc) {
            return Ok(());
        }
        list.try_reserve(1).map_err(|e| Error::alloc("posting list", e))?;
        list.push(doc);
        Ok(())
    }

    /// Slides a gram-sized window over `melody` and puts every window.
    ///
    /// All windows are resolved before any is recorded, so a melody with an
    /// out-of-alphabet symbol leaves the index untouched.
    pub fn index_sequence(&mut self, melody: &str, doc: DocId) -> Result<()> {
        let symbols: Vec<char> = melody.chars().collect();
        if symbols.len() < GRAM_LEN {
            return Ok(());
        }
        let mut gram = String::with_capacity(GRAM_LEN);
        let ids = symbols
            .windows(GRAM_LEN)
            .map(|window| {
                gram.clear();
                gram.extend(window);
                ngram_id(&gram)
            })
            .collect::<Result<Vec<_>>>()?;
        for id in ids {
            self.put_id(id, doc)?;
        }
        Ok(())
    }

    pub fn posting_list(&self, id: GramId) -> &[DocId] {
        match self.slots.get(id as usize) {
            Some(&slot) if slot != EMPTY => &self.lists[slot as usize],
            _ => &[],
        }
    }

    /// Sorts one gram's postings ascending.
    pub fn sort_postings(&mut self, id: GramId) {
        if let Some(&slot) = self.slots.get(id as usize) {
            if slot != EMPTY {
                let list = &mut self.lists[slot as usize];
                if list.len() > 1 {
                    list.sort_unstable();
                }
            }
        }
    }

    /// Number of grams seen at least once.
    pub fn non_empty_grams(&self) -> usize {
        self.lists.len()
    }

    /// Same as [`NGramIndex::non_empty_grams`]; pairs with `is_empty`.
    pub fn len(&self) -> usize {
        self.non_empty_grams()
    }

    /// Size of the slot table, one slot per possible gram.
    pub fn num_slots(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}
