pub mod align;
pub mod error;
pub mod index;
pub mod persist;
pub mod record;
pub mod topk;
pub mod varint;

pub use align::{similarity, Melody, ScoringMode, Similarity};
pub use error::{Error, Result};
pub use index::{ngram_from_id, ngram_id, DocId, GramId, NGramIndex};
pub use record::{parse_record, Record, RecordKind};
pub use topk::{Answer, BoundedMinHeap, Score, TopKRanker};
