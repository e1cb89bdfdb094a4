use serde::Serialize;

pub const DEFAULT_MAX_CHUNK_SIZE: usize = 2000;

/// A contiguous run of fragments sent to the model in one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Chunk {
    pub index: usize,
    /// Ordinal of the first fragment of this chunk in the full sequence.
    pub start_offset: usize,
    pub fragments: Vec<String>,
}

impl Chunk {
    pub fn len(&self) -> usize {
        self.fragments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fragments.is_empty()
    }

    pub fn char_len(&self) -> usize {
        self.fragments.iter().map(|fragment| fragment_len(fragment)).sum()
    }
}

/// Splits fragments into ordered chunks whose summed length stays below
/// `max_chunk_size`. A chunk is closed before it would reach the limit, and a
/// fragment at or above the limit gets a chunk of its own.
pub fn chunk_fragments(fragments: &[String], max_chunk_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = Vec::new();
    let mut current_size = 0usize;
    let mut start_offset = 0usize;

    for fragment in fragments {
        let size = fragment_len(fragment);
        if !current.is_empty() && current_size + size >= max_chunk_size {
            let taken = std::mem::take(&mut current);
            let len = taken.len();
            chunks.push(Chunk {
                index: chunks.len(),
                start_offset,
                fragments: taken,
            });
            start_offset += len;
            current_size = 0;
        }
        current.push(fragment.clone());
        current_size += size;
    }

    if !current.is_empty() {
        chunks.push(Chunk {
            index: chunks.len(),
            start_offset,
            fragments: current,
        });
    }

    chunks
}

fn fragment_len(fragment: &str) -> usize {
    fragment.chars().count()
}
