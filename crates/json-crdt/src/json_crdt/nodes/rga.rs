//! Replicated Growable Array, shared by strings, byte buffers and arrays.
//!
//! Chunks live in a `Vec` arena and are linked in document order through
//! `left`/`right` indices. Slot 0 is the origin chunk: it carries the id of
//! the owning node, holds no content and is never deleted, so an insert
//! anchored on the node id lands in front of everything else.
//!
//! Lookups are linear scans over the arena.

use tracing::trace;

use crate::json_crdt::error::ModelError;
use crate::json_crdt_patch::clock::{contains_id, Ts, Tss};

// ── ChunkData ─────────────────────────────────────────────────────────────

/// Payload of a chunk: a run of items that can be split and concatenated.
pub trait ChunkData: Clone + Default {
    /// A single element of the sequence.
    type Item: Clone;

    /// Number of logical items (clock cycles) the payload covers.
    fn item_count(&self) -> u64;

    /// Split `self` at logical offset `at` (number of items before the split).
    /// Modifies `self` to hold items `[0, at)` and returns items `[at, len)`.
    fn split_at_offset(&mut self, at: usize) -> Self;

    /// Append `other` to the end of `self`.
    fn merge(&mut self, other: Self);

    /// The item at logical offset `offset`.
    fn item(&self, offset: usize) -> Option<Self::Item>;
}

impl ChunkData for String {
    type Item = char;

    fn item_count(&self) -> u64 {
        self.chars().count() as u64
    }

    fn split_at_offset(&mut self, at: usize) -> Self {
        let byte_pos = self
            .char_indices()
            .nth(at)
            .map(|(i, _)| i)
            .unwrap_or(self.len());
        self.split_off(byte_pos)
    }

    fn merge(&mut self, other: Self) {
        self.push_str(&other);
    }

    fn item(&self, offset: usize) -> Option<char> {
        self.chars().nth(offset)
    }
}

impl ChunkData for Vec<u8> {
    type Item = u8;

    fn item_count(&self) -> u64 {
        self.len() as u64
    }

    fn split_at_offset(&mut self, at: usize) -> Self {
        self.split_off(at)
    }

    fn merge(&mut self, mut other: Self) {
        self.append(&mut other);
    }

    fn item(&self, offset: usize) -> Option<u8> {
        self.get(offset).copied()
    }
}

impl ChunkData for Vec<Ts> {
    type Item = Ts;

    fn item_count(&self) -> u64 {
        self.len() as u64
    }

    fn split_at_offset(&mut self, at: usize) -> Self {
        self.split_off(at)
    }

    fn merge(&mut self, mut other: Self) {
        self.append(&mut other);
    }

    fn item(&self, offset: usize) -> Option<Ts> {
        self.get(offset).copied()
    }
}

// ── Chunk ─────────────────────────────────────────────────────────────────

/// A contiguous run of items with consecutive timestamps `id, id+1, ...`
/// under one session.
#[derive(Debug, Clone)]
pub struct Chunk<T> {
    /// Timestamp of the *first* item in this chunk.
    pub id: Ts,
    /// Number of logical items, deleted or not.
    pub span: u64,
    pub deleted: bool,
    /// `None` for tombstones and for the origin chunk.
    pub data: Option<T>,
    pub left: Option<usize>,
    pub right: Option<usize>,
}

impl<T> Chunk<T> {
    pub fn new(id: Ts, span: u64, data: T) -> Self {
        Self {
            id,
            span,
            deleted: false,
            data: Some(data),
            left: None,
            right: None,
        }
    }

    /// Live length: 0 for tombstones and the origin.
    pub fn len(&self) -> u64 {
        if self.deleted || self.data.is_none() {
            0
        } else {
            self.span
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Rga ───────────────────────────────────────────────────────────────────

/// An RGA sequence owned by one node.
#[derive(Debug, Clone)]
pub struct Rga<T> {
    pub chunks: Vec<Chunk<T>>,
    tail: usize,
}

const ORIGIN_CHUNK: usize = 0;

impl<T: ChunkData> Rga<T> {
    /// Creates an empty sequence whose origin chunk carries `id`.
    pub fn new(id: Ts) -> Self {
        let origin = Chunk {
            id,
            span: 1,
            deleted: false,
            data: None,
            left: None,
            right: None,
        };
        Self {
            chunks: vec![origin],
            tail: ORIGIN_CHUNK,
        }
    }

    /// Finds the chunk whose id range contains `id`, walking from the tail
    /// leftwards. The origin chunk matches the node id.
    pub fn find_chunk(&self, id: Ts) -> Option<usize> {
        let mut cur = Some(self.tail);
        while let Some(i) = cur {
            let chunk = &self.chunks[i];
            if contains_id(chunk.id, chunk.span, id) {
                return Some(i);
            }
            cur = chunk.left;
        }
        None
    }

    /// Inserts `data`, whose first item has timestamp `id`, right after the
    /// element `after`.
    ///
    /// Concurrent inserts anchored on the same element are ordered by
    /// descending timestamp. Returns `false` when nothing changed: the insert
    /// was already applied, the payload is empty, or `after` is unknown.
    pub fn insert(&mut self, after: Ts, id: Ts, data: T) -> bool {
        let span = data.item_count();
        if span == 0 {
            return false;
        }
        if self.find_chunk(id).is_some() {
            return false;
        }
        let Some(target) = self.find_chunk(after) else {
            trace!(after = %after, id = %id, "dropping insert with unknown anchor");
            return false;
        };

        let chunk = &self.chunks[target];
        let offset = after.time - chunk.id.time;
        if offset + 1 < chunk.span {
            self.split_chunk_at(target, (offset + 1) as usize);
        }

        let mut pos = target;
        while let Some(next) = self.chunks[pos].right {
            if self.chunks[next].id > id {
                pos = next;
            } else {
                break;
            }
        }

        if pos == target && self.can_append(target, id) {
            let chunk = &mut self.chunks[target];
            if let Some(existing) = chunk.data.as_mut() {
                existing.merge(data);
                chunk.span += span;
                return true;
            }
        }

        self.link_after(pos, Chunk::new(id, span, data));
        true
    }

    /// Whether `id` continues the last item of chunk `idx` in time.
    fn can_append(&self, idx: usize, id: Ts) -> bool {
        let chunk = &self.chunks[idx];
        idx != ORIGIN_CHUNK
            && !chunk.deleted
            && chunk.id.sid == id.sid
            && chunk.id.time + chunk.span == id.time
    }

    fn link_after(&mut self, idx: usize, mut chunk: Chunk<T>) -> usize {
        let new_idx = self.chunks.len();
        let right = self.chunks[idx].right;
        chunk.left = Some(idx);
        chunk.right = right;
        match right {
            Some(r) => self.chunks[r].left = Some(new_idx),
            None => self.tail = new_idx,
        }
        self.chunks[idx].right = Some(new_idx);
        self.chunks.push(chunk);
        new_idx
    }

    // ── Chunk splitting ──────────────────────────────────────────────────

    /// Splits chunk `idx` so it keeps items `[0, at)`; the remainder is linked
    /// right after it. Returns the index of the new right half.
    fn split_chunk_at(&mut self, idx: usize, at: usize) -> usize {
        let chunk = &mut self.chunks[idx];
        let right_data = chunk.data.as_mut().map(|d| d.split_at_offset(at));
        let right = Chunk {
            id: Ts::new(chunk.id.sid, chunk.id.time + at as u64),
            span: chunk.span - at as u64,
            deleted: chunk.deleted,
            data: right_data,
            left: None,
            right: None,
        };
        chunk.span = at as u64;
        self.link_after(idx, right)
    }

    // ── Deletion ─────────────────────────────────────────────────────────

    /// Tombstones every item covered by `spans`.
    ///
    /// Chunks partially covered are split at the span boundaries first, so
    /// only the targeted items are removed. Already deleted items and the
    /// origin are left alone, which makes re-applying a delete a no-op.
    pub fn delete(&mut self, spans: &[Tss]) {
        for tss in spans {
            let del_start = tss.time;
            let del_end = tss.time + tss.span;

            let mut i = ORIGIN_CHUNK + 1;
            while i < self.chunks.len() {
                let chunk = &self.chunks[i];
                if chunk.deleted || chunk.id.sid != tss.sid {
                    i += 1;
                    continue;
                }
                let chunk_start = chunk.id.time;
                let chunk_end = chunk_start + chunk.span;
                if chunk_start >= del_end || chunk_end <= del_start {
                    i += 1;
                    continue;
                }

                // The right half is pushed onto the arena and visited later.
                if del_start > chunk_start {
                    self.split_chunk_at(i, (del_start - chunk_start) as usize);
                    i += 1;
                    continue;
                }
                if del_end < chunk_end {
                    self.split_chunk_at(i, (del_end - chunk_start) as usize);
                }

                let chunk = &mut self.chunks[i];
                chunk.deleted = true;
                chunk.data = None;
                i += 1;
            }
        }
    }

    // ── Iteration ────────────────────────────────────────────────────────

    /// Content chunks (tombstones included) in document order.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            chunks: &self.chunks,
            cur: self.chunks[ORIGIN_CHUNK].right,
        }
    }

    /// Iterate live (non-deleted) chunks.
    pub fn iter_live(&self) -> impl Iterator<Item = &Chunk<T>> {
        self.iter().filter(|c| !c.is_empty())
    }

    // ── Queries ──────────────────────────────────────────────────────────

    /// Number of live items.
    pub fn length(&self) -> usize {
        self.iter_live().map(|c| c.len() as usize).sum()
    }

    /// Total span of all content chunks, live and deleted.
    pub fn total_span(&self) -> u64 {
        self.iter().map(|c| c.span).sum()
    }

    /// Locates the live item at `index`: its chunk and offset inside it.
    fn locate(&self, index: usize) -> Option<(&Chunk<T>, usize)> {
        let mut count = 0usize;
        for chunk in self.iter_live() {
            let len = chunk.len() as usize;
            if index < count + len {
                return Some((chunk, index - count));
            }
            count += len;
        }
        None
    }

    /// Timestamp of the live item at `index`.
    pub fn find_id(&self, index: usize) -> Result<Ts, ModelError> {
        let (chunk, offset) = self.locate(index).ok_or(ModelError::OutOfBounds)?;
        Ok(Ts::new(chunk.id.sid, chunk.id.time + offset as u64))
    }

    /// The live item at `index`.
    pub fn find_value(&self, index: usize) -> Result<T::Item, ModelError> {
        let (chunk, offset) = self.locate(index).ok_or(ModelError::OutOfBounds)?;
        chunk
            .data
            .as_ref()
            .and_then(|d| d.item(offset))
            .ok_or(ModelError::OutOfBounds)
    }

    /// Contiguous timestamp spans covering live items `[index, index + len)`.
    pub fn find_id_spans(&self, index: usize, len: usize) -> Result<Vec<Tss>, ModelError> {
        let end = index.checked_add(len).ok_or(ModelError::OutOfBounds)?;
        if end > self.length() {
            return Err(ModelError::OutOfBounds);
        }
        let mut spans: Vec<Tss> = Vec::new();
        let mut count = 0usize;
        for chunk in self.iter_live() {
            if count >= end {
                break;
            }
            let chunk_len = chunk.len() as usize;
            let chunk_start = count;
            let chunk_end = count + chunk_len;
            count = chunk_end;
            if chunk_end <= index {
                continue;
            }
            let local_start = index.saturating_sub(chunk_start);
            let local_end = (end - chunk_start).min(chunk_len);
            let time = chunk.id.time + local_start as u64;
            let span = (local_end - local_start) as u64;
            match spans.last_mut() {
                Some(last) if last.sid == chunk.id.sid && last.time + last.span == time => {
                    last.span += span;
                }
                _ => spans.push(Tss::new(chunk.id.sid, time, span)),
            }
        }
        Ok(spans)
    }

    /// The live item with timestamp `id`, if any.
    pub fn get_by_id(&self, id: Ts) -> Option<T::Item> {
        let chunk = &self.chunks[self.find_chunk(id)?];
        let offset = (id.time - chunk.id.time) as usize;
        chunk.data.as_ref().and_then(|d| d.item(offset))
    }

    /// Concatenation of all live payloads.
    pub fn view(&self) -> T {
        let mut out = T::default();
        for chunk in self.iter_live() {
            if let Some(data) = &chunk.data {
                out.merge(data.clone());
            }
        }
        out
    }
}

/// Iterator over content chunks in link order.
pub struct Iter<'a, T> {
    chunks: &'a [Chunk<T>],
    cur: Option<usize>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a Chunk<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let chunk = &self.chunks[self.cur?];
        self.cur = chunk.right;
        Some(chunk)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::json_crdt_patch::clock::{ts, tss};

    const NODE: Ts = Ts::new(1, 0);

    fn text(rga: &Rga<String>) -> String {
        rga.view()
    }

    #[test]
    fn insert_single_chunk() {
        let mut rga: Rga<String> = Rga::new(NODE);
        assert!(rga.insert(NODE, ts(1, 1), "hello".to_string()));
        assert_eq!(rga.iter().count(), 1);
        assert_eq!(text(&rga), "hello");
        assert_eq!(rga.length(), 5);
    }

    #[test]
    fn append_merges_into_previous_chunk() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "ab".to_string());
        rga.insert(ts(1, 2), ts(1, 3), "cd".to_string());
        assert_eq!(rga.iter().count(), 1);
        assert_eq!(text(&rga), "abcd");
    }

    #[test]
    fn insert_mid_chunk_splits() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "held".to_string());
        rga.insert(ts(1, 3), ts(2, 10), "lo worl".to_string());
        assert_eq!(text(&rga), "hello world");
        assert_eq!(rga.iter().count(), 3);
    }

    #[test]
    fn concurrent_inserts_order_by_descending_timestamp() {
        let a = (ts(1, 5), "x".to_string());
        let b = (ts(2, 5), "y".to_string());

        let mut left: Rga<String> = Rga::new(NODE);
        left.insert(NODE, a.0, a.1.clone());
        left.insert(NODE, b.0, b.1.clone());

        let mut right: Rga<String> = Rga::new(NODE);
        right.insert(NODE, b.0, b.1);
        right.insert(NODE, a.0, a.1);

        assert_eq!(text(&left), "yx");
        assert_eq!(text(&right), "yx");
    }

    #[test]
    fn concurrent_insert_skips_newer_subtree() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(2, 10), "b".to_string());
        rga.insert(ts(2, 10), ts(2, 11), "c".to_string());
        rga.insert(NODE, ts(1, 3), "a".to_string());
        assert_eq!(text(&rga), "bca");
    }

    #[test]
    fn reapplying_insert_is_noop() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "abc".to_string());
        assert!(!rga.insert(NODE, ts(1, 1), "abc".to_string()));
        rga.insert(ts(1, 3), ts(1, 4), "d".to_string());
        assert!(!rga.insert(ts(1, 3), ts(1, 4), "d".to_string()));
        assert_eq!(text(&rga), "abcd");
    }

    #[test]
    fn insert_with_unknown_anchor_is_dropped() {
        let mut rga: Rga<String> = Rga::new(NODE);
        assert!(!rga.insert(ts(9, 9), ts(1, 1), "x".to_string()));
        assert_eq!(rga.length(), 0);
    }

    #[test]
    fn partial_delete_middle() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "hello".to_string());
        rga.delete(&[tss(1, 2, 3)]);
        assert_eq!(text(&rga), "ho");
        assert_eq!(rga.total_span(), 5);
    }

    #[test]
    fn partial_delete_prefix_and_suffix() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "hello".to_string());
        rga.delete(&[tss(1, 1, 2)]);
        assert_eq!(text(&rga), "llo");
        rga.delete(&[tss(1, 4, 2)]);
        assert_eq!(text(&rga), "l");
    }

    #[test]
    fn delete_spanning_chunks_and_reapply() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "he".to_string());
        rga.insert(ts(1, 2), ts(2, 3), "llo".to_string());
        rga.delete(&[tss(1, 2, 1), tss(2, 3, 1)]);
        assert_eq!(text(&rga), "hlo");
        rga.delete(&[tss(1, 2, 1), tss(2, 3, 1)]);
        assert_eq!(text(&rga), "hlo");
        assert_eq!(rga.total_span(), 5);
    }

    #[test]
    fn delete_never_touches_origin() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "ab".to_string());
        rga.delete(&[tss(1, 0, 3)]);
        assert_eq!(text(&rga), "");
        assert!(rga.insert(NODE, ts(1, 5), "z".to_string()));
        assert_eq!(text(&rga), "z");
    }

    #[test]
    fn insert_after_tombstone() {
        let mut rga: Rga<String> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), "abc".to_string());
        rga.delete(&[tss(1, 2, 1)]);
        rga.insert(ts(1, 2), ts(2, 9), "X".to_string());
        assert_eq!(text(&rga), "aXc");
    }

    #[test]
    fn find_id_and_value() {
        let mut rga: Rga<Vec<u8>> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), vec![10, 20, 30]);
        rga.delete(&[tss(1, 1, 1)]);
        assert_eq!(rga.find_id(0), Ok(ts(1, 2)));
        assert_eq!(rga.find_value(1), Ok(30));
        assert_eq!(rga.find_id(2), Err(ModelError::OutOfBounds));
        assert_eq!(rga.get_by_id(ts(1, 3)), Some(30));
        assert_eq!(rga.get_by_id(ts(1, 1)), None);
    }

    #[test]
    fn find_id_spans_crosses_chunks() {
        let mut rga: Rga<Vec<Ts>> = Rga::new(NODE);
        rga.insert(NODE, ts(1, 1), vec![ts(1, 100), ts(1, 101)]);
        rga.insert(ts(1, 2), ts(2, 5), vec![ts(2, 100), ts(2, 101)]);
        let spans = rga.find_id_spans(1, 2).unwrap();
        assert_eq!(spans, vec![tss(1, 2, 1), tss(2, 5, 1)]);
        assert_eq!(rga.find_id_spans(3, 2), Err(ModelError::OutOfBounds));
        assert_eq!(rga.find_id_spans(4, 0), Ok(vec![]));
    }
}
