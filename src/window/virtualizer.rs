use crate::config::{DEFAULT_WINDOW_BATCH_SIZE, DEFAULT_WINDOW_OVERSCAN};
use serde::Serialize;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IngestProgress {
    pub processed: usize,
    pub total: usize,
    pub is_processing: bool,
    pub cancelled: bool,
}

impl IngestProgress {
    pub fn is_settled(&self) -> bool {
        !self.is_processing || self.cancelled
    }
}

// The processed prefix is `source[..processed_len]`; batches only move the boundary.
#[derive(Debug, Clone)]
pub struct Virtualizer<T> {
    source: Vec<T>,
    processed_len: usize,
    batch_size: usize,
    overscan: usize,
    requested: Range<usize>,
}

impl<T> Default for Virtualizer<T> {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW_BATCH_SIZE, DEFAULT_WINDOW_OVERSCAN)
    }
}

impl<T> Virtualizer<T> {
    pub fn new(batch_size: usize, overscan: usize) -> Self {
        Self {
            source: Vec::new(),
            processed_len: 0,
            batch_size: batch_size.max(1),
            overscan,
            requested: 0..0,
        }
    }

    pub fn set_source(&mut self, source: Vec<T>) {
        self.source = source;
        self.processed_len = 0;
    }

    pub fn ingest_next_batch(&mut self) -> Option<Range<usize>> {
        let start = self.processed_len;
        if start >= self.source.len() {
            return None;
        }
        let end = start.saturating_add(self.batch_size).min(self.source.len());
        self.processed_len = end;
        Some(start..end)
    }

    pub fn processed_count(&self) -> usize {
        self.processed_len
    }

    pub fn total_count(&self) -> usize {
        self.source.len()
    }

    pub fn is_processing(&self) -> bool {
        self.processed_len < self.source.len()
    }

    pub fn progress(&self) -> IngestProgress {
        IngestProgress {
            processed: self.processed_count(),
            total: self.total_count(),
            is_processing: self.is_processing(),
            cancelled: false,
        }
    }

    pub fn update_visible_range(&mut self, start: usize, end: usize) {
        self.requested = start..end.max(start);
    }

    pub fn requested_range(&self) -> Range<usize> {
        self.requested.clone()
    }

    pub fn visible_range(&self) -> Range<usize> {
        let processed = self.processed_len;
        let end = self
            .requested
            .end
            .saturating_add(self.overscan)
            .min(processed);
        let start = self.requested.start.saturating_sub(self.overscan).min(end);
        start..end
    }

    pub fn visible_data(&self) -> &[T] {
        &self.source[self.visible_range()]
    }

    pub fn processed_data(&self) -> &[T] {
        &self.source[..self.processed_len]
    }
}
