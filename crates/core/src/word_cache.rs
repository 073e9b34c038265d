//! Per-page memo of extracted words
//!
//! Word extraction is the expensive part of drawing the text layer, so each
//! page is extracted once per session. By default nothing is ever evicted;
//! the cache grows with the number of distinct pages visited. A capacity can
//! be set to bound it, in which case the least recently used page is dropped.

use crate::renderer::WordSpan;
use std::collections::{HashMap, VecDeque};

#[derive(Debug, Clone, Default)]
pub struct WordCache {
    capacity: Option<usize>,
    pages: HashMap<u32, Vec<WordSpan>>,
    order: VecDeque<u32>,
}

impl WordCache {
    /// Unbounded cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache holding at most `capacity` pages (minimum 1).
    pub fn with_capacity(capacity: usize) -> Self {
        Self { capacity: Some(capacity.max(1)), ..Self::default() }
    }

    pub fn from_capacity(capacity: Option<usize>) -> Self {
        capacity.map_or_else(Self::new, Self::with_capacity)
    }

    /// Words for `page`, calling `fetch` only if the page is not cached yet.
    pub fn get_or_fetch<F>(&mut self, page: u32, fetch: F) -> &[WordSpan]
    where
        F: FnOnce() -> Vec<WordSpan>,
    {
        match self.try_get_or_fetch(page, || Ok::<_, std::convert::Infallible>(fetch())) {
            Ok(words) => words,
            Err(never) => match never {},
        }
    }

    /// Fallible variant of [`get_or_fetch`](Self::get_or_fetch).
    ///
    /// A failed fetch leaves the page uncached so the next call retries.
    pub fn try_get_or_fetch<F, E>(&mut self, page: u32, fetch: F) -> Result<&[WordSpan], E>
    where
        F: FnOnce() -> Result<Vec<WordSpan>, E>,
    {
        if self.pages.contains_key(&page) {
            self.touch(page);
        } else {
            let words = fetch()?;
            tracing::debug!(page, words = words.len(), "word cache filled");
            self.insert(page, words);
        }

        Ok(self.pages.get(&page).map(Vec::as_slice).unwrap_or_default())
    }

    pub fn peek(&self, page: u32) -> Option<&[WordSpan]> {
        self.pages.get(&page).map(Vec::as_slice)
    }

    pub fn contains(&self, page: u32) -> bool {
        self.pages.contains_key(&page)
    }

    pub fn len(&self) -> usize {
        self.pages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    /// Forget every page, as on a full document reload.
    pub fn clear(&mut self) {
        self.pages.clear();
        self.order.clear();
    }

    fn insert(&mut self, page: u32, words: Vec<WordSpan>) {
        self.pages.insert(page, words);

        let Some(capacity) = self.capacity else {
            return;
        };

        self.order.push_back(page);
        while self.pages.len() > capacity {
            if let Some(oldest) = self.order.pop_front() {
                self.pages.remove(&oldest);
            }
        }
    }

    fn touch(&mut self, page: u32) {
        if self.capacity.is_none() {
            return;
        }

        if let Some(index) = self.order.iter().position(|existing| *existing == page) {
            if let Some(found) = self.order.remove(index) {
                self.order.push_back(found);
            }
        }
    }
}
