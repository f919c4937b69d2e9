//! Page windows over an ordered collection with wrap-around navigation.

use std::num::NonZeroUsize;

use serde::{Deserialize, Serialize};

/// A page cursor. `page` is always within `0..total_pages` and
/// `total_pages` is at least one, even for an empty collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageState {
    page: usize,
    total_pages: usize,
}

impl PageState {
    /// Builds a cursor from possibly stale or out-of-range values.
    pub fn new(page: i64, total_pages: usize) -> Self {
        let total_pages = total_pages.max(1);
        Self {
            page: normalize(page, total_pages),
            total_pages,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn total_pages(&self) -> usize {
        self.total_pages
    }

    pub fn next(&self) -> Self {
        Self::new(self.page as i64 + 1, self.total_pages)
    }

    pub fn prev(&self) -> Self {
        Self::new(self.page as i64 - 1, self.total_pages)
    }

    /// One-based "page/total" label.
    pub fn label(&self) -> String {
        format!("{}/{}", self.page + 1, self.total_pages)
    }
}

impl Default for PageState {
    fn default() -> Self {
        Self::new(0, 1)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageWindow<'a, T> {
    pub items: &'a [T],
    pub state: PageState,
}

pub fn total_pages(len: usize, page_size: NonZeroUsize) -> usize {
    len.div_ceil(page_size.get()).max(1)
}

/// Euclidean remainder, so `-1` lands on the last page.
pub fn normalize(page: i64, total_pages: usize) -> usize {
    let total = i64::try_from(total_pages.max(1)).unwrap_or(i64::MAX);
    page.rem_euclid(total) as usize
}

pub fn next(page: i64, total_pages: usize) -> usize {
    normalize(page.saturating_add(1), total_pages)
}

pub fn prev(page: i64, total_pages: usize) -> usize {
    normalize(page.saturating_sub(1), total_pages)
}

/// Re-derives the page count from `items` and normalizes `page` against it,
/// so a stored page from a larger collection still yields a valid window.
pub fn paginate<T>(items: &[T], page: i64, page_size: NonZeroUsize) -> PageWindow<'_, T> {
    let state = PageState::new(page, total_pages(items.len(), page_size));
    let start = (state.page * page_size.get()).min(items.len());
    let end = (start + page_size.get()).min(items.len());
    PageWindow {
        items: &items[start..end],
        state,
    }
}
