//! Pagination

use serde::{Deserialize, Serialize};

/// Requested slice of the result rows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Page {
    #[default]
    NoPaging,
    Paged { index: usize, size: usize },
}

impl Page {
    pub fn new(index: usize, size: usize) -> Self {
        Page::Paged { index, size }
    }

    /// First page of `size` rows
    pub fn first(size: usize) -> Self {
        Page::Paged { index: 0, size }
    }

    pub fn is_bounded(&self) -> bool {
        matches!(self, Page::Paged { .. })
    }

    /// Rows skipped before this page
    pub fn offset(&self) -> usize {
        match self {
            Page::NoPaging => 0,
            Page::Paged { index, size } => index.saturating_mul(*size),
        }
    }

    pub fn limit(&self) -> Option<usize> {
        match self {
            Page::NoPaging => None,
            Page::Paged { size, .. } => Some(*size),
        }
    }

    pub fn next(&self) -> Self {
        match self {
            Page::NoPaging => Page::NoPaging,
            Page::Paged { index, size } => Page::Paged {
                index: index + 1,
                size: *size,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_offsets() {
        assert_eq!(Page::NoPaging.offset(), 0);
        assert_eq!(Page::NoPaging.limit(), None);
        let p = Page::new(2, 10);
        assert_eq!(p.offset(), 20);
        assert_eq!(p.limit(), Some(10));
        assert_eq!(p.next().offset(), 30);
        assert!(Page::first(1).is_bounded());
    }
}
