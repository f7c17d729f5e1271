//! Page-count arithmetic for the pagination control.

/// Pagination state derived from a [`Page`](crate::model::Page)'s total count.
///
/// # Examples
///
/// ```
/// use rquery::query::Pagination;
///
/// let p = Pagination::new(45, 3, 10);
/// assert_eq!(p.total_pages(), 5);
/// assert_eq!(p.previous_pages(), vec![2]);
/// assert_eq!(p.next_pages(), vec![4]);
/// assert!(p.show_first() && p.show_last());
/// assert_eq!(p.row_range(), Some((21, 30)));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub total_count: u64,
    pub current_page: u32,
    pub page_size: u32,
    /// Pages shown on each side of the current one.
    pub siblings: u32,
}

impl Pagination {
    pub const DEFAULT_SIBLINGS: u32 = 1;

    /// A zero `page_size` is treated as one row per page.
    pub fn new(total_count: u64, current_page: u32, page_size: u32) -> Self {
        Self {
            total_count,
            current_page: current_page.max(1),
            page_size: page_size.max(1),
            siblings: Self::DEFAULT_SIBLINGS,
        }
    }

    #[must_use]
    pub fn with_siblings(mut self, siblings: u32) -> Self {
        self.siblings = siblings;
        self
    }

    /// `ceil(total_count / page_size)`; zero for an empty collection.
    pub fn total_pages(&self) -> u32 {
        let pages = self.total_count.div_ceil(u64::from(self.page_size));
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Is `page` a page the control may request?
    pub fn contains(&self, page: u32) -> bool {
        (1..=self.total_pages()).contains(&page)
    }

    /// Sibling pages before the current one, ascending.
    pub fn previous_pages(&self) -> Vec<u32> {
        let current = self.current_page;
        let from = current.saturating_sub(self.siblings).max(1);
        (from..current).collect()
    }

    /// Sibling pages after the current one, ascending.
    pub fn next_pages(&self) -> Vec<u32> {
        let last = self.total_pages();
        let current = self.current_page;
        if current >= last {
            return Vec::new();
        }
        let to = current.saturating_add(self.siblings).min(last);
        (current + 1..=to).collect()
    }

    /// Show a direct link to page 1 (it is not among the siblings).
    pub fn show_first(&self) -> bool {
        self.current_page > 1 + self.siblings
    }

    /// Show an ellipsis between page 1 and the previous siblings.
    pub fn gap_after_first(&self) -> bool {
        self.current_page > 2 + self.siblings
    }

    /// Show a direct link to the last page.
    pub fn show_last(&self) -> bool {
        u64::from(self.current_page) + u64::from(self.siblings) < u64::from(self.total_pages())
    }

    /// Show an ellipsis between the next siblings and the last page.
    pub fn gap_before_last(&self) -> bool {
        u64::from(self.current_page) + 1 + u64::from(self.siblings)
            < u64::from(self.total_pages())
    }

    /// 1-based `(first, last)` row numbers shown on the current page, or
    /// `None` past the end of the collection.
    pub fn row_range(&self) -> Option<(u64, u64)> {
        let size = u64::from(self.page_size);
        let first = u64::from(self.current_page.saturating_sub(1)) * size + 1;
        if first > self.total_count {
            return None;
        }
        Some((first, (first + size - 1).min(self.total_count)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_page() {
        let p = Pagination::new(1, 1, 10);
        assert_eq!(p.total_pages(), 1);
        assert!(p.contains(1));
        assert!(!p.contains(0));
        assert!(!p.contains(2));
        assert!(p.previous_pages().is_empty());
        assert!(p.next_pages().is_empty());
        assert!(!p.show_first());
        assert!(!p.show_last());
    }

    #[test]
    fn empty_collection_has_no_pages() {
        let p = Pagination::new(0, 1, 10);
        assert_eq!(p.total_pages(), 0);
        assert!(!p.contains(1));
        assert_eq!(p.row_range(), None);
    }

    #[test]
    fn partial_last_page_rounds_up() {
        let p = Pagination::new(21, 3, 10);
        assert_eq!(p.total_pages(), 3);
        assert_eq!(p.row_range(), Some((21, 21)));
    }

    #[test]
    fn windows_at_the_edges() {
        let first = Pagination::new(200, 1, 10);
        assert!(first.previous_pages().is_empty());
        assert_eq!(first.next_pages(), vec![2]);
        assert!(first.show_last());
        assert!(first.gap_before_last());

        let last = Pagination::new(200, 20, 10);
        assert_eq!(last.previous_pages(), vec![19]);
        assert!(last.next_pages().is_empty());
        assert!(last.show_first());
        assert!(last.gap_after_first());
        assert!(!last.show_last());
    }

    #[test]
    fn wider_sibling_window() {
        let p = Pagination::new(200, 10, 10).with_siblings(2);
        assert_eq!(p.previous_pages(), vec![8, 9]);
        assert_eq!(p.next_pages(), vec![11, 12]);
    }

    #[test]
    fn row_range_with_unclamped_page_zero() {
        let p = Pagination {
            total_count: 25,
            current_page: 0,
            page_size: 10,
            siblings: 1,
        };
        assert_eq!(p.row_range(), Some((1, 10)));
    }

    #[test]
    fn zero_inputs_are_clamped() {
        let p = Pagination::new(5, 0, 0);
        assert_eq!(p.current_page, 1);
        assert_eq!(p.total_pages(), 5);
    }
}
