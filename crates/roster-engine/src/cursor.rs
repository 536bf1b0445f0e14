//! Per-partition pagination state and the continue/stop decision.

use serde::{Deserialize, Serialize};

/// Outcome of evaluating one fetched page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CursorDecision {
    Continue,
    /// Declared total reached or a short page seen
    StopExhausted,
    /// Empty first page or too many consecutive empty pages
    StopEmpty,
    /// Caller's page cap reached
    StopCapped,
}

impl CursorDecision {
    pub fn is_stop(self) -> bool {
        !matches!(self, Self::Continue)
    }
}

/// Pagination state for one (source, partition) pair.
///
/// `page_number` is logical and 1-based; adapters translate it into whatever
/// page or offset scheme the source uses. The page number only ever grows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginationCursor {
    page_number: u32,
    page_size_hint: u32,
    declared_total: Option<u64>,
    consecutive_empty_pages: u32,
    pages_fetched: u32,
    records_seen: u64,
    max_consecutive_empty: u32,
    page_cap: Option<u32>,
}

impl PaginationCursor {
    pub fn new(page_size_hint: u32, max_consecutive_empty: u32, page_cap: Option<u32>) -> Self {
        Self {
            page_number: 1,
            page_size_hint: page_size_hint.max(1),
            declared_total: None,
            consecutive_empty_pages: 0,
            pages_fetched: 0,
            records_seen: 0,
            max_consecutive_empty: max_consecutive_empty.max(1),
            page_cap,
        }
    }

    pub fn page_number(&self) -> u32 {
        self.page_number
    }

    pub fn page_size_hint(&self) -> u32 {
        self.page_size_hint
    }

    pub fn declared_total(&self) -> Option<u64> {
        self.declared_total
    }

    pub fn consecutive_empty_pages(&self) -> u32 {
        self.consecutive_empty_pages
    }

    pub fn pages_fetched(&self) -> u32 {
        self.pages_fetched
    }

    pub fn records_seen(&self) -> u64 {
        self.records_seen
    }

    /// Whether the page about to be fetched is the partition's first.
    pub fn is_first_page(&self) -> bool {
        self.pages_fetched == 0
    }

    /// Zero-based record offset of the current page.
    pub fn offset(&self) -> u64 {
        u64::from(self.page_number - 1) * u64::from(self.page_size_hint)
    }

    /// `ceil(declared_total / page_size_hint)` once a total is known.
    pub fn total_pages(&self) -> Option<u64> {
        self.declared_total
            .map(|total| total.div_ceil(u64::from(self.page_size_hint)))
    }

    /// Record a fetched page and decide whether to fetch another.
    ///
    /// `declared_total` is only adopted while the cursor has none; zero
    /// means unknown.
    pub fn should_continue(
        &mut self,
        page_record_count: usize,
        declared_total: Option<u64>,
    ) -> CursorDecision {
        self.pages_fetched += 1;
        self.records_seen += page_record_count as u64;
        if self.declared_total.is_none() {
            self.declared_total = declared_total.filter(|total| *total > 0);
        }

        if self.page_cap.is_some_and(|cap| self.pages_fetched >= cap) {
            return CursorDecision::StopCapped;
        }

        if page_record_count == 0 {
            self.consecutive_empty_pages += 1;
            if self.pages_fetched == 1
                || self.consecutive_empty_pages >= self.max_consecutive_empty
            {
                return CursorDecision::StopEmpty;
            }
            self.page_number += 1;
            return CursorDecision::Continue;
        }
        self.consecutive_empty_pages = 0;

        let exhausted = match self.total_pages() {
            Some(total_pages) => u64::from(self.page_number) >= total_pages,
            None => page_record_count < self.page_size_hint as usize,
        };
        if exhausted {
            return CursorDecision::StopExhausted;
        }

        self.page_number += 1;
        CursorDecision::Continue
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_total_pages() {
        let mut cursor = PaginationCursor::new(25, 2, None);
        assert_eq!(cursor.should_continue(25, Some(57)), CursorDecision::Continue);
        assert_eq!(cursor.total_pages(), Some(3));
        assert_eq!(cursor.should_continue(25, None), CursorDecision::Continue);
        assert_eq!(
            cursor.should_continue(7, None),
            CursorDecision::StopExhausted
        );
        assert_eq!(cursor.page_number(), 3);
        assert_eq!(cursor.records_seen(), 57);
    }

    #[test]
    fn test_total_pages_matches_ceiling() {
        for (total, size, expected) in [(57, 25, 3), (50, 25, 2), (1, 25, 1), (100, 10, 10)] {
            let mut cursor = PaginationCursor::new(size, 2, None);
            let mut decision = cursor.should_continue(size as usize, Some(total));
            while decision == CursorDecision::Continue {
                decision = cursor.should_continue(size as usize, None);
            }
            assert_eq!(decision, CursorDecision::StopExhausted);
            assert_eq!(u64::from(cursor.pages_fetched()), expected);
        }
    }

    #[test]
    fn test_full_pages_continue_despite_short_count_with_total() {
        let mut cursor = PaginationCursor::new(25, 2, None);
        assert_eq!(cursor.should_continue(20, Some(80)), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(20, None), CursorDecision::Continue);
    }

    #[test]
    fn test_first_declared_total_wins() {
        let mut cursor = PaginationCursor::new(10, 2, None);
        cursor.should_continue(10, Some(30));
        cursor.should_continue(10, Some(500));
        assert_eq!(cursor.declared_total(), Some(30));
    }

    #[test]
    fn test_zero_total_is_unknown() {
        let mut cursor = PaginationCursor::new(10, 2, None);
        assert_eq!(cursor.should_continue(10, Some(0)), CursorDecision::Continue);
        assert_eq!(cursor.declared_total(), None);
        assert_eq!(cursor.should_continue(4, None), CursorDecision::StopExhausted);
    }

    #[test]
    fn test_short_page_without_total() {
        let mut cursor = PaginationCursor::new(25, 2, None);
        assert_eq!(cursor.should_continue(25, None), CursorDecision::Continue);
        assert_eq!(
            cursor.should_continue(24, None),
            CursorDecision::StopExhausted
        );
    }

    #[test]
    fn test_empty_first_page_stops_immediately() {
        let mut cursor = PaginationCursor::new(25, 5, None);
        assert_eq!(cursor.should_continue(0, None), CursorDecision::StopEmpty);
        assert_eq!(cursor.pages_fetched(), 1);
    }

    #[test]
    fn test_consecutive_empty_pages() {
        let mut cursor = PaginationCursor::new(10, 2, None);
        assert_eq!(cursor.should_continue(10, Some(100)), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(0, None), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(0, None), CursorDecision::StopEmpty);
        assert_eq!(cursor.pages_fetched(), 3);
    }

    #[test]
    fn test_empty_count_resets_on_records() {
        let mut cursor = PaginationCursor::new(10, 2, None);
        cursor.should_continue(10, Some(100));
        assert_eq!(cursor.should_continue(0, None), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(10, None), CursorDecision::Continue);
        assert_eq!(cursor.consecutive_empty_pages(), 0);
        assert_eq!(cursor.should_continue(0, None), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(0, None), CursorDecision::StopEmpty);
    }

    #[test]
    fn test_page_cap_is_checked_first() {
        let mut cursor = PaginationCursor::new(25, 2, Some(2));
        assert_eq!(cursor.should_continue(25, None), CursorDecision::Continue);
        assert_eq!(cursor.should_continue(25, None), CursorDecision::StopCapped);

        let mut cursor = PaginationCursor::new(25, 2, Some(1));
        assert_eq!(cursor.should_continue(0, None), CursorDecision::StopCapped);
    }

    #[test]
    fn test_page_number_is_monotonic() {
        let mut cursor = PaginationCursor::new(5, 3, None);
        let mut last = cursor.page_number();
        for count in [5, 0, 5, 0, 0, 5] {
            if cursor.should_continue(count, Some(1000)).is_stop() {
                break;
            }
            assert!(cursor.page_number() > last);
            last = cursor.page_number();
        }
    }

    #[test]
    fn test_offset() {
        let mut cursor = PaginationCursor::new(20, 2, None);
        assert_eq!(cursor.offset(), 0);
        cursor.should_continue(20, None);
        assert_eq!(cursor.offset(), 20);
    }
}
