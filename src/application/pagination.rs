//! Offset pagination with forgiving page-number parsing.
//!
//! Page numbers arrive as untrusted query strings. Anything that is not an
//! integer resolves to the first page, and integers outside `1..=num_pages`
//! resolve to the last page. An empty result set still has one page.

use std::num::NonZeroU32;

use serde::Serialize;

/// Offset/limit pair handed to repositories.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageSlice {
    pub offset: u64,
    pub limit: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageWindow {
    pub number: u32,
    pub num_pages: u32,
    pub per_page: u32,
    pub total_items: u64,
    pub has_previous: bool,
    pub has_next: bool,
}

impl PageWindow {
    pub fn resolve(raw: Option<&str>, total_items: u64, per_page: NonZeroU32) -> Self {
        let per_page_value = per_page.get();
        let num_pages = page_count(total_items, per_page_value);
        let number = match raw.map(str::trim) {
            None | Some("") => 1,
            Some(value) => resolve_number(value, num_pages),
        };

        Self {
            number,
            num_pages,
            per_page: per_page_value,
            total_items,
            has_previous: number > 1,
            has_next: number < num_pages,
        }
    }

    pub fn slice(&self) -> PageSlice {
        PageSlice {
            offset: u64::from(self.number - 1) * u64::from(self.per_page),
            limit: self.per_page,
        }
    }

    /// Window for a result set that was never queried.
    pub fn empty(per_page: NonZeroU32) -> Self {
        Self::resolve(None, 0, per_page)
    }
}

fn page_count(total_items: u64, per_page: u32) -> u32 {
    if total_items == 0 {
        return 1;
    }
    let pages = total_items.div_ceil(u64::from(per_page));
    u32::try_from(pages).unwrap_or(u32::MAX)
}

fn resolve_number(value: &str, num_pages: u32) -> u32 {
    let digits = value.strip_prefix(['-', '+']).unwrap_or(value);
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return 1;
    }

    match value.parse::<i64>() {
        Ok(number) if number >= 1 && number <= i64::from(num_pages) => number as u32,
        // Integers below one or past the end, including ones too large to parse.
        _ => num_pages,
    }
}

/// One resolved page of items.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page: PageWindow,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, page: PageWindow) -> Self {
        Self { items, page }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn size(value: u32) -> NonZeroU32 {
        NonZeroU32::new(value).unwrap()
    }

    #[test]
    fn missing_page_defaults_to_first() {
        let window = PageWindow::resolve(None, 10, size(3));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 4);
        assert_eq!(window.slice(), PageSlice { offset: 0, limit: 3 });
    }

    #[test]
    fn non_numeric_page_defaults_to_first() {
        let window = PageWindow::resolve(Some("abc"), 10, size(3));
        assert_eq!(window.number, 1);
        assert!(!window.has_previous);
        assert!(window.has_next);
    }

    #[test]
    fn page_past_the_end_resolves_to_last() {
        let window = PageWindow::resolve(Some("99"), 10, size(3));
        assert_eq!(window.number, 4);
        assert_eq!(window.slice(), PageSlice { offset: 9, limit: 3 });
        assert!(!window.has_next);
    }

    #[test]
    fn page_below_one_resolves_to_last() {
        assert_eq!(PageWindow::resolve(Some("0"), 10, size(3)).number, 4);
        assert_eq!(PageWindow::resolve(Some("-2"), 10, size(3)).number, 4);
    }

    #[test]
    fn oversized_integer_resolves_to_last() {
        let window = PageWindow::resolve(Some("99999999999999999999999"), 10, size(3));
        assert_eq!(window.number, 4);
    }

    #[test]
    fn decimals_are_not_integers() {
        assert_eq!(PageWindow::resolve(Some("2.5"), 10, size(3)).number, 1);
    }

    #[test]
    fn empty_result_set_has_one_page() {
        let window = PageWindow::resolve(Some("3"), 0, size(3));
        assert_eq!(window.number, 1);
        assert_eq!(window.num_pages, 1);
        assert!(!window.has_next);
        assert!(!window.has_previous);
        assert_eq!(window, PageWindow::empty(size(3)));
    }

    #[test]
    fn exact_multiple_has_no_trailing_page() {
        let window = PageWindow::resolve(Some("2"), 6, size(3));
        assert_eq!(window.num_pages, 2);
        assert!(!window.has_next);
        assert_eq!(window.slice().offset, 3);
    }
}
