use serde::{Deserialize, Serialize};

/// One page of a paged query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub page_num: i64,
    pub page_size: i64,
    pub total: i64,
    pub pages: i64,
    pub offset: i64,
}

impl<T> Page<T> {
    /// Empty page with counters derived from `total`.
    pub fn of(page_num: i64, page_size: i64, total: i64) -> Self {
        Self {
            items: Vec::new(),
            page_num,
            page_size,
            total,
            pages: calc_pages(total, page_size),
            offset: calc_offset(page_num, page_size),
        }
    }

    pub fn with_items(mut self, items: Vec<T>) -> Self {
        self.items = items;
        self
    }

    /// Maps the items, keeping every counter.
    pub fn convert<R>(self, mapper: impl FnMut(T) -> R) -> Page<R> {
        Page {
            items: self.items.into_iter().map(mapper).collect(),
            page_num: self.page_num,
            page_size: self.page_size,
            total: self.total,
            pages: self.pages,
            offset: self.offset,
        }
    }

    pub fn try_convert<R, E>(self, mapper: impl FnMut(T) -> Result<R, E>) -> Result<Page<R>, E> {
        let items = self.items.into_iter().map(mapper).collect::<Result<Vec<_>, E>>()?;
        Ok(Page {
            items,
            page_num: self.page_num,
            page_size: self.page_size,
            total: self.total,
            pages: self.pages,
            offset: self.offset,
        })
    }
}

pub fn calc_pages(total: i64, page_size: i64) -> i64 {
    if total <= 0 || page_size <= 0 {
        return 0;
    }
    total.div_euclid(page_size) + i64::from(total.rem_euclid(page_size) != 0)
}

pub fn calc_offset(page_num: i64, page_size: i64) -> i64 {
    if page_num <= 0 {
        return 0;
    }
    (page_num - 1).saturating_mul(page_size.max(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_counters() {
        let page: Page<()> = Page::of(2, 10, 25);
        assert_eq!(page.pages, 3);
        assert_eq!(page.offset, 10);

        let empty: Page<()> = Page::of(2, 10, 0);
        assert_eq!(empty.pages, 0);
        assert!(empty.items.is_empty());
    }

    #[test]
    fn test_degenerate_inputs() {
        assert_eq!(calc_pages(10, 0), 0);
        assert_eq!(calc_pages(-1, 10), 0);
        assert_eq!(calc_pages(20, 10), 2);
        assert_eq!(calc_offset(0, 10), 0);
        assert_eq!(calc_offset(-3, 10), 0);
        assert_eq!(calc_offset(1, 10), 0);
    }

    #[test]
    fn test_extreme_inputs_saturate() {
        let page: Page<()> = Page::of(i64::MAX, 10, 5);
        assert_eq!(page.offset, i64::MAX);
        assert_eq!(page.pages, 1);

        assert_eq!(calc_pages(i64::MAX, i64::MAX), 1);
        assert_eq!(calc_pages(i64::MAX, 2), i64::MAX / 2 + 1);
        assert_eq!(calc_offset(2, i64::MAX), i64::MAX);
        assert_eq!(calc_offset(3, -5), 0);
    }

    #[test]
    fn test_convert_keeps_counters() {
        let page = Page::of(3, 5, 11).with_items(vec![1, 2]);
        let converted = page.convert(|i| i.to_string());
        assert_eq!(converted.items, vec!["1", "2"]);
        assert_eq!((converted.pages, converted.offset, converted.total), (3, 10, 11));
    }
}
