/// Splits a list into fixed-size pages for inline keyboards.
#[derive(Debug, Clone)]
pub struct Paginator<'a, T> {
    items: &'a [T],
    page_size: usize,
}

impl<'a, T> Paginator<'a, T> {
    pub fn new(items: &'a [T], page_size: usize) -> Self {
        Self {
            items,
            page_size: page_size.max(1),
        }
    }

    pub fn total_pages(&self) -> usize {
        self.items.len().div_ceil(self.page_size)
    }

    /// Returns the items of `page` and the page number actually used.
    ///
    /// Out-of-range pages are clamped to `[1, total_pages]`; an empty list
    /// yields page 1 with no items.
    pub fn page(&self, page: usize) -> (&'a [T], usize) {
        let page = page.min(self.total_pages()).max(1);
        let start = ((page - 1) * self.page_size).min(self.items.len());
        let end = (start + self.page_size).min(self.items.len());
        (&self.items[start..end], page)
    }
}
