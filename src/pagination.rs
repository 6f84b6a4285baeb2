use crate::filter_state::ListingState;
use derive_more::Display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum PaginationItem {
    Page(u32),
    #[display("…")]
    Gap,
}

pub const WINDOW: u32 = 5;

pub fn build_pagination_items(current: u32, total: u32) -> Vec<PaginationItem> {
    if total <= WINDOW {
        return (1..=total).map(PaginationItem::Page).collect();
    }
    if current <= 3 {
        let mut items = (1..=4).map(PaginationItem::Page).collect::<Vec<_>>();
        items.push(PaginationItem::Gap);
        items.push(PaginationItem::Page(total));
        return items;
    }
    if current >= total.saturating_sub(2) {
        let mut items = vec![PaginationItem::Page(1), PaginationItem::Gap];
        items.extend((total.saturating_sub(3)..=total).map(PaginationItem::Page));
        return items;
    }
    vec![
        PaginationItem::Page(1),
        PaginationItem::Gap,
        PaginationItem::Page(current.saturating_sub(1)),
        PaginationItem::Page(current),
        PaginationItem::Page(current + 1),
        PaginationItem::Gap,
        PaginationItem::Page(total),
    ]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationState {
    pub current_page: u32,
    pub total_pages: u32,
}

impl PaginationState {
    /// Clamps `current` into `[1, total]`; with no pages the current page is 1.
    pub fn new(current: u32, total: u32) -> Self {
        Self {
            current_page: current.clamp(1, total.max(1)),
            total_pages: total,
        }
    }

    /// No control is rendered for a single page.
    pub fn is_visible(&self) -> bool {
        self.total_pages > 1
    }

    pub fn items(&self) -> Vec<PaginationItem> {
        if !self.is_visible() {
            return vec![];
        }
        build_pagination_items(self.current_page, self.total_pages)
    }

    /// Target page for a click, or `None` when it would not change anything.
    pub fn request_page(&self, page: u32) -> Option<u32> {
        let page = page.clamp(1, self.total_pages.max(1));
        (page != self.current_page).then_some(page)
    }

    pub fn previous(&self) -> Option<u32> {
        self.request_page(self.current_page.saturating_sub(1))
    }

    pub fn next(&self) -> Option<u32> {
        self.request_page(self.current_page.saturating_add(1))
    }
}

pub struct PageLink {
    pub label: String,
    pub url: Option<String>,
    pub current: bool,
}

/// Links for each page token, built from the listing URL.
pub fn page_links(
    state: &ListingState,
    pagination: &PaginationState,
    path: &str,
) -> Vec<PageLink> {
    pagination
        .items()
        .into_iter()
        .map(|item| match item {
            PaginationItem::Page(page) => PageLink {
                label: page.to_string(),
                url: Some(state.with_page(page).to_url(path)),
                current: page == pagination.current_page,
            },
            PaginationItem::Gap => PageLink {
                label: item.to_string(),
                url: None,
                current: false,
            },
        })
        .collect()
}
