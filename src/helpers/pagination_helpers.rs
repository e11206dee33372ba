use crate::models::pagination::{PaginationInfo, Window};

/// Skip/limit window for a 1-based `page` of `per_page` documents.
pub fn compute_window(page: u64, per_page: u64) -> Window {
    Window {
        skip: page.saturating_sub(1).saturating_mul(per_page),
        limit: per_page,
    }
}

/// Metadata for a page, from the full match count and the resolved paging.
///
/// The page is reported as requested, even past the last page.
pub fn compute_pagination(total: u64, per_page: u64, page: u64) -> PaginationInfo {
    let total_page = if total == 0 || per_page == 0 {
        0
    } else {
        total.div_ceil(per_page)
    };

    PaginationInfo {
        total,
        page,
        per_page,
        prev: (page > 1).then(|| page - 1),
        next: (page < total_page).then(|| page + 1),
        total_page,
    }
}
