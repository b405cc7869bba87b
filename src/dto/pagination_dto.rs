use serde::{Deserialize, Serialize};
use url::Url;

/// Pages shown on each side of the current one before gaps are used.
const ON_EACH_SIDE: i64 = 3;

pub const PREVIOUS_LABEL: &str = "&laquo; Previous";
pub const NEXT_LABEL: &str = "Next &raquo;";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub data: Vec<T>,
    pub links: PaginationLinks,
    pub meta: PaginationMeta,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationLinks {
    pub first: String,
    pub last: String,
    pub prev: Option<String>,
    pub next: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PaginationMeta {
    pub current_page: i64,
    pub from: Option<i64>,
    pub last_page: i64,
    pub links: Vec<PageLink>,
    pub path: String,
    pub per_page: i64,
    pub to: Option<i64>,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PageLink {
    pub url: Option<String>,
    pub label: String,
    pub active: bool,
}

impl<T> PaginatedResponse<T> {
    /// Wraps one page of `items` taken from `total` records.
    pub fn new(data: Vec<T>, total: i64, current_page: i64, per_page: i64, path: &str) -> Self {
        let last_page = last_page(total, per_page);
        let count = data.len() as i64;
        let (from, to) = if count > 0 {
            let from = (current_page - 1).saturating_mul(per_page).saturating_add(1);
            (Some(from), Some(from.saturating_add(count - 1)))
        } else {
            (None, None)
        };
        let prev = (current_page > 1).then(|| page_url(path, current_page - 1));
        let next = (current_page < last_page).then(|| page_url(path, current_page + 1));

        let mut links = Vec::new();
        links.push(PageLink {
            url: prev.clone(),
            label: PREVIOUS_LABEL.to_string(),
            active: false,
        });
        for element in page_window(current_page, last_page) {
            links.push(match element {
                WindowElement::Page(page) => PageLink {
                    url: Some(page_url(path, page)),
                    label: page.to_string(),
                    active: page == current_page,
                },
                WindowElement::Gap => PageLink {
                    url: None,
                    label: "...".to_string(),
                    active: false,
                },
            });
        }
        links.push(PageLink {
            url: next.clone(),
            label: NEXT_LABEL.to_string(),
            active: false,
        });

        Self {
            data,
            links: PaginationLinks {
                first: page_url(path, 1),
                last: page_url(path, last_page),
                prev,
                next,
            },
            meta: PaginationMeta {
                current_page,
                from,
                last_page,
                links,
                path: path.to_string(),
                per_page,
                to,
                total,
            },
        }
    }
}

pub fn last_page(total: i64, per_page: i64) -> i64 {
    if per_page <= 0 {
        return 1;
    }
    ((total + per_page - 1) / per_page).max(1)
}

fn page_url(path: &str, page: i64) -> String {
    match Url::parse(path) {
        Ok(mut url) => {
            url.query_pairs_mut().append_pair("page", &page.to_string());
            url.to_string()
        }
        Err(_) => {
            let sep = if path.contains('?') { '&' } else { '?' };
            format!("{}{}page={}", path, sep, page)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WindowElement {
    Page(i64),
    Gap,
}

/// Page numbers to list around `current`. Short runs list every page;
/// longer ones keep the ends and a slider, separated by gaps.
fn page_window(current: i64, last: i64) -> Vec<WindowElement> {
    let range = |from: i64, to: i64| (from..=to).map(WindowElement::Page);

    if last < ON_EACH_SIDE * 2 + 8 {
        return range(1, last).collect();
    }

    let window = ON_EACH_SIDE + 4;
    let mut out = Vec::new();
    if current <= window {
        out.extend(range(1, window + ON_EACH_SIDE));
        out.push(WindowElement::Gap);
        out.extend(range(last - 1, last));
    } else if current > last - window {
        out.extend(range(1, 2));
        out.push(WindowElement::Gap);
        out.extend(range(last - (window + ON_EACH_SIDE - 1), last));
    } else {
        out.extend(range(1, 2));
        out.push(WindowElement::Gap);
        out.extend(range(current - ON_EACH_SIDE, current + ON_EACH_SIDE));
        out.push(WindowElement::Gap);
        out.extend(range(last - 1, last));
    }
    out
}
