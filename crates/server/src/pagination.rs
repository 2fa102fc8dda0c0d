use std::collections::HashMap;

use axum::http::Uri;
use db::models::{PageRequest, Paged};
use serde::Serialize;
use ts_rs::TS;
use url::form_urlencoded;

use crate::error::ApiError;

const PAGE_PARAM: &str = "page";

#[derive(Debug, Serialize, TS)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

/// Reads `?page=` (default 1). Anything but a positive integer is an
/// invalid page, as is a page whose offset overflows.
pub fn page_request(
    query: &HashMap<String, String>,
    page_size: u64,
) -> Result<PageRequest, ApiError> {
    let page = match query.get(PAGE_PARAM) {
        None => 1,
        Some(raw) => match raw.trim().parse::<u64>() {
            Ok(page) if page >= 1 => page,
            _ => return Err(ApiError::InvalidPage),
        },
    };
    PageRequest::checked(page, page_size).ok_or(ApiError::InvalidPage)
}

/// `uri` with `page` replaced, or dropped when `page` is `None`. Other
/// parameters keep their order.
fn page_url(uri: &Uri, page: Option<u64>) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in form_urlencoded::parse(uri.query().unwrap_or_default().as_bytes()) {
        if key != PAGE_PARAM {
            serializer.append_pair(&key, &value);
        }
    }
    if let Some(page) = page {
        serializer.append_pair(PAGE_PARAM, &page.to_string());
    }
    let query = serializer.finish();
    if query.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), query)
    }
}

impl<T> Page<T> {
    /// Fails with [`ApiError::InvalidPage`] past the last page. The first
    /// page of an empty collection is still valid.
    pub fn build(paged: Paged<T>, request: PageRequest, uri: &Uri) -> Result<Self, ApiError> {
        let last_page = paged.count.div_ceil(request.page_size).max(1);
        if request.page > last_page {
            return Err(ApiError::InvalidPage);
        }

        let next = (request.page < last_page).then(|| page_url(uri, Some(request.page + 1)));
        let previous = match request.page {
            1 => None,
            2 => Some(page_url(uri, None)),
            page => Some(page_url(uri, Some(page - 1))),
        };

        Ok(Self {
            count: paged.count,
            next,
            previous,
            results: paged.items,
        })
    }
}
