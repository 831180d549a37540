//! Page-number pagination (`?page=N&limit=M`).

use axum::http::Uri;
use serde::Serialize;

use super::error::ApiError;

/// Upper bound for `limit`.
pub const MAX_PAGE_SIZE: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    page: u32,
    limit: u32,
}

impl PageRequest {
    /// `page` is 1-based. A missing or zero `limit` falls back to
    /// `default_limit`; larger values are capped at [`MAX_PAGE_SIZE`].
    pub fn new(page: Option<u32>, limit: Option<u32>, default_limit: u32) -> Result<Self, ApiError> {
        let page = page.unwrap_or(1);
        if page == 0 {
            return Err(ApiError::BadRequest("Invalid page".to_owned()));
        }
        let limit = match limit {
            None | Some(0) => default_limit,
            Some(limit) => limit,
        }
        .min(MAX_PAGE_SIZE);
        Ok(Self { page, limit })
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.limit)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    /// Builds the envelope; `uri` is the request URI the links are derived from.
    pub fn new(results: Vec<T>, count: i64, request: PageRequest, uri: &Uri) -> Self {
        let has_next = request.offset() + request.limit() < count;
        let next = has_next.then(|| page_link(uri, request.page + 1));
        let previous = (request.page > 1).then(|| page_link(uri, request.page - 1));
        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// The request path and query with `page` replaced. Page 1 drops the parameter.
fn page_link(uri: &Uri, page: u32) -> String {
    let mut params: Vec<String> = uri
        .query()
        .unwrap_or_default()
        .split('&')
        .filter(|pair| !pair.is_empty())
        .filter(|pair| pair.split('=').next() != Some("page"))
        .map(str::to_owned)
        .collect();
    if page > 1 {
        params.push(format!("page={page}"));
    }

    if params.is_empty() {
        uri.path().to_owned()
    } else {
        format!("{}?{}", uri.path(), params.join("&"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri(s: &str) -> Uri {
        s.parse().unwrap()
    }

    #[test]
    fn limit_defaults_and_caps() {
        assert_eq!(PageRequest::new(None, None, 6).unwrap().limit(), 6);
        assert_eq!(PageRequest::new(None, Some(0), 6).unwrap().limit(), 6);
        assert_eq!(PageRequest::new(None, Some(500), 6).unwrap().limit(), 100);
        assert!(PageRequest::new(Some(0), None, 6).is_err());
    }

    #[test]
    fn offset_follows_page() {
        let request = PageRequest::new(Some(3), Some(10), 6).unwrap();
        assert_eq!(request.offset(), 20);
    }

    #[test]
    fn first_page_links() {
        let request = PageRequest::new(None, Some(2), 6).unwrap();
        let page = Paginated::new(vec![1, 2], 5, request, &uri("/api/recipes/?limit=2&tags=lunch"));

        assert_eq!(page.previous, None);
        assert_eq!(
            page.next.as_deref(),
            Some("/api/recipes/?limit=2&tags=lunch&page=2")
        );
    }

    #[test]
    fn middle_and_last_page_links() {
        let request = PageRequest::new(Some(2), Some(2), 6).unwrap();
        let page = Paginated::new(vec![3, 4], 5, request, &uri("/api/users/?page=2&limit=2"));
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2"));
        assert_eq!(page.next.as_deref(), Some("/api/users/?limit=2&page=3"));

        let request = PageRequest::new(Some(3), Some(2), 6).unwrap();
        let page = Paginated::new(vec![5], 5, request, &uri("/api/users/?page=3&limit=2"));
        assert_eq!(page.next, None);
        assert_eq!(page.previous.as_deref(), Some("/api/users/?limit=2&page=2"));
    }

    #[test]
    fn past_the_end_is_empty_without_next() {
        let request = PageRequest::new(Some(9), None, 6).unwrap();
        let page: Paginated<i32> = Paginated::new(vec![], 3, request, &uri("/api/recipes/?page=9"));
        assert_eq!(page.next, None);
        assert!(page.results.is_empty());
        assert_eq!(page.count, 3);
    }
}
