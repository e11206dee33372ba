use serde_json::Value;

use crate::{
    helpers::pagination_helpers::compute_window,
    models::pagination::{PaginationParams, Window, DEFAULT_PAGE_SIZE},
    Error, Result,
};

/// Paging parameters after validation and normalization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedPaging {
    pub page: u64,
    pub per_page: u64,
    pub window: Window,
}

pub struct PagingValidator;

impl PagingValidator {
    /// `limit` and `page` must both have been set; values `<= 0` then fall
    /// back to [`DEFAULT_PAGE_SIZE`] and page 1.
    pub fn resolve_paging(params: &PaginationParams) -> Result<ResolvedPaging> {
        let (limit, page) = match (params.limit, params.page) {
            (Some(limit), Some(page)) => (limit, page),
            (limit, page) => {
                let mut missing = Vec::new();
                if limit.is_none() {
                    missing.push("limit");
                }
                if page.is_none() {
                    missing.push("page");
                }
                return Err(Error::MissingPagingParams { missing });
            }
        };

        let per_page = Self::normalize_limit(limit);
        let page = Self::normalize_page(page);

        Ok(ResolvedPaging {
            page,
            per_page,
            window: compute_window(page, per_page),
        })
    }

    pub fn normalize_limit(limit: i64) -> u64 {
        if limit <= 0 {
            DEFAULT_PAGE_SIZE
        } else {
            limit as u64
        }
    }

    pub fn normalize_page(page: i64) -> u64 {
        if page <= 0 {
            1
        } else {
            page as u64
        }
    }

    /// Plain fetch needs a filter; `null` counts as none.
    pub fn require_filter(params: &PaginationParams) -> Result<&Value> {
        match &params.filter {
            Some(filter) if !filter.is_null() => Ok(filter),
            _ => Err(Error::MissingFilter),
        }
    }

    /// Pipeline fetch must not carry a filter as well.
    pub fn reject_filter(params: &PaginationParams) -> Result<()> {
        match &params.filter {
            Some(filter) if !filter.is_null() => Err(Error::ConflictingMode),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(limit: Option<i64>, page: Option<i64>) -> PaginationParams {
        PaginationParams {
            limit,
            page,
            ..Default::default()
        }
    }

    #[test]
    fn test_unset_paging_is_rejected() {
        let err = PagingValidator::resolve_paging(&params(None, None)).unwrap_err();
        match err {
            Error::MissingPagingParams { missing } => assert_eq!(missing, vec!["limit", "page"]),
            other => panic!("unexpected error: {other:?}"),
        }

        let err = PagingValidator::resolve_paging(&params(Some(10), None)).unwrap_err();
        assert!(matches!(err, Error::MissingPagingParams { missing } if missing == vec!["page"]));

        let err = PagingValidator::resolve_paging(&params(None, Some(1))).unwrap_err();
        assert!(matches!(err, Error::MissingPagingParams { missing } if missing == vec!["limit"]));
    }

    // An explicit zero is "set" and normalizes; only a missing setter call fails.
    #[test]
    fn test_explicit_zero_normalizes() {
        let resolved = PagingValidator::resolve_paging(&params(Some(10), Some(0))).unwrap();
        assert_eq!(resolved.page, 1);
        assert_eq!(resolved.per_page, 10);
        assert_eq!(resolved.window, Window { skip: 0, limit: 10 });

        let resolved = PagingValidator::resolve_paging(&params(Some(0), Some(2))).unwrap();
        assert_eq!(resolved.per_page, DEFAULT_PAGE_SIZE);
        assert_eq!(resolved.window, Window { skip: 10, limit: 10 });

        let resolved = PagingValidator::resolve_paging(&params(Some(-3), Some(-8))).unwrap();
        assert_eq!((resolved.page, resolved.per_page), (1, DEFAULT_PAGE_SIZE));
    }

    #[test]
    fn test_filter_checks() {
        let mut p = params(Some(1), Some(1));
        assert!(matches!(
            PagingValidator::require_filter(&p),
            Err(Error::MissingFilter)
        ));
        assert!(PagingValidator::reject_filter(&p).is_ok());

        p.filter = Some(Value::Null);
        assert!(matches!(
            PagingValidator::require_filter(&p),
            Err(Error::MissingFilter)
        ));
        assert!(PagingValidator::reject_filter(&p).is_ok());

        p.filter = Some(json!({}));
        assert!(PagingValidator::require_filter(&p).is_ok());
        assert!(matches!(
            PagingValidator::reject_filter(&p),
            Err(Error::ConflictingMode)
        ));
    }
}
