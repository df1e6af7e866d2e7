use serde::Deserialize;

use crate::database::{Bindings, Record};
use crate::model::{non_blank, Studio, Tag};

/// Raw query string of a listing request. Every field stays a string so that a malformed value can fall back to
/// its default instead of rejecting the request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ListParams {
    pub search: Option<String>,
    pub tag: Option<String>,
    pub studio: Option<String>,
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// Query string of listings that only paginate.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PageParams {
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Sort {
    #[default]
    Newest,
    Oldest,
    MostLiked,
    Title,
    Random,
}

impl Sort {
    /// Unknown or missing values sort by [Sort::Newest].
    pub fn parse(value: Option<&str>) -> Sort {
        match value.map(str::trim) {
            Some("oldest") => Sort::Oldest,
            Some("most_liked") => Sort::MostLiked,
            Some("title") => Sort::Title,
            Some("random") => Sort::Random,
            _ => Sort::Newest,
        }
    }

    pub(super) fn order(self) -> &'static str {
        match self {
            Sort::Newest => "created_at DESC",
            Sort::Oldest => "created_at ASC",
            Sort::MostLiked => "likes_count DESC, created_at DESC",
            Sort::Title => "title ASC",
            Sort::Random => "RAND()",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paging {
    pub page: u64,
    pub limit: u64,
}

impl Paging {
    pub const DEFAULT_LIMIT: u64 = 20;
    pub const MAX_LIMIT: u64 = 100;

    /// Non numeric, zero or negative values fall back to the first page of [Paging::DEFAULT_LIMIT] items.
    pub fn parse(page: Option<&str>, limit: Option<&str>) -> Paging {
        let positive = |value: Option<&str>| {
            value
                .and_then(|value| value.trim().parse::<u64>().ok())
                .filter(|value| *value > 0)
        };

        Paging {
            page: positive(page).unwrap_or(1),
            limit: positive(limit)
                .unwrap_or(Self::DEFAULT_LIMIT)
                .min(Self::MAX_LIMIT),
        }
    }

    /// Offset of the first item. The store reads `START` as a signed integer, so the offset saturates at
    /// `i64::MAX`; any page that far out is past the end of every listing.
    pub fn start(self) -> u64 {
        (self.page - 1).saturating_mul(self.limit).min(i64::MAX as u64)
    }

    pub fn total_pages(self, total: u64) -> u64 {
        total.div_ceil(self.limit)
    }

    pub(super) fn bind(self, query: Bindings<'_>) -> Bindings<'_> {
        query.bind(("limit", self.limit)).bind(("start", self.start()))
    }
}

impl Default for Paging {
    fn default() -> Self {
        Paging::parse(None, None)
    }
}

/// The optional filters of a listing. Each present filter adds one clause; clauses are joined with `AND`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Filter {
    /// Lower cased search text.
    pub search: Option<String>,
    pub tag: Option<Record<Tag>>,
    pub studio: Option<Record<Studio>>,
}

impl Filter {
    pub(super) fn predicate(&self) -> String {
        let mut clauses = Vec::new();

        if self.search.is_some() {
            clauses.push(
                "((string::lowercase(title) CONTAINS $search) \
                OR (string::lowercase(description OR '') CONTAINS $search))",
            );
        }
        if self.tag.is_some() {
            clauses.push("(id INSIDE (SELECT VALUE video FROM video_tags WHERE tag = $tag))");
        }
        if self.studio.is_some() {
            clauses.push("(studio = $studio)");
        }

        if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        }
    }

    pub(super) fn bind<'a>(&self, mut query: Bindings<'a>) -> Bindings<'a> {
        if let Some(search) = &self.search {
            query = query.bind(("search", search));
        }
        if let Some(tag) = &self.tag {
            query = query.bind(("tag", tag));
        }
        if let Some(studio) = &self.studio {
            query = query.bind(("studio", studio));
        }
        query
    }
}

/// A fully normalized listing request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub filter: Filter,
    pub sort: Sort,
    pub paging: Paging,
}

impl From<&ListParams> for Listing {
    fn from(params: &ListParams) -> Self {
        let filter = Filter {
            search: non_blank(params.search.as_deref()).map(|search| search.to_lowercase()),
            tag: params.tag.as_deref().and_then(Record::parse),
            studio: params.studio.as_deref().and_then(Record::parse),
        };

        Listing {
            filter,
            sort: Sort::parse(params.sort.as_deref()),
            paging: Paging::parse(params.page.as_deref(), params.limit.as_deref()),
        }
    }
}

impl From<&PageParams> for Paging {
    fn from(params: &PageParams) -> Self {
        Paging::parse(params.page.as_deref(), params.limit.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> ListParams {
        let mut params = ListParams::default();
        for (key, value) in pairs {
            let value = Some(value.to_string());
            match *key {
                "search" => params.search = value,
                "tag" => params.tag = value,
                "studio" => params.studio = value,
                "sort" => params.sort = value,
                "page" => params.page = value,
                "limit" => params.limit = value,
                _ => unreachable!("unknown parameter {key}"),
            }
        }
        params
    }

    #[test]
    fn malformed_values_fall_back_to_defaults() {
        for (page, limit) in [("abc", "x"), ("0", "0"), ("-2", "-5"), ("", "")] {
            let listing = Listing::from(&params(&[("page", page), ("limit", limit), ("sort", "sideways")]));
            assert_eq!(listing.paging, Paging { page: 1, limit: 20 });
            assert_eq!(listing.sort, Sort::Newest);
        }
    }

    #[test]
    fn limit_is_capped() {
        assert_eq!(Paging::parse(Some("3"), Some("1000")), Paging { page: 3, limit: 100 });
    }

    #[test]
    fn empty_filters_are_absent() {
        let listing = Listing::from(&params(&[("search", "  "), ("tag", ""), ("studio", "")]));
        assert_eq!(listing.filter, Filter::default());
        assert_eq!(listing.filter.predicate(), "");
    }

    #[test]
    fn every_filter_adds_one_bound_clause() {
        let listing = Listing::from(&params(&[("search", "Ninja"), ("tag", "t1"), ("studio", "s1")]));
        assert_eq!(listing.filter.search.as_deref(), Some("ninja"));

        let predicate = listing.filter.predicate();
        assert!(predicate.starts_with("WHERE "));
        assert_eq!(predicate.matches(" AND ").count(), 2);
        for param in ["$search", "$tag", "$studio"] {
            assert!(predicate.contains(param), "{predicate} is missing {param}");
        }
        assert!(!predicate.contains("ninja"));
    }

    #[test]
    fn offsets_and_page_counts() {
        let paging = Paging::parse(Some("2"), Some("10"));
        assert_eq!(paging.start(), 10);
        assert_eq!(paging.total_pages(15), 2);
        assert_eq!(paging.total_pages(20), 2);
        assert_eq!(paging.total_pages(0), 0);

        let far = Paging::parse(Some(&u64::MAX.to_string()), Some("20"));
        assert_eq!(far.page, u64::MAX);
        assert_eq!(far.start(), i64::MAX as u64);
    }

    #[test]
    fn sort_keys() {
        assert_eq!(Sort::parse(Some("most_liked")), Sort::MostLiked);
        assert_eq!(Sort::parse(Some("title")), Sort::Title);
        assert_eq!(Sort::parse(Some("oldest")), Sort::Oldest);
        assert_eq!(Sort::parse(Some("random")), Sort::Random);
        assert_eq!(Sort::parse(None), Sort::Newest);
    }
}
