use crate::client::HEADER_LINK;
use serde::Serialize;
use url::Url;

/// Page numbers advertised by the `Link` header of a list response
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Pagination {
    pub next_page: Option<usize>,
    pub prev_page: Option<usize>,
    pub first_page: Option<usize>,
    pub last_page: Option<usize>,
}

impl Pagination {
    pub(super) fn from_headers(headers: &reqwest::header::HeaderMap) -> Self {
        let mut pagination = Self::default();
        let links = match headers.get(HEADER_LINK).and_then(|h| h.to_str().ok()) {
            Some(links) => links,
            None => return pagination,
        };

        for (page, rel) in links.split(',').filter_map(parse_link) {
            let slot = match rel {
                "next" => &mut pagination.next_page,
                "prev" => &mut pagination.prev_page,
                "first" => &mut pagination.first_page,
                "last" => &mut pagination.last_page,
                _ => continue,
            };
            *slot = Some(page);
        }

        pagination
    }
}

// Splits one `<url>; rel="name"` entry into its page number and relation.
// Entries without an angle-bracketed url, a `page` query parameter or a
// `rel` parameter yield nothing.
fn parse_link(link: &str) -> Option<(usize, &str)> {
    let mut params = link.split(';').map(str::trim);

    let target = params.next()?.strip_prefix('<')?.strip_suffix('>')?;
    let page = Url::parse(target)
        .ok()?
        .query_pairs()
        .find(|(key, _)| key == "page")?
        .1
        .parse()
        .ok()?;

    let rel = params.find_map(|param| {
        param
            .strip_prefix("rel=")
            .map(|value| value.trim_matches('"'))
    })?;

    Some((page, rel))
}

#[derive(Debug, Default, Clone, Serialize)]
pub struct PaginationOptions {
    pub page: Option<usize>,
    pub per_page: Option<usize>,
}
