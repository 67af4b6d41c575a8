use crate::sql::scanner::StatementSplitter;
use crate::sql::transform::strip_leading_comments;
use regex::bytes::Regex;
use std::sync::LazyLock;

/// Only this much of the dump is searched for the source site's URLs.
pub const DETECT_HEAD_LEN: usize = 1024 * 1024;

static OPTIONS_INSERT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i-u)^INSERT\s+INTO\s+`?[^`\s(]*options`?[\s(]").expect("static regex")
});
static ROW_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?-u)'(siteurl|home)'\s*,\s*'([^']+)'").expect("static regex"));

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SiteUrls {
    pub site_url: Option<String>,
    pub home_url: Option<String>,
}

/// Find the `siteurl` and `home` option rows in the head of a dump.
///
/// Rows only count inside an `INSERT` into the options table; values in any other
/// statement are ignored even when they look like option rows.
pub fn detect_site_urls(head: &[u8]) -> SiteUrls {
    let mut found = SiteUrls::default();
    let mut visit = |statement: &[u8]| {
        if found.site_url.is_some() && found.home_url.is_some() {
            return;
        }
        let Some(statement) = strip_leading_comments(statement) else {
            return;
        };
        if !OPTIONS_INSERT.is_match(statement) {
            return;
        }
        for caps in ROW_VALUE.captures_iter(statement) {
            let slot = match &caps[1] {
                b"siteurl" => &mut found.site_url,
                _ => &mut found.home_url,
            };
            if slot.is_none() {
                *slot = Some(String::from_utf8_lossy(&caps[2]).trim().to_string());
            }
        }
    };

    let mut splitter = StatementSplitter::new();
    splitter.feed(head, &mut visit);
    splitter.finish(&mut visit);
    found
}
