use serde::Serialize;

/// One entry extracted from a feed.
///
/// Every field may be empty: missing elements never reject an entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Headline {
    pub title: String,
    pub link: String,
    pub description: String,
    pub source_label: String,
}

impl Headline {
    /// The link when it is safe to put in an `href`: only `http` and `https`
    /// URLs qualify, so `javascript:` or `data:` links render as plain titles.
    pub fn safe_link(&self) -> Option<&str> {
        let link = self.link.trim();
        let is_web = ["http://", "https://"].iter().any(|scheme| {
            link.get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        });
        is_web.then_some(link)
    }
}
