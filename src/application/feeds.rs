//! RSS and Atom feeds over the published index.

use std::sync::Arc;

use thiserror::Error;
use time::format_description::well_known::{Rfc2822, Rfc3339};
use time::OffsetDateTime;

use crate::application::repos::{ContentRepository, RepoError};
use crate::domain::resource::{Resource, ResourceBody, ResourceKind, Version};
use crate::search::{Order, SearchQuery};
use crate::util::xml;

const FEED_LIMIT: i64 = 20;

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("failed to query the published index: {0}")]
    Repo(#[from] RepoError),
}

pub struct FeedService {
    repository: Arc<dyn ContentRepository>,
    site_title: String,
    base_url: String,
}

impl FeedService {
    pub fn new(
        repository: Arc<dyn ContentRepository>,
        site_title: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            site_title: site_title.into(),
            base_url: normalize_base_url(&base_url.into()),
        }
    }

    async fn published_pages(&self, site: &str) -> Result<Vec<Resource>, FeedError> {
        let query = SearchQuery::new(site)
            .with_kind(ResourceKind::Page)
            .with_version(Version::Live)
            .sort_by_publishing_date(Order::Descending)
            .with_limit(FEED_LIMIT);
        let result = self.repository.find(&query).await?;
        Ok(result
            .hits
            .into_iter()
            .map(|hit| hit.resource)
            .filter(|resource| resource.published().is_published_now())
            .collect())
    }

    /// Generate an RSS 2.0 feed of the most recently published pages.
    pub async fn rss(&self, site: &str) -> Result<String, FeedError> {
        let pages = self.published_pages(site).await?;
        let mut items = String::new();
        for page in &pages {
            let link = format!("{}{}", self.base_url, page.uri().path.trim_start_matches('/'));
            items.push_str(&format!(
                "    <item>\n      <title>{}</title>\n      <link>{}</link>\n      <guid>{}</guid>\n      <pubDate>{}</pubDate>\n    </item>\n",
                xml::escape(page_title(page)),
                xml::escape(&link),
                page.id(),
                format_rfc2822(page.published().publish_from()),
            ));
        }
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rss version=\"2.0\">\n  <channel>\n    <title>{}</title>\n    <link>{}</link>\n    <description>{}</description>\n{}  </channel>\n</rss>\n",
            xml::escape(&self.site_title),
            xml::escape(&self.base_url),
            xml::escape(&self.site_title),
            items
        ))
    }

    /// Generate an Atom 1.0 feed of the most recently published pages.
    pub async fn atom(&self, site: &str) -> Result<String, FeedError> {
        let pages = self.published_pages(site).await?;
        let updated = pages
            .first()
            .and_then(|page| page.published().publish_from())
            .unwrap_or(OffsetDateTime::UNIX_EPOCH);
        let mut entries = String::new();
        for page in &pages {
            let link = format!("{}{}", self.base_url, page.uri().path.trim_start_matches('/'));
            entries.push_str(&format!(
                "  <entry>\n    <title>{}</title>\n    <link href=\"{}\"/>\n    <id>urn:uuid:{}</id>\n    <updated>{}</updated>\n  </entry>\n",
                xml::escape(page_title(page)),
                xml::escape(&link),
                page.id(),
                format_rfc3339(page.published().publish_from()),
            ));
        }
        Ok(format!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<feed xmlns=\"http://www.w3.org/2005/Atom\">\n  <title>{}</title>\n  <link href=\"{}\"/>\n  <updated>{}</updated>\n  <id>{}</id>\n{}</feed>\n",
            xml::escape(&self.site_title),
            xml::escape(&self.base_url),
            format_rfc3339(Some(updated)),
            xml::escape(&self.base_url),
            entries
        ))
    }
}

fn page_title(page: &Resource) -> &str {
    match page.body() {
        ResourceBody::Page(body) => body.title().unwrap_or(&page.uri().path),
        ResourceBody::Binary(content) => &content.filename,
    }
}

fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    format!("{trimmed}/")
}

fn format_rfc2822(date: Option<OffsetDateTime>) -> String {
    date.unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&Rfc2822)
        .unwrap_or_default()
}

fn format_rfc3339(date: Option<OffsetDateTime>) -> String {
    date.unwrap_or(OffsetDateTime::UNIX_EPOCH)
        .format(&Rfc3339)
        .unwrap_or_default()
}
