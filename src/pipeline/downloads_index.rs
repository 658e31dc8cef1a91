//! The downloads index: the origin's hub page listing every downloadable
//! file per product name, parsed once per run into a read-only lookup.
//!
//! Only links on the trusted asset host are retained. In-page download
//! links elsewhere on the origin resolve to soft-error pages; this
//! allow-list is what keeps the broken-link problem from re-entering
//! through the index itself.

use scraper::{Html, Selector};
use tracing::info;

use crate::domain::AssetKind;
use crate::infrastructure::config::OriginConfig;
use crate::infrastructure::errors::FetchError;
use crate::infrastructure::fetch::FetchPort;

use super::heuristics;

/// One qualifying link scraped from a downloads table row.
#[derive(Debug, Clone)]
pub struct IndexFile {
    pub url: String,
    pub filename: String,
    pub link_text: String,
    pub kind: AssetKind,
}

/// All downloadable files listed for one product name.
#[derive(Debug, Clone)]
pub struct DownloadsIndexEntry {
    /// Normalized product-name key.
    pub key: String,
    pub display_name: String,
    pub files: Vec<IndexFile>,
}

/// Read-only lookup built once per run, before any resolver call. Iteration
/// order is insertion order from the hub page.
#[derive(Debug, Default)]
pub struct DownloadsIndex {
    entries: Vec<DownloadsIndexEntry>,
}

impl DownloadsIndex {
    /// Fetch the hub page through the port and parse it. Called at most once
    /// per run; the result is passed by reference everywhere it is read.
    pub async fn fetch(fetcher: &dyn FetchPort, origin: &OriginConfig) -> Result<Self, FetchError> {
        let url = origin.downloads_url();
        info!("fetching downloads index from {}", url);
        let html = fetcher.render(&url).await?;
        let index = Self::parse(&html, &origin.asset_host);
        info!("downloads index holds {} products", index.len());
        Ok(index)
    }

    /// Parse every table row carrying a name cell; a row with no qualifying
    /// link is not indexed. A repeated key replaces the earlier entry in
    /// place, keeping its position.
    pub fn parse(html: &str, asset_host: &str) -> Self {
        let row_selector = Selector::parse("tr").expect("static selector");
        let name_selector = Selector::parse("td.name").expect("static selector");
        let link_selector = Selector::parse("a[href]").expect("static selector");

        let doc = Html::parse_document(html);
        let mut index = Self::default();
        for row in doc.select(&row_selector) {
            let Some(name_cell) = row.select(&name_selector).next() else {
                continue;
            };
            let display_name = name_cell.text().collect::<String>().trim().to_string();
            let key = heuristics::slugify(&display_name);
            if key.is_empty() {
                continue;
            }

            let mut files = Vec::new();
            for link in row.select(&link_selector) {
                let Some(href) = link.value().attr("href") else {
                    continue;
                };
                if !href.contains(asset_host) {
                    continue;
                }
                let text = link.text().collect::<String>().trim().to_string();
                files.push(IndexFile {
                    filename: last_path_segment(href),
                    kind: heuristics::classify_asset(href, &text),
                    url: href.to_string(),
                    link_text: text,
                });
            }

            if !files.is_empty() {
                index.insert(DownloadsIndexEntry {
                    key,
                    display_name,
                    files,
                });
            }
        }
        index
    }

    fn insert(&mut self, entry: DownloadsIndexEntry) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.key == entry.key) {
            *existing = entry;
        } else {
            self.entries.push(entry);
        }
    }

    pub fn get(&self, key: &str) -> Option<&DownloadsIndexEntry> {
        self.entries.iter().find(|e| e.key == key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &DownloadsIndexEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn last_path_segment(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ASSET_HOST: &str = "s3cdn.theexhibitorshandbook.com";

    fn hub_page() -> String {
        format!(
            r#"
            <table>
            <tr>
              <td class="name">Retractable Banner Stand 8ft</td>
              <td>
                <a href="https://{ASSET_HOST}/GraphicTemplates/GT_stand_8ft.pdf">Graphic template</a>
                <a href="https://{ASSET_HOST}/InstructionSheets/IS_stand_8ft.pdf">Setup guide</a>
                <a href="https://www.theexhibitorshandbook.com/downloads/broken-link.pdf">Broken</a>
              </td>
            </tr>
            <tr>
              <td class="name">Unhosted Product</td>
              <td><a href="https://elsewhere.com/file.pdf">Off-host only</a></td>
            </tr>
            <tr>
              <td>No name cell here</td>
              <td><a href="https://{ASSET_HOST}/x.pdf">File</a></td>
            </tr>
            </table>
            "#
        )
    }

    #[test]
    fn only_trusted_host_links_are_indexed() {
        let index = DownloadsIndex::parse(&hub_page(), ASSET_HOST);
        assert_eq!(index.len(), 1);

        let entry = index.get("retractable_banner_stand_8ft").expect("entry");
        assert_eq!(entry.display_name, "Retractable Banner Stand 8ft");
        assert_eq!(entry.files.len(), 2);
        assert_eq!(entry.files[0].filename, "GT_stand_8ft.pdf");
        assert_eq!(entry.files[0].kind, AssetKind::Template);
        assert_eq!(entry.files[1].kind, AssetKind::SetupGuide);
    }

    #[test]
    fn rows_without_qualifying_links_are_not_indexed() {
        let index = DownloadsIndex::parse(&hub_page(), ASSET_HOST);
        assert!(index.get("unhosted_product").is_none());
    }

    #[test]
    fn repeated_key_replaces_in_place() {
        let html = format!(
            r#"
            <table>
            <tr><td class="name">Stand A</td><td><a href="https://{ASSET_HOST}/v1.pdf">x</a></td></tr>
            <tr><td class="name">Stand B</td><td><a href="https://{ASSET_HOST}/b.pdf">x</a></td></tr>
            <tr><td class="name">Stand A</td><td><a href="https://{ASSET_HOST}/v2.pdf">x</a></td></tr>
            </table>
            "#
        );
        let index = DownloadsIndex::parse(&html, ASSET_HOST);
        assert_eq!(index.len(), 2);
        let keys: Vec<_> = index.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["stand_a", "stand_b"]);
        assert_eq!(index.get("stand_a").expect("entry").files[0].filename, "v2.pdf");
    }
}
