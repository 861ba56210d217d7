//! Document rewriting
//!
//! Finds every resource-bearing tag, resolves and names each reference, then
//! fetches the resources one at a time and points the tags at the local copies.
//!
//! Planning (resolve + name) covers every tag before the first fetch, so a
//! single unusable reference fails the job without touching the network.

use crate::classify::{resolve, ResolvedUrl};
use crate::error::{FetchError, UrlError};
use crate::fetchers::ResourceFetcher;
use crate::filename::permute;
use kuchiki::iter::NodeIterator;
use kuchiki::{ElementData, NodeDataRef, NodeRef};
use percent_encoding::{utf8_percent_encode, AsciiSet, CONTROLS};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Redraws allowed when a generated name is already taken
const MAX_NAME_ATTEMPTS: usize = 16;

/// Characters escaped in one segment of a rewritten reference
///
/// Anything a browser would read as a delimiter, an escape or a separator.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'<')
    .add(b'>')
    .add(b'?')
    .add(b'`')
    .add(b'{')
    .add(b'}')
    .add(b'/')
    .add(b'\\');

/// Kind of resource-bearing tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    /// `<img src>`
    Image,
    /// `<script src>`
    Script,
    /// `<link rel="stylesheet" href>`
    Stylesheet,
}

impl ResourceKind {
    /// Attribute that carries the URL for this kind
    pub fn attribute(self) -> &'static str {
        match self {
            ResourceKind::Image | ResourceKind::Script => "src",
            ResourceKind::Stylesheet => "href",
        }
    }

    fn of_element(element: &ElementData) -> Option<Self> {
        let kind = match &*element.name.local {
            "img" => ResourceKind::Image,
            "script" => ResourceKind::Script,
            "link" if is_stylesheet_link(element) => ResourceKind::Stylesheet,
            _ => return None,
        };
        Some(kind)
    }
}

fn is_stylesheet_link(element: &ElementData) -> bool {
    element
        .attributes
        .borrow()
        .get("rel")
        .map(|rel| {
            rel.split_ascii_whitespace()
                .any(|token| token.eq_ignore_ascii_case("stylesheet"))
        })
        .unwrap_or(false)
}

/// A URL reference found in the document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceReference {
    pub kind: ResourceKind,
    pub attribute: &'static str,
    pub url: String,
}

/// A resource written into the assets directory
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalAsset {
    /// Resolved URL the bytes came from
    pub url: String,
    pub directory: PathBuf,
    pub file_name: String,
    /// Bytes written
    pub bytes: u64,
}

impl LocalAsset {
    pub fn path(&self) -> PathBuf {
        self.directory.join(&self.file_name)
    }
}

/// Resource-bearing elements in document order, paired with their references
fn resource_elements(document: &NodeRef) -> Vec<(NodeDataRef<ElementData>, SourceReference)> {
    document
        .descendants()
        .elements()
        .filter_map(|element| {
            let kind = ResourceKind::of_element(&element)?;
            let attribute = kind.attribute();
            let url = element.attributes.borrow().get(attribute)?.to_string();
            Some((
                element,
                SourceReference {
                    kind,
                    attribute,
                    url,
                },
            ))
        })
        .collect()
}

/// Scan a document for resource references, in document order
pub fn scan(document: &NodeRef) -> Vec<SourceReference> {
    resource_elements(document)
        .into_iter()
        .map(|(_, reference)| reference)
        .collect()
}

struct PlannedResource {
    element: NodeDataRef<ElementData>,
    reference: SourceReference,
    url: ResolvedUrl,
    file_name: String,
}

/// Every resource of a document, resolved and named, ready to fetch
pub struct RewritePlan {
    assets_dir: PathBuf,
    assets_name: String,
    entries: Vec<PlannedResource>,
}

impl RewritePlan {
    /// Resolve and name every resource-bearing tag of `document`
    ///
    /// `assets_dir` is where files will be written; `assets_name` is the
    /// prefix written into the rewritten attributes.
    pub fn new(
        document: &NodeRef,
        assets_dir: &Path,
        assets_name: &str,
    ) -> Result<Self, UrlError> {
        let mut taken = HashSet::new();
        let mut entries = Vec::new();

        for (element, reference) in resource_elements(document) {
            let url = resolve(&reference.url)?;
            let file_name = unique_name(url.as_str(), assets_dir, &mut taken)?;
            debug!(
                kind = ?reference.kind,
                url = %url,
                file_name = %file_name,
                "Planned resource"
            );
            entries.push(PlannedResource {
                element,
                reference,
                url,
                file_name,
            });
        }

        Ok(Self {
            assets_dir: assets_dir.to_path_buf(),
            assets_name: assets_name.to_string(),
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// References covered by this plan, in fetch order
    pub fn references(&self) -> impl Iterator<Item = &SourceReference> {
        self.entries.iter().map(|entry| &entry.reference)
    }

    /// Fetch every planned resource in order and rewrite its tag
    ///
    /// Stops at the first failure; tags fetched before it keep their new value.
    pub async fn execute(
        self,
        fetcher: &dyn ResourceFetcher,
        mut on_progress: impl FnMut(usize, usize),
    ) -> Result<Vec<LocalAsset>, FetchError> {
        let total = self.entries.len();
        let mut assets = Vec::with_capacity(total);

        for (index, entry) in self.entries.into_iter().enumerate() {
            on_progress(index, total);

            let destination = self.assets_dir.join(&entry.file_name);
            let bytes = fetcher.fetch(entry.url.as_str(), &destination).await?;

            let local_path = local_reference(&self.assets_name, &entry.file_name);
            entry
                .element
                .attributes
                .borrow_mut()
                .insert(entry.reference.attribute, local_path);

            info!(url = %entry.url, bytes, fetcher = fetcher.name(), "Saved {}", entry.file_name);
            assets.push(LocalAsset {
                url: entry.url.into_string(),
                directory: self.assets_dir.clone(),
                file_name: entry.file_name,
                bytes,
            });
        }
        on_progress(total, total);

        Ok(assets)
    }
}

/// Generate a name not already used in this plan or present on disk
///
/// After `MAX_NAME_ATTEMPTS` draws the last one is used as is and will
/// overwrite whatever holds that name.
fn unique_name(
    url: &str,
    assets_dir: &Path,
    taken: &mut HashSet<String>,
) -> Result<String, UrlError> {
    let mut name = permute(url)?;
    for _ in 1..MAX_NAME_ATTEMPTS {
        if !taken.contains(&name) && !assets_dir.join(&name).exists() {
            break;
        }
        debug!(name = %name, "Generated name already taken, drawing again");
        name = permute(url)?;
    }
    if taken.contains(&name) || assets_dir.join(&name).exists() {
        warn!(name = %name, url, "No free name found, resource will overwrite an earlier one");
    }
    taken.insert(name.clone());
    Ok(name)
}

/// Relative URL of an asset as written into the document
///
/// Title and file name are used verbatim on disk, so each is escaped as a
/// single path segment.
fn local_reference(assets_name: &str, file_name: &str) -> String {
    format!(
        "{}/{}",
        utf8_percent_encode(assets_name, SEGMENT),
        utf8_percent_encode(file_name, SEGMENT)
    )
}

/// Plan and execute in one step
pub async fn rewrite_document(
    document: &NodeRef,
    assets_dir: &Path,
    assets_name: &str,
    fetcher: &dyn ResourceFetcher,
) -> Result<Vec<LocalAsset>, crate::ConvertError> {
    let plan = RewritePlan::new(document, assets_dir, assets_name)?;
    Ok(plan.execute(fetcher, |_, _| {}).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kuchiki::traits::TendrilSink;
    use std::sync::Mutex;

    /// Writes a fixed body and records every URL it was asked for
    struct RecordingFetcher {
        body: &'static [u8],
        calls: Mutex<Vec<String>>,
    }

    impl RecordingFetcher {
        fn new(body: &'static [u8]) -> Self {
            Self {
                body,
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ResourceFetcher for RecordingFetcher {
        fn name(&self) -> &'static str {
            "recording"
        }

        async fn fetch(&self, url: &str, destination: &Path) -> Result<u64, FetchError> {
            self.calls.lock().unwrap().push(url.to_string());
            std::fs::write(destination, self.body).map_err(|source| FetchError::LocalWrite {
                path: destination.to_path_buf(),
                source,
            })?;
            Ok(self.body.len() as u64)
        }
    }

    fn parse(html: &str) -> NodeRef {
        kuchiki::parse_html().one(html)
    }

    #[test]
    fn test_resource_kind_attribute() {
        assert_eq!(ResourceKind::Image.attribute(), "src");
        assert_eq!(ResourceKind::Script.attribute(), "src");
        assert_eq!(ResourceKind::Stylesheet.attribute(), "href");
    }

    #[test]
    fn test_scan_document_order() {
        let document = parse(
            r#"<html><head>
            <link rel="stylesheet" href="https://example.com/site.css">
            <link rel="icon" href="https://example.com/favicon.ico">
            <script src="//cdn.example.com/app.js"></script>
            <script>inline()</script>
            </head><body>
            <img src="https://example.com/a.png">
            <img alt="no source">
            <link rel="alternate STYLESHEET" href="https://example.com/alt.css">
            </body></html>"#,
        );

        let refs = scan(&document);
        let summary: Vec<_> = refs.iter().map(|r| (r.kind, r.url.as_str())).collect();
        assert_eq!(
            summary,
            vec![
                (ResourceKind::Stylesheet, "https://example.com/site.css"),
                (ResourceKind::Script, "//cdn.example.com/app.js"),
                (ResourceKind::Image, "https://example.com/a.png"),
                (ResourceKind::Stylesheet, "https://example.com/alt.css"),
            ]
        );
        assert_eq!(refs[0].attribute, "href");
        assert_eq!(refs[1].attribute, "src");
    }

    #[test]
    fn test_plan_rejects_relative_reference() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse(
            r#"<img src="https://example.com/a.png"><script src="relative/path.js"></script>"#,
        );

        let result = RewritePlan::new(&document, dir.path(), "Page_files");
        assert!(matches!(
            result,
            Err(UrlError::UnresolvableRelativeUrl(ref url)) if url == "relative/path.js"
        ));
    }

    #[test]
    fn test_plan_rejects_missing_extension() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse(r#"<img src="https://example.com/pixel">"#);

        let result = RewritePlan::new(&document, dir.path(), "Page_files");
        assert!(matches!(result, Err(UrlError::MissingExtension(_))));
    }

    #[test]
    fn test_plan_names_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let tags = r#"<img src="https://example.com/a.png">"#.repeat(40);
        let document = parse(&tags);

        let plan = RewritePlan::new(&document, dir.path(), "Page_files").unwrap();
        let names: HashSet<_> = plan.entries.iter().map(|e| e.file_name.clone()).collect();
        assert_eq!(plan.len(), 40);
        assert_eq!(names.len(), 40);
    }

    #[tokio::test]
    async fn test_execute_rewrites_attributes() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse(
            r#"<html><head><link rel="stylesheet" href="http://example.com/css/site.css"></head>
            <body><img src="//cdn.example.com/a.png"></body></html>"#,
        );
        let fetcher = RecordingFetcher::new(b"payload");

        let assets = rewrite_document(&document, dir.path(), "Demo_files", &fetcher)
            .await
            .unwrap();

        assert_eq!(
            fetcher.calls(),
            vec![
                "http://example.com/css/site.css".to_string(),
                "https://cdn.example.com/a.png".to_string(),
            ]
        );
        assert_eq!(assets.len(), 2);
        for asset in &assets {
            assert_eq!(asset.bytes, 7);
            assert_eq!(std::fs::read(asset.path()).unwrap(), b"payload");
        }

        let refs = scan(&document);
        assert_eq!(refs[0].url, format!("Demo_files/{}", assets[0].file_name));
        assert_eq!(refs[1].url, format!("Demo_files/{}", assets[1].file_name));
        assert!(assets[1].file_name.starts_with("a_"));
    }

    #[tokio::test]
    async fn test_execute_reports_progress() {
        let dir = tempfile::tempdir().unwrap();
        let document =
            parse(r#"<img src="https://example.com/a.png"><img src="https://example.com/b.gif">"#);
        let fetcher = RecordingFetcher::new(b"x");
        let plan = RewritePlan::new(&document, dir.path(), "P_files").unwrap();

        let mut seen = Vec::new();
        plan.execute(&fetcher, |done, total| seen.push((done, total)))
            .await
            .unwrap();

        assert_eq!(seen, vec![(0, 2), (1, 2), (2, 2)]);
    }

    #[test]
    fn test_local_reference_escapes_segments() {
        assert_eq!(local_reference("Demo_files", "a_1f2e.png"), "Demo_files/a_1f2e.png");
        assert_eq!(
            local_reference("Q&A #1_files", "my%20photo_1f2e.png"),
            "Q&A%20%231_files/my%2520photo_1f2e.png"
        );
        assert_eq!(
            local_reference("News\\Today?_files", "caf\u{e9}_1f2e.css"),
            "News%5CToday%3F_files/caf%C3%A9_1f2e.css"
        );
    }

    #[test]
    fn test_plan_references_follow_document_order() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse(
            r#"<script src="//cdn.example.com/app.js"></script><img src="https://example.com/a.png">"#,
        );

        let plan = RewritePlan::new(&document, dir.path(), "P_files").unwrap();
        let urls: Vec<_> = plan.references().map(|r| r.url.as_str()).collect();
        assert_eq!(urls, vec!["//cdn.example.com/app.js", "https://example.com/a.png"]);
        assert!(!plan.is_empty());
    }

    #[tokio::test]
    async fn test_repeated_urls_are_fetched_each_time() {
        let dir = tempfile::tempdir().unwrap();
        let document = parse(
            r#"<img src="https://example.com/a.png"><img src="https://example.com/a.png">"#,
        );
        let fetcher = RecordingFetcher::new(b"x");

        let assets = rewrite_document(&document, dir.path(), "P_files", &fetcher)
            .await
            .unwrap();

        assert_eq!(fetcher.calls().len(), 2);
        assert_ne!(assets[0].file_name, assets[1].file_name);
    }
}
