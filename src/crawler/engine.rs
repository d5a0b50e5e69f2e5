// src/crawler/engine.rs
// =============================================================================
// The traversal engine: expands a page tree breadth-first from a root URL up
// to a maximum depth across a fixed pool of workers.
//
// Shape:
// - A bounded job channel feeds the pool; dispatch blocks once every worker
//   is busy, which throttles concurrency to the pool size
// - Workers fetch + extract one node at a time and report one Completed
//   message per node on an unbounded channel, so the report path can never
//   take part in a dispatch/report deadlock cycle
// - A single coordinating loop owns the visited set and the pending-work
//   counter; nobody else touches them, so neither needs a lock
//
// The counter reaches zero exactly when no scheduled work remains; fetch and
// parse failures degrade the affected node to an empty title and no children
// but never abort the crawl.
// =============================================================================

use std::collections::HashSet;
use std::num::NonZeroUsize;
use std::thread;
use std::time::Duration;

use futures::StreamExt;
use reqwest::Client;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::extract::extract_links;
use super::fetch::{build_client, fetch};
use super::node::PageNode;

/// Tuning knobs for one crawler instance.
#[derive(Debug, Clone)]
pub struct CrawlerConfig {
    /// Fixed worker pool size for the lifetime of each crawl call.
    pub workers: usize,
    pub connect_timeout: Duration,
    /// Bounds the whole request: handshake, headers, and body read.
    pub request_timeout: Duration,
    pub accept_invalid_certs: bool,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        let parallelism = thread::available_parallelism()
            .map(NonZeroUsize::get)
            .unwrap_or(1);
        Self {
            workers: 5 * parallelism,
            connect_timeout: Duration::from_secs(20),
            request_timeout: Duration::from_secs(60),
            accept_invalid_certs: true,
        }
    }
}

/// Crawls pages into a tree; cheap to share behind the API layer since the
/// underlying HTTP client is pooled and clone-friendly.
pub struct Crawler {
    client: Client,
    workers: usize,
}

/// One scheduled node expansion handed to the pool.
struct Job {
    id: usize,
    url: String,
    depth: usize,
}

/// The single report a worker makes per processed node.
struct Completed {
    id: usize,
    title: String,
    links: Vec<String>,
}

impl Completed {
    fn empty(id: usize) -> Self {
        Self {
            id,
            title: String::new(),
            links: Vec::new(),
        }
    }
}

// Flat store for nodes under construction. Ids are assigned in discovery
// order, so a parent always precedes its children.
struct Slot {
    url: String,
    title: String,
    depth: usize,
    children: Vec<usize>,
}

impl Slot {
    fn new(url: String, depth: usize) -> Self {
        Self {
            url,
            title: String::new(),
            depth,
            children: Vec::new(),
        }
    }
}

impl Crawler {
    pub fn new(config: CrawlerConfig) -> reqwest::Result<Self> {
        let client = build_client(&config)?;
        Ok(Self {
            client,
            workers: config.workers.max(1),
        })
    }

    /// Crawls from `root_url` for `max_depth` fetch levels and returns the
    /// completed tree. Never fails: broken pages surface as empty nodes.
    pub async fn crawl(&self, root_url: &str, max_depth: usize) -> PageNode {
        self.crawl_with_cancel(root_url, max_depth, CancellationToken::new())
            .await
    }

    /// Like [`crawl`](Self::crawl), but unwinds early when `cancel` fires,
    /// returning whatever part of the tree was finished by then.
    pub async fn crawl_with_cancel(
        &self,
        root_url: &str,
        max_depth: usize,
        cancel: CancellationToken,
    ) -> PageNode {
        if max_depth == 0 {
            debug!(url = %root_url, "max depth is zero, nothing to retrieve");
            return PageNode::new(root_url, 0);
        }

        let mut arena = vec![Slot::new(root_url.to_string(), 0)];
        let mut seen: HashSet<String> = HashSet::new();
        let mut pending: usize = 0;

        let (job_tx, job_rx) = mpsc::channel::<Job>(self.workers);
        let (done_tx, mut done_rx) = mpsc::unbounded_channel::<Completed>();

        let pool = {
            let client = self.client.clone();
            let workers = self.workers;
            let pool_cancel = cancel.clone();
            tokio::spawn(async move {
                ReceiverStream::new(job_rx)
                    .for_each_concurrent(workers, |job| {
                        let client = client.clone();
                        let done_tx = done_tx.clone();
                        let cancel = pool_cancel.clone();
                        async move {
                            let completed = process(&client, job, &cancel).await;
                            let _ = done_tx.send(completed);
                        }
                    })
                    .await;
            })
        };

        seen.insert(root_url.to_string());
        pending += 1;
        if job_tx
            .send(Job {
                id: 0,
                url: root_url.to_string(),
                depth: 0,
            })
            .await
            .is_err()
        {
            pending -= 1;
        }

        while pending > 0 {
            tokio::select! {
                completed = done_rx.recv() => {
                    let Some(completed) = completed else { break };
                    pending -= 1;

                    let child_depth = arena[completed.id].depth + 1;
                    arena[completed.id].title = completed.title;

                    for url in completed.links {
                        let child_id = arena.len();
                        arena.push(Slot::new(url.clone(), child_depth));
                        arena[completed.id].children.push(child_id);

                        // Schedule only fresh URLs below the depth limit;
                        // everything else stays in the tree as a bare leaf.
                        if child_depth < max_depth && seen.insert(url.clone()) {
                            pending += 1;
                            let job = Job { id: child_id, url, depth: child_depth };
                            if job_tx.send(job).await.is_err() {
                                pending -= 1;
                            }
                        }
                    }
                }
                _ = cancel.cancelled() => {
                    debug!(url = %root_url, "crawl cancelled, returning partial tree");
                    break;
                }
            }
        }

        // Closing the job channel ends the pool stream; joining it first
        // guarantees no worker still points into this crawl's state.
        drop(job_tx);
        let _ = pool.await;

        assemble(arena)
    }
}

// Fetches and extracts one node; every outcome is a Completed report
async fn process(client: &Client, job: Job, cancel: &CancellationToken) -> Completed {
    if cancel.is_cancelled() {
        return Completed::empty(job.id);
    }

    debug!(url = %job.url, depth = job.depth, "crawling");

    let body = tokio::select! {
        fetched = fetch(client, &job.url) => match fetched {
            Ok(body) => body,
            Err(error) => {
                warn!(url = %job.url, error = %error, "failed to get url");
                return Completed::empty(job.id);
            }
        },
        _ = cancel.cancelled() => return Completed::empty(job.id),
    };

    let (links, title) = tokio::select! {
        extracted = extract_links(body, &job.url) => extracted,
        _ = cancel.cancelled() => (Vec::new(), String::new()),
    };
    debug!(url = %job.url, title = %title, link_count = links.len(), "page processed");

    // http only; mailto:, javascript: and friends never become nodes
    let links = links
        .into_iter()
        .filter(|link| link.starts_with("http"))
        .collect();

    Completed {
        id: job.id,
        title,
        links,
    }
}

// Folds the flat arena into the nested tree. Children always carry a larger
// id than their parent, so a reverse walk builds every child before it is
// attached.
fn assemble(mut arena: Vec<Slot>) -> PageNode {
    let mut built: Vec<Option<PageNode>> = (0..arena.len()).map(|_| None).collect();
    for id in (0..arena.len()).rev() {
        let slot = &mut arena[id];
        let children = std::mem::take(&mut slot.children);
        let nodes = children
            .into_iter()
            .filter_map(|child| built[child].take())
            .collect();
        built[id] = Some(PageNode {
            url: std::mem::take(&mut slot.url),
            title: std::mem::take(&mut slot.title),
            nodes,
            depth: slot.depth,
        });
    }
    built[0].take().expect("root slot always exists")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> CrawlerConfig {
        CrawlerConfig {
            workers: 4,
            connect_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
            accept_invalid_certs: false,
        }
    }

    fn crawler() -> Crawler {
        Crawler::new(test_config()).expect("client should build")
    }

    fn page(title: &str, links: &[&str]) -> String {
        let anchors: String = links
            .iter()
            .map(|link| format!(r#"<a href="{link}">link</a>"#))
            .collect();
        format!("<html><head><title>{title}</title></head><body>{anchors}</body></html>")
    }

    fn assert_depths(node: &PageNode, max_depth: usize) {
        assert!(node.depth <= max_depth);
        for child in &node.nodes {
            assert_eq!(child.depth, node.depth + 1);
            assert_depths(child, max_depth);
        }
    }

    #[tokio::test]
    async fn depth_zero_returns_root_without_fetching() {
        let mut server = mockito::Server::new_async().await;
        let mock = server.mock("GET", "/").expect(0).create_async().await;

        let root = crawler().crawl(&server.url(), 0).await;

        assert_eq!(root.url, server.url());
        assert_eq!(root.title, "");
        assert!(root.nodes.is_empty());
        assert_eq!(root.depth, 0);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn depth_two_fetches_two_levels_and_leaves_the_third_bare() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let root_mock = server
            .mock("GET", "/")
            .with_body(page("foo title", &[&format!("{url}/bar")]))
            .expect(1)
            .create_async()
            .await;
        let bar_mock = server
            .mock("GET", "/bar")
            .with_body(page("bar title", &[&format!("{url}/baragain")]))
            .expect(1)
            .create_async()
            .await;
        let leaf_mock = server
            .mock("GET", "/baragain")
            .expect(0)
            .create_async()
            .await;

        let root = crawler().crawl(&url, 2).await;

        assert_eq!(root.title, "foo title");
        assert_eq!(root.nodes.len(), 1);
        let bar = &root.nodes[0];
        assert_eq!(bar.url, format!("{url}/bar"));
        assert_eq!(bar.title, "bar title");
        assert_eq!(bar.depth, 1);
        assert_eq!(bar.nodes.len(), 1);
        let leaf = &bar.nodes[0];
        assert_eq!(leaf.url, format!("{url}/baragain"));
        assert_eq!(leaf.title, "");
        assert!(leaf.nodes.is_empty());
        assert_eq!(leaf.depth, 2);
        assert_depths(&root, 2);

        root_mock.assert_async().await;
        bar_mock.assert_async().await;
        leaf_mock.assert_async().await;
    }

    #[tokio::test]
    async fn shared_url_is_fetched_once() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _root = server
            .mock("GET", "/")
            .with_body(page(
                "root",
                &[&format!("{url}/left"), &format!("{url}/right")],
            ))
            .create_async()
            .await;
        let _left = server
            .mock("GET", "/left")
            .with_body(page("left", &[&format!("{url}/shared")]))
            .create_async()
            .await;
        let _right = server
            .mock("GET", "/right")
            .with_body(page("right", &[&format!("{url}/shared")]))
            .create_async()
            .await;
        let shared = server
            .mock("GET", "/shared")
            .with_body(page("shared", &[]))
            .expect(1)
            .create_async()
            .await;

        let root = crawler().crawl(&url, 3).await;

        // Both parents keep their child; only one expansion was scheduled.
        assert_eq!(root.nodes.len(), 2);
        for parent in &root.nodes {
            assert_eq!(parent.nodes.len(), 1);
            assert_eq!(parent.nodes[0].url, format!("{url}/shared"));
        }
        shared.assert_async().await;
    }

    #[tokio::test]
    async fn self_link_is_not_refetched() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let mock = server
            .mock("GET", "/")
            .with_body(page("loop", &[&format!("{url}/")]))
            .expect(1)
            .create_async()
            .await;

        let root = crawler().crawl(&format!("{url}/"), 3).await;

        assert_eq!(root.title, "loop");
        assert_eq!(root.nodes.len(), 1);
        assert_eq!(root.nodes[0].title, "");
        assert!(root.nodes[0].nodes.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn unreachable_child_does_not_abort_siblings() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _root = server
            .mock("GET", "/")
            .with_body(page(
                "root",
                &["http://127.0.0.1:1/dead", &format!("{url}/ok")],
            ))
            .create_async()
            .await;
        let _ok = server
            .mock("GET", "/ok")
            .with_body(page("ok title", &[]))
            .create_async()
            .await;

        let root = crawler().crawl(&url, 2).await;

        assert_eq!(root.title, "root");
        assert_eq!(root.nodes.len(), 2);
        let dead = &root.nodes[0];
        assert_eq!(dead.url, "http://127.0.0.1:1/dead");
        assert_eq!(dead.title, "");
        assert!(dead.nodes.is_empty());
        let ok = &root.nodes[1];
        assert_eq!(ok.title, "ok title");
    }

    #[tokio::test]
    async fn non_2xx_root_degrades_to_a_bare_node() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/")
            .with_status(500)
            .create_async()
            .await;

        let root = crawler().crawl(&server.url(), 2).await;

        assert_eq!(root.url, server.url());
        assert_eq!(root.title, "");
        assert!(root.nodes.is_empty());
    }

    #[tokio::test]
    async fn non_http_links_are_dropped() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _mock = server
            .mock("GET", "/")
            .with_body(
                "<title>t</title>\
                 <a href=\"mailto:someone@example.com\">mail</a>\
                 <a href=\"javascript:void(0)\">js</a>",
            )
            .create_async()
            .await;

        let root = crawler().crawl(&url, 2).await;

        assert_eq!(root.title, "t");
        assert!(root.nodes.is_empty());
    }

    #[tokio::test]
    async fn children_keep_document_order() {
        let mut server = mockito::Server::new_async().await;
        let url = server.url();
        let _mock = server
            .mock("GET", "/")
            .with_body(page(
                "ordered",
                &[
                    &format!("{url}/c"),
                    &format!("{url}/a"),
                    &format!("{url}/b"),
                ],
            ))
            .create_async()
            .await;

        let root = crawler().crawl(&url, 1).await;

        let urls: Vec<_> = root.nodes.iter().map(|node| node.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                format!("{url}/c"),
                format!("{url}/a"),
                format!("{url}/b")
            ]
        );
    }

    #[tokio::test]
    async fn cancelled_crawl_returns_promptly() {
        let mut server = mockito::Server::new_async().await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        let root = crawler()
            .crawl_with_cancel(&server.url(), 3, cancel)
            .await;

        assert_eq!(root.url, server.url());
    }
}
