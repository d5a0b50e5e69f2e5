// src/crawler/mod.rs
// =============================================================================
// The crawl core.
//
// Submodules:
// - engine: worker pool + coordinating loop, the traversal state machine
// - fetch: single-page HTTP GET with bounded timeouts
// - extract: incremental link/title extraction from a streaming body
// - resolve: href-to-absolute-URL resolution
// - node: the page tree data model
// =============================================================================

mod engine;
mod extract;
mod fetch;
mod node;
mod resolve;

pub use engine::{Crawler, CrawlerConfig};
pub use node::PageNode;
