// src/crawler/node.rs
// =============================================================================
// The unit of the crawl tree: one visited or pending URL together with its
// extracted title and child pages.
//
// A node is created when its URL is first referenced (as the root, or as a
// link inside a parent page) and mutated exactly once by the worker that
// fetches it. Serialized form is {"url", "title", "nodes"}; the depth is an
// internal bookkeeping field and stays out of the JSON.
// =============================================================================

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageNode {
    pub url: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub nodes: Vec<PageNode>,
    /// Distance from the root in fetch hops; root is 0.
    #[serde(skip)]
    pub depth: usize,
}

impl PageNode {
    pub fn new(url: impl Into<String>, depth: usize) -> Self {
        Self {
            url: url.into(),
            title: String::new(),
            nodes: Vec::new(),
            depth,
        }
    }
}
