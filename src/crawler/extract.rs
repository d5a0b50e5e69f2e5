// src/crawler/extract.rs
// =============================================================================
// Incremental link and title extraction from a streaming HTML body.
//
// The body is consumed chunk by chunk and fed into lol_html, which tokenizes
// forward-only — the whole document is never held in memory. The rewriter is
// not Send, so it runs on a blocking thread fed through a channel while the
// async side drains the network stream.
//
// Rules:
// - Title: text inside <title> regions; the last complete text node wins
// - Links: any <a> attribute whose quote-stripped key equals "href"
//   contributes its value, resolved against the page URL, in document order
// - Malformed markup or a mid-body transport error ends extraction; whatever
//   was accumulated so far is returned, nothing propagates
// =============================================================================

use std::cell::RefCell;
use std::fmt::Display;
use std::sync::mpsc;

use bytes::Bytes;
use futures::{pin_mut, Stream, StreamExt};
use lol_html::{element, text, HtmlRewriter, Settings};
use tracing::debug;

use super::resolve::resolve_link;

// Extracts all resolvable links and the page title from an HTML byte stream
//
// The stream item error type only needs to be printable; an error item ends
// the stream early but never fails the extraction.
pub async fn extract_links<S, E>(body: S, base_url: &str) -> (Vec<String>, String)
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Display,
{
    let (chunk_tx, chunk_rx) = mpsc::channel::<Bytes>();
    let base = base_url.to_string();
    let parser = tokio::task::spawn_blocking(move || parse_chunks(chunk_rx, &base));

    pin_mut!(body);
    while let Some(chunk) = body.next().await {
        match chunk {
            // The parser hangs up once the markup is beyond repair.
            Ok(bytes) => {
                if chunk_tx.send(bytes).is_err() {
                    break;
                }
            }
            Err(error) => {
                debug!(url = %base_url, error = %error, "body stream ended early");
                break;
            }
        }
    }
    drop(chunk_tx);

    parser.await.unwrap_or_default()
}

// Runs the streaming tokenizer over incoming chunks until the channel closes
// or the rewriter rejects the input
fn parse_chunks(chunks: mpsc::Receiver<Bytes>, base_url: &str) -> (Vec<String>, String) {
    let links = RefCell::new(Vec::new());
    let title = RefCell::new(TitleCapture::default());

    let mut rewriter = HtmlRewriter::new(
        Settings {
            element_content_handlers: vec![
                element!("a", |anchor| {
                    for attribute in anchor.attributes() {
                        if strip_quotes(&attribute.name()) == "href" {
                            let href = attribute.value();
                            if let Some(resolved) = resolve_link(strip_quotes(&href), base_url) {
                                links.borrow_mut().push(resolved);
                            }
                        }
                    }
                    Ok(())
                }),
                text!("title", |chunk| {
                    title
                        .borrow_mut()
                        .push(chunk.as_str(), chunk.last_in_text_node());
                    Ok(())
                }),
            ],
            ..Settings::default()
        },
        |_: &[u8]| {},
    );

    let mut broken = false;
    while let Ok(chunk) = chunks.recv() {
        if let Err(error) = rewriter.write(&chunk) {
            debug!(url = %base_url, error = %error, "tokenizer gave up on document");
            broken = true;
            break;
        }
    }
    if broken {
        drop(rewriter);
    } else if let Err(error) = rewriter.end() {
        debug!(url = %base_url, error = %error, "tokenizer flush failed");
    }

    (links.into_inner(), title.into_inner().into_title())
}

/// Accumulates <title> text, replacing the buffer whenever a new text node
/// starts after a completed one.
#[derive(Default)]
struct TitleCapture {
    buffer: String,
    node_complete: bool,
}

impl TitleCapture {
    fn push(&mut self, text: &str, last_in_node: bool) {
        if self.node_complete {
            self.buffer.clear();
            self.node_complete = false;
        }
        self.buffer.push_str(text);
        if last_in_node {
            self.node_complete = true;
        }
    }

    fn into_title(self) -> String {
        self.buffer
    }
}

// Strips one leading and one trailing quote character, each independently,
// so sloppily quoted markup like <a 'href'='/x'> still yields its link
fn strip_quotes(s: &str) -> &str {
    let s = s.strip_prefix(['"', '\'']).unwrap_or(s);
    s.strip_suffix(['"', '\'']).unwrap_or(s)
}
