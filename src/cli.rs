// src/cli.rs
// =============================================================================
// Command-line interface, built with clap's derive API.
// =============================================================================

use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "linkmap",
    version,
    about = "Crawl a web page and map its outbound links into a tree",
    long_about = "linkmap serves an HTTP API that fetches a page, extracts its title and \
                  links, and repeats this for linked pages up to a requested depth, \
                  returning the visited pages as a JSON tree."
)]
pub struct Cli {
    /// Port for the crawl API to listen on
    #[arg(long, default_value_t = 8080)]
    pub port: u16,

    /// Worker pool size (default: 5x the available parallelism)
    #[arg(long)]
    pub workers: Option<usize>,
}
