//! `fetch <url> [capacity]` - downloads one URL into a fixed-size buffer and
//! writes the content to stdout.

use std::io::Write;

use anyhow::{Context, bail};
use picohttpd::client::OutboundRequest;
use url::Url;

const DEFAULT_CAPACITY: usize = 256 * 1024;

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .with_writer(std::io::stderr)
        .init();

    let mut args = std::env::args().skip(1);
    let target = args.next().context("usage: fetch <url> [capacity]")?;
    let capacity = match args.next() {
        Some(c) => c.parse().with_context(|| format!("invalid capacity {c}"))?,
        None => DEFAULT_CAPACITY,
    };

    let url = Url::parse(&target).with_context(|| format!("invalid url {target}"))?;
    if url.scheme() != "http" {
        bail!("unsupported scheme {}", url.scheme());
    }
    let host = url.host_str().context("url has no host")?;
    let port = url.port_or_known_default().unwrap_or(80);
    let location = match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    };

    let mut request = OutboundRequest::build(host, port, &location, "GET", capacity)
        .context("failed to build request")?;
    request
        .execute()
        .with_context(|| format!("request to {target} failed"))?;

    tracing::info!(
        status = ?request.status_code(),
        content_length = ?request.content_length(),
        received = request.used(),
        "response received"
    );

    let content = request.content().context("response has no header terminator")?;
    std::io::stdout().write_all(content)?;
    Ok(())
}
