//! Demo pages served by the `picohttpd` binary.

use std::path::{Component, Path, PathBuf};

use anyhow::Context;

use crate::http::connection::Handler;
use crate::http::mime::content_type_for;
use crate::http::request::ParsedRequest;
use crate::http::response::StatusCode;
use crate::http::text::html_escape_into;
use crate::http::writer::ResponseWriter;

const NOT_FOUND_BODY: &[u8] = b"<h1>not really found</h1>";

/// Routes `/`, `/svg` and `/input`, and serves everything else from
/// `doc_root` when one is configured.
#[derive(Debug, Clone, Default)]
pub struct Site {
    doc_root: Option<PathBuf>,
}

impl Site {
    pub fn new(doc_root: Option<PathBuf>) -> Self {
        Self { doc_root }
    }

    fn index(&self, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
        res.respond_fixed(StatusCode::OK, Some(b"Hello, world!".as_slice()), None, None)?;
        Ok(())
    }

    fn svg(&self, req: &ParsedRequest, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
        res.begin_chunked(StatusCode::OK, Some("Content-Type: text/xml\r\n"))?;

        res.write_chunk_bytes(
            b"<?xml version=\"1.0\" encoding=\"UTF-8\"?>\
              <!DOCTYPE HTML PUBLIC \"-//W3C//DTD XHTML 1.0 Strict//EN\"\n\
              \"http://www.w3.org/TR/xhtml1/DTD/xhtml1-strict.dtd\">\
              <html xml:lang=\"en\" xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:svg=\"http://www.w3.org/2000/svg\">\
              <head><title>svg</title></head><body>",
        )?;
        write_wrapped(res, &mut String::new(), "<h1>", req.location(), "</h1>")?;
        res.write_chunk_bytes(
            b"<svg:svg version=\"1.1\">\
              <svg:rect style=\"fill:#f73\" id=\"x\" width=\"300 px\" height=\"300 px\" x=\"0 px\" y=\"0 px\"/>\
              </svg:svg>",
        )?;
        res.write_chunk_bytes(b"</body></html>")?;

        res.end_chunked()?;
        Ok(())
    }

    fn input(&self, req: &ParsedRequest, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
        let field = req.arg("field1").unwrap_or("???");

        res.begin_chunked(StatusCode::OK, None)?;
        let mut line = String::new();
        res.write_chunk_bytes(b"<html><body><h2>http headers</h2><ul>")?;
        for (name, value) in req.headers().iter() {
            write_list_item(res, &mut line, name, value)?;
        }
        res.write_chunk_bytes(b"</ul><h2>http parameters (POST+GET)</h2><ul>")?;
        for (name, value) in req.args().iter() {
            write_list_item(res, &mut line, name, value)?;
        }
        write_wrapped(
            res,
            &mut line,
            "</ul><form method=\"POST\" action=\"",
            req.location(),
            "\">",
        )?;
        write_wrapped(
            res,
            &mut line,
            "<input type=\"text\" name=\"field1\" value=\"",
            field,
            "\"/>",
        )?;
        res.write_chunk_bytes(b"<input type=\"submit\"/></form></body></html>")?;

        res.end_chunked()?;
        Ok(())
    }

    fn static_file(&self, req: &ParsedRequest, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
        let Some(path) = self.resolve(req.location()) else {
            return not_found(res);
        };

        let contents = match std::fs::read(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return not_found(res),
            Err(e) => {
                return Err(e).with_context(|| format!("failed to read {}", path.display()));
            }
        };

        let header = format!("Content-Type: {}\r\n", content_type_for(&path));
        res.respond_fixed(StatusCode::OK, Some(contents.as_slice()), None, Some(&header))?;
        Ok(())
    }

    /// Maps a location onto `doc_root`, refusing anything that could escape it.
    fn resolve(&self, location: &str) -> Option<PathBuf> {
        let root = self.doc_root.as_ref()?;
        let relative = Path::new(location.trim_start_matches('/'));

        if relative.as_os_str().is_empty()
            || !relative.components().all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }

        let path = root.join(relative);
        path.is_file().then_some(path)
    }
}

/// Sends `before`, the escaped `text` and `after` as one chunk.
///
/// Escaping can grow request text well past the format buffer, so the chunk
/// is assembled in `line` and sent as raw bytes.
fn write_wrapped(
    res: &mut ResponseWriter<'_>,
    line: &mut String,
    before: &str,
    text: &str,
    after: &str,
) -> anyhow::Result<()> {
    line.clear();
    line.push_str(before);
    html_escape_into(text, line);
    line.push_str(after);
    res.write_chunk_bytes(line.as_bytes())?;
    Ok(())
}

fn write_list_item(
    res: &mut ResponseWriter<'_>,
    line: &mut String,
    name: &str,
    value: &str,
) -> anyhow::Result<()> {
    line.clear();
    line.push_str("<li><b>");
    html_escape_into(name, line);
    line.push_str("</b> : ");
    html_escape_into(value, line);
    line.push_str("</li>");
    res.write_chunk_bytes(line.as_bytes())?;
    Ok(())
}

fn not_found(res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
    res.respond_fixed(StatusCode::NOT_FOUND, Some(NOT_FOUND_BODY), None, None)?;
    Ok(())
}

impl Handler for Site {
    fn handle(&mut self, req: &ParsedRequest, res: &mut ResponseWriter<'_>) -> anyhow::Result<()> {
        match req.location() {
            "/" => self.index(res),
            "/svg" => self.svg(req, res),
            "/input" => self.input(req, res),
            _ => self.static_file(req, res),
        }
    }
}
