use picohttpd::http::connection::Connection;
use picohttpd::site::Site;
use std::fs;
use std::io::{self, Cursor, Read, Write};

struct MockStream {
    input: Cursor<Vec<u8>>,
    output: Vec<u8>,
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.input.read(buf)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.output.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn get(site: &mut Site, request: &str) -> String {
    let stream = MockStream {
        input: Cursor::new(request.as_bytes().to_vec()),
        output: Vec::new(),
    };
    let mut conn = Connection::new(stream);
    conn.run(site).unwrap();
    String::from_utf8_lossy(&conn.into_inner().output).into_owned()
}

#[test]
fn test_index_page() {
    let out = get(&mut Site::default(), "GET / HTTP/1.1\r\n\r\n");

    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Content-Length: 13\r\n"));
    assert!(out.ends_with("\r\n\r\nHello, world!"));
}

#[test]
fn test_svg_page() {
    let out = get(&mut Site::default(), "GET /svg HTTP/1.1\r\n\r\n");

    assert!(out.contains("Transfer-Encoding: chunked\r\n"));
    assert!(out.contains("Content-Type: text/xml\r\n"));
    assert!(out.contains("<h1>/svg</h1>"));
    assert!(out.contains("<svg:rect"));
    assert!(out.ends_with("0\r\n\r\n"));
}

#[test]
fn test_input_page_lists_headers_and_args() {
    let out = get(
        &mut Site::default(),
        "GET /input?color=red HTTP/1.1\r\nHost: localhost\r\nX-Note: a b\r\n\r\n",
    );

    assert!(out.contains("<li><b>Host</b> : localhost</li>"));
    assert!(out.contains("<li><b>X-Note</b> : a&nbsp;b</li>"));
    assert!(out.contains("<li><b>color</b> : red</li>"));
    assert!(out.contains("<form method=\"POST\" action=\"/input\">"));
    assert!(out.contains("name=\"field1\" value=\"???\""));
}

#[test]
fn test_input_page_echoes_escaped_field() {
    let out = get(
        &mut Site::default(),
        "POST /input HTTP/1.1\r\nContent-Length: 26\r\n\r\nfield1=%3Cb%3Ehi%3C%2Fb%3E",
    );

    assert!(out.contains("value=\"&lt;b&gt;hi&lt;/b&gt;\""));
    assert!(!out.contains("value=\"<b>"));
}

#[test]
fn test_unknown_location_without_doc_root() {
    let out = get(&mut Site::default(), "GET /nothing-here HTTP/1.1\r\n\r\n");

    assert!(out.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(out.ends_with("<h1>not really found</h1>"));
}

#[test]
fn test_static_files_from_doc_root() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("page.html"), "<p>static</p>").unwrap();
    fs::write(dir.path().join("logo.svg"), "<svg/>").unwrap();
    fs::create_dir(dir.path().join("sub")).unwrap();
    fs::write(dir.path().join("sub").join("notes.txt"), "nested").unwrap();

    let mut site = Site::new(Some(dir.path().to_path_buf()));

    let out = get(&mut site, "GET /page.html HTTP/1.1\r\n\r\n");
    assert!(out.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(out.contains("Content-Type: text/html\r\n"));
    assert!(out.ends_with("\r\n\r\n<p>static</p>"));

    let out = get(&mut site, "GET /logo.svg HTTP/1.1\r\n\r\n");
    assert!(out.contains("Content-Type: image/svg+xml\r\n"));

    let out = get(&mut site, "GET /sub/notes.txt HTTP/1.1\r\n\r\n");
    assert!(out.contains("Content-Type: text/plain\r\n"));
    assert!(out.ends_with("nested"));
}

#[test]
fn test_static_files_refuse_escape_and_directories() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().join("root");
    fs::create_dir_all(root.join("assets")).unwrap();
    fs::write(dir.path().join("secret.txt"), "secret").unwrap();

    let mut site = Site::new(Some(root));

    for location in ["/../secret.txt", "/%2E%2E/secret.txt", "/missing.txt", "/assets"] {
        let out = get(&mut site, &format!("GET {location} HTTP/1.1\r\n\r\n"));
        assert!(out.starts_with("HTTP/1.1 404 "), "{location} was served");
        assert!(!out.ends_with("\r\n\r\nsecret"), "{location} leaked");
    }
}

#[test]
fn test_input_page_with_long_escaped_header() {
    let cookie = "a b".repeat(1000);
    let out = get(
        &mut Site::default(),
        &format!("GET /input HTTP/1.1\r\nCookie: {cookie}\r\n\r\n"),
    );

    assert!(out.contains(&format!("<li><b>Cookie</b> : {}</li>", "a&nbsp;b".repeat(1000))));
    assert!(out.contains("<form"));
    assert!(out.contains("</html>"));
    assert!(out.ends_with("\r\n0\r\n\r\n"));
}

#[test]
fn test_input_page_with_long_escaped_field() {
    let field = "<\t>".repeat(600);
    let body = format!("field1={}", field.replace('<', "%3C").replace('>', "%3E").replace('\t', "%09"));
    let out = get(
        &mut Site::default(),
        &format!(
            "POST /input HTTP/1.1\r\nContent-Length: {}\r\n\r\n{body}",
            body.len()
        ),
    );

    let escaped = "&lt;&nbsp;&nbsp;&gt;".repeat(600);
    assert!(out.contains(&format!("name=\"field1\" value=\"{escaped}\"/>")));
    assert!(out.contains("</html>"));
}
