use picohttpd::chunk;
use picohttpd::http::response::StatusCode;
use picohttpd::http::writer::{FORMAT_BUFFER_SIZE, ResponseWriter, WriteError, WriterState};

fn text(out: &[u8]) -> &str {
    std::str::from_utf8(out).unwrap()
}

#[test]
fn test_fixed_response_with_body() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(StatusCode::OK, Some(b"Hello, world!".as_slice()), None, None)
        .unwrap();
    assert_eq!(writer.state(), WriterState::Complete);
    drop(writer);

    assert_eq!(
        text(&out),
        "HTTP/1.1 200 OK\r\n\
         Server: picohttpd\r\n\
         Cache-Control: no-cache\r\n\
         Content-Length: 13\r\n\
         Content-Type: text/html\r\n\
         \r\n\
         Hello, world!"
    );
}

#[test]
fn test_fixed_response_without_body() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(StatusCode::NOT_FOUND, None, None, None)
        .unwrap();
    drop(writer);

    let response = text(&out);
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
    assert!(response.contains("Content-Length: 0\r\n"));
    assert!(response.ends_with("\r\n\r\n"));
}

#[test]
fn test_fixed_response_custom_headers_replace_default() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(
            StatusCode::OK,
            Some(b"{}".as_slice()),
            None,
            Some("Content-Type: application/json\r\nX-Trace: 1\r\n"),
        )
        .unwrap();
    drop(writer);

    let response = text(&out);
    assert!(response.contains("Content-Type: application/json\r\nX-Trace: 1\r\n\r\n{}"));
    assert!(!response.contains("text/html"));
}

#[test]
fn test_fixed_response_content_length_prefix() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(StatusCode::OK, Some(b"abcdef".as_slice()), Some(3), None)
        .unwrap();
    drop(writer);

    let response = text(&out);
    assert!(response.contains("Content-Length: 3\r\n"));
    assert!(response.ends_with("\r\n\r\nabc"));
}

#[test]
fn test_fixed_response_content_length_too_long() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    let result = writer.respond_fixed(StatusCode::OK, Some(b"abc".as_slice()), Some(10), None);

    assert!(matches!(
        result,
        Err(WriteError::LengthMismatch {
            declared: 10,
            available: 3
        })
    ));
    assert_eq!(writer.state(), WriterState::Ready);
    drop(writer);
    assert!(out.is_empty());
}

#[test]
fn test_unknown_status_code() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(StatusCode::new(299), None, None, None)
        .unwrap();
    drop(writer);

    assert!(text(&out).starts_with("HTTP/1.1 299 ???\r\n"));
}

#[test]
fn test_chunked_response() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);

    writer.begin_chunked(StatusCode::OK, None).unwrap();
    assert!(writer.is_chunked());
    assert_eq!(chunk!(writer, "AB").unwrap(), 2);
    assert_eq!(chunk!(writer, "{}{}", "CD", 'E').unwrap(), 3);
    writer.end_chunked().unwrap();
    assert_eq!(writer.state(), WriterState::Complete);
    drop(writer);

    assert_eq!(
        text(&out),
        "HTTP/1.1 200 OK\r\n\
         Server: picohttpd\r\n\
         Cache-Control: no-cache\r\n\
         Transfer-Encoding: chunked\r\n\
         Content-Type: text/html\r\n\
         \r\n\
         2\r\nAB\r\n\
         3\r\nCDE\r\n\
         0\r\n\r\n"
    );
}

#[test]
fn test_chunk_size_is_hex() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer.begin_chunked(StatusCode::OK, Some("")).unwrap();
    let payload = vec![b'z'; 300];
    assert_eq!(writer.write_chunk_bytes(&payload).unwrap(), 300);
    drop(writer);

    let response = text(&out);
    assert!(response.contains("\r\n\r\n12c\r\n"));
}

#[test]
fn test_empty_chunk_is_not_sent() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer.begin_chunked(StatusCode::OK, None).unwrap();
    assert_eq!(writer.write_chunk_bytes(b"").unwrap(), 0);
    assert_eq!(chunk!(writer, "{}", "").unwrap(), 0);
    writer.end_chunked().unwrap();
    drop(writer);

    assert!(text(&out).ends_with("\r\n\r\n0\r\n\r\n"));
}

#[test]
fn test_chunk_text_too_long() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer.begin_chunked(StatusCode::OK, None).unwrap();

    let fits = "x".repeat(FORMAT_BUFFER_SIZE - 1);
    assert_eq!(chunk!(writer, "{}", fits).unwrap(), FORMAT_BUFFER_SIZE - 1);

    let too_long = "x".repeat(FORMAT_BUFFER_SIZE);
    assert!(matches!(
        chunk!(writer, "{}", too_long),
        Err(WriteError::BufferExceeded { capacity: FORMAT_BUFFER_SIZE })
    ));

    // raw bytes bypass the format buffer
    let raw = vec![b'y'; FORMAT_BUFFER_SIZE * 2];
    assert_eq!(writer.write_chunk_bytes(&raw).unwrap(), raw.len());
    assert!(writer.is_chunked());
}

#[test]
fn test_chunk_outside_chunked_mode() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);

    assert!(matches!(chunk!(writer, "x"), Err(WriteError::NotChunked)));
    assert!(matches!(writer.end_chunked(), Err(WriteError::NotChunked)));

    writer
        .respond_fixed(StatusCode::OK, None, None, None)
        .unwrap();
    assert!(matches!(chunk!(writer, "x"), Err(WriteError::NotChunked)));
}

#[test]
fn test_second_response_rejected() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer
        .respond_fixed(StatusCode::OK, None, None, None)
        .unwrap();

    assert!(matches!(
        writer.respond_fixed(StatusCode::OK, None, None, None),
        Err(WriteError::AlreadyResponded)
    ));
    assert!(matches!(
        writer.begin_chunked(StatusCode::OK, None),
        Err(WriteError::AlreadyResponded)
    ));

    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer.begin_chunked(StatusCode::OK, None).unwrap();
    assert!(matches!(
        writer.respond_fixed(StatusCode::OK, None, None, None),
        Err(WriteError::AlreadyResponded)
    ));
}

#[test]
fn test_status_accepts_plain_u16() {
    let mut out = Vec::new();
    let mut writer = ResponseWriter::new(&mut out);
    writer.respond_fixed(220u16, None, None, None).unwrap();
    drop(writer);

    assert!(text(&out).starts_with("HTTP/1.1 220 OK\r\n"));
}
