// ============================================================================
// Canned HTTP responses for tests
// ============================================================================

use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

/// Serve exactly one HTTP response on an ephemeral local port and return the
/// URL to request. The request headers are read and discarded.
pub fn serve_once(status: &str, content_type: &str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    let head = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        content_type,
        body.len()
    );

    thread::spawn(move || {
        let Ok((stream, _)) = listener.accept() else {
            return;
        };
        let mut reader = BufReader::new(stream);
        let mut line = String::new();
        while reader.read_line(&mut line).map(|n| n > 0).unwrap_or(false) {
            if line == "\r\n" {
                break;
            }
            line.clear();
        }

        let mut stream = reader.into_inner();
        stream.write_all(head.as_bytes()).ok();
        stream.write_all(&body).ok();
        stream.flush().ok();
    });

    format!("http://{}/resource", addr)
}

/// Client that talks to the local server directly even when a proxy is set
pub fn local_client() -> reqwest::blocking::Client {
    reqwest::blocking::Client::builder().no_proxy().build().unwrap()
}
