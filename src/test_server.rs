use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread;

/// Minimal per-test HTTP server: `handler` maps a request path to a raw
/// response. Returns the base URL to request against.
pub fn spawn_server<F>(handler: F) -> String
where
    F: Fn(&str) -> String + Send + 'static
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();

    thread::spawn(move || {
        for stream in listener.incoming() {
            let Ok(mut stream) = stream else { break };

            let mut reader = BufReader::new(stream.try_clone().unwrap());
            let mut request_line = String::new();
            if reader.read_line(&mut request_line).is_err() {
                continue;
            }

            let mut header = String::new();
            while reader.read_line(&mut header).is_ok() {
                if header == "\r\n" || header.is_empty() {
                    break;
                }
                header.clear();
            }

            let path = request_line.split_whitespace().nth(1).unwrap_or("/").to_string();
            let _ = stream.write_all(handler(&path).as_bytes());
        }
    });

    format!("http://{addr}")
}

pub fn ok_response(body: &str) -> String {
    format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {len}\r\nConnection: close\r\n\r\n{body}",
        len = body.len()
    )
}

pub fn redirect_response(location: &str) -> String {
    format!(
        "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
    )
}

pub fn not_found_response() -> String {
    "HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\nConnection: close\r\n\r\n".to_string()
}
