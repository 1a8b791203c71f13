use crate::config::HttpTimeouts;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Method {
    Get,
    Post,
    Delete,
}

impl Method {
    fn as_str(self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Delete => "DELETE",
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct HttpRequest<'a> {
    pub(crate) method: Method,
    pub(crate) url: &'a str,
    pub(crate) headers: Vec<(String, String)>,
    pub(crate) query: Vec<(String, String)>,
    pub(crate) body: Option<String>,
}

impl<'a> HttpRequest<'a> {
    pub(crate) fn new(method: Method, url: &'a str) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
            query: Vec::new(),
            body: None,
        }
    }

    pub(crate) fn header(mut self, key: &str, value: impl Into<String>) -> Self {
        self.headers.push((key.to_string(), value.into()));
        self
    }

    pub(crate) fn query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }

    pub(crate) fn json_body(mut self, body: String) -> Self {
        self.body = Some(body);
        self.header("Content-Type", "application/json")
    }
}

/// Issues one request and returns the response body. There is no retry:
/// callers log the error and keep their previous state.
pub(crate) fn send_text(request: HttpRequest<'_>, timeouts: HttpTimeouts) -> Result<String, String> {
    let agent = ureq::AgentBuilder::new()
        .timeout_connect(timeouts.connect)
        .timeout_read(timeouts.read)
        .timeout_write(timeouts.read)
        .build();

    let mut pending = agent.request(request.method.as_str(), request.url);
    for (key, value) in &request.headers {
        pending = pending.set(key, value);
    }
    for (key, value) in &request.query {
        pending = pending.query(key, value);
    }

    let result = match request.body.as_deref() {
        Some(body) => pending.send_string(body),
        None => pending.call(),
    };

    match result {
        Ok(response) => response
            .into_string()
            .map_err(|err| format!("request failed: response decode failed: {err}")),
        Err(ureq::Error::Status(status, response)) => {
            let response_body = response.into_string().ok().unwrap_or_default();
            let body = response_body.trim();
            if body.is_empty() {
                Err(format!("request failed: HTTP status {status}"))
            } else {
                let truncated = body.chars().take(240).collect::<String>();
                Err(format!("request failed: HTTP status {status} ({truncated})"))
            }
        }
        Err(ureq::Error::Transport(err)) => Err(format!("request failed: transport error: {err}")),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    #[derive(Debug, Clone)]
    pub(crate) enum Behavior {
        Respond(u16, String),
        DelayRespond(Duration, u16, String),
    }

    #[derive(Debug)]
    pub(crate) struct TestServer {
        pub(crate) base_url: String,
        requests: Arc<AtomicUsize>,
        heads: Arc<Mutex<Vec<String>>>,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        pub(crate) fn spawn(behaviors: Vec<Behavior>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let requests = Arc::new(AtomicUsize::new(0));
            let requests_clone = Arc::clone(&requests);
            let heads = Arc::new(Mutex::new(Vec::new()));
            let heads_clone = Arc::clone(&heads);
            let shared_behaviors = Arc::new(Mutex::new(VecDeque::from(behaviors)));
            let behaviors_clone = Arc::clone(&shared_behaviors);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            requests_clone.fetch_add(1, Ordering::SeqCst);
                            let behavior = {
                                let mut queue = behaviors_clone.lock().expect("lock behaviors");
                                queue.pop_front().unwrap_or_else(|| {
                                    Behavior::Respond(200, "default-ok".to_string())
                                })
                            };
                            let heads = Arc::clone(&heads_clone);
                            std::thread::spawn(move || {
                                if let Ok(head) = consume_request(&mut stream) {
                                    heads.lock().expect("lock heads").push(head);
                                }
                                serve_behavior(&mut stream, behavior);
                            });
                        }
                        Err(err) if err.kind() == std::io::ErrorKind::WouldBlock => {
                            std::thread::sleep(Duration::from_millis(5));
                        }
                        Err(_) => break,
                    }
                }
            });

            Self {
                base_url: format!("http://{addr}"),
                requests,
                heads,
                shutdown_tx,
                join_handle: Some(join_handle),
            }
        }

        pub(crate) fn request_count(&self) -> usize {
            self.requests.load(Ordering::SeqCst)
        }

        /// Raw request heads and bodies, in arrival order.
        pub(crate) fn requests(&self) -> Vec<String> {
            self.heads.lock().expect("lock heads").clone()
        }
    }

    impl Drop for TestServer {
        fn drop(&mut self) {
            let _ = self.shutdown_tx.send(());
            if let Some(handle) = self.join_handle.take() {
                let _ = handle.join();
            }
        }
    }

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<String> {
        stream.set_read_timeout(Some(Duration::from_millis(200)))?;
        let mut buf = [0_u8; 1024];
        let mut data = Vec::new();
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(read) => {
                    data.extend_from_slice(&buf[..read]);
                    if request_complete(&data) {
                        break;
                    }
                }
                Err(err)
                    if err.kind() == std::io::ErrorKind::WouldBlock
                        || err.kind() == std::io::ErrorKind::TimedOut =>
                {
                    break;
                }
                Err(err) => return Err(err),
            }
        }
        Ok(String::from_utf8_lossy(&data).into_owned())
    }

    fn request_complete(data: &[u8]) -> bool {
        let Some(head_end) = data.windows(4).position(|window| window == b"\r\n\r\n") else {
            return false;
        };
        let head = String::from_utf8_lossy(&data[..head_end]).to_ascii_lowercase();
        let content_length = head
            .lines()
            .find_map(|line| line.strip_prefix("content-length:"))
            .and_then(|value| value.trim().parse::<usize>().ok())
            .unwrap_or(0);
        data.len() >= head_end + 4 + content_length
    }

    fn reason_phrase(status: u16) -> &'static str {
        match status {
            200 => "OK",
            201 => "Created",
            204 => "No Content",
            400 => "Bad Request",
            401 => "Unauthorized",
            404 => "Not Found",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Status",
        }
    }

    fn serve_behavior(stream: &mut TcpStream, behavior: Behavior) {
        match behavior {
            Behavior::Respond(status, body) => {
                let _ = write_response(stream, status, &body);
            }
            Behavior::DelayRespond(delay, status, body) => {
                std::thread::sleep(delay);
                let _ = write_response(stream, status, &body);
            }
        }
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let reason = reason_phrase(status);
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} {reason}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }

    pub(crate) fn fast_timeouts() -> HttpTimeouts {
        HttpTimeouts {
            connect: Duration::from_millis(200),
            read: Duration::from_millis(200),
        }
    }

    #[test]
    fn returns_body_on_success() {
        let server = TestServer::spawn(vec![Behavior::Respond(200, "ok".to_string())]);
        let url = format!("{}/shows", server.base_url);

        let result = send_text(
            HttpRequest::new(Method::Get, &url).query("q", "x"),
            fast_timeouts(),
        );

        assert_eq!(result.expect("request should succeed"), "ok");
        let requests = server.requests();
        assert!(
            requests[0].starts_with("GET /shows?q=x "),
            "unexpected request line: {}",
            requests[0]
        );
    }

    #[test]
    fn does_not_retry_server_errors() {
        let server = TestServer::spawn(vec![
            Behavior::Respond(503, "down".to_string()),
            Behavior::Respond(200, "ok".to_string()),
        ]);

        let result = send_text(HttpRequest::new(Method::Get, &server.base_url), fast_timeouts());

        let err = result.expect_err("503 should surface as an error");
        assert!(
            err.contains("HTTP status 503") && err.contains("down"),
            "unexpected error message: {err}"
        );
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn reports_transport_timeout() {
        let server = TestServer::spawn(vec![Behavior::DelayRespond(
            Duration::from_millis(400),
            200,
            "slow".to_string(),
        )]);
        let timeouts = HttpTimeouts {
            connect: Duration::from_millis(200),
            read: Duration::from_millis(50),
        };

        let result = send_text(HttpRequest::new(Method::Get, &server.base_url), timeouts);

        let err = result.expect_err("slow response should time out");
        assert!(err.contains("transport error"), "unexpected error message: {err}");
        assert_eq!(server.request_count(), 1);
    }

    #[test]
    fn sends_json_body_and_headers() {
        let server = TestServer::spawn(vec![Behavior::Respond(201, String::new())]);
        let url = format!("{}/rest/v1/favorites", server.base_url);

        let result = send_text(
            HttpRequest::new(Method::Post, &url)
                .header("apikey", "anon")
                .json_body("[{\"season_id\":\"10\"}]".to_string()),
            fast_timeouts(),
        );

        assert_eq!(result.expect("insert should succeed"), "");
        let request = &server.requests()[0];
        let lower = request.to_ascii_lowercase();
        assert!(request.starts_with("POST /rest/v1/favorites "));
        assert!(lower.contains("apikey: anon"));
        assert!(lower.contains("content-type: application/json"));
        assert!(request.ends_with("[{\"season_id\":\"10\"}]"));
    }
}
