use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use serde_json::{Value, json};

const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Opaque W3C element reference handed back by find operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ElementRef(String);

impl ElementRef {
    pub(crate) fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub(crate) fn id(&self) -> &str {
        &self.0
    }
}

/// Minimal synchronous client for one W3C WebDriver session.
pub(crate) struct WebDriver {
    agent: ureq::Agent,
    session_url: String,
}

impl WebDriver {
    pub(crate) fn new_session(server_url: &str) -> Result<Self> {
        let agent = build_agent();
        let base = server_url.trim_end_matches('/').to_string();
        let url = format!("{base}/session");
        let body = json!({ "capabilities": { "alwaysMatch": {} } });
        let value = match send(agent.post(&url), Some(&body)) {
            Ok(value) => value,
            Err(err) => {
                return Err(anyhow!(
                    "failed to create webdriver session at {base}: {}",
                    err.detail()
                ));
            }
        };
        let session_id = value
            .pointer("/value/sessionId")
            .and_then(Value::as_str)
            .context("webdriver session response missing sessionId")?;
        Ok(Self {
            session_url: format!("{base}/session/{session_id}"),
            agent,
        })
    }

    pub(crate) fn navigate(&self, url: &str) -> Result<()> {
        self.post("url", &json!({ "url": url }))?;
        Ok(())
    }

    pub(crate) fn current_url(&self) -> Result<String> {
        let value = self.get("url")?;
        value
            .pointer("/value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("webdriver url response missing value")
    }

    /// Single-element lookup; an absent element is `None`, not an error.
    pub(crate) fn find_element(&self, css: &str) -> Result<Option<ElementRef>> {
        self.find_one("element", css)
    }

    pub(crate) fn find_element_from(
        &self,
        parent: &ElementRef,
        css: &str,
    ) -> Result<Option<ElementRef>> {
        self.find_one(&format!("element/{}/element", parent.id()), css)
    }

    pub(crate) fn find_elements_from(
        &self,
        parent: &ElementRef,
        css: &str,
    ) -> Result<Vec<ElementRef>> {
        let value = self.post(
            &format!("element/{}/elements", parent.id()),
            &selector_body(css),
        )?;
        let items = value
            .pointer("/value")
            .and_then(Value::as_array)
            .context("webdriver elements response missing value array")?;
        items.iter().map(element_from_value).collect()
    }

    pub(crate) fn element_property(&self, element: &ElementRef, name: &str) -> Result<Value> {
        let value = self.get(&format!("element/{}/property/{name}", element.id()))?;
        Ok(value.pointer("/value").cloned().unwrap_or(Value::Null))
    }

    pub(crate) fn element_text(&self, element: &ElementRef) -> Result<String> {
        let value = self.get(&format!("element/{}/text", element.id()))?;
        value
            .pointer("/value")
            .and_then(Value::as_str)
            .map(str::to_string)
            .context("webdriver text response missing value")
    }

    pub(crate) fn click(&self, element: &ElementRef) -> Result<()> {
        self.post(&format!("element/{}/click", element.id()), &json!({}))?;
        Ok(())
    }

    pub(crate) fn execute(&self, script: &str, args: Vec<Value>) -> Result<Value> {
        let value = self.post(
            "execute/sync",
            &json!({ "script": script, "args": args }),
        )?;
        Ok(value.pointer("/value").cloned().unwrap_or(Value::Null))
    }

    pub(crate) fn quit(self) -> Result<()> {
        match send(self.agent.delete(&self.session_url), None) {
            Ok(_) => Ok(()),
            Err(err) => Err(anyhow!("failed to end webdriver session: {}", err.detail())),
        }
    }

    #[cfg(test)]
    pub(crate) fn attach_for_tests(server_url: &str, session_id: &str) -> Self {
        Self {
            agent: build_agent(),
            session_url: format!("{}/session/{session_id}", server_url.trim_end_matches('/')),
        }
    }

    fn find_one(&self, path: &str, css: &str) -> Result<Option<ElementRef>> {
        let url = self.endpoint(path);
        match send(self.agent.post(&url), Some(&selector_body(css))) {
            Ok(value) => {
                let element = value
                    .pointer("/value")
                    .map(element_from_value)
                    .context("webdriver element response missing value")??;
                Ok(Some(element))
            }
            Err(CallError::NoSuchElement) => Ok(None),
            Err(err) => Err(anyhow!(
                "webdriver request {url} failed: {}",
                err.detail()
            )),
        }
    }

    fn post(&self, path: &str, body: &Value) -> Result<Value> {
        let url = self.endpoint(path);
        send(self.agent.post(&url), Some(body))
            .map_err(|err| anyhow!("webdriver request {url} failed: {}", err.detail()))
    }

    fn get(&self, path: &str) -> Result<Value> {
        let url = self.endpoint(path);
        send(self.agent.get(&url), None)
            .map_err(|err| anyhow!("webdriver request {url} failed: {}", err.detail()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.session_url)
    }
}

fn build_agent() -> ureq::Agent {
    ureq::AgentBuilder::new()
        .timeout_connect(Duration::from_secs(5))
        .timeout_read(Duration::from_secs(30))
        .timeout_write(Duration::from_secs(30))
        .build()
}

fn selector_body(css: &str) -> Value {
    json!({ "using": "css selector", "value": css })
}

fn element_from_value(value: &Value) -> Result<ElementRef> {
    value
        .pointer(&format!("/{ELEMENT_KEY}"))
        .and_then(Value::as_str)
        .map(ElementRef::new)
        .context("webdriver element response missing element id")
}

#[derive(Debug)]
enum CallError {
    NoSuchElement,
    Failed(String),
}

impl CallError {
    fn detail(&self) -> &str {
        match self {
            CallError::NoSuchElement => "no such element",
            CallError::Failed(detail) => detail,
        }
    }
}

fn send(request: ureq::Request, body: Option<&Value>) -> Result<Value, CallError> {
    let response = match body {
        Some(payload) => request.send_json(payload.clone()),
        None => request.call(),
    };
    match response {
        Ok(response) => response
            .into_json::<Value>()
            .map_err(|err| CallError::Failed(format!("response decode failed: {err}"))),
        Err(ureq::Error::Status(status, response)) => {
            let body = response.into_string().unwrap_or_default();
            Err(decode_error_body(status, &body))
        }
        Err(ureq::Error::Transport(err)) => {
            Err(CallError::Failed(format!("transport error: {err}")))
        }
    }
}

fn decode_error_body(status: u16, body: &str) -> CallError {
    let parsed: Value = match serde_json::from_str(body) {
        Ok(value) => value,
        Err(_) => return CallError::Failed(format!("HTTP status {status}")),
    };
    let error = parsed
        .pointer("/value/error")
        .and_then(Value::as_str)
        .unwrap_or_default();
    if error == "no such element" {
        return CallError::NoSuchElement;
    }
    let message = parsed
        .pointer("/value/message")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let truncated = message.chars().take(240).collect::<String>();
    if truncated.is_empty() {
        CallError::Failed(format!("HTTP status {status} ({error})"))
    } else {
        CallError::Failed(format!("HTTP status {status} ({error}: {truncated})"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::io::{Read, Write};
    use std::net::{TcpListener, TcpStream};
    use std::sync::mpsc;
    use std::sync::{Arc, Mutex};

    #[derive(Debug)]
    struct TestServer {
        base_url: String,
        shutdown_tx: mpsc::Sender<()>,
        join_handle: Option<std::thread::JoinHandle<()>>,
    }

    impl TestServer {
        fn spawn(responses: Vec<(u16, String)>) -> Self {
            let listener = TcpListener::bind(("127.0.0.1", 0)).expect("bind test server");
            listener.set_nonblocking(true).expect("set nonblocking");
            let addr = listener.local_addr().expect("local addr");

            let shared = Arc::new(Mutex::new(VecDeque::from(responses)));
            let shared_clone = Arc::clone(&shared);
            let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

            let join_handle = std::thread::spawn(move || {
                loop {
                    if shutdown_rx.try_recv().is_ok() {
                        break;
                    }

                    match listener.accept() {
                        Ok((mut stream, _)) => {
                            let (status, body) = {
                                let mut queue = shared_clone.lock().expect("lock responses");
                                queue
                                    .pop_front()
                                    .unwrap_or((200, r#"{"value":null}"#.to_string()))
                            };
                            std::thread::spawn(move || {
                                let _ = consume_request(&mut stream);
                                let _ = write_response(&mut stream, status, &body);
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
                shutdown_tx,
                join_handle: Some(join_handle),
            }
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

    fn consume_request(stream: &mut TcpStream) -> std::io::Result<()> {
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
        Ok(())
    }

    // Reads past the headers until any declared body has arrived, so closing
    // the socket does not race the client's request write.
    fn request_complete(data: &[u8]) -> bool {
        let Some(header_end) = data
            .windows(4)
            .position(|window| window == b"\r\n\r\n")
            .map(|idx| idx + 4)
        else {
            return false;
        };
        let headers = String::from_utf8_lossy(&data[..header_end]);
        let content_length = headers
            .lines()
            .find_map(|line| {
                let (name, value) = line.split_once(':')?;
                name.trim()
                    .eq_ignore_ascii_case("content-length")
                    .then(|| value.trim().parse::<usize>().ok())?
            })
            .unwrap_or(0);
        data.len() >= header_end + content_length
    }

    fn write_response(stream: &mut TcpStream, status: u16, body: &str) -> std::io::Result<()> {
        let payload = body.as_bytes();
        write!(
            stream,
            "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            payload.len()
        )?;
        stream.write_all(payload)?;
        stream.flush()
    }

    #[test]
    fn new_session_parses_session_id() {
        let server = TestServer::spawn(vec![(
            200,
            r#"{"value":{"sessionId":"sess-1","capabilities":{}}}"#.to_string(),
        )]);

        let driver = WebDriver::new_session(&server.base_url).expect("session should open");
        assert!(driver.session_url.ends_with("/session/sess-1"));
    }

    #[test]
    fn absent_element_maps_to_none() {
        let server = TestServer::spawn(vec![(
            404,
            r#"{"value":{"error":"no such element","message":"Unable to locate element"}}"#
                .to_string(),
        )]);
        let driver = WebDriver::attach_for_tests(&server.base_url, "sess-1");

        let found = driver.find_element("video").expect("lookup should not error");
        assert!(found.is_none());
    }

    #[test]
    fn found_element_carries_w3c_id() {
        let server = TestServer::spawn(vec![(
            200,
            format!(r#"{{"value":{{"{ELEMENT_KEY}":"el-42"}}}}"#),
        )]);
        let driver = WebDriver::attach_for_tests(&server.base_url, "sess-1");

        let found = driver
            .find_element("video")
            .expect("lookup should succeed")
            .expect("element should be present");
        assert_eq!(found.id(), "el-42");
    }

    #[test]
    fn element_property_returns_raw_value() {
        let server = TestServer::spawn(vec![(200, r#"{"value":123.5}"#.to_string())]);
        let driver = WebDriver::attach_for_tests(&server.base_url, "sess-1");
        let element = ElementRef::new("el-1");

        let value = driver
            .element_property(&element, "currentTime")
            .expect("property read should succeed");
        assert_eq!(value.as_f64(), Some(123.5));
    }

    #[test]
    fn status_errors_carry_driver_detail() {
        let server = TestServer::spawn(vec![(
            500,
            r#"{"value":{"error":"unknown error","message":"player crashed"}}"#.to_string(),
        )]);
        let driver = WebDriver::attach_for_tests(&server.base_url, "sess-1");
        let element = ElementRef::new("el-1");

        let err = driver.click(&element).expect_err("click should fail");
        let detail = format!("{err}");
        assert!(detail.contains("HTTP status 500"), "unexpected error: {detail}");
        assert!(detail.contains("player crashed"), "unexpected error: {detail}");
    }
}
