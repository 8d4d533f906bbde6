//! Network module
//!
//! Blocking HTTP requests (`net.get`, `net.post`) and a minimal WebSocket
//! client (`net.websocket`).

use moonglue_core::Result;
use mlua::{Lua, Table, UserData, UserDataMethods, Value};
use std::net::TcpStream;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::debug;
use tungstenite::protocol::WebSocket;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::Message;

/// Content type `net.post` sends when the script does not set one.
pub const DEFAULT_POST_CONTENT_TYPE: &str = "application/x-www-form-urlencoded";

/// Register the net module
pub fn register(lua: &Lua) -> Result<Table> {
    let net_table = lua.create_table()?;

    // net.get(url, options?) -> response
    net_table.set("get", lua.create_function(net_get)?)?;

    // net.post(url, body, options?) -> response
    net_table.set("post", lua.create_function(net_post)?)?;

    // net.websocket(url, options?) -> connection
    net_table.set("websocket", lua.create_function(net_websocket)?)?;

    Ok(net_table)
}

// ---------------------------------------------------------------------------
// HTTP
// ---------------------------------------------------------------------------

/// Options shared by `get` and `post`
#[derive(Debug, Default)]
struct RequestOptions {
    headers: Vec<(String, String)>,
    timeout: Option<Duration>,
}

impl RequestOptions {
    fn from_table(table: Option<Table>) -> mlua::Result<Self> {
        let Some(table) = table else {
            return Ok(Self::default());
        };

        let mut headers = Vec::new();
        if let Some(headers_table) = table.get::<Option<Table>>("headers")? {
            for pair in headers_table.pairs::<String, String>() {
                headers.push(pair?);
            }
        }

        // Timeout in milliseconds
        let timeout = table.get::<Option<u64>>("timeout")?.map(Duration::from_millis);

        Ok(Self { headers, timeout })
    }

    fn has_header(&self, name: &str) -> bool {
        self.headers.iter().any(|(key, _)| key.eq_ignore_ascii_case(name))
    }
}

/// A response read to completion on the blocking pool.
#[derive(Debug)]
struct HttpResponse {
    status: u16,
    headers: Vec<(String, String)>,
    body: Vec<u8>,
}

enum Method {
    Get,
    Post(Vec<u8>),
}

fn send(url: String, method: Method, options: RequestOptions) -> mlua::Result<HttpResponse> {
    debug!("HTTP request to {}", url);

    let outcome = moonglue_core::run_blocking(move || -> std::result::Result<HttpResponse, String> {
        let mut builder = reqwest::blocking::Client::builder();
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {}", e))?;

        let mut request = match method {
            Method::Get => client.get(&url),
            Method::Post(body) => {
                let mut request = client.post(&url).body(body);
                if !options.has_header("content-type") {
                    request = request.header("Content-Type", DEFAULT_POST_CONTENT_TYPE);
                }
                request
            }
        };
        for (key, value) in &options.headers {
            request = request.header(key, value);
        }

        let response = request
            .send()
            .map_err(|e| format!("HTTP request failed: {}", e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(key, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (key.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .map_err(|e| format!("Failed to read response body: {}", e))?
            .to_vec();

        Ok(HttpResponse { status, headers, body })
    });

    outcome
        .map_err(|e| mlua::Error::runtime(format!("Task join error: {}", e)))?
        .map_err(mlua::Error::runtime)
}

fn build_response(lua: &Lua, response: HttpResponse) -> mlua::Result<Table> {
    let result = lua.create_table()?;
    result.set("status", response.status)?;
    result.set("ok", (200..300).contains(&response.status))?;
    result.set("body", lua.create_string(&response.body)?)?;

    let headers_table = lua.create_table()?;
    for (key, value) in response.headers {
        headers_table.set(key, value)?;
    }
    result.set("headers", headers_table)?;

    Ok(result)
}

fn net_get(lua: &Lua, (url, options): (String, Option<Table>)) -> mlua::Result<Table> {
    let options = RequestOptions::from_table(options)?;
    let response = send(url, Method::Get, options)?;
    build_response(lua, response)
}

fn net_post(
    lua: &Lua,
    (url, body, options): (String, Option<mlua::String>, Option<Table>),
) -> mlua::Result<Table> {
    let options = RequestOptions::from_table(options)?;
    let body = body.map(|b| b.as_bytes().to_vec()).unwrap_or_default();
    let response = send(url, Method::Post(body), options)?;
    build_response(lua, response)
}

// ---------------------------------------------------------------------------
// WebSocket
// ---------------------------------------------------------------------------

type ClientSocket = WebSocket<MaybeTlsStream<TcpStream>>;

struct WsConnection {
    ws: Arc<Mutex<ClientSocket>>,
}

impl WsConnection {
    fn lock(&self) -> mlua::Result<std::sync::MutexGuard<'_, ClientSocket>> {
        self.ws
            .lock()
            .map_err(|e| mlua::Error::runtime(format!("Lock error: {}", e)))
    }
}

fn set_timeouts(ws: &ClientSocket, timeout: Option<Duration>) -> std::io::Result<()> {
    let stream = match ws.get_ref() {
        MaybeTlsStream::Plain(s) => s,
        MaybeTlsStream::NativeTls(s) => s.get_ref(),
        _ => return Ok(()),
    };
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)
}

impl UserData for WsConnection {
    fn add_methods<M: UserDataMethods<Self>>(methods: &mut M) {
        // ws:send(text)
        methods.add_method("send", |_, this, text: String| {
            let mut ws = this.lock()?;
            ws.send(Message::Text(text.into()))
                .map_err(|e| mlua::Error::runtime(format!("WebSocket send error: {}", e)))
        });

        // ws:receive() -> string | nil
        methods.add_method("receive", |lua, this, _: ()| {
            let mut ws = this.lock()?;
            loop {
                if !ws.can_read() {
                    return Ok(Value::Nil);
                }
                let message = match ws.read() {
                    Ok(message) => message,
                    Err(tungstenite::Error::ConnectionClosed)
                    | Err(tungstenite::Error::AlreadyClosed) => return Ok(Value::Nil),
                    Err(tungstenite::Error::Io(ref e))
                        if e.kind() == std::io::ErrorKind::WouldBlock
                            || e.kind() == std::io::ErrorKind::TimedOut =>
                    {
                        return Err(mlua::Error::runtime("WebSocket receive timeout"));
                    }
                    Err(e) => {
                        return Err(mlua::Error::runtime(format!("WebSocket receive error: {}", e)))
                    }
                };

                match message {
                    Message::Text(text) => return Ok(Value::String(lua.create_string(text.as_str())?)),
                    Message::Binary(bytes) => return Ok(Value::String(lua.create_string(&bytes[..])?)),
                    Message::Close(_) => return Ok(Value::Nil),
                    // Control frames are answered by tungstenite itself.
                    Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => continue,
                }
            }
        });

        // ws:close()
        methods.add_method("close", |_, this, _: ()| {
            let mut ws = this.lock()?;
            match ws.close(None) {
                Ok(()) | Err(tungstenite::Error::AlreadyClosed) => {}
                Err(e) => {
                    return Err(mlua::Error::runtime(format!("WebSocket close error: {}", e)))
                }
            }
            // Drive the closing handshake until the peer acknowledges.
            loop {
                match ws.read() {
                    Ok(_) => continue,
                    Err(_) => break,
                }
            }
            Ok(())
        });

        // ws:is_connected() -> boolean
        methods.add_method("is_connected", |_, this, _: ()| {
            let ws = this.lock()?;
            Ok(ws.can_write())
        });
    }
}

fn net_websocket(_: &Lua, (url, options): (String, Option<Table>)) -> mlua::Result<WsConnection> {
    debug!("WebSocket connect to {}", url);

    let (ws, _response) = tungstenite::connect(url.as_str())
        .map_err(|e| mlua::Error::runtime(format!("WebSocket connect error: {}", e)))?;

    if let Some(opts) = options {
        if let Some(ms) = opts.get::<Option<u64>>("timeout")? {
            set_timeouts(&ws, Some(Duration::from_millis(ms)))
                .map_err(|e| mlua::Error::runtime(format!("Set timeout error: {}", e)))?;
        }
    }

    Ok(WsConnection {
        ws: Arc::new(Mutex::new(ws)),
    })
}
