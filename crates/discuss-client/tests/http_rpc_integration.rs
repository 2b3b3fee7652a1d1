use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use discuss_client::{HttpMessagingRpc, HttpTransportConfig, MessagingRpc, RpcError};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::Mutex;

/// Serves one canned response and keeps the raw request for inspection.
async fn start_test_server(
    body: String,
    status_line: &'static str,
    delay: Option<Duration>,
) -> (SocketAddr, Arc<Mutex<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let seen = Arc::new(Mutex::new(String::new()));
    let captured = seen.clone();
    tokio::spawn(async move {
        if let Ok((mut stream, _)) = listener.accept().await {
            let request = read_request(&mut stream).await;
            *captured.lock().await = request;
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                status_line,
                body.len()
            );
            let _ = stream.write_all(response.as_bytes()).await;
            let _ = stream.write_all(body.as_bytes()).await;
        }
    });
    (addr, seen)
}

/// Read headers plus a Content-Length body.
async fn read_request(stream: &mut tokio::net::TcpStream) -> String {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let Ok(n) = stream.read(&mut chunk).await else {
            break;
        };
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
        let text = String::from_utf8_lossy(&buf);
        if let Some(split) = text.find("\r\n\r\n") {
            let length = text[..split]
                .lines()
                .find_map(|line| {
                    let (name, value) = line.split_once(':')?;
                    name.eq_ignore_ascii_case("content-length")
                        .then(|| value.trim().parse::<usize>().ok())
                        .flatten()
                })
                .unwrap_or(0);
            if buf.len() >= split + 4 + length {
                break;
            }
        }
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn request_json(raw: &str) -> Value {
    let body = raw.split_once("\r\n\r\n").map(|(_, body)| body).unwrap_or("");
    serde_json::from_str(body).unwrap()
}

async fn loopback_available() -> bool {
    TcpListener::bind("127.0.0.1:0").await.is_ok()
}

fn rpc(addr: SocketAddr, config: HttpTransportConfig) -> HttpMessagingRpc {
    HttpMessagingRpc::new(format!("http://{addr}"), config).unwrap()
}

#[tokio::test]
async fn init_messaging_posts_jsonrpc_envelope() {
    if !loopback_available().await {
        eprintln!("skipping init_messaging_posts_jsonrpc_envelope: loopback bind not permitted");
        return;
    }
    let reply = json!({"jsonrpc": "2.0", "id": 1, "result": {"menu_id": 4, "Thread": []}});
    let (addr, seen) = start_test_server(reply.to_string(), "200 OK", None).await;

    let snapshot = rpc(addr, HttpTransportConfig::default())
        .init_messaging()
        .await
        .unwrap();
    assert_eq!(snapshot, json!({"menu_id": 4, "Thread": []}));

    let raw = seen.lock().await.clone();
    assert!(raw.starts_with("POST /mail/init_messaging "));
    let request = request_json(&raw);
    assert_eq!(request["jsonrpc"], json!("2.0"));
    assert_eq!(request["method"], json!("call"));
    assert_eq!(request["params"], json!({}));
}

#[tokio::test]
async fn search_partners_sends_term_and_limit() {
    if !loopback_available().await {
        eprintln!("skipping search_partners_sends_term_and_limit: loopback bind not permitted");
        return;
    }
    let reply = json!({"jsonrpc": "2.0", "id": 1, "result": [{"id": 9, "name": "Foo"}]});
    let (addr, seen) = start_test_server(reply.to_string(), "200 OK", None).await;

    let partners = rpc(addr, HttpTransportConfig::default())
        .search_partners("Foo", 10)
        .await
        .unwrap();
    assert_eq!(partners, vec![json!({"id": 9, "name": "Foo"})]);

    let raw = seen.lock().await.clone();
    assert!(raw.starts_with("POST /web/dataset/call_kw/res.partner/im_search "));
    let request = request_json(&raw);
    assert_eq!(request["params"]["model"], json!("res.partner"));
    assert_eq!(request["params"]["method"], json!("im_search"));
    assert_eq!(request["params"]["args"], json!(["Foo", 10]));
}

#[tokio::test]
async fn server_error_member_maps_to_server_error() {
    if !loopback_available().await {
        eprintln!("skipping server_error_member_maps_to_server_error: loopback bind not permitted");
        return;
    }
    let reply = json!({
        "jsonrpc": "2.0",
        "id": 1,
        "error": {"code": 200, "message": "Odoo Server Error", "data": {"message": "boom"}},
    });
    let (addr, _) = start_test_server(reply.to_string(), "200 OK", None).await;
    let err = rpc(addr, HttpTransportConfig::default())
        .init_messaging()
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Server { code: 200, ref message, .. } if message == "boom"));
}

#[tokio::test]
async fn http_status_error_is_reported() {
    if !loopback_available().await {
        eprintln!("skipping http_status_error_is_reported: loopback bind not permitted");
        return;
    }
    let (addr, _) = start_test_server("gone".into(), "404 Not Found", None).await;
    let err = rpc(addr, HttpTransportConfig::default())
        .init_messaging()
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Status { status: 404, .. }));
}

#[tokio::test]
async fn body_too_large_errors() {
    if !loopback_available().await {
        eprintln!("skipping body_too_large_errors: loopback bind not permitted");
        return;
    }
    let reply = json!({"jsonrpc": "2.0", "id": 1, "result": []});
    let (addr, _) = start_test_server(reply.to_string(), "200 OK", None).await;
    let config = HttpTransportConfig {
        max_body_size: 4,
        ..HttpTransportConfig::default()
    };
    let err = rpc(addr, config).search_partners("x", 1).await.unwrap_err();
    assert!(matches!(err, RpcError::BodyTooLarge { limit: 4, .. }));
}

#[tokio::test]
async fn slow_server_times_out() {
    if !loopback_available().await {
        eprintln!("skipping slow_server_times_out: loopback bind not permitted");
        return;
    }
    let reply = json!({"jsonrpc": "2.0", "id": 1, "result": {}});
    let (addr, _) =
        start_test_server(reply.to_string(), "200 OK", Some(Duration::from_millis(200))).await;
    let config = HttpTransportConfig {
        timeout: Duration::from_millis(20),
        ..HttpTransportConfig::default()
    };
    let err = rpc(addr, config).init_messaging().await.unwrap_err();
    assert!(matches!(err, RpcError::Timeout(_)));
}

#[tokio::test]
async fn non_list_search_result_is_malformed() {
    if !loopback_available().await {
        eprintln!("skipping non_list_search_result_is_malformed: loopback bind not permitted");
        return;
    }
    let reply = json!({"jsonrpc": "2.0", "id": 1, "result": {"id": 1}});
    let (addr, _) = start_test_server(reply.to_string(), "200 OK", None).await;
    let err = rpc(addr, HttpTransportConfig::default())
        .search_partners("x", 1)
        .await
        .unwrap_err();
    assert!(matches!(err, RpcError::Decode(_)));
}
