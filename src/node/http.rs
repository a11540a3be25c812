use crate::node::service::{RegistrySnapshot, ServiceCommand};
use crate::op::{Operation, SignedOperation};
use crate::types::Address;
use hex::decode as hex_decode;
use serde::Deserialize;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{mpsc, Arc, RwLock};
use std::thread;
use std::time::Duration;
use tracing::warn;

#[derive(Deserialize)]
struct OpRequest {
    op: Operation,
    pubkey_hex: String,
    signature_hex: String,
}

pub fn start_http_server(
    listen_addr: String,
    snapshot: Arc<RwLock<RegistrySnapshot>>,
    tx_cmd: mpsc::Sender<ServiceCommand>,
) {
    thread::spawn(move || {
        let listener = TcpListener::bind(listen_addr).expect("bind http");
        for stream in listener.incoming() {
            if let Ok(stream) = stream {
                let snap = Arc::clone(&snapshot);
                let tx_cmd = tx_cmd.clone();
                thread::spawn(move || handle_client(stream, snap, tx_cmd));
            }
        }
    });
}

fn handle_client(
    mut stream: TcpStream,
    snapshot: Arc<RwLock<RegistrySnapshot>>,
    tx_cmd: mpsc::Sender<ServiceCommand>,
) {
    let req = match read_request(&mut stream) {
        Ok(r) => r,
        Err(_) => return,
    };

    match (req.method.as_str(), req.path.as_str()) {
        ("POST", "/op") => {
            let body = match serde_json::from_slice::<OpRequest>(&req.body) {
                Ok(b) => b,
                Err(_) => return write_json(&mut stream, 400, r#"{"error":"bad json"}"#),
            };
            let Some(pubkey) = parse_hex32(&body.pubkey_hex) else {
                return write_json(&mut stream, 400, r#"{"error":"bad pubkey"}"#);
            };
            let signed = SignedOperation {
                op: body.op,
                pubkey,
                signature: body.signature_hex,
            };

            let (reply_tx, reply_rx) = mpsc::channel();
            if tx_cmd
                .send(ServiceCommand::Apply {
                    signed,
                    reply: reply_tx,
                })
                .is_err()
            {
                return write_json(&mut stream, 500, r#"{"error":"service unavailable"}"#);
            }
            match reply_rx.recv_timeout(Duration::from_secs(5)) {
                Ok(Ok(receipt)) => {
                    let version = snapshot.read().map(|s| s.version).unwrap_or(0);
                    let resp = format!(
                        r#"{{"payout":{},"version":{}}}"#,
                        receipt.payout, version
                    );
                    write_json(&mut stream, 200, &resp);
                }
                Ok(Err(err)) => {
                    let resp = format!(r#"{{"error":"{}"}}"#, err);
                    write_json(&mut stream, 400, &resp);
                }
                Err(_) => {
                    warn!("service did not answer an operation in time");
                    write_json(&mut stream, 500, r#"{"error":"service timeout"}"#);
                }
            }
        }
        ("GET", "/version") => {
            let snap = snapshot.read().unwrap();
            let resp = format!(
                r#"{{"registry_id":"{}","version":{}}}"#,
                snap.registry_id, snap.version
            );
            write_json(&mut stream, 200, &resp);
        }
        ("GET", path) if path.starts_with("/stake/") => {
            match parse_addr_path(path, "/stake/") {
                Some(address) => {
                    let snap = snapshot.read().unwrap();
                    let resp = format!(
                        r#"{{"address":"{}","stake_balance":{}}}"#,
                        hex::encode(address),
                        snap.stake_balance(&address)
                    );
                    write_json(&mut stream, 200, &resp);
                }
                None => write_json(&mut stream, 400, r#"{"error":"bad address"}"#),
            }
        }
        ("GET", path) if path.starts_with("/registered/") => {
            match parse_addr_path(path, "/registered/") {
                Some(address) => {
                    let snap = snapshot.read().unwrap();
                    let resp = format!(
                        r#"{{"address":"{}","registered":{}}}"#,
                        hex::encode(address),
                        snap.is_registered(&address)
                    );
                    write_json(&mut stream, 200, &resp);
                }
                None => write_json(&mut stream, 400, r#"{"error":"bad address"}"#),
            }
        }
        ("GET", path) if path.starts_with("/account/") => {
            match parse_addr_path(path, "/account/") {
                Some(address) => {
                    let snap = snapshot.read().unwrap();
                    let resp = format!(
                        r#"{{"address":"{}","balance":{}}}"#,
                        hex::encode(address),
                        snap.account_balance(&address)
                    );
                    write_json(&mut stream, 200, &resp);
                }
                None => write_json(&mut stream, 400, r#"{"error":"bad address"}"#),
            }
        }
        _ => {
            write_json(&mut stream, 404, r#"{"error":"not found"}"#);
        }
    }
}

fn parse_addr_path(path: &str, prefix: &str) -> Option<Address> {
    parse_hex32(path.trim_start_matches(prefix))
}

fn parse_hex32(hex_str: &str) -> Option<[u8; 32]> {
    let bytes = hex_decode(hex_str).ok()?;
    if bytes.len() != 32 {
        return None;
    }
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Some(out)
}

struct Request {
    method: String,
    path: String,
    body: Vec<u8>,
}

fn read_request(stream: &mut TcpStream) -> Result<Request, String> {
    let mut buf = [0u8; 4096];
    let mut data = Vec::new();
    loop {
        let n = stream.read(&mut buf).map_err(|e| format!("{}", e))?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
        if data.windows(4).any(|w| w == b"\r\n\r\n") {
            break;
        }
    }
    let header_end = data
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .ok_or("bad request")?
        + 4;
    let header_bytes = &data[..header_end];
    let mut body = data[header_end..].to_vec();

    let req_str = String::from_utf8_lossy(header_bytes);
    let mut lines = req_str.split("\r\n");
    let line = lines.next().ok_or("bad request")?;
    let mut parts = line.split_whitespace();
    let method = parts.next().ok_or("bad method")?.to_string();
    let path = parts.next().ok_or("bad path")?.to_string();

    let mut content_len = 0usize;
    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some(rest) = line.strip_prefix("Content-Length:") {
            content_len = rest.trim().parse::<usize>().unwrap_or(0);
        }
    }

    if content_len > body.len() {
        let mut remaining = content_len.saturating_sub(body.len());
        while remaining > 0 {
            let mut buf = vec![0u8; remaining.min(4096)];
            let n = stream.read(&mut buf).map_err(|e| format!("{}", e))?;
            if n == 0 {
                break;
            }
            body.extend_from_slice(&buf[..n]);
            remaining = remaining.saturating_sub(n);
        }
    }

    Ok(Request { method, path, body })
}

fn write_json(stream: &mut TcpStream, status: u16, body: &str) {
    let status_line = match status {
        200 => "HTTP/1.1 200 OK",
        400 => "HTTP/1.1 400 Bad Request",
        404 => "HTTP/1.1 404 Not Found",
        _ => "HTTP/1.1 500 Internal Server Error",
    };
    let resp = format!(
        "{}\r\nContent-Type: application/json\r\nContent-Length: {}\r\n\r\n{}",
        status_line,
        body.len(),
        body
    );
    let _ = stream.write_all(resp.as_bytes());
}
