#![allow(dead_code)]

use semlayer::{QueryEngineClient, SessionContext};
use std::fs;
use std::path::Path;

pub const TOKEN: &str = "t0ken-abc";
pub const APP_ID: &str = "demo";
pub const BEARER: &str = "Bearer t0ken-abc";

pub fn session(server_url: &str, root: &Path, temp: &Path) -> SessionContext {
    SessionContext::new(server_url, TOKEN, APP_ID, root)
        .unwrap()
        .with_temp_dir(temp)
}

pub fn client(server_url: &str) -> QueryEngineClient {
    let scratch = std::env::temp_dir();
    QueryEngineClient::new(&session(server_url, &scratch, &scratch)).unwrap()
}

pub fn write_file(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(path, contents).unwrap();
}

pub fn dir_is_empty(dir: &Path) -> bool {
    fs::read_dir(dir).unwrap().next().is_none()
}

fn find(haystack: &[u8], needle: &[u8], from: usize) -> Option<usize> {
    haystack[from..]
        .windows(needle.len())
        .position(|w| w == needle)
        .map(|pos| pos + from)
}

/// Extract the payload of the single part named `field` from a multipart body.
pub fn multipart_part(content_type: &str, body: &[u8], field: &str) -> Vec<u8> {
    let boundary = content_type
        .split("boundary=")
        .nth(1)
        .expect("multipart boundary")
        .trim_matches('"');
    let delimiter = format!("--{boundary}");
    let disposition = format!("name=\"{field}\"");

    let part_start = find(body, disposition.as_bytes(), 0).expect("named part");
    let payload_start = find(body, b"\r\n\r\n", part_start).expect("part headers") + 4;
    let closing = format!("\r\n{delimiter}");
    let payload_end = find(body, closing.as_bytes(), payload_start).expect("part end");
    body[payload_start..payload_end].to_vec()
}
