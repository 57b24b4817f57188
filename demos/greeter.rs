//! Greeter: answers every text message with a greeting and every binary
//! message with `ABCD`.
//!
//! Run with: `cargo run --example greeter -- 8080`
//! Logs: `RUST_LOG=mini_ws=debug`

use mini_ws::{Event, Server};
use std::time::Duration;

const GREETING: &str = "Hello, WebSocket!";
const BINARY_REPLY: &[u8] = b"ABCD";

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let port = match std::env::args().nth(1) {
        Some(arg) => arg.parse()?,
        None => 8080,
    };

    let mut server = Server::create(port)?;
    println!("Listening on {}", server.local_addr()?);

    loop {
        let Some(mut conn) = server.accept(Duration::from_secs(1)) else {
            continue;
        };
        let id = conn.id();
        println!("[{id}] connected from {:?}", conn.peer_addr());

        loop {
            let event = conn.poll_event(Duration::from_millis(100));
            if event.is_closed() {
                println!("[{id}] closed");
                break;
            }
            let reply = match event {
                Event::Text(_) => {
                    let text = event.as_text().unwrap_or("<invalid UTF-8>");
                    println!("[{id}] text: {text}");
                    conn.send_text(GREETING)
                }
                Event::Binary(_) => {
                    let len = event.payload().map_or(0, <[u8]>::len);
                    println!("[{id}] binary: {len} bytes");
                    conn.send_binary(BINARY_REPLY)
                }
                Event::None | Event::Closed => continue,
            };
            if let Err(e) = reply {
                println!("[{id}] send failed: {e}");
                break;
            }
        }
    }
}
