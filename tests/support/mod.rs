//! An in-process stand-in for clamd.
//!
//! It decodes the real wire framing, records every exchange, and answers
//! the way clamd does: `OK`, the EICAR signature, a missing-file `ERROR`,
//! or `INSTREAM size limit exceeded.` when its own limit is crossed.

#![allow(dead_code)]

use clamstream::{ClamdClient, ClamdConfig};

use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// The EICAR antivirus test string.
pub const EICAR: &[u8] =
    b"X5O!P%@AP[4\\PZX54(P^)7CC)7}$EICAR-STANDARD-ANTIVIRUS-TEST-FILE!$H+H*";

pub const SIZE_LIMIT_REPLY: &[u8] = b"INSTREAM size limit exceeded. ERROR\0";

/// One connection as seen by the daemon.
#[derive(Debug, Clone, Default)]
pub struct Exchange {
    pub command: String,
    pub frames: Vec<usize>,
    pub data: Vec<u8>,
    pub terminated: bool,
}

/// How the fake daemon misbehaves, if at all.
#[derive(Debug, Clone)]
pub struct Behavior {
    /// Daemon-side `StreamMaxLength`.
    pub stream_max_length: Option<usize>,
    /// Sent right after the first frame, before the stream is terminated.
    pub early_reply: Option<Vec<u8>>,
    /// Replaces the normal INSTREAM reply.
    pub final_reply: Option<Vec<u8>>,
    /// Answer to `zPING`.
    pub pong: Vec<u8>,
    /// Never answer INSTREAM.
    pub silent: bool,
    /// Close after the first frame without replying.
    pub close_early: bool,
    /// Drop the socket right after an early reply, leaving the client's
    /// unread frames behind so the kernel resets the connection.
    pub reset_after_reply: bool,
}

impl Default for Behavior {
    fn default() -> Self {
        Self {
            stream_max_length: None,
            early_reply: None,
            final_reply: None,
            pong: b"PONG\0".to_vec(),
            silent: false,
            close_early: false,
            reset_after_reply: false,
        }
    }
}

pub struct FakeClamd {
    port: u16,
    exchanges: Arc<Mutex<Vec<Exchange>>>,
    task: JoinHandle<()>,
}

impl FakeClamd {
    pub async fn start() -> Self {
        Self::with_behavior(Behavior::default()).await
    }

    pub async fn with_behavior(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let exchanges = Arc::new(Mutex::new(Vec::new()));
        let behavior = Arc::new(behavior);

        let recorded = Arc::clone(&exchanges);
        let task = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                let behavior = Arc::clone(&behavior);
                let recorded = Arc::clone(&recorded);
                tokio::spawn(async move {
                    let _ = handle(socket, &behavior, &recorded).await;
                });
            }
        });

        Self {
            port,
            exchanges,
            task,
        }
    }

    pub fn config(&self) -> ClamdConfig {
        ClamdConfig::new("127.0.0.1", self.port).with_read_timeout(Duration::from_secs(5))
    }

    pub fn client(&self) -> ClamdClient {
        ClamdClient::new(self.config()).unwrap()
    }

    pub fn exchanges(&self) -> Vec<Exchange> {
        self.exchanges.lock().unwrap().clone()
    }

    pub fn last_exchange(&self) -> Exchange {
        self.exchanges().pop().expect("no exchange recorded")
    }
}

impl Drop for FakeClamd {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// A port nothing listens on.
pub async fn unused_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

/// A reader that yields `blocks` chunks of 2048 bytes with a pause between
/// them, so the daemon gets a chance to answer mid-stream.
pub fn slow_source(blocks: usize) -> tokio::io::DuplexStream {
    let (mut writer, reader) = tokio::io::duplex(64 * 1024);
    tokio::spawn(async move {
        let block = [b'x'; 2048];
        for _ in 0..blocks {
            if writer.write_all(&block).await.is_err() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    });
    reader
}

async fn handle(
    socket: TcpStream,
    behavior: &Behavior,
    recorded: &Mutex<Vec<Exchange>>,
) -> std::io::Result<()> {
    let (rd, mut wr) = socket.into_split();
    let mut rd = BufReader::new(rd);

    let first = rd.read_u8().await?;
    let mut command = Vec::new();
    if first == b'z' {
        rd.read_until(0, &mut command).await?;
        if command.last() == Some(&0) {
            command.pop();
        }
    } else {
        command.push(first);
        rd.read_until(b'\n', &mut command).await?;
        if command.last() == Some(&b'\n') {
            command.pop();
        }
    }
    let command = String::from_utf8_lossy(&command).into_owned();

    let record = |exchange: Exchange| recorded.lock().unwrap().push(exchange);
    let bare = |command: &str| Exchange {
        command: command.to_string(),
        ..Exchange::default()
    };

    match command.as_str() {
        "PING" => {
            record(bare(&command));
            wr.write_all(&behavior.pong).await?;
        }
        "VERSION" => {
            record(bare(&command));
            wr.write_all(b"ClamAV 1.3.1/27400/Mon Oct 19 08:12:00 2026\0").await?;
        }
        "INSTREAM" => instream(rd, wr, behavior, record).await?,
        other if other.starts_with("SCAN ") => {
            record(bare(other));
            let path = Path::new(&other["SCAN ".len()..]);
            let reply = match std::fs::read(path) {
                Ok(data) if contains(&data, EICAR) => {
                    format!("{}: Eicar-Test-Signature FOUND\n", path.display())
                }
                Ok(_) => format!("{}: OK\n", path.display()),
                Err(_) => format!(
                    "{}: File path check failure: No such file or directory. ERROR\n",
                    path.display()
                ),
            };
            wr.write_all(reply.as_bytes()).await?;
        }
        other => {
            record(bare(other));
            wr.write_all(b"UNKNOWN COMMAND\n").await?;
        }
    }
    Ok(())
}

async fn instream(
    mut rd: BufReader<OwnedReadHalf>,
    mut wr: OwnedWriteHalf,
    behavior: &Behavior,
    record: impl Fn(Exchange),
) -> std::io::Result<()> {
    let mut exchange = Exchange {
        command: "INSTREAM".to_string(),
        ..Exchange::default()
    };

    loop {
        let len = rd.read_u32().await? as usize;
        if len == 0 {
            exchange.terminated = true;
            break;
        }
        let mut chunk = vec![0u8; len];
        rd.read_exact(&mut chunk).await?;
        exchange.frames.push(len);
        exchange.data.extend_from_slice(&chunk);

        let over_limit = behavior
            .stream_max_length
            .is_some_and(|max| exchange.data.len() > max);
        let early = if over_limit {
            Some(SIZE_LIMIT_REPLY.to_vec())
        } else if exchange.frames.len() == 1 && behavior.close_early {
            Some(Vec::new())
        } else if exchange.frames.len() == 1 {
            behavior.early_reply.clone()
        } else {
            None
        };

        if let Some(reply) = early {
            record(exchange);
            wr.write_all(&reply).await?;
            if behavior.reset_after_reply {
                return Ok(());
            }
            wr.shutdown().await?;
            // keep reading so the client's in-flight chunks do not reset the connection
            let _ = tokio::io::copy(&mut rd, &mut tokio::io::sink()).await;
            return Ok(());
        }
    }

    let reply = match &behavior.final_reply {
        Some(reply) => reply.clone(),
        None if contains(&exchange.data, EICAR) => b"stream: Eicar-Test-Signature FOUND\0".to_vec(),
        None => b"stream: OK\0".to_vec(),
    };
    record(exchange);

    if behavior.silent {
        tokio::time::sleep(Duration::from_secs(3600)).await;
    }
    wr.write_all(&reply).await
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|window| window == needle)
}
