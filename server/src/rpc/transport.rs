//! Transport Layer
//!
//! Line-delimited JSON-RPC 2.0 over any async byte stream; stdio in production.

use super::protocol::{JsonRpcRequest, JsonRpcResponse};
use std::io;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

/// One non-blank line from the client
#[derive(Debug)]
pub enum Incoming {
    Request(JsonRpcRequest),
    /// Line that is not a JSON-RPC request, with the parse error
    Malformed(String),
}

/// Reads requests one line at a time
pub struct RequestReader<R> {
    reader: R,
}

impl<R: AsyncBufRead + Unpin> RequestReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next message, `None` at end of input
    pub async fn next_message(&mut self) -> io::Result<Option<Incoming>> {
        loop {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            return Ok(Some(match serde_json::from_str(line) {
                Ok(request) => Incoming::Request(request),
                Err(e) => {
                    tracing::warn!("Failed to parse JSON-RPC request: {}", e);
                    Incoming::Malformed(e.to_string())
                }
            }));
        }
    }
}

/// Writes one response per line
pub struct ResponseWriter<W> {
    writer: W,
}

impl<W: AsyncWrite + Unpin> ResponseWriter<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> io::Result<()> {
        let json = serde_json::to_string(response)?;
        self.writer.write_all(json.as_bytes()).await?;
        self.writer.write_all(b"\n").await?;
        self.writer.flush().await
    }
}

/// Reader and writer bound to the process's stdin and stdout
pub fn stdio() -> (
    RequestReader<BufReader<tokio::io::Stdin>>,
    ResponseWriter<tokio::io::Stdout>,
) {
    (
        RequestReader::new(BufReader::new(tokio::io::stdin())),
        ResponseWriter::new(tokio::io::stdout()),
    )
}
