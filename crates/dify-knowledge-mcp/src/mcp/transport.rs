//! stdio transport for JSON-RPC 2.0 over NDJSON
//!
//! Standard input is read on a plain std::thread and forwarded line by line
//! through a bounded channel, so the server loop can notice input closure
//! while a tool call is still running.

use std::io::{self, BufRead};

use serde::Serialize;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::McpResult;

/// Lines buffered between the reader thread and the server loop
const LINE_CHANNEL_CAPACITY: usize = 64;

/// Spawn the input reader thread
///
/// Blank lines are skipped. The channel closes on EOF, on a read error, or
/// once the receiver is dropped.
pub fn spawn_reader<R>(input: R) -> io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(LINE_CHANNEL_CAPACITY);

    std::thread::Builder::new()
        .name("mcp-stdin".into())
        .spawn(move || {
            for line in input.lines() {
                let line = match line {
                    Ok(l) => l,
                    Err(e) => {
                        warn!(error = %e, "Failed to read from stdin");
                        break;
                    }
                };

                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }

                if tx.blocking_send(trimmed.to_string()).is_err() {
                    break; // server loop is gone
                }
            }
            debug!("Input reader finished");
        })?;

    Ok(rx)
}

/// Write one message as a single JSON line and flush
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> McpResult<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    #[tokio::test]
    async fn test_reader_skips_blank_lines_and_closes_on_eof() {
        let input = Cursor::new(b"{\"a\":1}\n\n   \n{\"b\":2}\r\n".to_vec());
        let mut rx = spawn_reader(input).unwrap();

        assert_eq!(rx.recv().await.as_deref(), Some("{\"a\":1}"));
        assert_eq!(rx.recv().await.as_deref(), Some("{\"b\":2}"));
        assert_eq!(rx.recv().await, None);
    }

    #[tokio::test]
    async fn test_write_message_is_one_line() {
        let mut out = Vec::new();
        write_message(&mut out, &json!({ "x": "line\nbreak" })).await.unwrap();

        let text = String::from_utf8(out).unwrap();
        assert_eq!(text, "{\"x\":\"line\\nbreak\"}\n");
    }
}
