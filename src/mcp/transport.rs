//! Newline-delimited JSON transport.
//!
//! Each message is one compact JSON-RPC object on a single line:
//!
//! ```text
//! {"jsonrpc":"2.0","id":1,"method":"initialize","params":{...}}\n
//! {"jsonrpc":"2.0","id":1,"result":{...}}\n
//! ```

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader, Stdin, Stdout};

use crate::MagiResult;

use super::protocol::{JsonRpcRequest, JsonRpcResponse};

/// Line-oriented JSON-RPC transport over any async byte stream.
pub struct LineTransport<R, W> {
    reader: R,
    writer: W,
}

/// Transport bound to the process stdin/stdout.
pub type StdioTransport = LineTransport<BufReader<Stdin>, Stdout>;

impl StdioTransport {
    pub fn stdio() -> Self {
        LineTransport::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> LineTransport<R, W>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Reads the next request.
    ///
    /// Blank lines are skipped. Returns `Ok(None)` at end of input and a
    /// `Json` error when a line is not a valid request.
    pub async fn read_message(&mut self) -> MagiResult<Option<JsonRpcRequest>> {
        let mut line = String::new();

        loop {
            line.clear();
            if self.reader.read_line(&mut line).await? == 0 {
                return Ok(None);
            }
            if !line.trim().is_empty() {
                break;
            }
        }

        let request: JsonRpcRequest = serde_json::from_str(line.trim())?;
        tracing::debug!(method = %request.method, id = ?request.id, "Received request");
        Ok(Some(request))
    }

    /// Writes one response line and flushes.
    pub async fn write_response(&mut self, response: &JsonRpcResponse) -> MagiResult<()> {
        let mut body = serde_json::to_vec(response)?;
        body.push(b'\n');

        self.writer.write_all(&body).await?;
        self.writer.flush().await?;

        tracing::debug!(id = ?response.id, is_error = response.is_error(), "Sent response");
        Ok(())
    }

    /// Returns the underlying writer.
    pub fn into_writer(self) -> W {
        self.writer
    }
}
