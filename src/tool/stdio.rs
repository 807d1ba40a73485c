//! Newline-delimited JSON-RPC over stdin/stdout.
//!
//! One frame per line in, one response per line out. Logs go to stderr,
//! never stdout: the protocol owns that stream.

use super::rpc;
use super::ToolSurface;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Serve until stdin reaches EOF.
pub async fn serve(surface: ToolSurface) -> std::io::Result<()> {
    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = tokio::io::stdout();
    let mut lines = stdin.lines();

    tracing::info!("tool protocol serving on stdio");
    while let Some(line) = lines.next_line().await? {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(response) = rpc::handle_frame(&surface, trimmed.as_bytes()).await {
            let mut frame = serde_json::to_vec(&response).unwrap_or_default();
            frame.push(b'\n');
            stdout.write_all(&frame).await?;
            stdout.flush().await?;
        }
    }
    tracing::info!("stdin closed, tool protocol shutting down");
    Ok(())
}
