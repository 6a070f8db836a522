//! Tracking host: the process the browser extension talks to over
//! newline-delimited JSON on stdin/stdout.

mod commands;
pub mod messages;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;

use self::commands::Flow;
pub use self::messages::{BrowserMessage, HostReply};
use crate::tracker::TrackerController;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_error, log_info, log_warn};

/// Serves browser messages until EOF, a `shutdown` message, or `cancel`.
/// Pending events are flushed on the way out; the session itself stays
/// persisted so the next host can rejoin it.
pub async fn run_host<R, W>(
    controller: TrackerController,
    reader: R,
    mut writer: W,
    cancel: CancellationToken,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = reader.lines();

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read browser message")?,
            _ = cancel.cancelled() => {
                log_info!("host interrupted");
                break;
            }
        };

        let Some(line) = line else {
            log_info!("browser closed the channel");
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (reply, flow) = match serde_json::from_str::<BrowserMessage>(line) {
            Ok(message) => match commands::dispatch(&controller, message).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    log_error!("failed to handle browser message: {err:#}");
                    (HostReply::error(format!("{err:#}")), Flow::Continue)
                }
            },
            Err(err) => {
                log_warn!("malformed browser message: {err}");
                (
                    HostReply::error(format!("malformed message: {err}")),
                    Flow::Continue,
                )
            }
        };

        write_reply(&mut writer, &reply).await?;
        if flow == Flow::Stop {
            break;
        }
    }

    let flushed = controller.shutdown().await;
    log_info!("host stopped ({flushed} events flushed)");
    Ok(())
}

async fn write_reply<W>(writer: &mut W, reply: &HostReply) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let mut payload = serde_json::to_vec(reply).context("failed to serialize host reply")?;
    payload.push(b'\n');
    writer
        .write_all(&payload)
        .await
        .context("failed writing host reply")?;
    writer.flush().await.context("failed flushing host reply")?;
    Ok(())
}
