use kanal::AsyncSender;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use crate::events::{AppEvent, parse_line};

/// Read stdin lines into app events until EOF or cancellation.
pub async fn stdin_reader(
    event_tx: AsyncSender<AppEvent>,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::debug!("stdin reader stopping");
                return Ok(());
            }
            line = lines.next_line() => {
                match line? {
                    Some(line) => {
                        if let Some(event) = parse_line(&line) {
                            event_tx.send(event).await?;
                        }
                    }
                    None => {
                        tracing::info!("stdin closed");
                        return Ok(());
                    }
                }
            }
        }
    }
}
