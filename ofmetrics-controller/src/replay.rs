//! JSON-lines event feed.
//!
//! Each non-empty line is one [`SwitchEvent`], e.g.
//! `{"type": "switch_connected", "switch": 1, "features_len": 32}`.
//! Lines starting with `#` are comments. Lines that do not decode are
//! dropped with a warning, the same way an undecodable wire message is.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::models::SwitchEvent;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct FeedStats {
    pub delivered: u64,
    pub rejected: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("IO error reading events: {0}")]
    Io(#[from] std::io::Error),
}

/// Forward every decoded line to `events`. Stops at end of input or when
/// the receiving side has gone away.
pub async fn feed_events<R>(reader: R, events: mpsc::Sender<SwitchEvent>) -> Result<FeedStats, ReplayError>
where
    R: AsyncBufRead + Unpin,
{
    let mut stats = FeedStats::default();
    let mut lines = reader.lines();

    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match serde_json::from_str::<SwitchEvent>(line) {
            Ok(event) => {
                if events.send(event).await.is_err() {
                    debug!("[replay] event loop closed, stopping feed");
                    break;
                }
                stats.delivered += 1;
            }
            Err(e) => {
                warn!("[replay] dropping undecodable event: {e}");
                stats.rejected += 1;
            }
        }
    }
    Ok(stats)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_feed_skips_comments_and_garbage() {
        let input = b"# capture 1\n{\"type\": \"switch_connected\", \"switch\": 1}\n\nnot json\n{\"type\": \"port_status_changed\", \"switch\": 1, \"port\": 2, \"reason\": \"add\"}\n";
        let (tx, mut rx) = mpsc::channel(8);

        let stats = feed_events(&input[..], tx).await.unwrap();
        assert_eq!(stats, FeedStats { delivered: 2, rejected: 1 });
        assert_eq!(rx.recv().await, Some(SwitchEvent::SwitchConnected { switch: 1, features_len: 0 }));
        assert!(matches!(rx.recv().await, Some(SwitchEvent::PortStatusChanged { port: 2, .. })));
        assert_eq!(rx.recv().await, None);
    }
}
