//! Relay messages from a line-oriented source: one `sender\tchannel\ttext`
//! triple per line, as written by the chat bridge.

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::watch;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{debug, info};

use crate::monitor::Monitor;
use crate::TARGET_INGEST;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayMessage<'a> {
    pub sender: &'a str,
    pub channel: &'a str,
    pub text: &'a str,
}

/// Splits a bridge line into its triple. The text keeps any further tabs.
pub fn split_relay_line(line: &str) -> Option<RelayMessage<'_>> {
    let mut fields = line.trim_end_matches(['\r', '\n']).splitn(3, '\t');
    let sender = fields.next()?;
    let channel = fields.next()?;
    let text = fields.next()?;
    if sender.is_empty() || channel.is_empty() {
        return None;
    }
    Some(RelayMessage {
        sender,
        channel,
        text,
    })
}

/// Feeds every line of `reader` to the monitor in arrival order until the
/// input ends or `shutdown` flips. Returns the number of recorded edits.
pub async fn ingest_lines<R>(
    reader: R,
    monitor: &Monitor,
    mut shutdown: watch::Receiver<bool>,
) -> Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = LinesStream::new(reader.lines());
    let mut seen = 0usize;
    let mut recorded = 0usize;

    loop {
        tokio::select! {
            next = lines.next() => match next {
                Some(line) => {
                    let line = line.context("Failed to read relay input")?;
                    seen += 1;
                    match split_relay_line(&line) {
                        Some(message) => {
                            if monitor
                                .handle_message(message.sender, message.channel, message.text)
                                .is_some()
                            {
                                recorded += 1;
                            }
                        }
                        None => debug!(
                            target: TARGET_INGEST,
                            "Ignoring line without sender and channel"
                        ),
                    }
                }
                None => {
                    info!(target: TARGET_INGEST, "Relay input ended");
                    break;
                }
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    info!(target: TARGET_INGEST, "Stopping relay ingest");
                    break;
                }
            }
        }
    }

    info!(target: TARGET_INGEST, "Read {} relay lines, recorded {} edits", seen, recorded);
    Ok(recorded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::environment::Settings;
    use crate::lookup::client::fake::FakeFetcher;
    use crate::notify::recording::RecordingNotifier;
    use crate::social::SocialSearch;
    use crate::tuning::Tuning;
    use std::sync::Arc;

    #[test]
    fn test_split_relay_line() {
        assert_eq!(
            split_relay_line("rc-pmtpa\t#en.wikipedia\t[[A]] * B *\t(+1)\r\n"),
            Some(RelayMessage {
                sender: "rc-pmtpa",
                channel: "#en.wikipedia",
                text: "[[A]] * B *\t(+1)",
            })
        );
        assert_eq!(split_relay_line("rc-pmtpa\t#en.wikipedia"), None);
        assert_eq!(split_relay_line("\t#en.wikipedia\ttext"), None);
    }

    #[tokio::test]
    async fn test_ingest_records_relay_edits_in_order() {
        let settings = Settings::default();
        let fetcher = Arc::new(FakeFetcher::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let monitor = Monitor::new(
            &settings,
            Arc::new(Tuning::from_settings(&settings)),
            fetcher.clone(),
            SocialSearch::new(Vec::new(), tokio::time::Duration::from_secs(1)),
            notifier.clone(),
        );

        let index = "https://en.wikipedia.org/w/index.php";
        let page = "#en.wikipedia\t[[Mount Etna]]";
        let input = [
            format!("rc-pmtpa\t{page} M {index}?oldid=1 * Alice * (+10) lava"),
            format!("someone\t{page} M {index}?oldid=1 * Eve * (+10) spam"),
            "garbage".to_string(),
            format!("rc-pmtpa\t{page} {index}?oldid=2 * Bob * (-4) tidy"),
        ]
        .join("\n");
        let (_tx, rx) = watch::channel(false);

        let recorded = ingest_lines(input.as_bytes(), &monitor, rx).await.unwrap();
        monitor.settle().await;

        assert_eq!(recorded, 2);
        assert_eq!(notifier.kinds(), vec!["firstTimeSeen", "nTimesSeen"]);
        assert_eq!(monitor.store().len(), 1);
    }
}
