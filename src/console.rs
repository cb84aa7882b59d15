//! Line-oriented command surface
//!
//! Each input line is one command; each command prints one JSON line with the
//! structured outcome. Rejections are printed as `{"error": kind, ...}` and do
//! not end the session.

use crate::error::{MatchmakingError, Result};
use crate::queue::QueueManager;
use crate::types::{ChannelId, MessageId, ParticipantId, ResetKind};
use serde_json::{json, Value};
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::debug;

pub const HELP: &str = "commands: enroll <channel> <participant> | withdraw <channel> <participant> \
| cancel <channel> | setup <channel> | status <channel> | announce <channel> <message> | stats | quit";

/// One parsed console command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsoleCommand {
    Enroll(ChannelId, ParticipantId),
    Withdraw(ChannelId, ParticipantId),
    Reset(ChannelId, ResetKind),
    Status(ChannelId),
    Announce(ChannelId, MessageId),
    Stats,
    Help,
    Quit,
}

impl FromStr for ConsoleCommand {
    type Err = anyhow::Error;

    fn from_str(line: &str) -> Result<Self> {
        let parts: Vec<&str> = line.split_whitespace().collect();
        let command = match parts.as_slice() {
            ["enroll", channel, participant] => {
                ConsoleCommand::Enroll(parse_id(channel)?, parse_id(participant)?)
            }
            ["withdraw", channel, participant] => {
                ConsoleCommand::Withdraw(parse_id(channel)?, parse_id(participant)?)
            }
            ["cancel", channel] => ConsoleCommand::Reset(parse_id(channel)?, ResetKind::Cancel),
            ["setup", channel] => ConsoleCommand::Reset(parse_id(channel)?, ResetKind::Setup),
            ["status", channel] => ConsoleCommand::Status(parse_id(channel)?),
            ["announce", channel, message] => {
                ConsoleCommand::Announce(parse_id(channel)?, parse_id(message)?)
            }
            ["stats"] => ConsoleCommand::Stats,
            ["help"] => ConsoleCommand::Help,
            ["quit"] | ["exit"] => ConsoleCommand::Quit,
            _ => anyhow::bail!("Unrecognized command: {}", line.trim()),
        };
        Ok(command)
    }
}

fn parse_id(raw: &str) -> Result<u64> {
    raw.parse()
        .map_err(|_| anyhow::anyhow!("Invalid identifier: {}", raw))
}

/// Executes console commands against a queue manager
pub struct Console {
    manager: QueueManager,
}

impl Console {
    pub fn new(manager: QueueManager) -> Self {
        Self { manager }
    }

    /// Run one command. User-attributable rejections become an error reply;
    /// anything else is returned as an error.
    pub async fn execute(&self, command: ConsoleCommand) -> Result<Value> {
        let result = match command {
            ConsoleCommand::Enroll(channel, participant) => self
                .manager
                .enroll(channel, participant)
                .await
                .and_then(to_value),
            ConsoleCommand::Withdraw(channel, participant) => self
                .manager
                .withdraw(channel, participant)
                .await
                .and_then(to_value),
            ConsoleCommand::Reset(channel, kind) => {
                self.manager.reset(channel, kind).await.and_then(to_value)
            }
            ConsoleCommand::Status(channel) => self.manager.status(channel).await.and_then(|s| {
                let open_slots = s.open_slots();
                let mut value = to_value(s)?;
                value["open_slots"] = json!(open_slots);
                Ok(value)
            }),
            ConsoleCommand::Announce(channel, message) => self
                .manager
                .set_announcement(channel, Some(message))
                .await
                .map(|_| json!({ "channel_id": channel, "announcement": message })),
            ConsoleCommand::Stats => self.manager.stats().and_then(to_value),
            ConsoleCommand::Help => Ok(json!({ "help": HELP })),
            ConsoleCommand::Quit => Ok(json!({ "bye": true })),
        };

        match result {
            Ok(value) => Ok(value),
            Err(e) => match e.downcast_ref::<MatchmakingError>() {
                Some(err) if err.is_user_error() => {
                    debug!("Console command rejected: {}", err);
                    Ok(json!({ "error": err.kind(), "message": err.to_string() }))
                }
                _ => Err(e),
            },
        }
    }

    /// Read commands until `quit` or end of input, writing one reply per line
    pub async fn run<R, W>(&self, reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let reply = match line.parse::<ConsoleCommand>() {
                Ok(ConsoleCommand::Quit) => break,
                Ok(command) => match self.execute(command).await {
                    Ok(value) => value,
                    Err(e) => json!({ "error": "failed", "message": e.to_string() }),
                },
                Err(e) => json!({ "error": "invalid_command", "message": e.to_string() }),
            };

            writer.write_all(reply.to_string().as_bytes()).await?;
            writer.write_all(b"\n").await?;
            writer.flush().await?;
        }
        Ok(())
    }
}

fn to_value<T: serde::Serialize>(outcome: T) -> Result<Value> {
    Ok(serde_json::to_value(outcome)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{QueueConfig, SessionLifecycleConfig};
    use crate::metrics::MetricsCollector;
    use crate::platform::InMemoryPlatform;
    use crate::storage::InMemorySnapshotStore;
    use std::sync::Arc;

    fn console(capacity: usize) -> Console {
        let manager = QueueManager::new(
            QueueConfig::without_cooldowns(capacity),
            SessionLifecycleConfig::default(),
            Arc::new(InMemoryPlatform::new()),
            Arc::new(InMemorySnapshotStore::new()),
            Arc::new(MetricsCollector::new().unwrap()),
        )
        .unwrap();
        Console::new(manager)
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(
            "enroll 1 2".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Enroll(1, 2)
        );
        assert_eq!(
            "  setup 9 ".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Reset(9, ResetKind::Setup)
        );
        assert_eq!(
            "cancel 9".parse::<ConsoleCommand>().unwrap(),
            ConsoleCommand::Reset(9, ResetKind::Cancel)
        );
        assert_eq!("quit".parse::<ConsoleCommand>().unwrap(), ConsoleCommand::Quit);
        assert!("enroll 1".parse::<ConsoleCommand>().is_err());
        assert!("enroll one 2".parse::<ConsoleCommand>().is_err());
        assert!("dance".parse::<ConsoleCommand>().is_err());
    }

    #[tokio::test]
    async fn test_rejection_is_a_reply() {
        let console = console(4);
        console.execute(ConsoleCommand::Enroll(1, 10)).await.unwrap();

        let reply = console.execute(ConsoleCommand::Enroll(2, 10)).await.unwrap();
        assert_eq!(reply["error"], "already_queued_elsewhere");

        let reply = console.execute(ConsoleCommand::Withdraw(2, 10)).await.unwrap();
        assert_eq!(reply["error"], "not_queued");
    }

    #[tokio::test]
    async fn test_status_reports_open_slots() {
        let console = console(3);
        console.execute(ConsoleCommand::Enroll(1, 10)).await.unwrap();

        let reply = console.execute(ConsoleCommand::Status(1)).await.unwrap();
        assert_eq!(reply["participants"], json!([10]));
        assert_eq!(reply["open_slots"], 2);
    }

    #[tokio::test]
    async fn test_run_session() {
        let console = console(2);
        let input = b"enroll 1 10\nbogus\n\nenroll 1 11\nstatus 1\nquit\nstatus 1\n";
        let mut output = Vec::new();

        console.run(&input[..], &mut output).await.unwrap();

        let replies: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(replies.len(), 4);
        assert_eq!(replies[0]["queue_size"], 1);
        assert_eq!(replies[1]["error"], "invalid_command");
        assert_eq!(replies[2]["formed"]["participants"], json!([10, 11]));
        assert_eq!(replies[3]["participants"], json!([]));
    }
}
