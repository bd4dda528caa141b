//! Local command console.
//!
//! Reads one command per line from an async reader (stdin in production)
//! and answers history queries through the pipeline's [`QueryHandle`].
//!
//! # Commands
//!
//! - `emailstate <address>` (case-insensitive, optional leading `!`)
//!
//! Anything else is ignored with a `debug` log line.

use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use postwatch_tracker::QueryHandle;

const EMAIL_STATE: &str = "emailstate";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// History query; carries the raw argument text.
    EmailState(String),
    /// Unrecognised command word.
    Unknown(String),
}

impl Command {
    /// Parse one input line. Blank lines yield `None`.
    pub fn parse(line: &str) -> Option<Self> {
        let line = line.trim();
        let line = line.strip_prefix('!').unwrap_or(line);
        let (word, args) = match line.split_once(char::is_whitespace) {
            Some((word, args)) => (word, args.trim()),
            None => (line, ""),
        };
        if word.is_empty() {
            return None;
        }

        if word.eq_ignore_ascii_case(EMAIL_STATE) {
            Some(Self::EmailState(args.to_owned()))
        } else {
            Some(Self::Unknown(word.to_owned()))
        }
    }
}

/// Serve commands until the input reaches EOF.
///
/// Each reply line is written followed by `\n`, and the writer is flushed
/// after every command.
///
/// # Errors
///
/// Input/output failures and a closed query channel (pipeline stopped).
pub async fn serve<R, W>(input: R, mut output: W, queries: QueryHandle) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Some(Command::EmailState(args)) => {
                tracing::debug!(args = %args, "emailstate query");
                let replies = queries.email_state(args).await?;
                for reply in replies {
                    output.write_all(reply.as_bytes()).await?;
                    output.write_all(b"\n").await?;
                }
                output.flush().await?;
            }
            Some(Command::Unknown(word)) => {
                tracing::debug!(command = %word, "ignoring unknown console command");
            }
            None => {}
        }
    }

    tracing::debug!("console input closed");
    Ok(())
}
