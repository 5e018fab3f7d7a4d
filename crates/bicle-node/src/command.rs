use std::{fmt, str::FromStr};

use crate::error::NodeError;

/// Inclusive block range `from..=to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockRange {
    pub from: u64,
    pub to: u64,
}

impl BlockRange {
    pub fn new(from: u64, to: u64) -> Self {
        Self { from, to }
    }

    /// The requested range, or `0..=head` when none was given.
    pub fn or_all(range: Option<Self>, head: u64) -> Self {
        range.unwrap_or(Self { from: 0, to: head })
    }
}

impl FromStr for BlockRange {
    type Err = NodeError;

    /// Accepts `a..b`, `a..=b` (both inclusive) or a single index `a`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| NodeError::InvalidCommand(format!("bad block range `{s}`")))
        };
        match s.split_once("..") {
            Some((from, to)) => Ok(Self {
                from: parse(from)?,
                to: parse(to.trim_start_matches('='))?,
            }),
            None => {
                let index = parse(s)?;
                Ok(Self { from: index, to: index })
            }
        }
    }
}

impl fmt::Display for BlockRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.from, self.to)
    }
}

/// Requests accepted from the chat-bot command surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a mining pass now.
    Mine,

    /// Validate the given range, or the whole chain.
    Verify(Option<BlockRange>),

    /// Queue a manual submission.  A missing title falls back to the url.
    Submit {
        url: String,
        title: Option<String>,
        submitter: Option<String>,
    },

    /// Export the given range, or the whole chain.
    Export(Option<BlockRange>),

    /// Show one block.
    Block(u64),

    /// Latest block number and hash.
    Hash,

    /// Summary of the most recent blocks.
    Proof,

    /// Item counts per source.
    Stats,

    /// Node status.
    Status,

    Help,
}

impl FromStr for Command {
    type Err = NodeError;

    /// Parse bot-style input such as `/verify 0..3` or
    /// `/submit https://example.com Some headline`.  The leading slash is
    /// optional.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words
            .next()
            .ok_or_else(|| NodeError::InvalidCommand("empty command".to_string()))?;
        let name = name.trim_start_matches('/').to_lowercase();
        let rest: Vec<&str> = words.collect();

        let range = |args: &[&str]| -> Result<Option<BlockRange>, NodeError> {
            args.first().map(|arg| arg.parse()).transpose()
        };

        match name.as_str() {
            "mine" => Ok(Command::Mine),
            "verify" => Ok(Command::Verify(range(&rest)?)),
            "export" => Ok(Command::Export(range(&rest)?)),
            "submit" => {
                let (url, title) = rest
                    .split_first()
                    .ok_or_else(|| NodeError::InvalidCommand("usage: /submit <url> [title]".to_string()))?;
                let title = (!title.is_empty()).then(|| title.join(" "));
                Ok(Command::Submit {
                    url: url.to_string(),
                    title,
                    submitter: None,
                })
            }
            "block" => {
                let index = rest
                    .first()
                    .and_then(|n| n.parse().ok())
                    .ok_or_else(|| NodeError::InvalidCommand("usage: /block <number>".to_string()))?;
                Ok(Command::Block(index))
            }
            "hash" => Ok(Command::Hash),
            "proof" => Ok(Command::Proof),
            "stats" => Ok(Command::Stats),
            "status" => Ok(Command::Status),
            "help" | "start" => Ok(Command::Help),
            other => Err(NodeError::InvalidCommand(format!("unknown command `/{other}`"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ranges() {
        assert_eq!("2..5".parse::<BlockRange>().unwrap(), BlockRange::new(2, 5));
        assert_eq!("2..=5".parse::<BlockRange>().unwrap(), BlockRange::new(2, 5));
        assert_eq!("7".parse::<BlockRange>().unwrap(), BlockRange::new(7, 7));
        assert!("a..b".parse::<BlockRange>().is_err());
    }

    #[test]
    fn parses_bot_commands() {
        assert_eq!("/mine".parse::<Command>().unwrap(), Command::Mine);
        assert_eq!("verify".parse::<Command>().unwrap(), Command::Verify(None));
        assert_eq!(
            "/export 0..1".parse::<Command>().unwrap(),
            Command::Export(Some(BlockRange::new(0, 1)))
        );
        assert_eq!("/block 4".parse::<Command>().unwrap(), Command::Block(4));
        assert_eq!("/start".parse::<Command>().unwrap(), Command::Help);
    }

    #[test]
    fn submit_joins_title_words() {
        let cmd: Command = "/submit https://x.example Big  news today".parse().unwrap();
        assert_eq!(
            cmd,
            Command::Submit {
                url: "https://x.example".into(),
                title: Some("Big news today".into()),
                submitter: None,
            }
        );

        let bare: Command = "/submit https://x.example".parse().unwrap();
        assert!(matches!(bare, Command::Submit { title: None, .. }));
    }

    #[test]
    fn rejects_bad_input() {
        assert!("".parse::<Command>().is_err());
        assert!("/submit".parse::<Command>().is_err());
        assert!("/block x".parse::<Command>().is_err());
        assert!("/launch".parse::<Command>().is_err());
    }
}
