use anyhow::{Context, Result, bail};
use helmet::geo::Coordinate;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

/// A line typed into the companion console
#[derive(Debug, Clone, PartialEq)]
pub enum ConsoleCommand {
    /// Status button, behaves per `connect_policy`
    Button,
    Connect,
    Toggle,
    Disconnect,
    Search(String),
    Clear,
    Fix(Coordinate),
    Play {
        title: String,
        artist: Option<String>,
    },
    Stop,
    Status,
    Quit,
}

/// Parse one console line; blank lines yield `None`
pub fn parse_command(line: &str) -> Result<Option<ConsoleCommand>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }

    let (verb, rest) = match line.split_once(char::is_whitespace) {
        Some((verb, rest)) => (verb, rest.trim()),
        None => (line, ""),
    };

    let command = match verb.to_ascii_lowercase().as_str() {
        "button" | "b" => ConsoleCommand::Button,
        "connect" => ConsoleCommand::Connect,
        "toggle" => ConsoleCommand::Toggle,
        "disconnect" => ConsoleCommand::Disconnect,
        // blank queries are passed through; the resolver ignores them
        "search" | "s" => ConsoleCommand::Search(rest.to_string()),
        "clear" => ConsoleCommand::Clear,
        "fix" => ConsoleCommand::Fix(parse_coordinate(rest)?),
        "play" => {
            let (title, artist) = match rest.split_once('|') {
                Some((title, artist)) => (title.trim(), Some(artist.trim().to_string())),
                None => (rest, None),
            };
            if title.is_empty() {
                bail!("usage: play <title> [| <artist>]");
            }
            ConsoleCommand::Play {
                title: title.to_string(),
                artist: artist.filter(|a| !a.is_empty()),
            }
        }
        "stop" => ConsoleCommand::Stop,
        "status" => ConsoleCommand::Status,
        "quit" | "exit" | "q" => ConsoleCommand::Quit,
        other => bail!("unknown command: {}", other),
    };

    Ok(Some(command))
}

fn parse_coordinate(args: &str) -> Result<Coordinate> {
    let mut parts = args.split(|c: char| c == ',' || c.is_whitespace()).filter(|p| !p.is_empty());

    let latitude = parts
        .next()
        .context("usage: fix <lat> <lon>")?
        .parse::<f64>()
        .context("latitude is not a number")?;
    let longitude = parts
        .next()
        .context("usage: fix <lat> <lon>")?
        .parse::<f64>()
        .context("longitude is not a number")?;

    let coordinate = Coordinate::new(latitude, longitude);
    if !coordinate.is_valid() {
        bail!("coordinate out of range: {}, {}", latitude, longitude);
    }

    Ok(coordinate)
}

/// Read commands from stdin and forward them until EOF or `quit`
pub async fn monitor_stdin(tx: mpsc::Sender<ConsoleCommand>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Some(line) = lines.next_line().await.context("Failed to read stdin")? {
        match parse_command(&line) {
            Ok(Some(command)) => {
                tracing::debug!("Console command: {:?}", command);
                let quit = command == ConsoleCommand::Quit;
                if tx.send(command).await.is_err() || quit {
                    break;
                }
            }
            Ok(None) => {}
            Err(e) => tracing::warn!("{}", e),
        }
    }

    Ok(())
}
