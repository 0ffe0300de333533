//! Parsing typed lines into user intents.

use crate::error::{GenStudioError, Result};
use crate::image::{AspectRatio, ImageSize};
use std::path::PathBuf;

/// Something the user asked the studio to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Replace the prompt.
    SetPrompt(String),
    /// Pick a resolution tier.
    SetSize(ImageSize),
    /// Pick an aspect ratio.
    SetAspectRatio(AspectRatio),
    /// Run the primary action.
    Generate,
    /// Show a history entry (0 is the most recent).
    Select(usize),
    /// Save the current image, optionally into another directory.
    Download(Option<PathBuf>),
    /// Run the key selection flow.
    SelectKey,
    /// Redraw the whole studio.
    Show,
    /// Print the command list.
    Help,
    /// Leave the studio.
    Quit,
}

/// Command summary printed by `/help`.
pub const HELP: &str = "\
Type any text to set the prompt. Commands:
  /generate, /g          generate an image from the prompt
  /size 1K|2K|4K         pick the resolution
  /ratio 1:1|9:16|16:9|3:4|4:3
                         pick the aspect ratio
  /prompt TEXT           set a prompt that starts with '/'
  /clear                 clear the prompt
  /select N, /s N        show history entry N
  /download [DIR], /d    save the current image
  /key                   select an API key
  /show                  redraw the studio
  /help                  show this help
  /quit                  leave";

/// Parses one input line. Blank lines yield `None`.
pub fn parse_intent(line: &str) -> Result<Option<Intent>> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(None);
    }
    if !line.starts_with('/') {
        return Ok(Some(Intent::SetPrompt(line.to_string())));
    }

    let (command, arg) = match line.split_once(char::is_whitespace) {
        Some((command, arg)) => (command, arg.trim()),
        None => (line, ""),
    };

    let intent = match command.to_ascii_lowercase().as_str() {
        "/generate" | "/gen" | "/g" => Intent::Generate,
        "/size" => Intent::SetSize(require(command, arg)?.parse()?),
        "/ratio" | "/aspect" => Intent::SetAspectRatio(require(command, arg)?.parse()?),
        "/prompt" => Intent::SetPrompt(arg.to_string()),
        "/clear" => Intent::SetPrompt(String::new()),
        "/select" | "/s" => Intent::Select(parse_position(require(command, arg)?)?),
        "/download" | "/d" => Intent::Download((!arg.is_empty()).then(|| PathBuf::from(arg))),
        "/key" => Intent::SelectKey,
        "/show" => Intent::Show,
        "/help" | "/?" => Intent::Help,
        "/quit" | "/exit" | "/q" => Intent::Quit,
        other => {
            return Err(GenStudioError::InvalidRequest(format!(
                "unknown command '{other}' (type /help)"
            )))
        }
    };
    Ok(Some(intent))
}

fn require<'a>(command: &str, arg: &'a str) -> Result<&'a str> {
    if arg.is_empty() {
        return Err(GenStudioError::InvalidRequest(format!(
            "{command} needs an argument (type /help)"
        )));
    }
    Ok(arg)
}

/// Converts a 1-based position into an index.
fn parse_position(arg: &str) -> Result<usize> {
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n - 1),
        _ => Err(GenStudioError::InvalidRequest(format!(
            "'{arg}' is not a history position (1, 2, ...)"
        ))),
    }
}
