//! Text rendering of the studio.

use crate::image::{AspectRatio, GeneratedImage, ImageSize};
use crate::session::Session;

/// Spinner animation frames.
pub const SPINNER_FRAMES: [&str; 10] = ["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"];

/// Longest prompt preview in the history grid.
const PREVIEW_CHARS: usize = 40;

const TITLE: &str = "Nano Banana Pro Studio";

/// Shown while the startup readiness check runs.
pub fn render_checking() -> String {
    format!("{} Checking API key...", SPINNER_FRAMES[0])
}

/// One spinner frame for an in-flight generation.
pub fn render_spinner(tick: usize) -> String {
    format!(
        "{} Dreaming pixels...",
        SPINNER_FRAMES[tick % SPINNER_FRAMES.len()]
    )
}

/// Renders the whole studio.
pub fn render(session: &Session) -> String {
    if session.is_checking_auth() {
        return render_checking();
    }

    let mut lines = Vec::new();
    header(&mut lines, session);
    if !session.is_key_ready() {
        key_banner(&mut lines);
    }
    prompt(&mut lines, session);
    controls(&mut lines, session);
    action(&mut lines, session);
    error_panel(&mut lines, session);
    result(&mut lines, session);
    history(&mut lines, session);
    lines.join("\n")
}

fn header(lines: &mut Vec<String>, session: &Session) {
    if session.is_key_ready() {
        lines.push(format!("== {TITLE} =="));
    } else {
        lines.push(format!("== {TITLE} ==  [Connect Key: /key]"));
    }
    lines.push(String::new());
}

fn key_banner(lines: &mut Vec<String>) {
    lines.push("! Access Required".into());
    lines.push(
        "  Generating high-quality (1K/2K/4K) images with Gemini 3 Pro requires a verified API key."
            .into(),
    );
    lines.push("  Type /key to select an API key.".into());
    lines.push(String::new());
}

fn prompt(lines: &mut Vec<String>, session: &Session) {
    let text = &session.options().prompt;
    if text.is_empty() {
        lines.push("Prompt: (describe your imagination...)".into());
    } else {
        lines.push(format!("Prompt: {text}"));
    }
    lines.push(format!("        {} chars", text.chars().count()));
}

fn controls(lines: &mut Vec<String>, session: &Session) {
    let options = session.options();
    let disabled = if session.status().is_generating() {
        "  (disabled)"
    } else {
        ""
    };

    lines.push(format!(
        "Resolution:   {}{disabled}",
        picker(&ImageSize::ALL, &options.size, ImageSize::as_str)
    ));
    lines.push(format!(
        "Aspect ratio: {}{disabled}",
        picker(&AspectRatio::ALL, &options.aspect_ratio, AspectRatio::as_str)
    ));
}

fn picker<T: PartialEq>(all: &[T], selected: &T, label: fn(&T) -> &'static str) -> String {
    all.iter()
        .map(|item| {
            if item == selected {
                format!("[{}]", label(item))
            } else {
                format!(" {} ", label(item))
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn action(lines: &mut Vec<String>, session: &Session) {
    let line = if session.status().is_generating() {
        "[ Generating... ]".to_string()
    } else if session.can_submit() {
        "[ Generate Image ]  /generate".to_string()
    } else {
        "[ Generate Image ]  (disabled: enter a prompt)".to_string()
    };
    lines.push(String::new());
    lines.push(line);
}

fn error_panel(lines: &mut Vec<String>, session: &Session) {
    let Some(error) = session.status().error() else {
        return;
    };
    lines.push(String::new());
    lines.push("x Generation Failed".into());
    lines.push(format!("  {error}"));
    if error.contains("Key") {
        lines.push("  Select Key Again: /key".into());
    }
}

fn result(lines: &mut Vec<String>, session: &Session) {
    if session.status().is_generating() {
        lines.push(String::new());
        lines.push("Result".into());
        lines.push(format!("  {}", render_spinner(0)));
        return;
    }
    let Some(image) = session.current_image() else {
        return;
    };
    lines.push(String::new());
    lines.push("Result  [Download: /download]".into());
    lines.push(format!("  {}", preview(&image.prompt, usize::MAX)));
    lines.push(format!(
        "  {}  {}",
        image.mime_type().unwrap_or("unknown"),
        short_id(image)
    ));
    lines.push(format!("  {} • {}", image.size, image.aspect_ratio));
}

fn history(lines: &mut Vec<String>, session: &Session) {
    let images = session.history();
    if images.is_empty() {
        return;
    }
    let current = session.current_image().map(|image| image.id.as_str());

    lines.push(String::new());
    lines.push("Recent Creations  (/select N)".into());
    for (i, image) in images.iter().enumerate() {
        let marker = if Some(image.id.as_str()) == current {
            '*'
        } else {
            ' '
        };
        lines.push(format!(
            "{marker}[{}] {:<width$}  {} • {}",
            i + 1,
            preview(&image.prompt, PREVIEW_CHARS),
            image.size,
            image.aspect_ratio,
            width = PREVIEW_CHARS + 1,
        ));
    }
}

/// Flattens a prompt onto one line, capped at `max` characters.
fn preview(prompt: &str, max: usize) -> String {
    let flat = prompt.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max {
        return flat;
    }
    let mut cut: String = flat.chars().take(max).collect();
    cut.push('…');
    cut
}

fn short_id(image: &GeneratedImage) -> &str {
    image.id.get(..8).unwrap_or(&image.id)
}
