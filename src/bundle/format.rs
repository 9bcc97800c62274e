//! Human-readable rendering of bundler diagnostics.
//!
//! ```text
//! ✘ [ERROR] Could not resolve "missing.js"
//!
//!     index.js:1:7:
//!       1 │ import 'missing.js';
//!         ╵        ~~~~~~~~~~
//! ```

use owo_colors::OwoColorize;

use super::{Location, Message, MessageKind};

/// Format every message; `color` adds ANSI styling.
pub fn format_messages(messages: &[Message], kind: MessageKind, color: bool) -> Vec<String> {
    messages.iter().map(|m| format_message(m, kind, color)).collect()
}

pub fn format_message(message: &Message, kind: MessageKind, color: bool) -> String {
    let (mark, label) = match kind {
        MessageKind::Error => ("✘", "[ERROR]"),
        MessageKind::Warning => ("▲", "[WARNING]"),
    };

    let mut header = if color {
        match kind {
            MessageKind::Error => format!(
                "{} {} {}",
                mark.red(),
                label.on_red().white().bold(),
                message.text.bold()
            ),
            MessageKind::Warning => format!(
                "{} {} {}",
                mark.yellow(),
                label.on_yellow().black().bold(),
                message.text.bold()
            ),
        }
    } else {
        format!("{mark} {label} {}", message.text)
    };

    if let Some(plugin) = &message.plugin_name {
        let tag = format!("[plugin {plugin}]");
        header.push(' ');
        if color {
            header.push_str(&tag.dimmed().to_string());
        } else {
            header.push_str(&tag);
        }
    }

    let mut out = header;
    out.push('\n');
    if let Some(location) = &message.location {
        out.push('\n');
        out.push_str(&format_location(location, color));
    }
    out.push('\n');
    out
}

fn format_location(location: &Location, color: bool) -> String {
    let position = format!("{}:{}:{}:", location.file, location.line, location.column + 1);
    let gutter = location.line.to_string();
    let pad = " ".repeat(gutter.len());

    let marker_pad = " ".repeat(location.column);
    let marker = "~".repeat(location.length.max(1));

    if color {
        format!(
            "    {}\n      {} │ {}\n      {pad} ╵ {marker_pad}{}\n",
            position,
            gutter.dimmed(),
            location.line_text,
            marker.green()
        )
    } else {
        format!(
            "    {position}\n      {gutter} │ {}\n      {pad} ╵ {marker_pad}{marker}\n",
            location.line_text
        )
    }
}
