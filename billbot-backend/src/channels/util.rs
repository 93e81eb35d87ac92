//! Shared utilities for channel implementations.

/// Telegram's per-message text limit
pub const TELEGRAM_MAX_MESSAGE_CHARS: usize = 4096;

/// Split a message into chunks of at most `max_chars` characters.
/// Splits on line boundaries; lines exceeding `max_chars` are hard-split on
/// char boundaries.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    if text.chars().count() <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in text.lines() {
        let line_len = line.chars().count();
        if current_len + line_len + 1 > max_chars {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
                current_len = 0;
            }
            if line_len > max_chars {
                let chars: Vec<char> = line.chars().collect();
                let mut pieces = chars.chunks(max_chars).peekable();
                while let Some(piece) = pieces.next() {
                    if pieces.peek().is_some() {
                        chunks.push(piece.iter().collect());
                    } else {
                        current = piece.iter().collect();
                        current_len = piece.len();
                    }
                }
            } else {
                current = line.to_string();
                current_len = line_len;
            }
        } else {
            if !current.is_empty() {
                current.push('\n');
                current_len += 1;
            }
            current.push_str(line);
            current_len += line_len;
        }
    }

    if !current.is_empty() {
        chunks.push(current);
    }

    chunks
}

/// Truncate `text` to `max_chars` characters for logging.
pub fn preview(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}
