//! Chat command parsing.

/// A recognized chat command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command<'a> {
    /// Join with the given display name, already trimmed.
    Join(&'a str),
    /// The join marker followed only by whitespace.
    JoinWithoutName,
    /// Draw `requested` winners; not yet validated or clamped.
    Draw { requested: i64 },
}

/// Matches message text against the configured, case-sensitive prefixes.
#[derive(Debug, Clone)]
pub struct CommandParser {
    join_marker: String,
    draw_command: String,
}

impl Default for CommandParser {
    fn default() -> Self {
        Self::new("@", "!sortear")
    }
}

impl CommandParser {
    pub fn new(join_marker: impl Into<String>, draw_command: impl Into<String>) -> Self {
        Self {
            join_marker: join_marker.into(),
            draw_command: draw_command.into(),
        }
    }

    /// Parse `text`, or `None` if it is not a command.
    ///
    /// A bare join marker is ignored. The draw command must be followed by
    /// whitespace or the end of the text; its first argument is the winner
    /// count, defaulting to 1 when missing or non-numeric. A fractional count
    /// is truncated toward zero.
    pub fn parse<'a>(&self, text: &'a str) -> Option<Command<'a>> {
        if let Some(rest) = text.strip_prefix(self.draw_command.as_str()) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                let requested = rest
                    .split_whitespace()
                    .next()
                    .and_then(winner_count)
                    .unwrap_or(1);
                return Some(Command::Draw { requested });
            }
        }

        let rest = text.strip_prefix(self.join_marker.as_str())?;
        if rest.is_empty() {
            return None;
        }
        match rest.trim() {
            "" => Some(Command::JoinWithoutName),
            name => Some(Command::Join(name)),
        }
    }
}

/// Integer part of a numeric argument; `None` unless the whole argument is a
/// finite number.
fn winner_count(arg: &str) -> Option<i64> {
    if !arg.parse::<f64>().is_ok_and(f64::is_finite) {
        return None;
    }
    let unsigned = arg.trim_start_matches(['+', '-']);
    let digits = unsigned.len() - unsigned.trim_start_matches(|c: char| c.is_ascii_digit()).len();
    let end = arg.len() - unsigned.len() + digits;
    arg[..end].parse().ok()
}
