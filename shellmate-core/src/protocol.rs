//! # Reply protocol
//!
//! How a model reply is read:
//!
//! - A reply that is exactly the sentinel (`DONE`, any case) ends the turn.
//! - Otherwise the first `<command>` ... `</command>` pair holds a command.
//!   Later pairs are ignored.
//! - Anything else is an ordinary conversational reply.
//!
//! Extracted commands go through a small normalization pipeline that peels
//! off the decoration models like to add: a `Command:` label, a fenced code
//! block with an `sh`/`bash` tag, and inline backticks.

/// Marker the model sends when the current goal is satisfied
pub const SENTINEL: &str = "DONE";

pub const OPEN_TAG: &str = "<command>";
pub const CLOSE_TAG: &str = "</command>";

/// What a model reply asks the loop to do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// The model considers the turn complete
    Done,
    /// The model wants this (normalized) command run
    Command(String),
    /// Plain conversational text
    Message(String),
}

impl Reply {
    /// Classify a raw model reply
    pub fn parse(reply: &str) -> Self {
        if is_sentinel(reply) {
            return Reply::Done;
        }
        match extract(reply) {
            Some(candidate) => Reply::Command(normalize(candidate)),
            None => Reply::Message(reply.trim().to_string()),
        }
    }
}

pub fn is_sentinel(reply: &str) -> bool {
    reply.trim().eq_ignore_ascii_case(SENTINEL)
}

/// The text strictly between the first opening tag and the first closing
/// tag after it. `None` if either tag is missing.
pub fn extract(reply: &str) -> Option<&str> {
    let start = reply.find(OPEN_TAG)? + OPEN_TAG.len();
    let len = reply[start..].find(CLOSE_TAG)?;
    Some(&reply[start..start + len])
}

/// One step of the normalization pipeline
pub type Stage = fn(&str) -> &str;

/// Stages in the order they must run. Each one only sees what the
/// previous one left.
pub const STAGES: [(&str, Stage); 3] = [
    ("label", strip_label),
    ("fence", strip_fence),
    ("backticks", strip_backticks),
];

/// Run the pipeline until no stage changes the command.
///
/// Repeating the pass makes the result a fixed point, so normalizing an
/// already normalized command is a no-op.
pub fn normalize(candidate: &str) -> String {
    let mut current = candidate.trim();
    loop {
        let before = current;
        for (_, stage) in STAGES {
            current = stage(current);
        }
        if current == before {
            return current.to_string();
        }
    }
}

/// `Command: ls` -> `ls` (label matched case-insensitively)
pub fn strip_label(command: &str) -> &str {
    const LABEL: &str = "command:";
    let command = command.trim();
    match command.get(..LABEL.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(LABEL) => command[LABEL.len()..].trim(),
        _ => command,
    }
}

/// ```` ```sh\nls\n``` ```` -> `ls`
///
/// The language tag is only dropped when it is a whole word, so a fenced
/// `shred file` keeps its first word.
pub fn strip_fence(command: &str) -> &str {
    const FENCE: &str = "```";
    let command = command.trim();
    if command.len() < 2 * FENCE.len() || !command.starts_with(FENCE) || !command.ends_with(FENCE) {
        return command;
    }

    let inner = command[FENCE.len()..command.len() - FENCE.len()].trim();
    for tag in ["bash", "sh"] {
        if let Some(rest) = inner.strip_prefix(tag) {
            if rest.is_empty() || rest.starts_with(char::is_whitespace) {
                return rest.trim();
            }
        }
    }
    inner
}

/// `` `ls -la` `` -> `ls -la`
pub fn strip_backticks(command: &str) -> &str {
    let command = command.trim();
    if command.len() >= 2 && command.starts_with('`') && command.ends_with('`') {
        command[1..command.len() - 1].trim()
    } else {
        command
    }
}

/// Wrap a command in the delimiter pair, as the model is told to
pub fn wrap(command: &str) -> String {
    format!("{}{}{}", OPEN_TAG, command, CLOSE_TAG)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_any_case() {
        assert_eq!(Reply::parse("DONE"), Reply::Done);
        assert_eq!(Reply::parse("  done\n"), Reply::Done);
        assert_eq!(Reply::parse("Done"), Reply::Done);
        assert!(!is_sentinel("DONE, the files are listed"));
    }

    #[test]
    fn test_sentinel_wins_over_scanning() {
        // A bare sentinel never reaches extraction
        assert_eq!(Reply::parse("done"), Reply::Done);
        assert_eq!(
            Reply::parse("<command>done</command>"),
            Reply::Command("done".into())
        );
    }

    #[test]
    fn test_plain_reply_is_message() {
        assert_eq!(
            Reply::parse("  The directory is empty.\n"),
            Reply::Message("The directory is empty.".into())
        );
    }

    #[test]
    fn test_extract_first_pair_only() {
        let reply = "First <command>ls</command> then <command>rm -rf x</command>";
        assert_eq!(extract(reply), Some("ls"));
        assert_eq!(Reply::parse(reply), Reply::Command("ls".into()));
    }

    #[test]
    fn test_extract_missing_tags() {
        assert_eq!(extract("run ls please"), None);
        assert_eq!(extract("<command>ls"), None);
        assert_eq!(extract("ls</command>"), None);
        assert_eq!(extract("</command>ls<command>"), None);
    }

    #[test]
    fn test_extract_closing_tag_after_opening() {
        assert_eq!(extract("</command> x <command>pwd</command>"), Some("pwd"));
    }

    #[test]
    fn test_label_fence_and_language_tag() {
        assert_eq!(normalize("Command: ```sh\nls -la\n```"), "ls -la");
        assert_eq!(normalize("COMMAND:```bash\ngit status\n```"), "git status");
    }

    #[test]
    fn test_single_backticks() {
        assert_eq!(normalize("`ls -la`"), "ls -la");
        assert_eq!(normalize("command: `pwd`"), "pwd");
    }

    #[test]
    fn test_fence_without_tag() {
        assert_eq!(normalize("```\necho hi\n```"), "echo hi");
    }

    #[test]
    fn test_language_tag_must_be_whole_word() {
        assert_eq!(strip_fence("```shred -u secret```"), "shred -u secret");
        assert_eq!(strip_fence("```bashful```"), "bashful");
    }

    #[test]
    fn test_stage_order_matters() {
        // The fence only becomes visible once the label is gone
        assert_eq!(strip_fence("Command: ```ls```"), "Command: ```ls```");
        assert_eq!(strip_fence(strip_label("Command: ```ls```")), "ls");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let inputs = [
            "Command: ```sh\nls -la\n```",
            "``ls``",
            "```command: ls```",
            "`Command: echo ok`",
            "plain text",
            "",
        ];
        for input in inputs {
            let once = normalize(input);
            assert_eq!(normalize(&once), once, "input: {:?}", input);
        }
    }

    #[test]
    fn test_inner_backticks_survive() {
        assert_eq!(normalize("echo `date`"), "echo `date`");
    }

    #[test]
    fn test_wrap_round_trips() {
        assert_eq!(extract(&wrap("ls -la")), Some("ls -la"));
    }
}
