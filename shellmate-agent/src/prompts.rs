//! Prompt text sent to the model

use shellmate_core::protocol::{CLOSE_TAG, OPEN_TAG, SENTINEL};
use std::path::Path;

/// Initial context message for a chat session
pub fn system_prompt(cwd: &Path) -> String {
    format!(
        r#"You are a terminal assistant working in a user's shell.

When you need to run a shell command, put exactly one command between {open} and {close}, for example:
{open}ls -la{close}
The user will see the command and decide whether it runs. You will then receive its output (STDOUT/STDERR) or a note that the user declined.

Rules:
- One command per reply. Wait for its output before the next one.
- Use `cd <dir>` on its own to change directory; it persists for later commands.
- When the user's request is fully handled, reply with exactly {sentinel} and nothing else.
- If no command is needed, answer in plain text without the tags.

The current working directory is {cwd}."#,
        open = OPEN_TAG,
        close = CLOSE_TAG,
        sentinel = SENTINEL,
        cwd = cwd.display()
    )
}

/// One-shot prompt for suggest mode: no history, whole reply is the command
pub fn suggest_prompt(cwd: &Path, request: &str) -> String {
    format!(
        r#"You are a terminal assistant. The user will provide a request in natural language, and you will provide the corresponding shell command.
Reply with the command only.
The current working directory is {}.

User request: {}
Command:
"#,
        cwd.display(),
        request
    )
}
