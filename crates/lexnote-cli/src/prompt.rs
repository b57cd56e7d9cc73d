//! Interactive confirmation prompt

use anyhow::Result;
use std::io::{self, Write};

/// Ask a yes/no question, defaulting to no.
///
/// Returns false without prompting when stdin is not a TTY, so piped
/// invocations never hang on a destructive command.
pub fn confirm(prompt: &str) -> Result<bool> {
    if !atty::is(atty::Stream::Stdin) {
        return Ok(false);
    }

    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;

    let input = input.trim().to_lowercase();
    Ok(input == "y" || input == "yes")
}
