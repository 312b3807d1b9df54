//! Operation summaries and the `Continue? [Y/n]` gate.

use crate::sites::SiteMapping;
use crate::{Error, Result};
use std::io::{self, BufRead, Write};

/// How the selected sites are listed in a summary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Remote alias only.
    RemoteOnly,
    /// `remote => local`, warning when not reading from the default env.
    RemoteToLocal,
    /// Local URL only.
    LocalOnly,
}

/// Render the list of operations and the sites they apply to.
pub fn site_summary(operations: &[String], sites: &[SiteMapping], direction: Direction) -> Result<String> {
    let mut out = operations_block(operations)?;
    out.push_str("Sites to perform the operations on:\n");

    for site in sites {
        let line = match direction {
            Direction::RemoteOnly => site.remote_alias.clone(),
            Direction::LocalOnly => site.local_url.clone(),
            Direction::RemoteToLocal if site.remote_is_default => {
                format!("{} => {}", site.remote_alias, site.local_url)
            }
            Direction::RemoteToLocal => format!(
                "{} => {} | [warning] Operating from non-default environment.",
                site.remote_alias, site.local_url
            ),
        };
        out.push_str(&format!("  * {}\n", line));
    }

    out.push_str("To modify the set of sites, edit [multisites] in the configuration file.\n");
    Ok(out)
}

/// Render the list of operations for a whole environment.
pub fn environment_summary(operations: &[String], target_env: &str) -> Result<String> {
    let mut out = operations_block(operations)?;
    out.push_str("Environment to perform the operations on:\n");
    out.push_str(&format!("  * {}\n", target_env));
    Ok(out)
}

fn operations_block(operations: &[String]) -> Result<String> {
    if operations.is_empty() {
        return Err(Error::config("You have not selected any operations to perform!"));
    }
    let mut out = String::from("Operations to be performed:\n");
    for operation in operations {
        out.push_str(&format!("  * {}\n", operation));
    }
    Ok(out)
}

/// Confirmation gate; `assume_yes` comes from `--yes`.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    assume_yes: bool,
}

impl Prompt {
    pub fn new(assume_yes: bool) -> Self {
        Self { assume_yes }
    }

    /// Print `summary` and ask on the terminal.
    pub fn confirm(&self, summary: &str) -> Result<bool> {
        let stdin = io::stdin();
        self.confirm_with(summary, &mut stdin.lock(), &mut io::stdout())
    }

    /// Empty input means yes.
    pub fn confirm_with<R: BufRead, W: Write>(&self, summary: &str, input: &mut R, output: &mut W) -> Result<bool> {
        write!(output, "{}", summary)?;
        if self.assume_yes {
            writeln!(output, "Continue? [Y/n] y")?;
            return Ok(true);
        }

        write!(output, "Continue? [Y/n] ")?;
        output.flush()?;

        let mut answer = String::new();
        input.read_line(&mut answer)?;
        Ok(matches!(answer.trim().to_lowercase().as_str(), "" | "y" | "yes"))
    }
}
