//! `git commit-msgs`: lint commit subjects of a branch against a regex.

use crate::config::GitConfig;
use crate::utils::shell;
use crate::{Error, Result};
use regex::Regex;
use std::process::Command;
use tracing::{error, info, warn};

pub const DEFAULT_PATTERN: &str =
    r#"^(?:(?:DR|ECOMRP|BECK|WT)-[0-9]+)(?:, (?:DR|ECOMRP|BECK|WT)-[0-9]+)*:? .+$|^Revert ".+""#;

const SMART_COMMITS_URL: &str = "https://confluence.atlassian.com/bitbucket/use-smart-commits-298979931.html";

pub struct CommitChecker {
    pattern: String,
    regex: Regex,
}

impl CommitChecker {
    /// Accepts a bare regex or a PHP-style `/…/flags` pattern.
    pub fn new(pattern: &str) -> Result<Self> {
        let translated = strip_delimiters(pattern)?;
        let regex = Regex::new(&translated)
            .map_err(|e| Error::config(format!("Invalid commit message pattern {}: {}", pattern, e)))?;
        Ok(Self {
            pattern: pattern.to_string(),
            regex,
        })
    }

    pub fn from_config(config: &GitConfig) -> Result<Self> {
        Self::new(config.commit_msg_pattern.as_deref().unwrap_or(DEFAULT_PATTERN))
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn is_valid(&self, subject: &str) -> bool {
        self.regex.is_match(subject)
    }
}

/// `/body/flags` → `(?flags)body`. Anything not opening with a delimiter is
/// returned unchanged.
fn strip_delimiters(pattern: &str) -> Result<String> {
    let Some(delimiter) = pattern.chars().next().filter(|c| matches!(c, '/' | '#' | '~' | '!' | '@' | '%')) else {
        return Ok(pattern.to_string());
    };
    let Some(end) = pattern.rfind(delimiter).filter(|&end| end > 0) else {
        return Ok(pattern.to_string());
    };

    let body = &pattern[1..end];
    let mut flags = String::new();
    for flag in pattern[end + 1..].chars() {
        match flag {
            'i' | 'm' | 's' | 'x' => flags.push(flag),
            'u' | 'D' => {}
            other => {
                return Err(Error::config(format!(
                    "Unsupported modifier '{}' in commit message pattern {}",
                    other, pattern
                )))
            }
        }
    }

    if flags.is_empty() {
        Ok(body.to_string())
    } else {
        Ok(format!("(?{}){}", flags, body))
    }
}

/// One line of `git log --pretty=format:%h:%p:%s`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub hash: String,
    pub parents: String,
    pub subject: String,
}

impl Commit {
    pub fn parse(line: &str) -> Option<Self> {
        let mut parts = line.splitn(3, ':');
        Some(Self {
            hash: parts.next()?.to_string(),
            parents: parts.next()?.to_string(),
            subject: parts.next()?.to_string(),
        })
    }

    /// Merge commits list more than one abbreviated parent.
    pub fn is_merge(&self) -> bool {
        self.parents.contains(' ')
    }
}

#[derive(Debug, Default)]
pub struct CommitReport {
    pub invalid: Vec<Commit>,
    pub has_merges: bool,
    pub total: usize,
}

pub fn check_commits(checker: &CommitChecker, commits: &[Commit]) -> CommitReport {
    let mut report = CommitReport {
        total: commits.len(),
        ..Default::default()
    };

    for commit in commits {
        if commit.is_merge() {
            report.has_merges = true;
            continue;
        }
        if !checker.is_valid(&commit.subject) {
            report.invalid.push(commit.clone());
        }
    }

    report
}

fn remediation(config: &GitConfig, checker: &CommitChecker, report: &CommitReport, branch: &str) -> Vec<String> {
    let mut lines = vec![format!("Commit messages must conform to the regex {}", checker.pattern())];
    if let Some(help) = config.commit_msg_help.as_deref().filter(|h| !h.is_empty()) {
        lines.push(help.to_string());
    }
    if let Some(example) = config.commit_msg_example.as_deref().filter(|e| !e.is_empty()) {
        lines.push(format!("Example: {}", example));
    }

    if report.has_merges {
        lines.push(
            "Since the branch has merge commits it will be difficult to rename commits. \
             If you are good with rebasing and resolving conflicts, try rebasing onto develop:"
                .to_string(),
        );
        lines.push("  git rebase -i develop".to_string());
        lines.push("After resolving any conflicts, force push your branch:".to_string());
        lines.push(format!("  git push origin +{}", branch));
        lines.push("Otherwise, work with the technical lead or release manager to proceed with merging this PR.".to_string());
    } else {
        lines.push("Please fix the commit messages by rebasing and following the prompts:".to_string());
        lines.push(format!("  git rebase -i HEAD~{}", report.total));
        lines.push("After renaming the commits, force push your branch:".to_string());
        lines.push(format!("  git push origin +{}", branch));
    }

    lines
}

/// Lint every commit on `branch` that is not on `compare`. Exit 1 when any
/// non-merge subject fails the pattern.
pub fn commit_msgs(config: &GitConfig, branch: &str, compare: &str) -> Result<i32> {
    let checker = CommitChecker::from_config(config)?;

    info!("Getting a list of git messages...");
    let mut log = Command::new("git");
    log.arg("log")
        .arg(branch)
        .arg("--pretty=format:%h:%p:%s")
        .arg("--not")
        .arg(compare);
    let commits: Vec<Commit> = shell::output_lines(&mut log)
        .map_err(|e| Error::Command(format!("Could not get a list of commits: {}", e)))?
        .iter()
        .filter_map(|line| Commit::parse(line))
        .collect();

    let report = check_commits(&checker, &commits);
    if report.invalid.is_empty() {
        println!("No commit message errors found.");
        return Ok(0);
    }

    error!("Invalid commit messages!");
    for commit in &report.invalid {
        warn!("{} {}", commit.hash, commit.subject);
    }
    for line in remediation(config, &checker, &report, branch) {
        println!("{}", line);
    }
    info!("See {} for details on using smart commit messages.", SMART_COMMITS_URL);

    Ok(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_pattern_accepts_ticket_subjects() {
        let checker = CommitChecker::new(DEFAULT_PATTERN).unwrap();
        for subject in [
            "DR-123 This is a valid message",
            "DR-123: This is a valid message",
            "DR-101, DR-102 This is a valid message",
            "ECOMRP-123: This is a valid message",
            "BECK-101, BECK-102 This is a valid message",
            "Revert \"DR-123: This is a valid message\"",
            "WT-34, WT-58: This is a valid message\"",
        ] {
            assert!(checker.is_valid(subject), "{}", subject);
        }
    }

    #[test]
    fn test_default_pattern_rejects_malformed_subjects() {
        let checker = CommitChecker::new(DEFAULT_PATTERN).unwrap();
        for subject in [
            "DR123 This is not a valid message",
            "This is not a valid message DR-123",
            "DR-123DR-123 This is not a valid message",
            "DR-123|DR-123 This is not a valid message",
            "DR-123:DR-123 This is not a valid message",
            "WT-123:WT-123 This is not a valid message",
        ] {
            assert!(!checker.is_valid(subject), "{}", subject);
        }
    }

    #[test]
    fn test_php_delimiters_and_flags() {
        let checker = CommitChecker::new("/^dr-[0-9]+ .+$/i").unwrap();
        assert!(checker.is_valid("DR-1 Fix"));
        assert!(!checker.is_valid("Fix"));
        assert_eq!(checker.pattern(), "/^dr-[0-9]+ .+$/i");

        assert_eq!(strip_delimiters("^plain$").unwrap(), "^plain$");
        assert!(CommitChecker::new("/x/e").is_err());
    }

    #[test]
    fn test_merge_commits_are_skipped() {
        let checker = CommitChecker::new(DEFAULT_PATTERN).unwrap();
        let commits: Vec<Commit> = [
            "31508b0:26d8163:DR-1223: add link button",
            "26d8163:f875f0e cf09c6f:Merge pull request #723 from fork/DR-906",
            "f875f0e:aa11bb2:fix typo: again",
        ]
        .iter()
        .filter_map(|line| Commit::parse(line))
        .collect();

        let report = check_commits(&checker, &commits);
        assert!(report.has_merges);
        assert_eq!(report.total, 3);
        assert_eq!(report.invalid.len(), 1);
        assert_eq!(report.invalid[0].subject, "fix typo: again");

        let advice = remediation(&GitConfig::default(), &checker, &report, "feature/x");
        assert!(advice.iter().any(|l| l == "  git rebase -i develop"));
        assert!(advice.iter().any(|l| l == "  git push origin +feature/x"));
    }

    #[test]
    fn test_parse_rejects_short_lines() {
        assert_eq!(Commit::parse("abc"), None);
    }
}
