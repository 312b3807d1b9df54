//! `ac auth`: store, show and verify Cloud API credentials.

use crate::api::cloud::credentials::CloudCredentials;
use crate::api::CloudClient;
use crate::config::Config;
use crate::{Error, Result};
use std::io::{self, BufRead, Write};
use std::path::Path;
use tracing::info;

pub const TOKENS_URL: &str = "https://cloud.acquia.com/app/profile/tokens";

/// Ask until a non-empty answer arrives; EOF is an error.
pub fn ask_required<R: BufRead, W: Write>(question: &str, input: &mut R, output: &mut W) -> Result<String> {
    loop {
        write!(output, "{} ", question)?;
        output.flush()?;
        let mut answer = String::new();
        if input.read_line(&mut answer)? == 0 {
            return Err(Error::Aborted(format!("No answer to \"{}\"", question)));
        }
        let answer = answer.trim();
        if !answer.is_empty() {
            return Ok(answer.to_string());
        }
    }
}

/// Write the credentials file, asking for whatever was not given.
pub fn set<R: BufRead, W: Write>(
    file: &Path,
    key: Option<&str>,
    secret: Option<&str>,
    input: &mut R,
    output: &mut W,
) -> Result<i32> {
    writeln!(output, "You may generate new API tokens at {}", TOKENS_URL)?;
    let key = match key.filter(|k| !k.is_empty()) {
        Some(key) => key.to_string(),
        None => ask_required("Please enter your Acquia cloud API key:", input, output)?,
    };
    let secret = match secret.filter(|s| !s.is_empty()) {
        Some(secret) => secret.to_string(),
        None => ask_required("Please enter your Acquia cloud API secret:", input, output)?,
    };

    CloudCredentials {
        key,
        secret,
        source: None,
    }
    .write_to_file(file)?;

    writeln!(output, "Successfully saved configuration to {}", file.display())?;
    Ok(0)
}

/// Interactive variant of [`set`] on the terminal.
pub fn set_interactive(file: &Path, key: Option<&str>, secret: Option<&str>) -> Result<i32> {
    let stdin = io::stdin();
    set(file, key, secret, &mut stdin.lock(), &mut io::stdout())
}

/// Print which source the credentials resolve from. The secret is masked.
pub fn get(file: &Path) -> Result<i32> {
    match CloudCredentials::resolve(None, None, file) {
        Ok(credentials) => {
            let source = credentials
                .source
                .as_ref()
                .map(ToString::to_string)
                .unwrap_or_default();
            println!("key: {}", credentials.key);
            println!("secret: {}", mask(&credentials.secret));
            println!("source: {}", source);
            Ok(0)
        }
        Err(e) => {
            println!("You are not authenticated to Acquia Cloud! {}", e);
            Ok(1)
        }
    }
}

/// Verify credentials by listing applications.
pub async fn check(config: &Config, key: Option<&str>, secret: Option<&str>) -> Result<i32> {
    let credentials = match CloudCredentials::resolve(key, secret, &config.cloud_credentials_file()?) {
        Ok(credentials) => credentials,
        Err(e) => {
            println!("You are not authenticated to Acquia Cloud! {}", e);
            return Ok(1);
        }
    };

    let client = CloudClient::new(&config.cloud.base_url, config.cloud.app_id.clone(), &credentials)?;
    match client.applications().await {
        Ok(applications) => {
            info!("Credentials can see {} application(s)", applications.len());
            println!("Successfully authenticated!");
            Ok(0)
        }
        Err(e) => {
            println!("Failed to authenticate! Message: {}", e);
            Ok(1)
        }
    }
}

fn mask(secret: &str) -> String {
    let visible: String = secret.chars().take(4).collect();
    format!("{}{}", visible, "*".repeat(secret.chars().count().saturating_sub(4)))
}
