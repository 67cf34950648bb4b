//! Terminal prompts.
//!
//! Prompts go to stderr and answers come from the controlling terminal,
//! since stdin and stdout carry the credential protocol.

use std::io::{BufRead, BufReader, Write};

use async_trait::async_trait;
use gitcred_core::{Credential, Error, OAuthMode, Prompts, Result};
use gitcred_oauth::DeviceCodeResult;
use url::Url;

#[cfg(unix)]
const TTY_PATH: &str = "/dev/tty";
#[cfg(windows)]
const TTY_PATH: &str = "CONIN$";

#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompts;

fn read_tty_line(prompt: &str) -> Result<String> {
    eprint!("{}", prompt);
    std::io::stderr()
        .flush()
        .map_err(|e| Error::Configuration(format!("cannot write prompt: {}", e)))?;

    let tty = std::fs::File::open(TTY_PATH)
        .map_err(|e| Error::Configuration(format!("no terminal available for prompting: {}", e)))?;
    let mut line = String::new();
    BufReader::new(tty)
        .read_line(&mut line)
        .map_err(|e| Error::Configuration(format!("cannot read from terminal: {}", e)))?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Run a blocking terminal interaction off the async runtime.
async fn blocking<T, F>(f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Configuration(format!("prompt task failed: {}", e)))?
}

#[async_trait]
impl Prompts for TerminalPrompts {
    async fn select_oauth_mode(&self, remote: &Url, modes: &[OAuthMode]) -> Result<OAuthMode> {
        let modes = modes.to_vec();
        let remote = remote.clone();
        blocking(move || {
            eprintln!("Select an authentication method for {}:", remote);
            for (i, mode) in modes.iter().enumerate() {
                eprintln!("  {}. {}", i + 1, mode);
            }
            loop {
                let answer = read_tty_line("option (enter for default): ")?;
                if answer.trim().is_empty() {
                    return Ok(modes[0]);
                }
                match answer.trim().parse::<usize>() {
                    Ok(n) if (1..=modes.len()).contains(&n) => return Ok(modes[n - 1]),
                    _ => eprintln!("Please enter a number between 1 and {}.", modes.len()),
                }
            }
        })
        .await
    }

    async fn show_device_code(&self, device: &DeviceCodeResult) -> Result<()> {
        eprintln!(
            "To complete authentication please visit {} and enter the code: {}",
            device.verification_uri, device.user_code
        );
        if let Some(complete) = &device.verification_uri_complete {
            eprintln!("Or open {}", complete);
        }
        Ok(())
    }

    async fn basic_credentials(&self, remote: &Url, username: Option<&str>) -> Result<Credential> {
        let remote = remote.clone();
        let username = username.map(str::to_string);
        blocking(move || {
            eprintln!("Enter credentials for {}", remote);
            let username = match username.filter(|u| !u.is_empty()) {
                Some(username) => username,
                None => read_tty_line("Username: ")?,
            };
            let password = rpassword::prompt_password("Password: ")
                .map_err(|e| Error::Configuration(format!("cannot read password: {}", e)))?;
            Ok(Credential::new(username, password))
        })
        .await
    }
}
