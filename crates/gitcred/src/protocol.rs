//! Git credential helper wire format.
//!
//! Requests are `key=value` lines ended by a blank line or EOF. Responses
//! are `username=` and `password=` lines.

use std::io::{BufRead, Write};

use anyhow::{Result, bail};
use gitcred_core::{Credential, RequestInput};

/// A parsed request. Unknown attributes are kept but not interpreted.
#[derive(Debug, Default)]
pub struct WireRequest {
    pub input: RequestInput,
    pub extra: Vec<(String, String)>,
}

pub fn read_request(reader: impl BufRead) -> Result<WireRequest> {
    let mut request = WireRequest::default();

    for line in reader.lines() {
        let line = line?;
        let line = line.strip_suffix('\r').unwrap_or(&line);
        if line.is_empty() {
            break;
        }

        let Some((key, value)) = line.split_once('=') else {
            bail!("invalid credential line: '{}'", line);
        };
        let input = std::mem::take(&mut request.input);
        request.input = match key {
            "protocol" => input.with_protocol(value),
            "host" => input.with_host(value),
            "path" => input.with_path(value),
            "username" => input.with_username(value),
            "password" => input.with_password(value),
            _ => {
                tracing::debug!(key = key, "Ignoring unknown credential attribute");
                request.extra.push((key.to_string(), value.to_string()));
                input
            }
        };
    }

    Ok(request)
}

pub fn write_credential(writer: &mut impl Write, credential: &Credential) -> Result<()> {
    let fields = [
        ("username", &credential.username),
        ("password", &credential.password),
    ];
    if let Some((key, _)) = fields.iter().find(|(_, v)| v.contains(['\n', '\0'])) {
        bail!("credential {} contains a newline or NUL", key);
    }
    for (key, value) in fields {
        writeln!(writer, "{}={}", key, value)?;
    }
    writer.flush()?;
    Ok(())
}
