//! Snapshot of the process environment.
//!
//! Settings read from a snapshot rather than `std::env` so resolution is a
//! pure function of its inputs.

use std::collections::HashMap;

/// Prefix shared by every environment variable gitcred reads.
pub const ENV_PREFIX: &str = "GITCRED_";

/// Environment variables visible to settings resolution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvVars {
    vars: HashMap<String, String>,
}

impl EnvVars {
    /// Capture the `GITCRED_*` variables of the current process.
    ///
    /// Variables whose name or value is not valid UTF-8 are skipped.
    pub fn from_process() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .filter(|(k, _)| k.starts_with(ENV_PREFIX))
            .collect();
        Self { vars }
    }

    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Value of `key`, treating an empty value as unset.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.vars
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_value_is_unset() {
        let env = EnvVars::from_pairs([("GITCRED_PROVIDER", ""), ("GITCRED_NAMESPACE", "work")]);
        assert_eq!(env.get("GITCRED_PROVIDER"), None);
        assert_eq!(env.get("GITCRED_NAMESPACE"), Some("work"));
        assert_eq!(env.get("GITCRED_MISSING"), None);
    }
}
