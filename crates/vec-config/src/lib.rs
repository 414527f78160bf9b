//! Repository configuration.
//!
//! Parses the repository's `config` file, an INI-style text format:
//!
//! ```text
//! [core]
//!     repositoryformatversion = 0
//! [user]
//!     name = Jane Doe
//!     email = jane@example.com
//! ```
//!
//! Section and key names are case-insensitive (lowercased on parse); values
//! keep their case. Commit creation sources the author identity from the
//! `[user]` section.

use std::collections::BTreeMap;
use std::path::Path;

/// Errors from config parsing.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("malformed config line {line}: {content}")]
    MalformedLine { line: usize, content: String },

    #[error("unterminated section header at line {line}")]
    UnterminatedSection { line: usize },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Parsed repository configuration.
#[derive(Debug, Clone, Default)]
pub struct Config {
    values: BTreeMap<(String, String), String>,
}

impl Config {
    /// Parse a config file. A missing file is an empty config.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        match std::fs::read_to_string(path.as_ref()) {
            Ok(text) => Self::parse(&text),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Parse config text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut values = BTreeMap::new();
        let mut section = String::new();

        for (lineno, raw) in text.lines().enumerate() {
            let line = strip_comment(raw).trim();
            if line.is_empty() {
                continue;
            }

            if let Some(rest) = line.strip_prefix('[') {
                let inner = rest
                    .strip_suffix(']')
                    .ok_or(ConfigError::UnterminatedSection { line: lineno + 1 })?;
                section = inner.trim().to_lowercase();
                continue;
            }

            let (key, value) = line.split_once('=').ok_or(ConfigError::MalformedLine {
                line: lineno + 1,
                content: line.to_string(),
            })?;
            values.insert(
                (section.clone(), key.trim().to_lowercase()),
                value.trim().to_string(),
            );
        }

        Ok(Self { values })
    }

    /// Get a value by section and key (case-insensitive).
    pub fn get(&self, section: &str, key: &str) -> Option<&str> {
        self.values
            .get(&(section.to_lowercase(), key.to_lowercase()))
            .map(String::as_str)
    }

    /// Set a value (used when composing a fresh config at init).
    pub fn set(&mut self, section: &str, key: &str, value: impl Into<String>) {
        self.values
            .insert((section.to_lowercase(), key.to_lowercase()), value.into());
    }

    /// The commit identity from `[user]`: `"Name <email>"`.
    ///
    /// `None` when either field is missing; callers surface that as an
    /// error at commit time.
    pub fn user_identity(&self) -> Option<String> {
        let name = self.get("user", "name")?;
        let email = self.get("user", "email")?;
        Some(format!("{name} <{email}>"))
    }
}

fn strip_comment(line: &str) -> &str {
    match line.find(['#', ';']) {
        Some(pos) => &line[..pos],
        None => line,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
[core]
\trepositoryformatversion = 0
\tbare = false

[user]
\tname = Jane Doe
\temail = jane@example.com  # work address
";

    #[test]
    fn parse_sections_and_keys() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.get("core", "bare"), Some("false"));
        assert_eq!(config.get("user", "name"), Some("Jane Doe"));
        assert_eq!(config.get("user", "email"), Some("jane@example.com"));
    }

    #[test]
    fn lookup_is_case_insensitive() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(config.get("USER", "Name"), Some("Jane Doe"));
    }

    #[test]
    fn identity_formats_name_and_email() {
        let config = Config::parse(SAMPLE).unwrap();
        assert_eq!(
            config.user_identity(),
            Some("Jane Doe <jane@example.com>".to_string())
        );
    }

    #[test]
    fn identity_requires_both_fields() {
        let config = Config::parse("[user]\nname = Solo\n").unwrap();
        assert_eq!(config.user_identity(), None);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("config")).unwrap();
        assert_eq!(config.get("user", "name"), None);
    }

    #[test]
    fn comments_and_blanks_ignored() {
        let config = Config::parse("# top\n\n[a]\nx = 1 ; tail\n").unwrap();
        assert_eq!(config.get("a", "x"), Some("1"));
    }

    #[test]
    fn malformed_line_rejected() {
        assert!(matches!(
            Config::parse("[a]\njust a bare word\n"),
            Err(ConfigError::MalformedLine { line: 2, .. })
        ));
    }

    #[test]
    fn unterminated_section_rejected() {
        assert!(matches!(
            Config::parse("[core\n"),
            Err(ConfigError::UnterminatedSection { line: 1 })
        ));
    }

    #[test]
    fn set_then_get() {
        let mut config = Config::default();
        config.set("user", "name", "Robot");
        assert_eq!(config.get("user", "name"), Some("Robot"));
    }
}
