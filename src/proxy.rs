//! Resolution of the monitored proxy's configuration file.
//!
//! A Zabbix proxy keeps its settings in a plain-text file with one
//! `Key Value` assignment per line. The exporter only cares about two of
//! them: `DBName` (where the SQLite database lives) and `Hostname` (how the
//! proxy identifies itself to its server). Everything else is ignored, and
//! none of the line-scanning quirks leak past [`ProxySettings`].

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Errors resolving the proxy configuration. Both are fatal at startup:
/// without a database path the exporter has nothing to scrape.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed to read proxy config '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no DBName entry in proxy config '{}'", .0.display())]
    MissingDbPath(PathBuf),
}

/// Immutable per-process settings extracted from the proxy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Path to the proxy's SQLite database.
    pub db_path: PathBuf,
    /// Identity label attached to every exported sample.
    pub hostname: String,
}

impl ProxySettings {
    /// Resolve settings from a proxy configuration file.
    ///
    /// A missing `Hostname` entry falls back to the local machine's
    /// hostname; a missing `DBName` entry is an error.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ResolveError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    fn parse(content: &str, path: &Path) -> Result<Self, ResolveError> {
        let mut db_path = None;
        let mut hostname = None;

        for line in content.lines() {
            let line = line.trim();
            if line.starts_with('#') {
                continue;
            }
            if let Some(value) = key_value(line, "DBName") {
                db_path = Some(PathBuf::from(value));
            } else if let Some(value) = key_value(line, "Hostname") {
                hostname = Some(value.to_string());
            }
        }

        let db_path = db_path.ok_or_else(|| ResolveError::MissingDbPath(path.to_path_buf()))?;

        Ok(Self {
            db_path,
            hostname: hostname.unwrap_or_else(local_hostname),
        })
    }
}

/// Extract the value of a `Key Value` line, or `None` if the line is for a
/// different key. The key must be followed by whitespace, so `Hostname`
/// does not match a `HostnameItem` line.
fn key_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let rest = line.strip_prefix(key)?;
    if !rest.starts_with(|c: char| c.is_whitespace()) {
        return None;
    }
    let value = rest.trim();
    (!value.is_empty()).then_some(value)
}

/// The local machine's hostname, used when the proxy config carries no
/// `Hostname` override.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_resolve_db_path_and_hostname() {
        let file = write_config("DBName /var/lib/zabbix/zabbix_proxy.db\nHostname myproxy\n");
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(
            settings.db_path,
            PathBuf::from("/var/lib/zabbix/zabbix_proxy.db")
        );
        assert_eq!(settings.hostname, "myproxy");
    }

    #[test]
    fn test_commented_lines_are_ignored() {
        let file = write_config(
            "# DBName /tmp/wrong.db\nDBName /tmp/right.db\n# Hostname commented-out\n",
        );
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/tmp/right.db"));
        assert_eq!(settings.hostname, local_hostname());
    }

    #[test]
    fn test_hostname_falls_back_to_local() {
        let file = write_config("DBName /tmp/proxy.db\n");
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(settings.hostname, local_hostname());
        assert!(!settings.hostname.is_empty());
    }

    #[test]
    fn test_missing_db_path_is_an_error() {
        let file = write_config("Hostname myproxy\nLogFile /tmp/proxy.log\n");
        let err = ProxySettings::from_file(file.path()).unwrap_err();

        assert!(matches!(err, ResolveError::MissingDbPath(_)));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let err = ProxySettings::from_file("/nonexistent/zabbix_proxy.conf").unwrap_err();

        assert!(matches!(err, ResolveError::Io { .. }));
    }

    #[test]
    fn test_prefix_keys_do_not_match() {
        // HostnameItem shares a prefix with Hostname and must not hijack it.
        let file = write_config("DBName /tmp/proxy.db\nHostnameItem system.hostname\n");
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(settings.hostname, local_hostname());
    }

    #[test]
    fn test_surrounding_whitespace_is_stripped() {
        let file = write_config("  DBName   /tmp/proxy.db  \n  Hostname\tmyproxy \n");
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/tmp/proxy.db"));
        assert_eq!(settings.hostname, "myproxy");
    }

    #[test]
    fn test_last_assignment_wins() {
        let file = write_config("DBName /tmp/old.db\nDBName /tmp/new.db\n");
        let settings = ProxySettings::from_file(file.path()).unwrap();

        assert_eq!(settings.db_path, PathBuf::from("/tmp/new.db"));
    }
}
