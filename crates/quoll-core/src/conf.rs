//! PBS configuration file (pbs.conf) handling.

use camino::{Utf8Path, Utf8PathBuf};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfError {
    #[error("Unable to read PBS config file {path}: {source}")]
    Unreadable {
        path: Utf8PathBuf,
        source: std::io::Error,
    },
    #[error("PBS_EXEC is not set in {0} or the environment")]
    NoPbsExec(Utf8PathBuf),
}

/// Parsed pbs.conf entries.
///
/// PBS installations conventionally export every pbs.conf entry into the
/// process environment at startup. Here the entries are held in an explicit
/// object and threaded into the qstat and qsub paths instead, with the
/// process environment as a read-only fallback for keys the file omits.
#[derive(Debug, Clone)]
pub struct PbsConf {
    path: Utf8PathBuf,
    entries: BTreeMap<String, String>,
}

impl PbsConf {
    /// Conventional pbs.conf location, honoring `PBS_CONF_FILE`.
    pub fn default_path() -> Utf8PathBuf {
        if let Ok(path) = std::env::var("PBS_CONF_FILE") {
            return Utf8PathBuf::from(path);
        }
        if cfg!(windows) {
            Utf8PathBuf::from(r"C:\Program Files\PBS Pro\pbs.conf")
        } else {
            Utf8PathBuf::from("/etc/pbs.conf")
        }
    }

    /// Read and parse a pbs.conf file.
    ///
    /// An unreadable file is an error: nothing downstream can locate the
    /// scheduler tools without it.
    pub fn load(path: &Utf8Path) -> Result<Self, ConfError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfError::Unreadable {
            path: path.to_owned(),
            source,
        })?;
        Ok(Self::parse(path, &text))
    }

    /// Parse `KEY=VALUE` lines.
    ///
    /// Only lines that split into exactly two parts on `=` are kept; values
    /// have trailing whitespace trimmed. Everything else (comments, blank
    /// lines, stray text) is skipped without complaint.
    pub fn parse(path: &Utf8Path, text: &str) -> Self {
        let mut entries = BTreeMap::new();
        for line in text.lines() {
            let parts: Vec<&str> = line.split('=').collect();
            if let [key, value] = parts[..] {
                entries.insert(key.to_string(), value.trim_end().to_string());
            }
        }
        Self {
            path: path.to_owned(),
            entries,
        }
    }

    /// Path this configuration was loaded from.
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    /// Entry from the file, if present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    /// File entry first, process environment second.
    pub fn lookup(&self, key: &str) -> Option<String> {
        self.entries
            .get(key)
            .cloned()
            .or_else(|| std::env::var(key).ok())
    }

    /// Location of the qstat binary under the PBS installation root.
    pub fn qstat_path(&self) -> Result<Utf8PathBuf, ConfError> {
        let exec = self
            .lookup("PBS_EXEC")
            .ok_or_else(|| ConfError::NoPbsExec(self.path.clone()))?;
        Ok(Utf8PathBuf::from(exec).join("bin").join("qstat"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_key_values() {
        let text = "PBS_EXEC=/opt/pbs \nPBS_SERVER=gadi-pbs\n";
        let conf = PbsConf::parse(Utf8Path::new("/etc/pbs.conf"), text);
        assert_eq!(conf.get("PBS_EXEC"), Some("/opt/pbs"));
        assert_eq!(conf.get("PBS_SERVER"), Some("gadi-pbs"));
    }

    #[test]
    fn test_parse_skips_malformed_lines() {
        let text = "# PBS installation\n\nPBS_HOME=/var/spool/pbs\nnot a setting\nA=B=C\n";
        let conf = PbsConf::parse(Utf8Path::new("/etc/pbs.conf"), text);
        assert_eq!(conf.get("PBS_HOME"), Some("/var/spool/pbs"));
        assert_eq!(conf.get("# PBS installation"), None);
        assert_eq!(conf.get("not a setting"), None);
        // Lines with more than one `=` don't split cleanly and are dropped
        assert_eq!(conf.get("A"), None);
    }

    #[test]
    fn test_qstat_path() {
        let conf = PbsConf::parse(Utf8Path::new("/etc/pbs.conf"), "PBS_EXEC=/opt/pbs\n");
        assert_eq!(
            conf.qstat_path().unwrap(),
            Utf8PathBuf::from("/opt/pbs/bin/qstat")
        );
    }

    #[test]
    fn test_load_missing_file() {
        let err = PbsConf::load(Utf8Path::new("/nonexistent/pbs.conf")).unwrap_err();
        assert!(matches!(err, ConfError::Unreadable { .. }));
    }
}
