//! Share lookup collaborators
//!
//! Resolving a drive letter to the share behind it is the operating system's
//! business. The resolver only sees the [`ShareLookup`] trait, so tests and
//! non-Windows submit hosts can plug in a fixed table.

use std::collections::BTreeMap;
use std::process::Command;

/// Maps a drive-letter path to the UNC root of the share backing it
pub trait ShareLookup {
    /// UNC root (`\\server\share`) for `path`, if its drive is a mapped share
    fn share_root(&self, path: &str) -> Option<String>;
}

impl<F> ShareLookup for F
where
    F: Fn(&str) -> Option<String>,
{
    fn share_root(&self, path: &str) -> Option<String> {
        self(path)
    }
}

/// Fixed drive letter to share table
#[derive(Debug, Clone, Default)]
pub struct StaticShareTable {
    shares: BTreeMap<char, String>,
}

impl StaticShareTable {
    /// Empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a mapping; `drive` may be `S`, `s:` or `S:\`
    pub fn with_share(mut self, drive: &str, unc_root: impl Into<String>) -> Self {
        if let Some(letter) = drive.chars().next().filter(char::is_ascii_alphabetic) {
            self.shares.insert(letter.to_ascii_uppercase(), unc_root.into());
        }
        self
    }

    /// Parse a `S:=\\server\share` mapping as given on the command line
    pub fn parse_mapping(mapping: &str) -> Result<(String, String), String> {
        let (drive, share) = mapping
            .split_once('=')
            .ok_or_else(|| format!("expected DRIVE=\\\\server\\share, got '{}'", mapping))?;
        let drive = drive.trim();
        let share = share.trim();
        let valid_drive = matches!(drive.len(), 1 | 2)
            && drive.starts_with(|c: char| c.is_ascii_alphabetic())
            && (drive.len() == 1 || drive.ends_with(':'));
        if !valid_drive {
            return Err(format!("invalid drive letter '{}'", drive));
        }
        if !share.starts_with(r"\\") {
            return Err(format!("share '{}' is not a UNC path", share));
        }
        Ok((drive.to_string(), share.to_string()))
    }

    /// Number of mappings
    pub fn len(&self) -> usize {
        self.shares.len()
    }

    /// Whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.shares.is_empty()
    }
}

impl ShareLookup for StaticShareTable {
    fn share_root(&self, path: &str) -> Option<String> {
        let letter = path.chars().next()?.to_ascii_uppercase();
        self.shares.get(&letter).cloned()
    }
}

/// Looks up mapped drives through the `net use` command
#[derive(Debug, Clone)]
pub struct NetUseLookup {
    program: String,
}

impl NetUseLookup {
    /// Lookup that runs `net use`
    pub fn new() -> Self {
        Self {
            program: "net".to_string(),
        }
    }

    /// Lookup that runs another program with the same output format
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn mappings(&self) -> BTreeMap<char, String> {
        match Command::new(&self.program).arg("use").output() {
            Ok(output) if output.status.success() => {
                parse_net_use(&String::from_utf8_lossy(&output.stdout))
            }
            Ok(output) => {
                tracing::debug!(
                    "{} use exited with {}: {}",
                    self.program,
                    output.status,
                    String::from_utf8_lossy(&output.stderr).trim()
                );
                BTreeMap::new()
            }
            Err(e) => {
                tracing::debug!("Unable to run {} use: {}", self.program, e);
                BTreeMap::new()
            }
        }
    }
}

impl Default for NetUseLookup {
    fn default() -> Self {
        Self::new()
    }
}

impl ShareLookup for NetUseLookup {
    fn share_root(&self, path: &str) -> Option<String> {
        let letter = path.chars().next()?.to_ascii_uppercase();
        self.mappings().remove(&letter)
    }
}

/// Tries `primary`, then `secondary` when one is configured
#[derive(Debug, Clone)]
pub struct FallbackLookup<A, B> {
    primary: A,
    secondary: Option<B>,
}

impl<A, B> FallbackLookup<A, B> {
    /// Chain two lookups
    pub fn new(primary: A, secondary: Option<B>) -> Self {
        Self { primary, secondary }
    }
}

impl<A: ShareLookup, B: ShareLookup> ShareLookup for FallbackLookup<A, B> {
    fn share_root(&self, path: &str) -> Option<String> {
        self.primary
            .share_root(path)
            .or_else(|| self.secondary.as_ref()?.share_root(path))
    }
}

/// Parse the drive table printed by `net use`
///
/// ```text
/// Status       Local     Remote                    Network
/// -------------------------------------------------------------------------------
/// OK           S:        \\fs01\projects           Microsoft Windows Network
/// Unavailable  Z:        \\fs02\render             Microsoft Windows Network
/// ```
pub fn parse_net_use(output: &str) -> BTreeMap<char, String> {
    let mut shares = BTreeMap::new();

    for line in output.lines() {
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let drive_at = tokens.iter().position(|t| {
            let b = t.as_bytes();
            b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
        });
        let Some(idx) = drive_at else { continue };
        let Some(remote) = tokens.get(idx + 1).filter(|r| r.starts_with(r"\\")) else {
            continue;
        };
        let letter = tokens[idx].as_bytes()[0].to_ascii_uppercase() as char;
        shares.insert(letter, remote.to_string());
    }

    shares
}
