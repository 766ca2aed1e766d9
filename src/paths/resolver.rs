//! Scene path to network location resolution

use super::share::ShareLookup;
use super::unc_root_len;
use crate::error::{Result, SpoolError};
use serde::{Deserialize, Serialize};

/// Drive mapped on the nodes when the scene path is already UNC
pub const DEFAULT_NET_DRIVE: &str = "Z:";

/// Where the nodes find a job's inputs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkLocation {
    /// UNC root of the share, always starting with `\\`
    pub net_share: String,
    /// Drive the share is mapped to on each node, always `X:`
    pub net_drive: String,
}

/// Derives the share and node drive for a local path
#[derive(Debug, Clone)]
pub struct PathResolver<L> {
    lookup: L,
    default_drive: String,
}

impl<L: ShareLookup> PathResolver<L> {
    /// Resolver using `lookup` for drive-letter paths
    pub fn new(lookup: L) -> Self {
        Self {
            lookup,
            default_drive: DEFAULT_NET_DRIVE.to_string(),
        }
    }

    /// Set the node drive used for UNC paths
    pub fn with_default_drive(mut self, drive: &str) -> Result<Self> {
        self.default_drive = normalize_drive(drive).ok_or_else(|| {
            SpoolError::unresolved(drive, "default drive must be a single letter followed by ':'")
        })?;
        Ok(self)
    }

    /// Node drive used for UNC paths
    pub fn default_drive(&self) -> &str {
        &self.default_drive
    }

    /// Resolve `path` to a share and a node drive
    ///
    /// UNC paths are split locally. Drive-letter paths go through the share
    /// lookup, whose answer is used verbatim.
    pub fn resolve(&self, path: &str) -> Result<NetworkLocation> {
        let path = path.trim();

        if let Some(len) = unc_root_len(path) {
            let net_share = path[..len].replace('/', "\\");
            tracing::debug!("{} is on share {}", path, net_share);
            return Ok(NetworkLocation {
                net_share,
                net_drive: self.default_drive.clone(),
            });
        }

        if path.starts_with(['\\', '/']) {
            return Err(SpoolError::unresolved(path, "malformed UNC path"));
        }

        let net_drive = drive_prefix(path)
            .ok_or_else(|| SpoolError::unresolved(path, "not a UNC or drive-letter path"))?;

        let net_share = self
            .lookup
            .share_root(path)
            .ok_or_else(|| SpoolError::unresolved(path, format!("drive {} is not a mapped share", net_drive)))?;

        if !net_share.starts_with(r"\\") {
            return Err(SpoolError::unresolved(
                path,
                format!("share lookup returned '{}', which is not a UNC path", net_share),
            ));
        }

        tracing::debug!("{} is on share {} via {}", path, net_share, net_drive);
        Ok(NetworkLocation { net_share, net_drive })
    }
}

/// `S:` for `s:\...` or `S:/...`
fn drive_prefix(path: &str) -> Option<String> {
    let b = path.as_bytes();
    let is_drive = b.len() >= 2 && b[0].is_ascii_alphabetic() && b[1] == b':';
    let rooted = b.len() == 2 || matches!(b.get(2), Some(b'\\') | Some(b'/'));
    (is_drive && rooted).then(|| format!("{}:", (b[0] as char).to_ascii_uppercase()))
}

fn normalize_drive(drive: &str) -> Option<String> {
    let drive = drive.trim().trim_end_matches(['\\', '/']);
    let b = drive.as_bytes();
    let ok = b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':';
    ok.then(|| drive.to_ascii_uppercase())
}
