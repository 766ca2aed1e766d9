//! Command template substitution
//!
//! Templates use `{name}` placeholders. Substitution is a single pass: values
//! are inserted as-is and never rescanned, and any placeholder without a value
//! is an error rather than being left in the command.

use crate::error::{Result, SpoolError};
use std::collections::BTreeMap;

/// Node preparation: map the share, then run the site prep script
pub const SETUP_TEMPLATE: &str = "net use {net_drive} {net_share} && hpc-node-prep";

/// Node release: run the site release script, then drop the mapping
pub const CLEANUP_TEMPLATE: &str = "hpc-node-release & net use {net_drive} /delete /y";

/// Substitute `params` into `template`
///
/// `label` names the template in errors.
pub fn render_template(label: &str, template: &str, params: &BTreeMap<&str, String>) -> Result<String> {
    let mut out = String::with_capacity(template.len() + 64);
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| SpoolError::IncompleteTemplate {
            template: label.to_string(),
            placeholder: after.to_string(),
        })?;

        let key = &after[..close];
        let value = params.get(key).ok_or_else(|| SpoolError::IncompleteTemplate {
            template: label.to_string(),
            placeholder: key.to_string(),
        })?;
        out.push_str(value);
        rest = &after[close + 1..];
    }
    out.push_str(rest);

    Ok(out)
}
