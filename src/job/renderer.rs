//! Supported renderers
//!
//! The renderer set is closed: each variant owns its command template and its
//! scheduling granularity. Nothing else in the crate branches on renderer
//! names.

use crate::error::{Result, SpoolError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Renderer that executes the sweep task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Renderer {
    /// 3ds Max command-line renderer
    Max,
    /// Maya batch render with RenderMan
    MayaRenderRman,
    /// Maya batch render with the software renderer
    MayaRenderSw,
}

/// Scheduling unit requested from the cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnitType {
    /// Whole nodes, no per-task core bounds
    Node,
    /// Individual cores
    Core,
}

// Render.exe rejects quoted remote paths, so none of these quote their arguments.
const CMD_3DSMAX_RENDER: &str =
    r"3dsmaxcmd.exe -frames=*-* -workPath:{node_project} -o:{output} -showRFW:0 {node_project}\{scene}";
const CMD_MAYA_RENDER_RMAN: &str =
    "Render.exe -n {threads} -r rman -s * -e * -proj {node_project} -rd {output} {scene}";
const CMD_MAYA_RENDER_SW: &str =
    "Render.exe -n {threads} -r sw -s * -e * -proj {node_project} -rd {output} {scene}";

impl Renderer {
    /// All known renderers
    pub const ALL: [Renderer; 3] = [Renderer::Max, Renderer::MayaRenderRman, Renderer::MayaRenderSw];

    /// Name used in job files and task environments
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Max => "max",
            Self::MayaRenderRman => "maya_render_rman",
            Self::MayaRenderSw => "maya_render_sw",
        }
    }

    /// Command template for the render sweep
    pub fn command_template(&self) -> &'static str {
        match self {
            Self::Max => CMD_3DSMAX_RENDER,
            Self::MayaRenderRman => CMD_MAYA_RENDER_RMAN,
            Self::MayaRenderSw => CMD_MAYA_RENDER_SW,
        }
    }

    /// Scheduling granularity
    pub fn unit_type(&self) -> UnitType {
        match self {
            Self::Max => UnitType::Node,
            Self::MayaRenderRman | Self::MayaRenderSw => UnitType::Core,
        }
    }

    /// Whether the sweep task carries explicit core bounds
    pub fn uses_core_bounds(&self) -> bool {
        self.unit_type() == UnitType::Core
    }
}

impl fmt::Display for Renderer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Renderer {
    type Err = SpoolError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|r| r.as_str() == s.trim())
            .ok_or_else(|| {
                SpoolError::parse(
                    "renderer",
                    format!(
                        "unknown renderer '{}' (expected one of: max, maya_render_rman, maya_render_sw)",
                        s.trim()
                    ),
                )
            })
    }
}

impl fmt::Display for UnitType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Node => f.write_str("Node"),
            Self::Core => f.write_str("Core"),
        }
    }
}
