//! Job description to task graph

use super::task::{CoreBounds, Dependency, IoRedirect, JobGraph, SweepRange, Task, TaskKind, Trigger};
use super::template::{render_template, CLEANUP_TEMPLATE, SETUP_TEMPLATE};
use crate::error::{Result, SpoolError};
use crate::job::JobSpec;
use crate::paths::{parent_dir, split_drive, win_join, NetworkLocation, PathResolver, ShareLookup};
use std::collections::BTreeMap;
use std::env;

/// Node-local directory under which each job gets a private folder
pub const DEFAULT_NODE_JOB_DIR: &str = r"D:\hpc";

/// Upper bound for per-frame render threads
pub const DEFAULT_MAX_THREADS: u32 = 64;

/// Debug flags copied into task environments only when the submitter sets them
const PROPAGATED_FLAGS: [&str; 2] = ["RRT_DEBUG", "RRT_USE_DESMOND"];

/// Submit-side inputs to graph construction that do not come from the job file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildSettings {
    /// Node-local parent of the per-job directories
    pub node_job_dir: String,
    /// Submitting user
    pub owner: String,
    /// Thread clamp for core-granularity renderers
    pub max_threads: u32,
    /// Debug flags set in the submitting environment
    pub debug_flags: BTreeMap<String, String>,
    /// Submitter's `MAYA_SCRIPT_PATH`, appended after the job scripts dir
    pub inherited_script_path: String,
}

impl BuildSettings {
    /// Settings with no inherited environment
    pub fn new(owner: impl Into<String>) -> Self {
        Self {
            node_job_dir: DEFAULT_NODE_JOB_DIR.to_string(),
            owner: owner.into(),
            max_threads: DEFAULT_MAX_THREADS,
            debug_flags: BTreeMap::new(),
            inherited_script_path: String::new(),
        }
    }

    /// Settings taken from the submitting process environment
    pub fn from_env() -> Self {
        let mut settings = Self::new(current_user());
        for flag in PROPAGATED_FLAGS {
            if let Some(value) = env::var(flag).ok().filter(|v| !v.is_empty()) {
                settings.debug_flags.insert(flag.to_string(), value);
            }
        }
        settings.inherited_script_path = env::var("MAYA_SCRIPT_PATH").unwrap_or_default();
        settings
    }

    /// Set the node job directory
    pub fn with_node_job_dir(mut self, dir: impl Into<String>) -> Self {
        self.node_job_dir = dir.into();
        self
    }

    /// Set the thread clamp
    pub fn with_max_threads(mut self, max_threads: u32) -> Self {
        self.max_threads = max_threads.max(1);
        self
    }

    /// Add a propagated debug flag
    pub fn with_debug_flag(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.debug_flags.insert(name.into(), value.into());
        self
    }

    /// Set the inherited script search path
    pub fn with_inherited_script_path(mut self, path: impl Into<String>) -> Self {
        self.inherited_script_path = path.into();
        self
    }
}

/// Name of the submitting user
pub(crate) fn current_user() -> String {
    env::var("USERNAME")
        .or_else(|_| env::var("USER"))
        .unwrap_or_else(|_| "unknown".to_string())
}

/// Builds the three-task graph for a job
#[derive(Debug, Clone)]
pub struct TaskGraphBuilder<L> {
    settings: BuildSettings,
    resolver: PathResolver<L>,
}

impl<L: ShareLookup> TaskGraphBuilder<L> {
    /// Create a builder
    pub fn new(settings: BuildSettings, resolver: PathResolver<L>) -> Self {
        Self { settings, resolver }
    }

    /// Build settings in use
    pub fn settings(&self) -> &BuildSettings {
        &self.settings
    }

    /// Resolver used for jobs without an explicit network location
    pub fn resolver(&self) -> &PathResolver<L> {
        &self.resolver
    }

    /// Build the NodePrep, Sweep and NodeRelease tasks for `spec`
    pub fn build(&self, spec: &JobSpec) -> Result<JobGraph> {
        let renderer = spec.require_renderer()?;
        let name = spec.require_name()?;
        let scene = spec.require_scene()?;
        let output = spec.require_output()?;
        let (start, end) = spec.require_frames()?;
        let step = validate_step(spec.frame_step())?;
        let location = self.network_location(spec, scene)?;

        tracing::info!("Building task graph for '{}' ({}) with {}", name, spec.uuid(), renderer);

        let node_project = win_join(&self.settings.node_job_dir, spec.uuid());
        let project = spec
            .project()
            .or_else(|| parent_dir(scene))
            .unwrap_or_default()
            .to_string();
        let logs = spec.logs().unwrap_or_default().to_string();
        let threads = spec.threads().clamp(1, self.settings.max_threads.max(1));
        if renderer.uses_core_bounds() && threads != spec.threads() {
            tracing::warn!("Clamped render threads from {} to {}", spec.threads(), threads);
        }

        let mut params: BTreeMap<&str, String> = BTreeMap::new();
        params.insert("name", name.to_string());
        params.insert("uuid", spec.uuid().to_string());
        params.insert("renderer", renderer.to_string());
        params.insert("project", project.clone());
        params.insert("scene", scene.to_string());
        params.insert("output", output.to_string());
        params.insert("logs", logs.clone());
        params.insert("threads", threads.to_string());
        params.insert("node_job_dir", self.settings.node_job_dir.clone());
        params.insert("node_project", node_project.clone());
        params.insert("net_share", location.net_share.clone());
        params.insert("net_drive", location.net_drive.clone());

        let mut common = BTreeMap::new();
        for var in ["TEMP", "TMP", "MAYA_APP_DIR", "NODE_PROJECT"] {
            common.insert(var.to_string(), node_project.clone());
        }
        common.insert("OWNER".to_string(), self.settings.owner.clone());
        common.insert("PROJECT".to_string(), project);
        common.insert("SCENE".to_string(), scene.to_string());
        common.insert("RENDERER".to_string(), renderer.to_string());
        common.insert("LOGS".to_string(), logs.clone());
        common.insert("OUTPUT".to_string(), output.to_string());
        common.insert("NET_SHARE".to_string(), location.net_share.clone());
        common.insert("NET_DRIVE".to_string(), location.net_drive.clone());
        for (flag, value) in &self.settings.debug_flags {
            common.insert(flag.clone(), value.clone());
        }

        let setup = Task {
            name: "Setup".to_string(),
            kind: TaskKind::NodePrep,
            command_line: render_template("setup", SETUP_TEMPLATE, &params)?,
            environment: common.clone(),
            resource_bounds: None,
            sweep_range: None,
            io_redirect: None,
            dependency: None,
        };

        let mut sweep_env = common.clone();
        sweep_env.insert("INIT_WD".to_string(), node_project.clone());
        sweep_env.insert(
            "MAYA_SCRIPT_PATH".to_string(),
            script_search_path(&node_project, &self.settings.inherited_script_path),
        );

        let render = Task {
            name: "Render *".to_string(),
            kind: TaskKind::Sweep,
            command_line: render_template(renderer.as_str(), renderer.command_template(), &params)?,
            environment: sweep_env,
            resource_bounds: renderer.uses_core_bounds().then_some(CoreBounds {
                min_cores: threads,
                max_cores: threads,
            }),
            sweep_range: Some(SweepRange { start, end, step }),
            io_redirect: (!logs.is_empty()).then(|| IoRedirect {
                stdout: logs.clone(),
                stderr: logs.clone(),
            }),
            dependency: Some(Dependency {
                after: TaskKind::NodePrep,
                trigger: Trigger::OnSuccess,
            }),
        };

        let cleanup = Task {
            name: "Cleanup".to_string(),
            kind: TaskKind::NodeRelease,
            command_line: render_template("cleanup", CLEANUP_TEMPLATE, &params)?,
            environment: common,
            resource_bounds: None,
            sweep_range: None,
            io_redirect: None,
            dependency: Some(Dependency {
                after: TaskKind::Sweep,
                trigger: Trigger::Always,
            }),
        };

        let graph = JobGraph {
            name: name.to_string(),
            uuid: spec.uuid().to_string(),
            unit_type: renderer.unit_type(),
            exclusive: true,
            tasks: [setup, render, cleanup],
        };
        graph.log_summary();
        Ok(graph)
    }

    /// Explicit share and drive from the job file, or derived from the scene
    ///
    /// A scene given relative to its project (3ds Max archives) is resolved
    /// through the project path instead.
    fn network_location(&self, spec: &JobSpec, scene: &str) -> Result<NetworkLocation> {
        let anchor = match (split_drive(scene).0, spec.project()) {
            ("", Some(project)) => project,
            _ => scene,
        };
        let location = match (spec.net_share(), spec.net_drive()) {
            (Some(share), Some(drive)) => NetworkLocation {
                net_share: share.to_string(),
                net_drive: drive.to_string(),
            },
            (share, drive) => {
                let derived = self.resolver.resolve(anchor)?;
                NetworkLocation {
                    net_share: share.map(str::to_string).unwrap_or(derived.net_share),
                    net_drive: drive.map(str::to_string).unwrap_or(derived.net_drive),
                }
            }
        };

        if !location.net_share.starts_with(r"\\") {
            return Err(SpoolError::unresolved(
                &location.net_share,
                "net_share must be a UNC path",
            ));
        }
        if !is_drive_token(&location.net_drive) {
            return Err(SpoolError::unresolved(
                &location.net_drive,
                "net_drive must be a drive letter followed by ':'",
            ));
        }
        Ok(location)
    }
}

/// Reject non-positive steps
fn validate_step(step: i64) -> Result<u32> {
    if step < 1 {
        return Err(SpoolError::InvalidStep(step));
    }
    u32::try_from(step).map_err(|_| SpoolError::InvalidStep(step))
}

/// Job scripts directory first, then whatever the submitter already had
fn script_search_path(node_project: &str, inherited: &str) -> String {
    format!("{};{}", win_join(node_project, "scripts"), inherited)
}

fn is_drive_token(s: &str) -> bool {
    let b = s.as_bytes();
    b.len() == 2 && b[0].is_ascii_alphabetic() && b[1] == b':'
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Renderer;
    use crate::paths::StaticShareTable;

    const UUID: &str = "20240102030405";

    fn builder() -> TaskGraphBuilder<StaticShareTable> {
        let shares = StaticShareTable::new().with_share("S", r"\\fs01\projects");
        let settings = BuildSettings::new("artist").with_inherited_script_path(r"C:\maya\scripts");
        TaskGraphBuilder::new(settings, PathResolver::new(shares))
    }

    fn spec(renderer: Renderer) -> JobSpec {
        if renderer == Renderer::Max {
            return max_spec();
        }
        JobSpec::new(UUID)
            .with_renderer(renderer)
            .with_name("Shot010")
            .with_project(r"S:\projects\shot010")
            .with_scene(r"S:\projects\shot010\scenes\shot010.mb")
            .with_output(r"\\fs01\output\artist\20240102030405")
            .with_logs(r"\\fs01\logs\artist\20240102030405\Shot010.*.txt")
            .with_frames(42, 10)
            .with_threads(4)
    }

    fn max_spec() -> JobSpec {
        JobSpec::new(UUID)
            .with_renderer(Renderer::Max)
            .with_name("Shot010")
            .with_project(r"S:\projects\shot010.zip")
            .with_scene("shot010.max")
            .with_output(r"\\fs01\output\artist\20240102030405\shot010.exr")
            .with_logs(r"\\fs01\logs\artist\20240102030405\Shot010.*.txt")
            .with_frames(42, 10)
            .with_threads(0)
    }

    #[test]
    fn test_three_tasks_in_fixed_order() {
        let b = builder();
        for renderer in Renderer::ALL {
            let graph = b.build(&spec(renderer)).unwrap();
            let kinds: Vec<TaskKind> = graph.tasks.iter().map(|t| t.kind).collect();
            assert_eq!(kinds, vec![TaskKind::NodePrep, TaskKind::Sweep, TaskKind::NodeRelease]);
            assert!(graph.exclusive);
        }
    }

    #[test]
    fn test_dependencies_declare_teardown_always_runs() {
        let graph = builder().build(&spec(Renderer::MayaRenderSw)).unwrap();
        assert_eq!(graph.task(TaskKind::NodePrep).dependency, None);
        assert_eq!(
            graph.sweep().dependency,
            Some(Dependency { after: TaskKind::NodePrep, trigger: Trigger::OnSuccess })
        );
        assert_eq!(
            graph.task(TaskKind::NodeRelease).dependency,
            Some(Dependency { after: TaskKind::Sweep, trigger: Trigger::Always })
        );
    }

    #[test]
    fn test_max_runs_at_node_granularity() {
        let graph = builder().build(&spec(Renderer::Max)).unwrap();
        assert_eq!(graph.unit_type, crate::job::UnitType::Node);
        assert_eq!(graph.sweep().resource_bounds, None);
        assert_eq!(
            graph.sweep().command_line,
            r"3dsmaxcmd.exe -frames=*-* -workPath:D:\hpc\20240102030405 -o:\\fs01\output\artist\20240102030405\shot010.exr -showRFW:0 D:\hpc\20240102030405\shot010.max"
        );
    }

    #[test]
    fn test_maya_core_bounds_are_rigid() {
        let graph = builder().build(&spec(Renderer::MayaRenderSw)).unwrap();
        assert_eq!(graph.unit_type, crate::job::UnitType::Core);
        assert_eq!(
            graph.sweep().resource_bounds,
            Some(CoreBounds { min_cores: 4, max_cores: 4 })
        );
        assert_eq!(
            graph.sweep().command_line,
            r"Render.exe -n 4 -r sw -s * -e * -proj D:\hpc\20240102030405 -rd \\fs01\output\artist\20240102030405 S:\projects\shot010\scenes\shot010.mb"
        );
    }

    #[test]
    fn test_threads_clamped() {
        let b = builder();
        let graph = b.build(&spec(Renderer::MayaRenderRman).with_threads(0)).unwrap();
        assert_eq!(graph.sweep().resource_bounds.unwrap().min_cores, 1);

        let graph = b.build(&spec(Renderer::MayaRenderRman).with_threads(500)).unwrap();
        assert_eq!(graph.sweep().resource_bounds.unwrap().max_cores, DEFAULT_MAX_THREADS);
        assert!(graph.sweep().command_line.starts_with("Render.exe -n 64 -r rman"));
    }

    #[test]
    fn test_sweep_range_normalized() {
        let graph = builder().build(&spec(Renderer::MayaRenderSw).with_step(2)).unwrap();
        assert_eq!(graph.sweep().sweep_range, Some(SweepRange { start: 10, end: 42, step: 2 }));
        assert_eq!(graph.task(TaskKind::NodePrep).sweep_range, None);
    }

    #[test]
    fn test_invalid_step() {
        let b = builder();
        assert!(matches!(
            b.build(&spec(Renderer::Max).with_step(0)),
            Err(SpoolError::InvalidStep(0))
        ));
        assert!(matches!(
            b.build(&spec(Renderer::Max).with_step(-3)),
            Err(SpoolError::InvalidStep(-3))
        ));
    }

    #[test]
    fn test_common_environment_on_every_task() {
        let graph = builder().build(&spec(Renderer::MayaRenderSw)).unwrap();
        for task in &graph.tasks {
            let env = &task.environment;
            assert_eq!(env["TEMP"], r"D:\hpc\20240102030405");
            assert_eq!(env["TMP"], r"D:\hpc\20240102030405");
            assert_eq!(env["OWNER"], "artist");
            assert_eq!(env["RENDERER"], "maya_render_sw");
            assert_eq!(env["NET_SHARE"], r"\\fs01\projects");
            assert_eq!(env["NET_DRIVE"], "S:");
            assert_eq!(env["PROJECT"], r"S:\projects\shot010");
            for value in env.values() {
                assert!(!value.contains('{'), "unresolved value {}", value);
            }
        }
    }

    #[test]
    fn test_sweep_prepends_job_scripts() {
        let graph = builder().build(&spec(Renderer::MayaRenderSw)).unwrap();
        assert_eq!(
            graph.sweep().environment["MAYA_SCRIPT_PATH"],
            r"D:\hpc\20240102030405\scripts;C:\maya\scripts"
        );
        assert_eq!(graph.sweep().environment["INIT_WD"], r"D:\hpc\20240102030405");
        assert!(!graph.task(TaskKind::NodePrep).environment.contains_key("MAYA_SCRIPT_PATH"));
    }

    #[test]
    fn test_debug_flags_only_when_set() {
        let graph = builder().build(&spec(Renderer::Max)).unwrap();
        assert!(!graph.sweep().environment.contains_key("RRT_DEBUG"));

        let shares = StaticShareTable::new().with_share("S", r"\\fs01\projects");
        let settings = BuildSettings::new("artist").with_debug_flag("RRT_DEBUG", "1");
        let b = TaskGraphBuilder::new(settings, PathResolver::new(shares));
        let graph = b.build(&spec(Renderer::Max)).unwrap();
        for task in &graph.tasks {
            assert_eq!(task.environment["RRT_DEBUG"], "1");
            assert!(!task.environment.contains_key("RRT_USE_DESMOND"));
        }
    }

    #[test]
    fn test_setup_and_cleanup_commands() {
        let graph = builder().build(&spec(Renderer::Max)).unwrap();
        assert_eq!(
            graph.task(TaskKind::NodePrep).command_line,
            r"net use S: \\fs01\projects && hpc-node-prep"
        );
        assert_eq!(
            graph.task(TaskKind::NodeRelease).command_line,
            "hpc-node-release & net use S: /delete /y"
        );
    }

    #[test]
    fn test_log_redirection() {
        let graph = builder().build(&spec(Renderer::Max)).unwrap();
        let redirect = graph.sweep().io_redirect.clone().unwrap();
        assert_eq!(redirect.stdout, redirect.stderr);
        assert!(redirect.stdout.ends_with("Shot010.*.txt"));

        let no_logs = JobSpec::new(UUID)
            .with_renderer(Renderer::Max)
            .with_name("A")
            .with_scene(r"S:\a.max")
            .with_output(r"\\fs01\out")
            .with_frames(1, 1);
        let graph = builder().build(&no_logs).unwrap();
        assert_eq!(graph.sweep().io_redirect, None);
        assert_eq!(graph.sweep().environment["LOGS"], "");
    }

    #[test]
    fn test_explicit_network_location_wins() {
        let spec = spec(Renderer::Max).with_network(r"\\other\share", "T:");
        let graph = builder().build(&spec).unwrap();
        assert_eq!(graph.sweep().environment["NET_SHARE"], r"\\other\share");
        assert_eq!(graph.sweep().environment["NET_DRIVE"], "T:");
    }

    #[test]
    fn test_bad_explicit_drive() {
        let spec = spec(Renderer::Max).with_network(r"\\other\share", "TT");
        assert!(matches!(builder().build(&spec), Err(SpoolError::UnresolvedPath { .. })));
    }

    #[test]
    fn test_unmapped_scene_drive() {
        let spec = spec(Renderer::MayaRenderSw).with_scene(r"C:\local\scene.mb");
        assert!(matches!(builder().build(&spec), Err(SpoolError::UnresolvedPath { .. })));
    }

    #[test]
    fn test_missing_fields_surface_at_build() {
        let b = builder();
        let partial = JobSpec::new(UUID).with_name("A");
        assert!(matches!(b.build(&partial), Err(SpoolError::MissingField("renderer"))));

        let partial = partial.with_renderer(Renderer::Max);
        assert!(matches!(b.build(&partial), Err(SpoolError::MissingField("scene"))));

        let partial = partial.with_scene(r"S:\a.max");
        assert!(matches!(b.build(&partial), Err(SpoolError::MissingField("output"))));

        let partial = partial.with_output(r"\\fs01\out");
        assert!(matches!(b.build(&partial), Err(SpoolError::MissingField("start"))));
    }

    #[test]
    fn test_project_defaults_to_scene_dir() {
        let spec = JobSpec::new(UUID)
            .with_renderer(Renderer::MayaRenderSw)
            .with_name("A")
            .with_scene(r"S:\proj\scenes\a.mb")
            .with_output(r"\\fs01\out")
            .with_frames(1, 2);
        let graph = builder().build(&spec).unwrap();
        assert_eq!(graph.sweep().environment["PROJECT"], r"S:\proj\scenes");
    }
}
