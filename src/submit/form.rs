//! Submission form state and the job spec it produces

use crate::error::{Result, SpoolError};
use crate::job::{IdentityGenerator, JobSpec, Renderer, DEFAULT_STEP, DEFAULT_THREADS};
use crate::paths::{parent_dir, split_drive, win_join, PathResolver, ShareLookup};

/// Image formats offered for 3ds Max output
pub const IMAGE_EXTENSIONS: [&str; 26] = [
    ".bmp", ".bw", ".cin", ".dds", ".eps", ".exr", ".fxr", ".hdr", ".icb", ".int", ".inta", ".jpe",
    ".jpeg", ".jpg", ".pic", ".png", ".ps", ".rgb", ".rgba", ".rla", ".rpf", ".sgi", ".tga", ".tif",
    ".vda", ".vst",
];

/// Punctuation a scene path may contain
pub const ALLOWED_PATH_PUNCTUATION: &str = r"/\._-";

/// Strip ASCII punctuation from a job title and trim it
pub fn filter_title(title: &str) -> String {
    title
        .chars()
        .filter(|c| !c.is_ascii_punctuation())
        .collect::<String>()
        .trim()
        .to_string()
}

/// Maya renderer for the scene's current renderer name
pub fn maya_job_type(current_renderer: &str) -> Renderer {
    if current_renderer == "renderMan" {
        Renderer::MayaRenderRman
    } else {
        Renderer::MayaRenderSw
    }
}

/// Everything an artist fills in before submitting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionForm {
    /// Job title as typed
    pub title: String,
    /// Renderer
    pub renderer: Renderer,
    /// Project directory or archive; defaults to the scene's directory
    pub project: Option<String>,
    /// Scene path, or the scene's name inside a project archive
    pub scene: String,
    /// First frame as typed
    pub start: i64,
    /// Last frame as typed
    pub end: i64,
    /// Frame increment
    pub step: i64,
    /// Render threads
    pub threads: u32,
    /// Root under which `<owner>\<uuid>` output directories are created
    pub output_root: String,
    /// Root for per-job log files; no logs when unset
    pub logs_root: Option<String>,
    /// Output image base name, 3ds Max only
    pub output_base: String,
    /// Output image extension, 3ds Max only
    pub output_ext: String,
    /// Submitting user
    pub owner: String,
}

impl SubmissionForm {
    /// Empty form for `renderer`, titled after the scene
    pub fn new(renderer: Renderer, scene: impl Into<String>, owner: impl Into<String>) -> Self {
        let scene = scene.into();
        Self {
            title: crate::paths::file_stem(&scene).to_string(),
            renderer,
            project: None,
            scene,
            start: 1,
            end: 1,
            step: DEFAULT_STEP,
            threads: DEFAULT_THREADS,
            output_root: String::new(),
            logs_root: None,
            output_base: String::new(),
            output_ext: ".png".to_string(),
            owner: owner.into(),
        }
    }

    /// Title with punctuation removed
    pub fn job_title(&self) -> String {
        filter_title(&self.title)
    }

    /// `(start, end)` with `start <= end`
    pub fn frames(&self) -> (i64, i64) {
        (self.start.min(self.end), self.start.max(self.end))
    }

    /// Check the form before anything is written
    pub fn validate(&self) -> Result<()> {
        if self.job_title().is_empty() {
            return Err(SpoolError::Validation("job title must not be blank".into()));
        }
        if self.scene.trim().is_empty() {
            return Err(SpoolError::Validation("no scene selected".into()));
        }
        let paths = std::iter::once(self.scene.as_str()).chain(self.project.as_deref());
        for path in paths {
            if path.contains(' ') {
                return Err(SpoolError::Validation(format!(
                    "'{}' contains spaces; rename or save as before submitting",
                    path
                )));
            }
            let (_, rest) = split_drive(path);
            if let Some(c) = rest
                .chars()
                .find(|c| c.is_ascii_punctuation() && !ALLOWED_PATH_PUNCTUATION.contains(*c))
            {
                return Err(SpoolError::Validation(format!(
                    "'{}' contains illegal character '{}'; only {} are allowed",
                    path, c, ALLOWED_PATH_PUNCTUATION
                )));
            }
        }
        if self.step < 1 {
            return Err(SpoolError::InvalidStep(self.step));
        }
        if self.output_root.trim().is_empty() {
            return Err(SpoolError::Validation("output root must not be blank".into()));
        }
        let roots = std::iter::once(("output", self.output_root.as_str()))
            .chain(self.logs_root.as_deref().map(|r| ("logs", r)));
        for (what, root) in roots {
            if root.contains(['#', '\r', '\n']) {
                return Err(SpoolError::Validation(format!(
                    "{} root '{}' may not contain '#' or line breaks",
                    what,
                    root.escape_debug()
                )));
            }
        }
        if self.renderer == Renderer::Max {
            self.validate_output_image()?;
        }
        Ok(())
    }

    fn validate_output_image(&self) -> Result<()> {
        if self.output_base.is_empty() {
            return Err(SpoolError::Validation("output cannot be blank".into()));
        }
        let valid_base = self
            .output_base
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
        if !valid_base {
            return Err(SpoolError::Validation(format!(
                "output name '{}' may only contain letters, digits, '_', '-' and '.'",
                self.output_base
            )));
        }
        if !IMAGE_EXTENSIONS.contains(&self.output_ext.to_ascii_lowercase().as_str()) {
            return Err(SpoolError::Validation(format!(
                "unsupported image format '{}'",
                self.output_ext
            )));
        }
        Ok(())
    }

    /// Validate and turn the form into a job spec with a fresh uuid
    ///
    /// Output goes to `<output_root>\<owner>\<uuid>`, with the image file name
    /// appended for 3ds Max. Logs go to `<logs_root>\<owner>\<uuid>\<title>.*.txt`.
    /// The network location is taken from the scene, or from the project when
    /// the scene is a bare name inside the project.
    pub fn to_job_spec<L: ShareLookup>(
        &self,
        ids: &IdentityGenerator,
        resolver: &PathResolver<L>,
    ) -> Result<JobSpec> {
        self.validate()?;

        let uuid = ids.new_id();
        let title = self.job_title();
        let owner_dir = |root: &str| win_join(&win_join(root, &self.owner), &uuid);

        let mut output = owner_dir(&self.output_root);
        if self.renderer == Renderer::Max {
            output = win_join(&output, &format!("{}{}", self.output_base, self.output_ext));
        }

        let scene = self.scene.trim();
        let project = self
            .project
            .as_deref()
            .map(str::trim)
            .or_else(|| parent_dir(scene))
            .unwrap_or_default();
        let anchor = if split_drive(scene).0.is_empty() { project } else { scene };
        let location = resolver.resolve(anchor)?;
        let (start, end) = self.frames();

        let mut spec = JobSpec::new(uuid.as_str())
            .with_renderer(self.renderer)
            .with_name(title.as_str())
            .with_scene(scene)
            .with_output(output)
            .with_frames(start, end)
            .with_step(self.step)
            .with_threads(self.threads)
            .with_network(location.net_share, location.net_drive);
        if !project.is_empty() {
            spec = spec.with_project(project);
        }
        if let Some(root) = self.logs_root.as_deref().filter(|r| !r.trim().is_empty()) {
            spec = spec.with_logs(win_join(&owner_dir(root), &format!("{}.*.txt", title)));
        }

        tracing::debug!("Prepared job {} '{}' for {}", uuid, title, self.owner);
        Ok(spec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::FixedClock;
    use crate::paths::StaticShareTable;
    use chrono::NaiveDate;

    fn ids() -> IdentityGenerator {
        let at = NaiveDate::from_ymd_opt(2011, 3, 4)
            .and_then(|d| d.and_hms_opt(15, 16, 17))
            .unwrap();
        IdentityGenerator::with_clock(FixedClock(at))
    }

    fn resolver() -> PathResolver<StaticShareTable> {
        PathResolver::new(
            StaticShareTable::new()
                .with_share("S", r"\\fs01\projects")
                .with_share("Z", r"\\fs01\students"),
        )
    }

    fn maya_form() -> SubmissionForm {
        let mut form = SubmissionForm::new(Renderer::MayaRenderSw, r"S:\proj\scenes\shot010.mb", "jdoe");
        form.start = 24;
        form.end = 1;
        form.output_root = r"\\fs01\output".into();
        form.logs_root = Some(r"\\fs01\logs".into());
        form
    }

    #[test]
    fn test_filter_title() {
        assert_eq!(filter_title("  My Shot! (v2)  "), "My Shot v2");
        assert_eq!(filter_title("!!!"), "");
    }

    #[test]
    fn test_maya_job_type() {
        assert_eq!(maya_job_type("renderMan"), Renderer::MayaRenderRman);
        assert_eq!(maya_job_type("mayaSoftware"), Renderer::MayaRenderSw);
        assert_eq!(maya_job_type("mentalRay"), Renderer::MayaRenderSw);
    }

    #[test]
    fn test_default_title_from_scene() {
        assert_eq!(maya_form().title, "shot010");
    }

    #[test]
    fn test_maya_job_spec() {
        let spec = maya_form().to_job_spec(&ids(), &resolver()).unwrap();
        assert_eq!(spec.uuid(), "20110304151617");
        assert_eq!(spec.name(), Some("shot010"));
        assert_eq!(spec.project(), Some(r"S:\proj\scenes"));
        assert_eq!(spec.output(), Some(r"\\fs01\output\jdoe\20110304151617"));
        assert_eq!(spec.logs(), Some(r"\\fs01\logs\jdoe\20110304151617\shot010.*.txt"));
        assert_eq!((spec.frame_start(), spec.frame_end()), (Some(1), Some(24)));
        assert_eq!(spec.net_share(), Some(r"\\fs01\projects"));
        assert_eq!(spec.net_drive(), Some("S:"));
    }

    #[test]
    fn test_max_job_spec_uses_project_share() {
        let mut form = SubmissionForm::new(Renderer::Max, "shot010.max", "jdoe");
        form.project = Some(r"Z:\jdoe\shot010.zip".into());
        form.output_root = r"\\fs01\output".into();
        form.output_base = "beauty".into();
        form.output_ext = ".exr".into();

        let spec = form.to_job_spec(&ids(), &resolver()).unwrap();
        assert_eq!(spec.output(), Some(r"\\fs01\output\jdoe\20110304151617\beauty.exr"));
        assert_eq!(spec.net_share(), Some(r"\\fs01\students"));
        assert_eq!(spec.net_drive(), Some("Z:"));
        assert_eq!(spec.logs(), None);
    }

    #[test]
    fn test_validation_failures() {
        let mut form = maya_form();
        form.title = "?!".into();
        assert!(matches!(form.validate(), Err(SpoolError::Validation(_))));

        let mut form = maya_form();
        form.scene = r"S:\proj\my scene.mb".into();
        assert!(matches!(form.validate(), Err(SpoolError::Validation(_))));

        let mut form = maya_form();
        form.scene = r"S:\proj\shot#1.mb".into();
        let err = form.validate().unwrap_err();
        assert!(err.to_string().contains('#'));

        let mut form = maya_form();
        form.step = 0;
        assert!(matches!(form.validate(), Err(SpoolError::InvalidStep(0))));

        let mut form = SubmissionForm::new(Renderer::Max, "a.max", "jdoe");
        form.output_root = r"\\fs01\output".into();
        assert!(form.validate().is_err());
        form.output_base = "bad name".into();
        assert!(form.validate().is_err());
        form.output_base = "good".into();
        form.output_ext = ".gif".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_comment_character_in_roots_rejected() {
        let mut form = maya_form();
        form.output_root = r"\\fs01\renders#A".into();
        let err = form.validate().unwrap_err();
        assert!(matches!(err, SpoolError::Validation(_)));
        assert!(err.to_string().contains("output root"));

        let mut form = maya_form();
        form.logs_root = Some(r"\\fs01\logs#2".into());
        let err = form.to_job_spec(&ids(), &resolver()).unwrap_err();
        assert!(err.to_string().contains("logs root"));

        let mut form = maya_form();
        form.output_root = "\\\\fs01\\out\nlogs = x".into();
        assert!(form.validate().is_err());
    }

    #[test]
    fn test_unresolvable_scene() {
        let mut form = maya_form();
        form.scene = r"C:\local\shot.mb".into();
        assert!(matches!(
            form.to_job_spec(&ids(), &resolver()),
            Err(SpoolError::UnresolvedPath { .. })
        ));
    }
}
