//! Project scaffolding inside the provisioned environment.
//!
//! `init project` seeds a fresh directory with a starter scene and a
//! `manim.cfg`; `init scene` drops an additional scene class into an
//! existing file (or creates the file with the import line prepended).
//! Scene templates are baked in; the new class is named by rewriting the
//! template's own class name.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};

/// Template applied when none is requested.
pub const DEFAULT_TEMPLATE: &str = "Default";

const IMPORT_STATEMENT: &str = "from manim import *";

const DEFAULT_BODY: &str = r#"class DefaultTemplate(Scene):
    def construct(self):
        circle = Circle()
        circle.set_fill(PINK, opacity=0.5)

        square = Square()
        square.flip(RIGHT)
        square.rotate(-3 * TAU / 8)

        self.play(Create(square))
        self.play(Transform(square, circle))
        self.play(FadeOut(square))
"#;

const MOVING_CAMERA_BODY: &str = r#"class MovingCameraTemplate(MovingCameraScene):
    def construct(self):
        text = Text("Hello World").set_color(BLUE)
        self.add(text)
        self.camera.frame.save_state()
        self.play(self.camera.frame.animate.set(width=text.width * 1.2))
        self.wait(0.3)
        self.play(Restore(self.camera.frame))
"#;

const TEMPLATES: &[(&str, &str)] = &[
    ("Default", DEFAULT_BODY),
    ("MovingCamera", MOVING_CAMERA_BODY),
];

/// Output resolution presets, smallest first.
pub const RESOLUTIONS: &[(&str, (u32, u32))] = &[
    ("480p", (854, 480)),
    ("720p", (1280, 720)),
    ("1080p", (1920, 1080)),
    ("1440p", (2560, 1440)),
];

pub fn template_names() -> Vec<&'static str> {
    TEMPLATES.iter().map(|(name, _)| *name).collect()
}

pub fn resolution_for(label: &str) -> Option<(u32, u32)> {
    RESOLUTIONS
        .iter()
        .find(|(l, _)| *l == label)
        .map(|(_, dims)| *dims)
}

/// Template names match case-insensitively; the canonical casing is used
/// for the generated class name.
fn lookup_template(name: &str) -> Result<(&'static str, &'static str)> {
    TEMPLATES
        .iter()
        .copied()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .ok_or_else(|| {
            anyhow!(
                "unknown template '{}' (available: {})",
                name,
                template_names().join(", ")
            )
        })
}

/// Per-project settings written to `manim.cfg`.
pub struct ProjectSettings {
    pub frame_rate: u32,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub background_color: String,
    pub background_opacity: f64,
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            frame_rate: 30,
            pixel_width: 854,
            pixel_height: 480,
            background_color: "BLACK".to_string(),
            background_opacity: 1.0,
        }
    }
}

impl ProjectSettings {
    /// Render the `[CLI]` section of a project's `manim.cfg`.
    pub fn render_cfg(&self, scene_names: &str) -> String {
        format!(
            "[CLI]\n\
             frame_rate = {}\n\
             pixel_width = {}\n\
             pixel_height = {}\n\
             background_color = {}\n\
             background_opacity = {}\n\
             scene_names = {}\n",
            self.frame_rate,
            self.pixel_width,
            self.pixel_height,
            self.background_color,
            self.background_opacity,
            scene_names
        )
    }
}

/// Create a new project directory: `main.py` with the template scene and a
/// `manim.cfg` pointing at it. An existing directory is refused rather than
/// merged into.
pub fn create_project(dir: &Path, template: &str, settings: &ProjectSettings) -> Result<()> {
    if dir.exists() {
        bail!(
            "'{}' already exists; pick another project name",
            dir.display()
        );
    }
    let (canonical, body) = lookup_template(template)?;

    fs::create_dir_all(dir).with_context(|| format!("cannot create {}", dir.display()))?;
    let main_py = dir.join("main.py");
    fs::write(&main_py, format!("{IMPORT_STATEMENT}\n\n\n{body}"))
        .with_context(|| format!("cannot write {}", main_py.display()))?;

    let scene_names = format!("{canonical}Template");
    let cfg_path = dir.join("manim.cfg");
    fs::write(&cfg_path, settings.render_cfg(&scene_names))
        .with_context(|| format!("cannot write {}", cfg_path.display()))?;

    println!(
        "Project ready at {} (template {})",
        dir.display(),
        canonical
    );
    Ok(())
}

/// Insert a scene class named `scene_name` into `file` (default `main.py`).
///
/// An existing file gets the scene appended; a new file is created with the
/// import line prepended. Returns the path actually written.
pub fn insert_scene(scene_name: &str, file: Option<&Path>, template: &str) -> Result<PathBuf> {
    let (canonical, body) = lookup_template(template)?;
    let scene = body.replacen(&format!("{canonical}Template"), scene_name, 1);

    let path = file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("main.py"));
    let path = ensure_py_suffix(path);

    if path.is_file() {
        let existing = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        fs::write(&path, format!("{existing}\n\n\n{scene}"))
            .with_context(|| format!("cannot write {}", path.display()))?;
    } else {
        fs::write(&path, format!("{IMPORT_STATEMENT}\n\n\n{scene}"))
            .with_context(|| format!("cannot write {}", path.display()))?;
    }
    Ok(path)
}

fn ensure_py_suffix(path: PathBuf) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some("py") => path,
        _ => {
            let mut raw = path.into_os_string();
            raw.push(".py");
            PathBuf::from(raw)
        }
    }
}
