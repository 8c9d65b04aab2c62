//! manim-provision - provisioning pipeline for the manim rendering image.
//!
//! Turns a bare Debian-style base layer into a reproducible rendering
//! environment: OS packages, font cache, a minimal TeX Live, manim itself
//! with its documentation tooling, and the non-root runtime identity.
//! Stages run in a fixed order and every failure is fatal; rebuilding from
//! a pristine base layer is the only remediation.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand, ValueEnum};

use manim_provision::config::Config;
use manim_provision::error::Stage;
use manim_provision::manifest::{ProvisionManifest, MANIFEST_NAME};
use manim_provision::preflight;
use manim_provision::scaffold;
use manim_provision::stages::{self, identity, packages, texlive, Context};

#[derive(Parser)]
#[command(name = "manim-provision")]
#[command(about = "Provision the manim rendering environment")]
#[command(
    after_help = "QUICK START:\n  manim-provision preflight           Check the host before provisioning\n  manim-provision provision           Run the full pipeline\n  manim-provision provision --shell   ...then drop into the runtime shell"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full provisioning pipeline (all five stages, in order)
    Provision {
        /// After success, exec an interactive shell as the runtime user
        #[arg(long)]
        shell: bool,
    },

    /// Run a single pipeline stage (one cacheable image layer per stage)
    Stage {
        #[arg(value_enum)]
        name: StageName,
    },

    /// Run preflight checks (verify the host before any stage mutates it)
    Preflight {
        /// Fail if any checks fail (exit code 1)
        #[arg(long)]
        strict: bool,
    },

    /// Scaffold a starter project or scene in the provisioned environment
    Init {
        #[command(subcommand)]
        what: InitTarget,
    },

    /// Show information
    Show {
        #[command(subcommand)]
        what: ShowTarget,
    },

    /// Remove the scratch directory (downloads and extracted installer)
    Clean,
}

#[derive(Clone, Copy, ValueEnum)]
enum StageName {
    Packages,
    Fonts,
    Texlive,
    App,
    Identity,
}

impl From<StageName> for Stage {
    fn from(name: StageName) -> Self {
        match name {
            StageName::Packages => Stage::Packages,
            StageName::Fonts => Stage::Fonts,
            StageName::Texlive => Stage::TexLive,
            StageName::App => Stage::App,
            StageName::Identity => Stage::Identity,
        }
    }
}

#[derive(Subcommand)]
enum InitTarget {
    /// Create a new project directory with a starter scene and manim.cfg
    Project {
        /// Directory to create
        name: PathBuf,
        /// Scene template to start from
        #[arg(long, default_value = scaffold::DEFAULT_TEMPLATE)]
        template: String,
        /// Output resolution preset (480p, 720p, 1080p, 1440p)
        #[arg(long, default_value = "480p")]
        resolution: String,
    },
    /// Insert a scene class into a file (created if missing; default main.py)
    Scene {
        /// Name of the new scene class
        name: String,
        /// File to insert into
        file: Option<PathBuf>,
        /// Scene template to start from
        #[arg(long, default_value = scaffold::DEFAULT_TEMPLATE)]
        template: String,
    },
}

#[derive(Subcommand)]
enum ShowTarget {
    /// Show current configuration
    Config {
        /// Emit as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the provision manifest of a completed run
    Manifest,
    /// Show the PATH value stages run with
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Load .env if present
    dotenvy::dotenv().ok();
    let base_dir = std::env::current_dir().context("cannot determine working directory")?;
    let config = Config::load(&base_dir)?;

    match cli.command {
        Commands::Provision { shell } => cmd_provision(config, shell),
        Commands::Stage { name } => cmd_stage(config, name.into()),
        Commands::Preflight { strict } => cmd_preflight(config, strict),
        Commands::Init { what } => cmd_init(what),
        Commands::Show { what } => cmd_show(config, what),
        Commands::Clean => cmd_clean(config),
    }
}

fn cmd_provision(config: Config, shell: bool) -> Result<()> {
    let mut ctx = Context::new(config);
    let pipeline = stages::default_stages();
    stages::run_pipeline(&pipeline, &mut ctx)?;

    let manifest = ProvisionManifest {
        created_unix: ProvisionManifest::now_unix(),
        username: ctx.config.username.clone(),
        uid: ctx.config.uid,
        home: ctx.config.home.clone(),
        os_packages: packages::APT_PACKAGES.iter().map(|s| s.to_string()).collect(),
        tex_packages: texlive::curated_set(),
        tex_bin_dir: ctx.tex_bin_dir.clone(),
        stages: ctx.records.clone(),
    };
    let manifest_path = ctx.config.home.join(MANIFEST_NAME);
    manifest.write(&manifest_path)?;
    // The identity stage already handed the home tree over; the manifest is
    // written afterwards and must not stay root-owned inside it
    let account = identity::lookup_account(Path::new("/etc/passwd"), &ctx.config.username)?;
    identity::take_ownership(&manifest_path, account.uid, account.gid)?;

    println!("\n=== Provisioning Complete ===");
    println!("  Manifest: {}", manifest_path.display());

    if shell {
        // Replaces this process on success
        identity::login_shell(&ctx.config, &ctx.search_path)?;
    }
    Ok(())
}

fn cmd_stage(config: Config, stage: Stage) -> Result<()> {
    let mut ctx = Context::new(config);
    let pipeline = vec![stages::stage_by_name(stage)];
    stages::run_pipeline(&pipeline, &mut ctx)?;
    Ok(())
}

fn cmd_preflight(config: Config, strict: bool) -> Result<()> {
    if strict {
        preflight::run_preflight_or_fail(&config)?;
    } else {
        let report = preflight::run_preflight(&config)?;
        report.print();
        if !report.all_passed() {
            println!("Some checks failed. Use --strict to fail the build.");
        }
    }
    Ok(())
}

fn cmd_init(what: InitTarget) -> Result<()> {
    match what {
        InitTarget::Project {
            name,
            template,
            resolution,
        } => {
            let mut settings = scaffold::ProjectSettings::default();
            let (width, height) = scaffold::resolution_for(&resolution)
                .with_context(|| format!("unknown resolution preset '{resolution}'"))?;
            settings.pixel_width = width;
            settings.pixel_height = height;
            scaffold::create_project(&name, &template, &settings)
        }
        InitTarget::Scene {
            name,
            file,
            template,
        } => {
            let written = scaffold::insert_scene(&name, file.as_deref(), &template)?;
            println!("Scene {} added to {}", name, written.display());
            Ok(())
        }
    }
}

fn cmd_show(config: Config, what: ShowTarget) -> Result<()> {
    match what {
        ShowTarget::Config { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(&config)?);
            } else {
                config.print();
            }
        }
        ShowTarget::Manifest => {
            let path = config.home.join(MANIFEST_NAME);
            let manifest = ProvisionManifest::read(&path)?;
            println!("{}", serde_json::to_string_pretty(&manifest)?);
        }
        ShowTarget::Path => {
            let ctx = Context::new(config);
            println!("{}", ctx.search_path);
        }
    }
    Ok(())
}

fn cmd_clean(config: Config) -> Result<()> {
    if config.scratch.exists() {
        println!("Removing scratch directory {}", config.scratch.display());
        fs::remove_dir_all(&config.scratch)
            .with_context(|| format!("Failed to remove {}", config.scratch.display()))?;
    } else {
        println!("Scratch directory {} already clean", config.scratch.display());
    }
    Ok(())
}
