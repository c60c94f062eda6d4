mod script;

pub use script::{AnnotationScript, ScriptEntry};

use annotator_core::{flatten, signature_image, EditorConfig, EditorSession, SignaturePad};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pdf_engine::{default_engine, PdfDocument, RecordingDocument};
use serde::Serialize;
use signature_vault::{SignatureKind, SignatureVault};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

const ENV_VAULT_PASSWORD: &str = "ANNOTATOR_VAULT_PASSWORD";

#[derive(Debug, Parser)]
#[command(name = "annotator")]
#[command(about = "Annotate, sign and flatten PDF documents")]
pub struct Cli {
    /// Editor settings file (TOML). Defaults come from ANNOTATOR_* variables.
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Print machine-readable PDF metadata.
    Info {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long)]
        password: Option<String>,
    },
    /// Render one page with a script's annotations to PNG.
    Render {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = 1.0)]
        zoom: f32,
        #[arg(long, value_name = "SCRIPT")]
        script: Option<PathBuf>,
        #[arg(long)]
        password: Option<String>,
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Burn a script's annotations and rotations into a PDF.
    Flatten {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, value_name = "SCRIPT")]
        script: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
        #[arg(long)]
        password: Option<String>,
        /// Write an unprotected copy of an encrypted source.
        #[arg(long)]
        unprotected: bool,
        /// Print the primitives that would be written instead of saving.
        #[arg(long)]
        dry_run: bool,
    },
    /// Write unprotected copies of password-protected PDFs.
    Unlock {
        #[arg(value_name = "FILE", required = true)]
        files: Vec<PathBuf>,
        #[arg(long)]
        password: String,
        #[arg(long)]
        output_dir: Option<PathBuf>,
    },
    /// Manage the encrypted signature library.
    Signatures {
        #[command(flatten)]
        vault: VaultArgs,
        #[command(subcommand)]
        action: SignatureAction,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, clap::Args)]
struct VaultArgs {
    /// Vault file. Defaults to the platform data directory.
    #[arg(long, global = true)]
    vault: Option<PathBuf>,
    /// Master password. Falls back to ANNOTATOR_VAULT_PASSWORD.
    #[arg(long, global = true)]
    vault_password: Option<String>,
}

#[derive(Debug, Subcommand)]
enum SignatureAction {
    /// Clean up an image and store it under NAME.
    Add {
        name: String,
        #[arg(value_name = "IMAGE")]
        image: PathBuf,
        #[arg(long)]
        initials: bool,
    },
    /// Render freehand strokes and store them under NAME.
    ///
    /// STROKES is a JSON array of strokes, each an array of `[x, y]` pad
    /// pixels on a 480x200 pad.
    Draw {
        name: String,
        #[arg(value_name = "STROKES")]
        strokes: PathBuf,
        #[arg(long)]
        initials: bool,
    },
    List,
    Remove {
        name: String,
    },
    /// Write a stored signature out as PNG.
    Export {
        name: String,
        #[arg(long)]
        output: PathBuf,
    },
}

#[derive(Debug, Serialize)]
struct InfoOutput {
    path: String,
    page_count: u32,
    encrypted: bool,
    pages: Vec<PageOutput>,
}

#[derive(Debug, Serialize)]
struct PageOutput {
    index: u32,
    width: f32,
    height: f32,
    rotation: i64,
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);
    init_logging();

    match cli.command {
        Commands::Info { file, password } => run_info(&file, password.as_deref()),
        Commands::Render { file, page, zoom, script, password, output } => {
            let config = load_config(cli.config.as_deref())?;
            run_render(&file, page, zoom, script.as_deref(), password.as_deref(), output.as_deref(), config)
        }
        Commands::Flatten { file, script, output, password, unprotected, dry_run } => {
            let config = load_config(cli.config.as_deref())?;
            let options = FlattenOptions { output, unprotected, dry_run };
            run_flatten(&file, &script, password.as_deref(), &options, config)
        }
        Commands::Unlock { files, password, output_dir } => {
            run_unlock(&files, &password, output_dir.as_deref())
        }
        Commands::Signatures { vault, action } => {
            let config = load_config(cli.config.as_deref())?;
            run_signatures(&vault, action, &config)
        }
        Commands::Version => {
            println!("{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// Logs go to stderr, filtered by `RUST_LOG` (default `warn`).
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig> {
    match path {
        Some(path) => EditorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display())),
        None => EditorConfig::from_env().context("invalid ANNOTATOR_* environment"),
    }
}

fn open_session(
    file: &Path,
    password: Option<&str>,
    config: EditorConfig,
) -> Result<EditorSession<pdf_engine::LopdfDocument>> {
    ensure_pdf_exists(file)?;
    EditorSession::open(&default_engine(), file, password, config).context("failed to open PDF")
}

fn run_info(file: &Path, password: Option<&str>) -> Result<()> {
    let session = open_session(file, password, EditorConfig::default())?;
    let document = session.document();

    let pages = (0..document.page_count())
        .map(|index| {
            let size = document.page_size(index)?;
            let rotation = document.page_rotation(index)?;
            Ok(PageOutput {
                index,
                width: size.width_pt,
                height: size.height_pt,
                rotation: rotation.degrees(),
            })
        })
        .collect::<Result<Vec<_>, pdf_engine::PdfEngineError>>()
        .context("failed to read page geometry")?;

    let payload = InfoOutput {
        path: file.display().to_string(),
        page_count: document.page_count(),
        encrypted: document.is_encrypted(),
        pages,
    };

    let json = serde_json::to_string_pretty(&payload)?;
    println!("{json}");
    Ok(())
}

fn run_render(
    file: &Path,
    page: u32,
    zoom: f32,
    script: Option<&Path>,
    password: Option<&str>,
    output: Option<&Path>,
    config: EditorConfig,
) -> Result<()> {
    if page == 0 {
        anyhow::bail!("--page is 1-based and must be >= 1");
    }

    let mut session = open_session(file, password, config)?;
    if let Some(script) = script {
        AnnotationScript::from_file(script)?.apply(&mut session)?;
    }
    if page > session.page_count() {
        anyhow::bail!("page {page} out of range (page_count={})", session.page_count());
    }
    session.go_to_page(page - 1);
    session.set_zoom(zoom);

    session.render().context("failed to render page")?;
    for failure in session.take_render_failures() {
        eprintln!("warning: {failure}");
    }
    let frame = session.last_frame().context("no frame was rendered")?;
    let output =
        output.map(ToOwned::to_owned).unwrap_or_else(|| default_render_output(file, page));
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    frame
        .save(&output)
        .with_context(|| format!("failed to write image to {}", output.display()))?;

    println!("{}", output.display());
    Ok(())
}

struct FlattenOptions {
    output: Option<PathBuf>,
    unprotected: bool,
    dry_run: bool,
}

fn run_flatten(
    file: &Path,
    script: &Path,
    password: Option<&str>,
    options: &FlattenOptions,
    config: EditorConfig,
) -> Result<()> {
    let script = AnnotationScript::from_file(script)?;
    let mut session = open_session(file, password, config.clone())?;

    if options.dry_run {
        let mirror =
            RecordingDocument::mirror(session.document()).context("failed to read page geometry")?;
        let mut preview = EditorSession::with_document(mirror, file, config);
        script.apply(&mut preview)?;

        let mut recorded = preview.document().clone();
        let report = flatten(&mut recorded, preview.store(), preview.rotations());
        for primitive in recorded.primitives() {
            println!("{primitive:?}");
        }
        for failure in &report.failures {
            eprintln!("warning: {failure}");
        }
        return Ok(());
    }

    script.apply(&mut session)?;
    let report = match (&options.output, options.unprotected) {
        (None, true) => session.save_unprotected(),
        (Some(output), _) => session.save_as(output),
        (None, false) => session.save(),
    }
    .context("failed to save PDF")?;

    for failure in &report.flatten.failures {
        eprintln!("warning: {failure}");
    }
    println!("{}", report.path.display());
    Ok(())
}

fn run_unlock(files: &[PathBuf], password: &str, output_dir: Option<&Path>) -> Result<()> {
    if let Some(dir) = output_dir {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let report = annotator_core::remove_passwords(&default_engine(), files, password, output_dir);
    for (source, result) in &report.results {
        match result {
            Ok(out) => println!("{} -> {}", source.display(), out.display()),
            Err(err) => eprintln!("{}: {err}", source.display()),
        }
    }

    if report.failed() > 0 {
        anyhow::bail!("{} of {} files could not be unlocked", report.failed(), report.results.len());
    }
    Ok(())
}

fn run_signatures(args: &VaultArgs, action: SignatureAction, config: &EditorConfig) -> Result<()> {
    let path = match &args.vault {
        Some(path) => path.clone(),
        None => SignatureVault::default_path()?,
    };
    let password = match &args.vault_password {
        Some(password) => password.clone(),
        None => std::env::var(ENV_VAULT_PASSWORD)
            .with_context(|| format!("pass --vault-password or set {ENV_VAULT_PASSWORD}"))?,
    };

    match action {
        SignatureAction::Add { name, image, initials } => {
            let mut vault = SignatureVault::open_or_create(&path, &password)
                .context("failed to unlock signature vault")?;
            let (kind, target) = signature_box(initials, config);

            let bytes = fs::read(&image)
                .with_context(|| format!("failed to read image {}", image.display()))?;
            let png = signature_image::prepare_upload(&bytes, target)
                .with_context(|| format!("unsupported image {}", image.display()))?;
            vault.add(&name, png, kind, target.0, target.1)?;
            println!("{name}");
        }
        SignatureAction::Draw { name, strokes: strokes_path, initials } => {
            let contents = fs::read_to_string(&strokes_path)
                .with_context(|| format!("failed to read strokes {}", strokes_path.display()))?;
            let strokes: Vec<Vec<(f32, f32)>> = serde_json::from_str(&contents)
                .with_context(|| format!("invalid strokes file {}", strokes_path.display()))?;
            let pad = SignaturePad::from_strokes(strokes);
            if pad.is_blank() {
                anyhow::bail!("drawing has no strokes");
            }

            let mut vault = SignatureVault::open_or_create(&path, &password)
                .context("failed to unlock signature vault")?;
            let (kind, target) = signature_box(initials, config);
            vault.add(&name, pad.to_png()?, kind, target.0, target.1)?;
            println!("{name}");
        }
        SignatureAction::List => {
            let vault =
                SignatureVault::unlock(&path, &password).context("failed to unlock signature vault")?;
            for name in vault.list() {
                if let Some(record) = vault.info(name) {
                    println!("{name}\t{}\t{}x{}", record.kind.as_str(), record.width, record.height);
                }
            }
        }
        SignatureAction::Remove { name } => {
            let mut vault =
                SignatureVault::unlock(&path, &password).context("failed to unlock signature vault")?;
            if !vault.delete(&name)? {
                anyhow::bail!("no signature named {name}");
            }
        }
        SignatureAction::Export { name, output } => {
            let vault =
                SignatureVault::unlock(&path, &password).context("failed to unlock signature vault")?;
            let data = vault.get(&name).with_context(|| format!("no signature named {name}"))?;
            fs::write(&output, data)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("{}", output.display());
        }
    }
    Ok(())
}

/// Kind and placement box in whole points for a stored signature.
fn signature_box(initials: bool, config: &EditorConfig) -> (SignatureKind, (u32, u32)) {
    let (kind, width, height) = if initials {
        (SignatureKind::Initials, config.initials_width, config.initials_height)
    } else {
        (SignatureKind::Signature, config.signature_width, config.signature_height)
    };
    (kind, (width.round().max(1.0) as u32, height.round().max(1.0) as u32))
}

fn ensure_pdf_exists(path: &Path) -> Result<()> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    Ok(())
}

fn default_render_output(file: &Path, page: u32) -> PathBuf {
    let stem = file.file_stem().and_then(|name| name.to_str()).unwrap_or("page");

    file.with_file_name(format!("{stem}-page-{page}.png"))
}
