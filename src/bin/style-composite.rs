use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing_subscriber::EnvFilter;

use style_composite::{
    default_output_path, ChromaKeyProvider, CompositeConfig, CompositeEngine, CompositeRequest,
    Error, MaskSource, ProcessResult, Resample, ResizeTarget,
};

#[derive(Clone, Copy, Debug, ValueEnum)]
enum MaskArg {
    /// Use the content image's own alpha channel
    Embedded,
    /// Key out a background colour from the content image
    Segmentation,
    /// Blend every pixel with the same weight
    Uniform,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResizeArg {
    /// Resize the style image to the content image
    Content,
    /// Resize the content image to the style image
    Style,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ResampleArg {
    Nearest,
    Bilinear,
}

#[derive(Parser)]
#[command(
    name = "style-composite",
    about = "Composite a content image over a style image via alpha blending",
    version,
    after_help = "Simple usage: style-composite <content> <style>  (writes {name}_composite.{ext})\n\n\
                  If <content> is a directory, every JPEG/PNG in it is composited over <style>\n\
                  and written under the same name into the -o directory."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Content (subject) image file or directory
    content: PathBuf,

    /// Style (background) image file
    style: PathBuf,

    /// Output file or directory (default: {name}_composite.{ext})
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// JSON configuration file; flags below override its values
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where the blend weights come from
    #[arg(short, long, value_enum)]
    mask_source: Option<MaskArg>,

    /// Foreground weight for uniform blending (0.0-1.0)
    #[arg(short, long)]
    weight: Option<f32>,

    /// Which image's dimensions the result takes
    #[arg(long, value_enum)]
    resize_target: Option<ResizeArg>,

    /// Resampling filter
    #[arg(long, value_enum)]
    resample: Option<ResampleArg>,

    /// JPEG quality (1-100)
    #[arg(long)]
    quality: Option<u8>,

    /// Background colour to key out in segmentation mode, as R,G,B
    #[arg(long, default_value = "0,255,0", value_parser = parse_rgb)]
    key_color: [u8; 3],

    /// Colour distance treated as pure background
    #[arg(long, default_value = "60")]
    tolerance: f32,

    /// Width of the soft edge beyond the tolerance
    #[arg(long, default_value = "40")]
    softness: f32,

    /// Segmentation time budget in milliseconds
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Fall back to a fully opaque mask when segmentation fails
    #[arg(long)]
    opaque_fallback: bool,

    /// Print base64 PNG previews of content, style and result as JSON
    #[arg(long)]
    json: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

fn parse_rgb(s: &str) -> Result<[u8; 3], String> {
    let parts: Vec<&str> = s.split(',').map(str::trim).collect();
    let &[r, g, b] = parts.as_slice() else {
        return Err(format!("expected R,G,B, got '{s}'"));
    };
    let channel = |v: &str| v.parse::<u8>().map_err(|e| format!("bad channel '{v}': {e}"));
    Ok([channel(r)?, channel(g)?, channel(b)?])
}

fn init_logging(cli: &Cli) {
    let level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn build_config(cli: &Cli) -> Result<CompositeConfig, Error> {
    let mut config = match &cli.config {
        Some(path) => CompositeConfig::from_json_file(path)?,
        None => CompositeConfig::default(),
    };

    match (cli.mask_source, cli.weight) {
        (Some(MaskArg::Embedded), _) => config.mask_source = MaskSource::Embedded,
        (Some(MaskArg::Segmentation), _) => config.mask_source = MaskSource::Segmentation,
        (Some(MaskArg::Uniform) | None, Some(weight)) => {
            config.mask_source = MaskSource::Uniform { weight };
        }
        (Some(MaskArg::Uniform), None) => {
            if !matches!(config.mask_source, MaskSource::Uniform { .. }) {
                config.mask_source = MaskSource::default();
            }
        }
        (None, None) => {}
    }
    if let Some(target) = cli.resize_target {
        config.resize_target = match target {
            ResizeArg::Content => ResizeTarget::Content,
            ResizeArg::Style => ResizeTarget::Style,
        };
    }
    if let Some(resample) = cli.resample {
        config.resample = match resample {
            ResampleArg::Nearest => Resample::Nearest,
            ResampleArg::Bilinear => Resample::Bilinear,
        };
    }
    if let Some(quality) = cli.quality {
        config.jpeg_quality = quality;
    }
    if let Some(timeout) = cli.timeout_ms {
        config.segmentation_timeout_ms = timeout;
    }
    if cli.opaque_fallback {
        config.opaque_on_segmentation_failure = true;
    }

    config.validate()?;
    Ok(config)
}

fn exit_code(error: &Error) -> i32 {
    if error.is_client_error() {
        2
    } else {
        1
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli);

    let config = match build_config(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Error: {e}");
            process::exit(exit_code(&e));
        }
    };

    let keyer = ChromaKeyProvider {
        key: cli.key_color,
        tolerance: cli.tolerance,
        softness: cli.softness,
    };
    let engine = match CompositeEngine::new(config) {
        Ok(e) => e.with_provider(keyer),
        Err(e) => {
            eprintln!("Fatal: Failed to initialize engine: {e}");
            process::exit(exit_code(&e));
        }
    };
    tracing::debug!(?engine, "engine ready");

    for path in [&cli.content, &cli.style] {
        if !path.exists() {
            eprintln!("Error: Input path does not exist: {}", path.display());
            process::exit(2);
        }
    }

    if cli.json {
        if cli.content.is_dir() {
            eprintln!("Error: --json requires a single content file");
            process::exit(2);
        }
        process::exit(print_preview(&engine, &cli));
    }

    let results = if cli.content.is_dir() {
        let Some(output_dir) = &cli.output else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: style-composite <content_dir> <style> -o <output_dir>");
            process::exit(2);
        };
        engine.process_directory(&cli.content, &cli.style, output_dir)
    } else {
        let output = cli
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&cli.content));
        vec![engine.process_file(&cli.content, &cli.style, &output)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;
    let mut code = 0;

    for r in &results {
        print_result(r, cli.quiet);
        if let Some(e) = &r.error {
            fail_count += 1;
            code = code.max(exit_code(e));
        } else {
            success_count += 1;
        }
    }

    if results.len() > 1 && !cli.quiet {
        eprintln!();
        eprint!("[Summary] Composited: {success_count}");
        if fail_count > 0 {
            eprint!(", Failed: {fail_count}");
        }
        eprintln!(" (Total: {})", results.len());
    }

    process::exit(code);
}

fn print_preview(engine: &CompositeEngine, cli: &Cli) -> i32 {
    let payload = CompositeRequest::open(&cli.content, &cli.style)
        .and_then(|request| engine.preview(&request))
        .and_then(|payload| payload.to_json());

    match payload {
        Ok(json) => {
            println!("{json}");
            0
        }
        Err(e) => {
            eprintln!("[FAIL] {}: {e}", file_name(&cli.content));
            exit_code(&e)
        }
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    )
}

fn print_result(result: &ProcessResult, quiet: bool) {
    let name = file_name(&result.path);
    if result.success() {
        if !quiet {
            eprintln!("[OK] {name} -> {} ({})", result.output.display(), result.message());
        }
    } else {
        eprintln!("[FAIL] {name}: {}", result.message());
    }
}
