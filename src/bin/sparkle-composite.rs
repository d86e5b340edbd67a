use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, ValueEnum};
use tracing::Level;

use sparkle_compositor::{
    default_output_path, AlphaMode, CompositeOptions, FilterType, ProcessResult, ResizePolicy,
    SparkleEngine, DEFAULT_OPACITY,
};

#[derive(Parser)]
#[command(
    name = "sparkle-composite",
    about = "Composite a sparkle overlay onto a base image at a chosen opacity",
    version,
    after_help = "Simple usage: sparkle-composite treasure.png sparkles.png  \
                  (writes treasure_sparkled.png)\n\n\
                  If BASE is a directory, every supported image in it is composited \
                  and written to the -o directory."
)]
#[allow(clippy::struct_excessive_bools)]
struct Cli {
    /// Base image file or directory
    base: String,

    /// Overlay image file
    overlay: String,

    /// Output file or directory (default: {name}_sparkled.{ext})
    #[arg(short, long)]
    output: Option<String>,

    /// Overlay opacity (0.0-1.0)
    #[arg(short, long, default_value_t = DEFAULT_OPACITY)]
    opacity: f32,

    /// Use a uniform overlay alpha instead of scaling the overlay's own alpha
    #[arg(long)]
    replace_alpha: bool,

    /// Resampling filter used when the overlay is stretched to the base size
    #[arg(long, value_enum, default_value_t = Filter::CatmullRom)]
    filter: Filter,

    /// Fail instead of stretching when overlay and base sizes differ
    #[arg(long)]
    no_resize: bool,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Suppress all non-error output
    #[arg(short, long)]
    quiet: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Filter {
    Nearest,
    Triangle,
    CatmullRom,
    Gaussian,
    Lanczos3,
}

impl From<Filter> for FilterType {
    fn from(f: Filter) -> Self {
        match f {
            Filter::Nearest => FilterType::Nearest,
            Filter::Triangle => FilterType::Triangle,
            Filter::CatmullRom => FilterType::CatmullRom,
            Filter::Gaussian => FilterType::Gaussian,
            Filter::Lanczos3 => FilterType::Lanczos3,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else if cli.quiet {
        Level::ERROR
    } else {
        Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();

    if !(0.0..=1.0).contains(&cli.opacity) {
        eprintln!("Error: Opacity must be between 0.0 and 1.0");
        process::exit(1);
    }

    let opts = CompositeOptions {
        opacity: cli.opacity,
        alpha_mode: if cli.replace_alpha {
            AlphaMode::Replace
        } else {
            AlphaMode::Scale
        },
        resize: if cli.no_resize {
            ResizePolicy::Reject
        } else {
            ResizePolicy::Stretch(cli.filter.into())
        },
    };

    let engine = match SparkleEngine::open(Path::new(&cli.overlay), opts) {
        Ok(e) => e,
        Err(e) => {
            eprintln!("Fatal: Failed to load overlay {}: {e}", cli.overlay);
            process::exit(1);
        }
    };

    let base_path = Path::new(&cli.base);
    if !base_path.exists() {
        eprintln!("Error: Base path does not exist: {}", cli.base);
        process::exit(1);
    }

    if !cli.quiet {
        eprintln!(
            "Opacity: {:.0}%{}",
            opts.opacity * 100.0,
            if cli.replace_alpha {
                " (uniform alpha)"
            } else {
                ""
            }
        );
        eprintln!();
    }

    let results = if base_path.is_dir() {
        let output_dir = if let Some(o) = &cli.output {
            PathBuf::from(o)
        } else {
            eprintln!("Error: Output directory is required for batch processing");
            eprintln!("Usage: sparkle-composite <base_dir> <overlay> -o <output_dir>");
            process::exit(1);
        };
        engine.process_directory(base_path, &output_dir)
    } else {
        let output_path = match &cli.output {
            Some(o) => PathBuf::from(o),
            None => default_output_path(base_path),
        };
        vec![engine.process_file(base_path, &output_path)]
    };

    let mut success_count = 0u32;
    let mut fail_count = 0u32;

    for r in &results {
        print_result(r, cli.verbose, cli.quiet);
        if r.success {
            success_count += 1;
        } else {
            fail_count += 1;
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

    if fail_count > 0 {
        process::exit(1);
    }
}

fn print_result(result: &ProcessResult, verbose: bool, quiet: bool) {
    if quiet && result.success {
        return;
    }

    let filename = result.path.file_name().map_or_else(
        || result.path.display().to_string(),
        |f| f.to_string_lossy().to_string(),
    );

    if result.success {
        if result.resized {
            eprintln!("[OK] {filename} (overlay stretched)");
        } else {
            eprintln!("[OK] {filename}");
        }
    } else {
        eprintln!("[FAIL] {filename}: {}", result.message);
    }

    if verbose && !result.message.is_empty() {
        eprintln!("  -> {}", result.message);
    }
}
