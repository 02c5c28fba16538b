use clap::{Parser, Subcommand};
use std::path::PathBuf;
use upload_shrink::imaging::{self, Blob, ImageFile, RustBackend};
use upload_shrink::{batch, config, output};

fn version_string() -> &'static str {
    if env!("ON_RELEASE_TAG") == "true" {
        return env!("CARGO_PKG_VERSION");
    }
    match env!("GIT_HASH") {
        "" => "dev@unknown",
        // Leaked once at startup
        hash => Box::leak(format!("dev@{hash}").into_boxed_str()),
    }
}

#[derive(Parser)]
#[command(name = "upload-shrink")]
#[command(about = "Shrink images to fit an upload size budget")]
#[command(long_about = "\
Shrink images to fit an upload size budget

Files already under the budget are copied through byte for byte. Larger
files are scaled down so the longer side is at most 1920 px, then encoded
at quality 0.8, 0.7, ... down to 0.3 until the result fits. The media type
never changes: a JPEG stays a JPEG, a PNG stays a PNG.

Settings are layered: built-in defaults, then upload-shrink.toml (or the
file given with --config), then command-line flags.

Run 'upload-shrink gen-config' to generate a documented config file.")]
#[command(version = version_string())]
struct Cli {
    /// Config file [default: upload-shrink.toml if present]
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

/// Flags that override config file values.
#[derive(clap::Args, Clone, Default)]
struct CompressionFlags {
    /// Size budget in megabytes (1 MB = 1024*1024 bytes)
    #[arg(long)]
    budget_mb: Option<f64>,
    /// Starting quality in (0, 1]
    #[arg(long)]
    quality: Option<f64>,
    /// Quality floor in (0, quality]
    #[arg(long)]
    min_quality: Option<f64>,
    /// Longer-side cap in pixels
    #[arg(long)]
    max_dimension: Option<u32>,
    /// Max parallel workers (capped at the CPU count)
    #[arg(long)]
    max_processes: Option<usize>,
}

impl CompressionFlags {
    /// Render the flags that were given as a TOML overlay.
    fn overlay(&self) -> Option<toml::Value> {
        let mut compression = toml::Table::new();
        if let Some(v) = self.budget_mb {
            compression.insert("size_budget_mb".into(), toml::Value::Float(v));
        }
        if let Some(v) = self.quality {
            compression.insert("quality".into(), toml::Value::Float(v));
        }
        if let Some(v) = self.min_quality {
            compression.insert("min_quality".into(), toml::Value::Float(v));
        }
        if let Some(v) = self.max_dimension {
            compression.insert("max_dimension".into(), toml::Value::Integer(v.into()));
        }
        let mut processing = toml::Table::new();
        if let Some(v) = self.max_processes {
            processing.insert("max_processes".into(), toml::Value::Integer(v as i64));
        }

        let mut root = toml::Table::new();
        if !compression.is_empty() {
            root.insert("compression".into(), toml::Value::Table(compression));
        }
        if !processing.is_empty() {
            root.insert("processing".into(), toml::Value::Table(processing));
        }
        (!root.is_empty()).then_some(toml::Value::Table(root))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Compress files and directories into an output directory
    Compress {
        /// Image files or directories (walked recursively)
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Output directory
        #[arg(long, short, default_value = "shrunk")]
        output: PathBuf,
        /// Print the JSON report instead of the per-file tree
        #[arg(long)]
        json: bool,
        #[command(flatten)]
        flags: CompressionFlags,
    },
    /// Print a file as a base64 data URL
    DataUrl {
        file: PathBuf,
        /// Compress to the configured budget first
        #[arg(long)]
        compress: bool,
        #[command(flatten)]
        flags: CompressionFlags,
    },
    /// Print a stock config file with all options documented
    GenConfig,
}

fn load_config(
    explicit: Option<&PathBuf>,
    flags: &CompressionFlags,
) -> Result<config::Config, Box<dyn std::error::Error>> {
    let path = match explicit {
        Some(path) if !path.exists() => {
            return Err(format!("config file not found: {}", path.display()).into());
        }
        Some(path) => path.clone(),
        None => PathBuf::from(config::DEFAULT_CONFIG_FILE),
    };
    Ok(config::load_config(&path, flags.overlay())?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command {
        Command::Compress {
            paths,
            output: output_dir,
            json,
            flags,
        } => {
            let config = load_config(cli.config.as_ref(), &flags)?;
            init_thread_pool(&config.processing);
            let options = config.compression.options();
            let inputs = batch::collect_inputs(&paths, &output_dir)?;

            let report = if json {
                batch::run(&RustBackend::new(), &inputs, &output_dir, &options, None)?
            } else {
                println!(
                    "==> Compressing {} files to {} (budget {})",
                    inputs.len(),
                    output_dir.display(),
                    options.size_budget
                );
                let (tx, rx) = std::sync::mpsc::channel();
                let printer = std::thread::spawn(move || {
                    for event in rx {
                        output::print_batch_event(&event);
                    }
                });
                let report =
                    batch::run(&RustBackend::new(), &inputs, &output_dir, &options, Some(tx))?;
                printer.join().map_err(|_| "output thread panicked")?;
                report
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                output::print_batch_summary(&report);
            }
        }
        Command::DataUrl {
            file,
            compress,
            flags,
        } => {
            let source = ImageFile::open(&file)?;
            let url = if compress {
                let config = load_config(cli.config.as_ref(), &flags)?;
                let compressed =
                    imaging::compress(&RustBackend::new(), &source, &config.compression.options())?;
                imaging::blob_to_base64(&compressed.blob)
            } else {
                imaging::blob_to_base64(&Blob::borrowed(source.bytes(), source.format()))
            };
            println!("{url}");
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Initialize the rayon thread pool based on processing config.
///
/// Caps at the number of available CPU cores — user can constrain down, not up.
fn init_thread_pool(processing: &config::ProcessingConfig) {
    let threads = config::effective_threads(processing);
    rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build_global()
        .ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn no_flags_means_no_overlay() {
        assert!(CompressionFlags::default().overlay().is_none());
    }

    #[test]
    fn flags_become_overlay_tables() {
        let flags = CompressionFlags {
            budget_mb: Some(2.0),
            max_dimension: Some(1280),
            max_processes: Some(2),
            ..CompressionFlags::default()
        };
        let overlay = flags.overlay().unwrap();
        let compression = overlay.get("compression").unwrap();
        assert_eq!(compression.get("size_budget_mb").unwrap().as_float(), Some(2.0));
        assert_eq!(compression.get("max_dimension").unwrap().as_integer(), Some(1280));
        assert!(compression.get("quality").is_none());
        assert_eq!(
            overlay
                .get("processing")
                .unwrap()
                .get("max_processes")
                .unwrap()
                .as_integer(),
            Some(2)
        );
    }

    #[test]
    fn parse_compress_command() {
        let cli = Cli::try_parse_from([
            "upload-shrink",
            "compress",
            "a.jpg",
            "photos",
            "--output",
            "out",
            "--quality",
            "0.9",
        ])
        .unwrap();
        match cli.command {
            Command::Compress {
                paths,
                output,
                flags,
                json,
            } => {
                assert_eq!(paths, vec![PathBuf::from("a.jpg"), PathBuf::from("photos")]);
                assert_eq!(output, PathBuf::from("out"));
                assert_eq!(flags.quality, Some(0.9));
                assert!(!json);
            }
            _ => panic!("expected compress command"),
        }
    }
}
