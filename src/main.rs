use clap::{Args, Parser, Subcommand};
use simple_img::config::{self, ImgConfig};
use simple_img::imaging::{
    ImageError, ImageHandle, Quality, ResizeMode, RustBackend, WatermarkAnchor, WatermarkOptions,
};
use simple_img::output::{self, TransformSummary};
use simple_img::{batch, render};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "simple-img")]
#[command(about = "Resize, crop and watermark PNG, GIF and JPEG images")]
#[command(long_about = "\
Resize, crop and watermark PNG, GIF and JPEG images

Resize modes:

  strict  exactly WIDTHxHEIGHT, aspect ratio ignored
  ratio   fit inside WIDTHxHEIGHT, never upscale
  crop    fill WIDTHxHEIGHT, then trim the overflow from the center

Give only --width or --height to derive the other from the aspect ratio.

Run 'simple-img gen-config' to generate a documented config.toml.")]
#[command(version)]
struct Cli {
    /// Config file (default: ./config.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v info, -vv debug). RUST_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

/// Input and output shared by single-image commands.
#[derive(Args)]
struct ImageArgs {
    /// Image to transform
    input: PathBuf,

    /// Where to write the result (default: overwrite the input)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Encoding quality 0-100 (default: output.quality from config)
    #[arg(short, long)]
    quality: Option<u32>,
}

#[derive(Subcommand)]
enum Command {
    /// Resize an image
    Resize {
        #[command(flatten)]
        image: ImageArgs,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        /// strict | ratio | crop
        #[arg(long, default_value = "crop")]
        mode: ResizeMode,
    },
    /// Crop a rectangle, or the middle of the image with --center
    Crop {
        #[command(flatten)]
        image: ImageArgs,
        #[arg(long)]
        width: Option<u32>,
        #[arg(long)]
        height: Option<u32>,
        #[arg(short, default_value_t = 0, allow_negative_numbers = true)]
        x: i64,
        #[arg(short, default_value_t = 0, allow_negative_numbers = true)]
        y: i64,
        /// Crop from the center (requires --width and --height)
        #[arg(long, conflicts_with_all = ["x", "y"])]
        center: bool,
    },
    /// Stamp an overlay image onto an image
    Watermark {
        #[command(flatten)]
        image: ImageArgs,
        /// Overlay image
        overlay: PathBuf,
        /// top-left | top-right | bottom-right | bottom-left | center
        #[arg(long)]
        anchor: Option<String>,
        /// Resize the overlay to this width first
        #[arg(long)]
        width: Option<u32>,
        /// Resize the overlay to this height first
        #[arg(long)]
        height: Option<u32>,
        /// Border margin for corner anchors, in pixels
        #[arg(long, allow_negative_numbers = true)]
        offset: Option<i64>,
    },
    /// Print the HTTP headers for an image and write the encoded body
    Render {
        /// Image to render
        input: PathBuf,
        /// File to write the body to
        #[arg(short, long)]
        output: PathBuf,
        /// Filename for Content-Disposition
        #[arg(long)]
        name: Option<String>,
        /// Cache lifetime in seconds (default: render.expires from config)
        #[arg(long)]
        expires: Option<u32>,
        #[arg(short, long)]
        quality: Option<u32>,
    },
    /// Apply the [[batch.steps]] recipe to every image in a directory
    Batch {
        /// Directory of source images (searched recursively)
        source: PathBuf,
        /// Directory for results
        output: PathBuf,
        /// Write a JSON report here (default: <output>/manifest.json)
        #[arg(long)]
        manifest: Option<PathBuf>,
    },
    /// Print a stock config.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = match (&cli.command, &cli.config) {
        (Command::GenConfig, _) => ImgConfig::default(),
        (_, Some(path)) => config::load_config_file(path)?,
        (_, None) => config::load_config(Path::new("."))?,
    };
    let backend = RustBackend::new();

    match cli.command {
        Command::Resize {
            image,
            width,
            height,
            mode,
        } => {
            transform(&backend, &config, &image, &format!("resize {mode}"), |handle| {
                handle.resize(width, height, mode)
            })?;
        }
        Command::Crop {
            image,
            width,
            height,
            x,
            y,
            center,
        } => {
            if center {
                let (Some(w), Some(h)) = (width, height) else {
                    return Err("--center needs both --width and --height".into());
                };
                transform(&backend, &config, &image, "crop center", |handle| {
                    handle.crop_from_center(w, h)
                })?;
            } else {
                transform(&backend, &config, &image, &format!("crop at {x},{y}"), |handle| {
                    handle.crop(x, y, width, height)
                })?;
            }
        }
        Command::Watermark {
            image,
            overlay,
            anchor,
            width,
            height,
            offset,
        } => {
            let anchor = anchor
                .as_deref()
                .map(WatermarkAnchor::from)
                .unwrap_or_else(|| config.watermark.anchor.clone());
            let options = offset
                .map(|offset| WatermarkOptions { offset })
                .unwrap_or_else(|| config.watermark_options());
            transform(&backend, &config, &image, &format!("watermark {anchor}"), |handle| {
                handle.watermark(&overlay, &anchor, width, height, options)
            })?;
        }
        Command::Render {
            input,
            output: dest,
            name,
            expires,
            quality,
        } => {
            let handle = ImageHandle::open(&backend, &input)?;
            let options = render::RenderOptions {
                name,
                quality: quality.map(Quality::new).unwrap_or_else(|| config.quality()),
                expires: expires.unwrap_or(config.render.expires),
                last_modified: None,
            };
            let rendered = render::render(handle, &options)?;
            std::fs::write(&dest, &rendered.bytes)?;
            for (name, value) in &rendered.headers {
                println!("{name}: {value}");
            }
        }
        Command::Batch {
            source,
            output: dest,
            manifest,
        } => {
            init_thread_pool(&config.processing);
            let recipe = batch::Recipe::from_config(&config);
            let report = batch::run_batch(&backend, &source, &dest, &recipe)?;
            let manifest_path = manifest.unwrap_or_else(|| dest.join("manifest.json"));
            batch::write_manifest(&report, &manifest_path)?;
            output::print_batch_output(&report, &source);
        }
        Command::GenConfig => {
            print!("{}", config::stock_config_toml());
        }
    }

    Ok(())
}

/// Open `args.input`, run `op` on it, save, and print what happened.
fn transform<F>(
    backend: &RustBackend,
    config: &ImgConfig,
    args: &ImageArgs,
    operation: &str,
    op: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: FnOnce(&mut ImageHandle<'_, RustBackend>) -> Result<(), ImageError>,
{
    let mut handle = ImageHandle::open(backend, &args.input)?;
    let before = handle.dimensions()?;
    op(&mut handle)?;

    let quality = args.quality.map(Quality::new).unwrap_or_else(|| config.quality());
    let written = handle.save(args.output.as_deref(), quality)?;

    output::print_transform_output(&TransformSummary {
        source: args.input.clone(),
        format: handle.format()?,
        before,
        after: handle.dimensions()?,
        operation: operation.to_string(),
        output: written,
    });
    Ok(())
}

/// Logs go to stderr so stdout stays clean for command output.
fn init_tracing(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .init();
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
