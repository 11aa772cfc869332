use clap::Parser;
use std::path::PathBuf;

// Build version with decoder info
const VERSION_INFO: &str = const_format::concatcp!(
    env!("CARGO_PKG_VERSION"), "\n",
    "Images: png, jpeg (image crate)\n",
    "Video:  raw-rgba\n",
    "Target: ", std::env::consts::ARCH, "-", std::env::consts::OS
);

/// Scroll-driven frame animation renderer
///
/// Loads `{host}/{id}/animation.json`, assembles the frame sequence and
/// writes the frame shown at each scroll position as a PNG.
#[derive(Parser, Debug)]
#[command(author, version = VERSION_INFO, about, long_about = None)]
pub struct Args {
    /// Directory (or file:// URL) holding one folder per animation
    #[arg(long = "host", value_name = "DIR")]
    pub host: String,

    /// Animation id (folder name under the host)
    #[arg(long = "id", value_name = "NAME")]
    pub id: String,

    /// Section top offset to render (repeatable, negative once scrolled past)
    #[arg(short = 's', long = "scroll", value_name = "TOP", allow_hyphen_values = true)]
    pub scroll: Vec<f64>,

    /// Height of the scroll section
    #[arg(long = "section-height", value_name = "PX", default_value_t = 3000.0)]
    pub section_height: f64,

    /// Viewport height
    #[arg(long = "viewport-height", value_name = "PX", default_value_t = 1000.0)]
    pub viewport_height: f64,

    /// Rendered canvas height (default: frame height)
    #[arg(long = "canvas-height", value_name = "PX")]
    pub canvas_height: Option<f64>,

    /// Output directory for rendered PNGs
    #[arg(short = 'o', long = "out", value_name = "DIR", default_value = "frames")]
    pub out: PathBuf,

    /// Worker threads (default: 3/4 of the cores)
    #[arg(long = "workers", value_name = "N")]
    pub workers: Option<usize>,

    /// Give up loading after this many milliseconds
    #[arg(long = "timeout-ms", value_name = "MS", default_value_t = 30_000)]
    pub timeout_ms: u64,

    /// Enable logging to file (default: scrollreel.log)
    #[arg(short = 'l', long = "log", value_name = "LOG_FILE")]
    pub log_file: Option<Option<PathBuf>>,

    /// Increase logging verbosity (default: warn, -v: info, -vv: debug, -vvv+: trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbosity: u8,
}
