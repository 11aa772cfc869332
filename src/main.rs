use scrollreel::cli::Args;
use scrollreel::core::controller::{AnimationController, Services};
use scrollreel::core::mapper::{ScrollGeometry, SharedRegion};
use scrollreel::core::scroll_feed::ScrollFeed;
use scrollreel::core::workers::Workers;
use scrollreel::entities::{Fetcher, FsFetcher, Manifest, RasterCanvas, WorkerPool};

use anyhow::{Context, bail};
use clap::Parser;
use log::{debug, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn init_logging(args: &Args) -> anyhow::Result<()> {
    // 0 (default) = warn, 1 (-v) = info, 2 (-vv) = debug, 3+ (-vvv) = trace
    let log_level = match args.verbosity {
        0 => log::LevelFilter::Warn,
        1 => log::LevelFilter::Info,
        2 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };

    if let Some(log_path_opt) = &args.log_file {
        let log_path = log_path_opt
            .clone()
            .unwrap_or_else(|| PathBuf::from("scrollreel.log"));
        let file = std::fs::File::create(&log_path)
            .with_context(|| format!("Failed to create log file {}", log_path.display()))?;

        env_logger::Builder::new()
            .filter_level(log_level)
            .format_timestamp_millis()
            .target(env_logger::Target::Pipe(Box::new(file)))
            .init();

        info!("Logging to file: {} (level: {:?})", log_path.display(), log_level);
    } else {
        // Console logging (respects RUST_LOG if set)
        let default_level = match args.verbosity {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };

        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
            .format_timestamp_millis()
            .init();
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    init_logging(&args)?;

    info!("scrollreel starting...");
    debug!("Command-line args: {:?}", args);

    let threads = args.workers.unwrap_or_else(Workers::default_threads);
    let workers: Arc<dyn WorkerPool> = Arc::new(Workers::new(threads).context("Failed to start worker threads")?);
    let fetcher: Arc<dyn Fetcher> = Arc::new(FsFetcher);

    let descriptor = Manifest::fetch_descriptor(fetcher.as_ref(), &args.host, &args.id)
        .with_context(|| format!("Failed to load animation '{}' from {}", args.id, args.host))?;
    info!(
        "Animation '{}': {} source files, {}x{} frames{}",
        args.id,
        descriptor.num_source_files,
        descriptor.frame_size.0,
        descriptor.frame_size.1,
        if descriptor.is_video() { " (video)" } else { "" }
    );

    let region = SharedRegion::new(ScrollGeometry {
        section_height: args.section_height,
        section_top: 0.0,
        canvas_height: args.canvas_height.unwrap_or(descriptor.frame_size.1 as f64),
        viewport_height: args.viewport_height,
    });

    let services = Services::new(fetcher, workers);
    let controller = Arc::new(Mutex::new(AnimationController::new(
        RasterCanvas::new(0, 0),
        region.clone(),
        descriptor,
        &services,
    )));
    let feed = ScrollFeed::new();
    let _subscription = feed.bind(Arc::clone(&controller));

    {
        let mut ctl = controller.lock().unwrap_or_else(|e| e.into_inner());
        if !ctl.wait_loaded(Duration::from_millis(args.timeout_ms)) {
            bail!("Animation '{}' did not finish loading within {} ms", args.id, args.timeout_ms);
        }
        let mut caught_up = 0;
        while ctl.on_refresh() {
            caught_up += 1;
        }
        debug!("Catch-up drew {} frames", caught_up);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("Failed to create output directory {}", args.out.display()))?;

    // No scroll positions: write whatever is on the canvas now
    let positions: Vec<Option<f64>> = if args.scroll.is_empty() {
        vec![None]
    } else {
        args.scroll.iter().copied().map(Some).collect()
    };

    for (i, top) in positions.into_iter().enumerate() {
        if let Some(top) = top {
            region.scroll_to(top);
            feed.notify();
        }

        let ctl = controller.lock().unwrap_or_else(|e| e.into_inner());
        let path = args.out.join(format!("{:04}.png", i));
        ctl.canvas()
            .save_png(&path)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        match ctl.shown() {
            Some(key) => info!("{}: frame {}", path.display(), key),
            None => warn!("{}: no frame drawn", path.display()),
        }
    }

    Ok(())
}
