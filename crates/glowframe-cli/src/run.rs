use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use glowframe::{
    Clock, FrameOutcome, Gpu, ManualClock, Motion, MotionOptions, RecordingGpu, WgpuGpu,
    WgpuOptions,
};
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::cli::{CheckConfigArgs, Cli, Command, RenderArgs, RunArgs, StyleArgs};

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    match cli.command {
        Command::Render(args) => render(args),
        Command::Run(args) => run_loop(args),
        Command::CheckConfig(args) => check_config(args),
    }
}

fn initialise_tracing() {
    let default_filter = "info,naga=error,wgpu=error,wgpu_core=error,wgpu_hal=error";
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Loads the options file, if any, then applies command-line overrides.
fn build_options(style: &StyleArgs) -> Result<MotionOptions> {
    let mut options = match &style.config {
        Some(path) => MotionOptions::from_path(path)
            .with_context(|| format!("failed to load options from {}", path.display()))?,
        None => MotionOptions::default(),
    };

    if let Some((width, height)) = style.size {
        options.width = Some(width);
        options.height = Some(height);
    }
    if style.ratio.is_some() {
        options.ratio = style.ratio;
    }
    if style.mode.is_some() {
        options.mode = style.mode;
    }
    if style.border_width.is_some() {
        options.border_width = style.border_width;
    }
    if style.glow_width.is_some() {
        options.glow_width = style.glow_width;
    }
    if style.border_radius.is_some() {
        options.border_radius = style.border_radius;
    }
    if !style.colors.is_empty() {
        options.colors = Some(style.colors.clone());
    }

    options.validate().context("invalid command-line options")?;
    Ok(options)
}

fn headless_gpu() -> Result<WgpuGpu> {
    let gpu = WgpuGpu::new(WgpuOptions::default()).context("failed to initialise GPU")?;
    tracing::info!(adapter = gpu.adapter_name(), "using GPU adapter");
    Ok(gpu)
}

fn render(args: RenderArgs) -> Result<()> {
    let options = build_options(&args.style)?;
    if !args.time.is_finite() || args.time < 0.0 {
        bail!("--time must be a finite, non-negative number of seconds");
    }

    if args.style.dry_run {
        let mut motion = Motion::with_gpu(RecordingGpu::new(), &options, ManualClock::new(), None)?;
        draw_still(&mut motion, args.time)?;
        let gpu = motion.gpu();
        let (width, height) = gpu.drawing_buffer_size();
        tracing::info!(
            width,
            height,
            draws = gpu.draw_count(),
            calls = gpu.call_count(),
            "dry run complete"
        );
        print_json(&RenderSummary {
            width,
            height,
            time: args.time,
            output: None,
        })?;
        motion.dispose()?;
        return Ok(());
    }

    let Some(output) = args.output.as_deref() else {
        bail!("--output is required unless --dry-run is given");
    };
    let mut motion = Motion::with_gpu(headless_gpu()?, &options, ManualClock::new(), None)?;
    draw_still(&mut motion, args.time)?;
    let image = motion
        .gpu_mut()
        .read_pixels()
        .context("failed to read back rendered frame")?;
    save_png(&image, output)?;
    tracing::info!(
        path = %output.display(),
        width = image.width(),
        height = image.height(),
        time = args.time,
        "wrote frame"
    );
    print_json(&RenderSummary {
        width: image.width(),
        height: image.height(),
        time: args.time,
        output: Some(output.display().to_string()),
    })?;
    motion.dispose()?;
    Ok(())
}

fn draw_still<G: Gpu>(motion: &mut Motion<G, ManualClock>, time: f32) -> Result<()> {
    motion.start().context("failed to start border animation")?;
    motion.pause()?;
    if time > 0.0 {
        motion
            .redraw_at(time)
            .with_context(|| format!("failed to draw frame at t={time}"))?;
    }
    Ok(())
}

fn save_png(image: &image::RgbaImage, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn run_loop(args: RunArgs) -> Result<()> {
    let options = build_options(&args.style)?;
    if args.style.dry_run {
        let motion = Motion::with_gpu(RecordingGpu::new(), &options, ManualClock::new(), None)?;
        simulate(motion, args.duration, args.refresh)
    } else {
        let motion = Motion::with_gpu(headless_gpu()?, &options, ManualClock::new(), None)?;
        simulate(motion, args.duration, args.refresh)
    }
}

/// Drives the frame loop at `refresh` Hz of simulated time for `duration`.
fn simulate<G: Gpu>(
    mut motion: Motion<G, ManualClock>,
    duration: Duration,
    refresh: f64,
) -> Result<()> {
    let interval = Duration::from_secs_f64(1.0 / refresh);
    let clock = motion.clock().clone();
    let start = clock.now();

    motion.start().context("failed to start border animation")?;
    let mut ticks = 0u64;
    let mut last_time = 0.0f32;
    while clock.now().saturating_duration_since(start) + interval <= duration {
        clock.advance(interval);
        let Some(token) = motion.pending_frame() else {
            bail!("animation stopped requesting frames");
        };
        if let FrameOutcome::Drawn { time } = motion.on_frame(token, clock.now())? {
            last_time = time;
            tracing::trace!(time, "frame admitted");
        }
        ticks += 1;
    }

    let stats = motion.stats();
    tracing::info!(
        ticks,
        admitted = stats.admitted,
        dropped = stats.dropped,
        "run complete"
    );
    print_json(&RunSummary {
        duration_ms: duration.as_millis(),
        refresh_hz: refresh,
        ticks,
        admitted: stats.admitted,
        dropped: stats.dropped,
        last_time,
    })?;
    motion.dispose()?;
    Ok(())
}

fn check_config(args: CheckConfigArgs) -> Result<()> {
    let options = MotionOptions::from_path(&args.path)
        .with_context(|| format!("invalid options file {}", args.path.display()))?;
    let resolved = options
        .resolve(None)
        .with_context(|| format!("invalid options file {}", args.path.display()))?;
    tracing::debug!(path = %args.path.display(), "options file is valid");
    print_json(&resolved)
}

#[derive(Serialize)]
struct RenderSummary {
    width: u32,
    height: u32,
    time: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
}

#[derive(Serialize)]
struct RunSummary {
    duration_ms: u128,
    refresh_hz: f64,
    ticks: u64,
    admitted: u64,
    dropped: u64,
    last_time: f32,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value).context("failed to serialise output")?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn style() -> StyleArgs {
        StyleArgs {
            dry_run: true,
            ..StyleArgs::default()
        }
    }

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("border.toml");
        std::fs::write(&path, "width = 100\nheight = 80\nmode = \"dark\"\nglow_width = 30\n").unwrap();

        let args = StyleArgs {
            config: Some(path),
            size: Some((320.0, 240.0)),
            glow_width: Some(12.0),
            ..style()
        };
        let options = build_options(&args).unwrap();
        assert_eq!(options.width, Some(320.0));
        assert_eq!(options.height, Some(240.0));
        assert_eq!(options.glow_width, Some(12.0));
        assert_eq!(options.mode, Some(glowframe::ModeSetting::Dark));
    }

    #[test]
    fn missing_config_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let args = StyleArgs {
            config: Some(dir.path().join("absent.toml")),
            ..style()
        };
        let err = build_options(&args).unwrap_err();
        assert!(format!("{err:#}").contains("absent.toml"));
    }

    #[test]
    fn wrong_color_count_is_rejected() {
        let args = StyleArgs {
            colors: vec!["rgb(1, 2, 3)".to_string()],
            ..style()
        };
        assert!(build_options(&args).is_err());
    }

    #[test]
    fn still_frame_draws_at_requested_time() {
        let options = build_options(&style()).unwrap();
        let mut motion =
            Motion::with_gpu(RecordingGpu::new(), &options, ManualClock::new(), None).unwrap();
        draw_still(&mut motion, 0.5).unwrap();
        assert_eq!(motion.gpu().draw_count(), 2);
        assert_eq!(motion.gpu().draws()[1].time, Some(0.5));
    }
}
