use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use glowframe::ModeSetting;

#[derive(Parser, Debug)]
#[command(
    name = "glowframe",
    author,
    version,
    about = "Animated glowing border renderer",
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Render a single frame to a PNG file.
    Render(RenderArgs),
    /// Run the paced animation loop headlessly and report frame statistics.
    Run(RunArgs),
    /// Validate an options file and print the resolved options as JSON.
    CheckConfig(CheckConfigArgs),
}

/// Options shared by every command that builds a border.
#[derive(Args, Debug, Default, Clone)]
pub struct StyleArgs {
    /// TOML options file; flags below override its values.
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Logical size of the canvas (e.g. `600x300`).
    #[arg(long, value_name = "WIDTHxHEIGHT", value_parser = parse_size)]
    pub size: Option<(f64, f64)>,

    /// Device pixel ratio applied to the logical size.
    #[arg(long, value_name = "RATIO")]
    pub ratio: Option<f64>,

    /// Background the border is composited onto: `dark` or `light`.
    #[arg(long, value_name = "MODE", value_parser = parse_mode)]
    pub mode: Option<ModeSetting>,

    /// Solid stroke width in logical pixels (capped at 20).
    #[arg(long, value_name = "PX")]
    pub border_width: Option<f32>,

    /// Glow falloff width in logical pixels.
    #[arg(long, value_name = "PX")]
    pub glow_width: Option<f32>,

    /// Corner radius in logical pixels.
    #[arg(long, value_name = "PX")]
    pub border_radius: Option<f32>,

    /// Palette entry as `rgb(r, g, b)`; pass exactly four times.
    #[arg(long = "color", value_name = "RGB")]
    pub colors: Vec<String>,

    /// Use the recording backend instead of a GPU device.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Args, Debug)]
pub struct RenderArgs {
    #[command(flatten)]
    pub style: StyleArgs,

    /// Animation time of the exported frame, in seconds.
    #[arg(long, value_name = "SECONDS", default_value_t = 0.0)]
    pub time: f32,

    /// Destination PNG (required unless `--dry-run`).
    #[arg(short, long, value_name = "PATH", required_unless_present = "dry_run")]
    pub output: Option<PathBuf>,
}

#[derive(Args, Debug)]
pub struct RunArgs {
    #[command(flatten)]
    pub style: StyleArgs,

    /// How long to run, e.g. `1s` or `2500ms`.
    #[arg(long, value_name = "DURATION", value_parser = parse_duration, default_value = "1s")]
    pub duration: Duration,

    /// Simulated display refresh rate in Hz.
    #[arg(long, value_name = "HZ", value_parser = parse_refresh, default_value_t = 60.0)]
    pub refresh: f64,
}

#[derive(Args, Debug)]
pub struct CheckConfigArgs {
    /// TOML options file to validate.
    #[arg(value_name = "PATH")]
    pub path: PathBuf,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_size(value: &str) -> Result<(f64, f64), String> {
    let trimmed = value.trim();
    let (width, height) = trimmed
        .split_once(['x', 'X', '×'])
        .ok_or_else(|| "expected WxH format, e.g. 600x300".to_string())?;

    let width: f64 = width
        .trim()
        .parse()
        .map_err(|_| "invalid width in size".to_string())?;
    let height: f64 = height
        .trim()
        .parse()
        .map_err(|_| "invalid height in size".to_string())?;

    if !width.is_finite() || !height.is_finite() || width < 0.0 || height < 0.0 {
        return Err("size must be finite and non-negative".to_string());
    }

    Ok((width, height))
}

pub fn parse_mode(value: &str) -> Result<ModeSetting, String> {
    value.parse()
}

pub fn parse_duration(value: &str) -> Result<Duration, String> {
    let duration = humantime::parse_duration(value.trim())
        .map_err(|err| format!("invalid duration '{value}': {err}"))?;
    if duration.is_zero() {
        return Err("duration must be greater than zero".to_string());
    }
    Ok(duration)
}

pub fn parse_refresh(value: &str) -> Result<f64, String> {
    let hz: f64 = value
        .trim()
        .parse()
        .map_err(|_| format!("invalid refresh rate '{value}'"))?;
    if !hz.is_finite() || hz <= 0.0 {
        return Err("refresh rate must be a positive number".to_string());
    }
    Ok(hz)
}
