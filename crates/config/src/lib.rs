use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use renderer::{ColorMode, Rgb, StyleConfig, MAX_BORDER_WIDTH};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize, Serializer};

pub const DEFAULT_WIDTH: f64 = 600.0;
pub const DEFAULT_HEIGHT: f64 = 600.0;
pub const DEFAULT_BORDER_WIDTH: f32 = 8.0;
pub const DEFAULT_GLOW_WIDTH: f32 = 200.0;
pub const DEFAULT_BORDER_RADIUS: f32 = 8.0;

pub const DEFAULT_COLORS: [RgbColor; 4] = [
    RgbColor::new(57, 182, 255),
    RgbColor::new(189, 69, 251),
    RgbColor::new(255, 87, 51),
    RgbColor::new(255, 214, 0),
];

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModeSetting {
    Dark,
    #[default]
    Light,
}

impl From<ModeSetting> for ColorMode {
    fn from(mode: ModeSetting) -> Self {
        match mode {
            ModeSetting::Dark => ColorMode::Dark,
            ModeSetting::Light => ColorMode::Light,
        }
    }
}

impl FromStr for ModeSetting {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "dark" => Ok(ModeSetting::Dark),
            "light" => Ok(ModeSetting::Light),
            other => Err(format!("invalid mode '{other}'; expected 'dark' or 'light'")),
        }
    }
}

/// An 8-bit `rgb(r, g, b)` color as written in option files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RgbColor {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl RgbColor {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_rgb(self) -> Rgb {
        Rgb::from_u8(self.r, self.g, self.b)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgb({}, {}, {})", self.r, self.g, self.b)
    }
}

impl FromStr for RgbColor {
    type Err = ConfigError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        parse_rgb(raw)
    }
}

impl Serialize for RgbColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Parses `rgb(r, g, b)` with integer components in 0..=255.
pub fn parse_rgb(raw: &str) -> Result<RgbColor, ConfigError> {
    let invalid = || ConfigError::Invalid(format!("invalid color '{raw}'; expected 'rgb(r, g, b)'"));

    let inner = raw
        .trim()
        .strip_prefix("rgb")
        .map(str::trim_start)
        .and_then(|rest| rest.strip_prefix('('))
        .and_then(|rest| rest.trim_end().strip_suffix(')'))
        .ok_or_else(invalid)?;

    let mut components = [0u8; 3];
    let mut parts = inner.split(',');
    for slot in &mut components {
        let part = parts.next().ok_or_else(invalid)?.trim();
        if part.is_empty() || !part.chars().all(|ch| ch.is_ascii_digit()) {
            return Err(invalid());
        }
        *slot = part.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "color '{raw}' has component {part} outside 0..=255"
            ))
        })?;
    }
    if parts.next().is_some() {
        return Err(invalid());
    }

    let [r, g, b] = components;
    Ok(RgbColor::new(r, g, b))
}

/// Options accepted by `Motion`, as read from TOML or built in code.
///
/// Every field is optional; [`MotionOptions::resolve`] fills in defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MotionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<f64>,
    #[serde(
        default,
        deserialize_with = "deserialize_mode_opt",
        skip_serializing_if = "Option::is_none"
    )]
    pub mode: Option<ModeSetting>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glow_width: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub border_radius: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub colors: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub class_names: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub styles: BTreeMap<String, String>,
}

fn deserialize_mode_opt<'de, D>(deserializer: D) -> Result<Option<ModeSetting>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    raw.map(|value| value.parse().map_err(de::Error::custom))
        .transpose()
}

/// Options with every default applied and the style validated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedOptions {
    pub width: f64,
    pub height: f64,
    pub ratio: f64,
    pub mode: ModeSetting,
    pub border_width: f32,
    pub glow_width: f32,
    pub border_radius: f32,
    pub colors: [RgbColor; 4],
    pub class_names: Vec<String>,
    pub styles: BTreeMap<String, String>,
    #[serde(skip)]
    pub style: StyleConfig,
}

impl MotionOptions {
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let raw: MotionOptions = toml::from_str(input)?;
        raw.validate()?;
        Ok(raw)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&contents)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [("width", self.width), ("height", self.height)] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be a finite, non-negative number (got {value})"
                    )));
                }
            }
        }

        if let Some(ratio) = self.ratio {
            if !ratio.is_finite() || ratio <= 0.0 {
                return Err(ConfigError::Invalid(format!(
                    "ratio must be a finite, positive number (got {ratio})"
                )));
            }
        }

        for (name, value) in [
            ("border_width", self.border_width),
            ("glow_width", self.glow_width),
            ("border_radius", self.border_radius),
        ] {
            if let Some(value) = value {
                if !value.is_finite() || value < 0.0 {
                    return Err(ConfigError::Invalid(format!(
                        "{name} must be a finite, non-negative number (got {value})"
                    )));
                }
            }
        }

        if let Some(colors) = &self.colors {
            if colors.len() != DEFAULT_COLORS.len() {
                return Err(ConfigError::Invalid(format!(
                    "colors must list exactly {} entries (got {})",
                    DEFAULT_COLORS.len(),
                    colors.len()
                )));
            }
            for color in colors {
                parse_rgb(color)?;
            }
        }

        for class in &self.class_names {
            if class.trim().is_empty() || class.chars().any(char::is_whitespace) {
                return Err(ConfigError::Invalid(format!(
                    "class name '{class}' must be a single non-empty token"
                )));
            }
        }

        if self.styles.keys().any(|key| key.trim().is_empty()) {
            return Err(ConfigError::Invalid("style property may not be empty".into()));
        }

        Ok(())
    }

    /// Applies defaults. `host_ratio` is used when no `ratio` is set.
    pub fn resolve(&self, host_ratio: Option<f64>) -> Result<ResolvedOptions, ConfigError> {
        self.validate()?;

        let ratio = self
            .ratio
            .or(host_ratio.filter(|ratio| ratio.is_finite() && *ratio > 0.0))
            .unwrap_or(1.0);
        let mode = self.mode.unwrap_or_default();

        let colors = match &self.colors {
            Some(raw) => {
                let mut colors = DEFAULT_COLORS;
                for (slot, color) in colors.iter_mut().zip(raw) {
                    *slot = parse_rgb(color)?;
                }
                colors
            }
            None => DEFAULT_COLORS,
        };

        let border_width = self.border_width.unwrap_or(DEFAULT_BORDER_WIDTH);
        if border_width > MAX_BORDER_WIDTH {
            tracing::warn!(
                requested = border_width,
                max = MAX_BORDER_WIDTH,
                "border width clamped"
            );
        }

        let style = StyleConfig::new(
            border_width,
            self.glow_width.unwrap_or(DEFAULT_GLOW_WIDTH),
            self.border_radius.unwrap_or(DEFAULT_BORDER_RADIUS),
            mode.into(),
            colors.map(RgbColor::to_rgb),
        )
        .map_err(|err| ConfigError::Invalid(err.to_string()))?;

        Ok(ResolvedOptions {
            width: self.width.unwrap_or(DEFAULT_WIDTH),
            height: self.height.unwrap_or(DEFAULT_HEIGHT),
            ratio,
            mode,
            border_width: style.border_width(),
            glow_width: style.glow_width(),
            border_radius: style.border_radius(),
            colors,
            class_names: self.class_names.clone(),
            styles: self.styles.clone(),
            style,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_options_resolve_to_defaults() {
        let resolved = MotionOptions::default().resolve(None).unwrap();
        assert_eq!(resolved.width, 600.0);
        assert_eq!(resolved.height, 600.0);
        assert_eq!(resolved.ratio, 1.0);
        assert_eq!(resolved.mode, ModeSetting::Light);
        assert_eq!(resolved.border_width, 8.0);
        assert_eq!(resolved.glow_width, 200.0);
        assert_eq!(resolved.border_radius, 8.0);
        assert_eq!(resolved.colors, DEFAULT_COLORS);
        assert_eq!(resolved.style, StyleConfig::default());
    }

    #[test]
    fn host_ratio_applies_only_without_explicit_ratio() {
        let options = MotionOptions::default();
        assert_eq!(options.resolve(Some(2.0)).unwrap().ratio, 2.0);
        assert_eq!(options.resolve(Some(f64::NAN)).unwrap().ratio, 1.0);

        let explicit = MotionOptions {
            ratio: Some(1.5),
            ..MotionOptions::default()
        };
        assert_eq!(explicit.resolve(Some(3.0)).unwrap().ratio, 1.5);
    }

    #[test]
    fn parses_full_toml() {
        let options = MotionOptions::from_toml_str(
            r#"
width = 320
height = 180.5
ratio = 2
mode = "Dark"
border_width = 4
glow_width = 60
border_radius = 12
colors = ["rgb(1, 2, 3)", "rgb(4,5,6)", "rgb( 7 , 8 , 9 )", "rgb(255, 255, 255)"]
class_names = ["glow", "overlay"]

[styles]
position = "absolute"
display = "inline"
"#,
        )
        .unwrap();

        let resolved = options.resolve(None).unwrap();
        assert_eq!(resolved.width, 320.0);
        assert_eq!(resolved.height, 180.5);
        assert_eq!(resolved.ratio, 2.0);
        assert_eq!(resolved.mode, ModeSetting::Dark);
        assert_eq!(resolved.style.mode(), ColorMode::Dark);
        assert_eq!(resolved.colors[2], RgbColor::new(7, 8, 9));
        assert_eq!(resolved.class_names, vec!["glow", "overlay"]);
        assert_eq!(resolved.styles["position"], "absolute");
    }

    #[test]
    fn border_width_is_clamped() {
        let options = MotionOptions {
            border_width: Some(64.0),
            ..MotionOptions::default()
        };
        assert_eq!(options.resolve(None).unwrap().border_width, 20.0);
    }

    #[test]
    fn parse_rgb_accepts_whitespace_and_rejects_garbage() {
        assert_eq!(parse_rgb("rgb(57, 182, 255)").unwrap(), RgbColor::new(57, 182, 255));
        assert_eq!(parse_rgb("  rgb (0,0,0) ").unwrap(), RgbColor::new(0, 0, 0));
        assert!(parse_rgb("#ff0000").is_err());
        assert!(parse_rgb("rgb(1, 2)").is_err());
        assert!(parse_rgb("rgb(1, 2, 3, 4)").is_err());
        assert!(parse_rgb("rgb(-1, 2, 3)").is_err());
        assert!(parse_rgb("rgb(256, 0, 0)").is_err());
    }

    #[test]
    fn colors_display_round_trip_through_parser() {
        for color in DEFAULT_COLORS {
            assert_eq!(parse_rgb(&color.to_string()).unwrap(), color);
        }
    }

    #[test]
    fn rejects_invalid_values() {
        let cases = [
            "width = -1",
            "ratio = 0",
            "glow_width = -3",
            "mode = \"dim\"",
            "colors = [\"rgb(1, 2, 3)\"]",
            "colors = [\"red\", \"rgb(1, 2, 3)\", \"rgb(1, 2, 3)\", \"rgb(1, 2, 3)\"]",
            "class_names = [\"two words\"]",
            "unknown_key = 1",
        ];
        for case in cases {
            assert!(MotionOptions::from_toml_str(case).is_err(), "accepted {case}");
        }
    }

    #[test]
    fn missing_file_reports_path() {
        let err = MotionOptions::from_path("/definitely/not/here.toml").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
        assert!(err.to_string().contains("/definitely/not/here.toml"));
    }
}
