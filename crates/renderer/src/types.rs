use crate::error::{RenderError, Result};

/// Upper bound for the solid border stroke, in pixels.
///
/// Larger values make the inset exceed half of small surfaces, so both the
/// style and the geometry builder clamp to it.
pub const MAX_BORDER_WIDTH: f32 = 20.0;

/// Number of palette entries fed to `uColors`.
pub const COLOR_COUNT: usize = 4;

/// Default light palette: blue, violet, orange, yellow.
pub const DEFAULT_COLORS: [Rgb; COLOR_COUNT] = [
    Rgb::from_u8(57, 182, 255),
    Rgb::from_u8(189, 69, 251),
    Rgb::from_u8(255, 87, 51),
    Rgb::from_u8(255, 214, 0),
];

/// Background the border is composited onto.
///
/// * `Dark` keeps the glow clean and luminous (squared falloff, boosted).
/// * `Light` uses a linear, saturated falloff that survives bright pages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ColorMode {
    Dark,
    #[default]
    Light,
}

impl ColorMode {
    /// Returns `(exponent, factor)` for the glow falloff uniforms.
    pub fn glow_parameters(self) -> (f32, f32) {
        match self {
            ColorMode::Dark => (2.0, 1.8),
            ColorMode::Light => (1.0, 1.0),
        }
    }
}

impl std::fmt::Display for ColorMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ColorMode::Dark => f.write_str("dark"),
            ColorMode::Light => f.write_str("light"),
        }
    }
}

/// Normalised RGB triple.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
        }
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.r, self.g, self.b]
    }

    fn is_normalised(self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }
}

/// Immutable style of one border configuration.
///
/// Values are validated on construction and the border width is clamped to
/// [`MAX_BORDER_WIDTH`]. Reconfiguring replaces the whole value.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleConfig {
    border_width: f32,
    glow_width: f32,
    border_radius: f32,
    mode: ColorMode,
    colors: [Rgb; COLOR_COUNT],
}

impl StyleConfig {
    pub fn new(
        border_width: f32,
        glow_width: f32,
        border_radius: f32,
        mode: ColorMode,
        colors: [Rgb; COLOR_COUNT],
    ) -> Result<Self> {
        for (name, value) in [
            ("border width", border_width),
            ("glow width", glow_width),
            ("border radius", border_radius),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(RenderError::invalid(format!(
                    "{name} must be a finite, non-negative number (got {value})"
                )));
            }
        }
        if let Some(index) = colors.iter().position(|color| !color.is_normalised()) {
            return Err(RenderError::invalid(format!(
                "color {index} has components outside [0, 1]"
            )));
        }

        Ok(Self {
            border_width: border_width.min(MAX_BORDER_WIDTH),
            glow_width,
            border_radius,
            mode,
            colors,
        })
    }

    pub fn border_width(&self) -> f32 {
        self.border_width
    }

    pub fn glow_width(&self) -> f32 {
        self.glow_width
    }

    pub fn border_radius(&self) -> f32 {
        self.border_radius
    }

    pub fn mode(&self) -> ColorMode {
        self.mode
    }

    pub fn colors(&self) -> &[Rgb; COLOR_COUNT] {
        &self.colors
    }
}

impl Default for StyleConfig {
    /// 8px border, 200px glow, 8px radius on the light palette.
    fn default() -> Self {
        Self {
            border_width: 8.0,
            glow_width: 200.0,
            border_radius: 8.0,
            mode: ColorMode::Light,
            colors: DEFAULT_COLORS,
        }
    }
}

/// Backing-buffer size in device pixels plus the ratio it was derived with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportState {
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub device_pixel_ratio: f64,
}

impl ViewportState {
    /// Converts a host logical size into device pixels: `max(1, floor(v * ratio))`.
    pub fn from_logical(width: f64, height: f64, ratio: f64) -> Result<Self> {
        if !ratio.is_finite() || ratio <= 0.0 {
            return Err(RenderError::invalid(format!(
                "device pixel ratio must be finite and positive (got {ratio})"
            )));
        }
        for (name, value) in [("width", width), ("height", height)] {
            if !value.is_finite() || value < 0.0 {
                return Err(RenderError::invalid(format!(
                    "{name} must be finite and non-negative (got {value})"
                )));
            }
        }

        let to_pixels = |value: f64| (value * ratio).floor().clamp(1.0, u32::MAX as f64) as u32;
        Ok(Self {
            pixel_width: to_pixels(width),
            pixel_height: to_pixels(height),
            device_pixel_ratio: ratio,
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.pixel_width == 0 || self.pixel_height == 0 {
            return Err(RenderError::invalid(format!(
                "viewport must be at least 1x1 pixels (got {}x{})",
                self.pixel_width, self.pixel_height
            )));
        }
        if !self.device_pixel_ratio.is_finite() || self.device_pixel_ratio <= 0.0 {
            return Err(RenderError::invalid(format!(
                "device pixel ratio must be finite and positive (got {})",
                self.device_pixel_ratio
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn border_width_is_clamped() {
        let style = StyleConfig::new(64.0, 10.0, 4.0, ColorMode::Dark, DEFAULT_COLORS).unwrap();
        assert_eq!(style.border_width(), MAX_BORDER_WIDTH);
        assert_eq!(style.glow_width(), 10.0);
    }

    #[test]
    fn rejects_non_finite_style_values() {
        assert!(StyleConfig::new(f32::NAN, 1.0, 1.0, ColorMode::Light, DEFAULT_COLORS).is_err());
        assert!(StyleConfig::new(1.0, -2.0, 1.0, ColorMode::Light, DEFAULT_COLORS).is_err());
        assert!(
            StyleConfig::new(1.0, 1.0, f32::INFINITY, ColorMode::Light, DEFAULT_COLORS).is_err()
        );
    }

    #[test]
    fn rejects_out_of_range_colors() {
        let mut colors = DEFAULT_COLORS;
        colors[2] = Rgb {
            r: 1.5,
            g: 0.0,
            b: 0.0,
        };
        let err = StyleConfig::new(8.0, 8.0, 8.0, ColorMode::Light, colors).unwrap_err();
        assert!(err.to_string().contains("color 2"));
    }

    #[test]
    fn viewport_scales_and_floors() {
        let viewport = ViewportState::from_logical(300.0, 150.5, 2.0).unwrap();
        assert_eq!(viewport.pixel_width, 600);
        assert_eq!(viewport.pixel_height, 301);

        let tiny = ViewportState::from_logical(0.2, 0.0, 1.0).unwrap();
        assert_eq!((tiny.pixel_width, tiny.pixel_height), (1, 1));
    }

    #[test]
    fn viewport_rejects_bad_input() {
        assert!(ViewportState::from_logical(f64::NAN, 10.0, 1.0).is_err());
        assert!(ViewportState::from_logical(10.0, -1.0, 1.0).is_err());
        assert!(ViewportState::from_logical(10.0, 10.0, 0.0).is_err());
    }

    #[test]
    fn glow_parameters_follow_mode() {
        assert_eq!(ColorMode::Dark.glow_parameters(), (2.0, 1.8));
        assert_eq!(ColorMode::Light.glow_parameters(), (1.0, 1.0));
    }
}
