use std::collections::BTreeMap;

use crate::fade::Keyframe;

/// Styles every canvas carries; they win over user-supplied values.
const FIXED_STYLES: [(&str, &str); 3] = [
    ("display", "block"),
    ("transform-origin", "center"),
    ("pointer-events", "none"),
];

/// Host-visible description of the drawing surface.
///
/// The canvas never reads host layout; it changes only through options,
/// explicit resizes and fades.
#[derive(Debug, Clone, PartialEq)]
pub struct Canvas {
    class_names: Vec<String>,
    styles: BTreeMap<String, String>,
    css_size: Option<(f64, f64)>,
    backing_size: Option<(u32, u32)>,
    presentation: Keyframe,
    attached: bool,
}

impl Canvas {
    pub(crate) fn new(class_names: Vec<String>, user_styles: &BTreeMap<String, String>) -> Self {
        let mut styles = user_styles.clone();
        for (property, value) in FIXED_STYLES {
            styles.insert(property.to_string(), value.to_string());
        }
        Self {
            class_names,
            styles,
            css_size: None,
            backing_size: None,
            presentation: Keyframe::VISIBLE,
            attached: true,
        }
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn styles(&self) -> &BTreeMap<String, String> {
        &self.styles
    }

    pub fn style(&self, property: &str) -> Option<&str> {
        self.styles.get(property).map(String::as_str)
    }

    /// Inline style text, e.g. `display: block; width: 300px`.
    pub fn css_text(&self) -> String {
        self.styles
            .iter()
            .map(|(property, value)| format!("{property}: {value}"))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Logical size in CSS pixels, once the surface has been configured.
    pub fn css_size(&self) -> Option<(f64, f64)> {
        self.css_size
    }

    /// Drawing-buffer size in device pixels, once configured.
    pub fn backing_size(&self) -> Option<(u32, u32)> {
        self.backing_size
    }

    pub fn opacity(&self) -> f32 {
        self.presentation.opacity
    }

    pub fn scale(&self) -> f32 {
        self.presentation.scale
    }

    pub fn is_attached(&self) -> bool {
        self.attached
    }

    pub(crate) fn set_size(&mut self, css: (f64, f64), backing: (u32, u32)) {
        self.css_size = Some(css);
        self.backing_size = Some(backing);
        self.styles.insert("width".to_string(), format!("{}px", css.0));
        self.styles.insert("height".to_string(), format!("{}px", css.1));
    }

    pub(crate) fn present(&mut self, keyframe: Keyframe) {
        self.presentation = keyframe;
    }

    pub(crate) fn detach(&mut self) {
        self.attached = false;
    }
}
