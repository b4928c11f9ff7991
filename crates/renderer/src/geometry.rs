//! Border-only mesh generation.
//!
//! The border is drawn as a hollow frame: the outer rectangle minus an inner
//! rectangle inset by `border + glow` pixels. Only the frame is rasterised, so
//! the fragment shader never runs over the (transparent) interior.
//!
//! ```text
//!   +--------------------------+
//!   |           top            |
//!   +----+----------------+----+
//!   |left|                |rght|
//!   +----+----------------+----+
//!   |          bottom          |
//!   +--------------------------+
//! ```

use crate::error::{RenderError, Result};
use crate::types::MAX_BORDER_WIDTH;

/// Vertices emitted per mesh: 4 strips x 2 triangles x 3 vertices.
pub const VERTEX_COUNT: usize = 24;

/// Floats per attribute stream (two components per vertex).
pub const COMPONENT_COUNT: usize = VERTEX_COUNT * 2;

/// Inner rectangle of the frame, in pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BorderInsets {
    pub inset_x: f64,
    pub inset_y: f64,
    pub inner_left: f64,
    pub inner_right: f64,
    pub inner_top: f64,
    pub inner_bottom: f64,
}

impl BorderInsets {
    /// True when the inner rectangle has zero area on either axis.
    pub fn is_collapsed(&self) -> bool {
        self.inner_left >= self.inner_right || self.inner_top >= self.inner_bottom
    }
}

/// Clip-space positions and texture coordinates for the border frame.
///
/// Strip order is fixed: top, bottom, left, right; six vertices each.
#[derive(Debug, Clone, PartialEq)]
pub struct Mesh {
    positions: [f32; COMPONENT_COUNT],
    uvs: [f32; COMPONENT_COUNT],
    insets: BorderInsets,
}

impl Mesh {
    pub fn positions(&self) -> &[f32; COMPONENT_COUNT] {
        &self.positions
    }

    pub fn uvs(&self) -> &[f32; COMPONENT_COUNT] {
        &self.uvs
    }

    pub fn insets(&self) -> BorderInsets {
        self.insets
    }

    pub fn vertex_count(&self) -> usize {
        VERTEX_COUNT
    }
}

/// Builds the frame mesh for a `pixel_width` x `pixel_height` surface.
///
/// `border_px` is clamped to [`MAX_BORDER_WIDTH`]; the combined inset is
/// limited to the short side and then to half of each axis, so the inner
/// rectangle can collapse to a line but never inverts.
pub fn build_border_mesh(
    pixel_width: u32,
    pixel_height: u32,
    border_px: f32,
    glow_px: f32,
) -> Result<Mesh> {
    if pixel_width == 0 || pixel_height == 0 {
        return Err(RenderError::invalid(format!(
            "geometry needs a surface of at least 1x1 pixels (got {pixel_width}x{pixel_height})"
        )));
    }
    for (name, value) in [("border", border_px), ("glow", glow_px)] {
        if !value.is_finite() || value < 0.0 {
            return Err(RenderError::invalid(format!(
                "{name} thickness must be finite and non-negative (got {value})"
            )));
        }
    }

    let width = f64::from(pixel_width);
    let height = f64::from(pixel_height);
    let short_side = width.min(height).max(1.0);
    let border = f64::from(border_px.min(MAX_BORDER_WIDTH));
    let total_inset = (border + f64::from(glow_px)).min(short_side);

    let inset_x = total_inset.min((width / 2.0).floor());
    let inset_y = total_inset.min((height / 2.0).floor());

    let clip_x = |x: f64| (x / width * 2.0 - 1.0) as f32;
    let clip_y = |y: f64| (y / height * 2.0 - 1.0) as f32;

    let (xi0, xi1) = (inset_x, width - inset_x);
    let (yi0, yi1) = (inset_y, height - inset_y);

    let (x0, x1) = (clip_x(0.0), clip_x(width));
    let (y0, y1) = (clip_y(0.0), clip_y(height));
    let (cxi0, cxi1) = (clip_x(xi0), clip_x(xi1));
    let (cyi0, cyi1) = (clip_y(yi0), clip_y(yi1));

    let (u0, u1, v0, v1) = (0.0_f32, 1.0_f32, 0.0_f32, 1.0_f32);
    let ui0 = (inset_x / width) as f32;
    let ui1 = (1.0 - inset_x / width) as f32;
    let vi0 = (inset_y / height) as f32;
    let vi1 = (1.0 - inset_y / height) as f32;

    #[rustfmt::skip]
    let positions = [
        // top
        x0, y0, x1, y0, x0, cyi0,
        x0, cyi0, x1, y0, x1, cyi0,
        // bottom
        x0, cyi1, x1, cyi1, x0, y1,
        x0, y1, x1, cyi1, x1, y1,
        // left
        x0, cyi0, cxi0, cyi0, x0, cyi1,
        x0, cyi1, cxi0, cyi0, cxi0, cyi1,
        // right
        cxi1, cyi0, x1, cyi0, cxi1, cyi1,
        cxi1, cyi1, x1, cyi0, x1, cyi1,
    ];

    #[rustfmt::skip]
    let uvs = [
        // top
        u0, v0, u1, v0, u0, vi0,
        u0, vi0, u1, v0, u1, vi0,
        // bottom
        u0, vi1, u1, vi1, u0, v1,
        u0, v1, u1, vi1, u1, v1,
        // left
        u0, vi0, ui0, vi0, u0, vi1,
        u0, vi1, ui0, vi0, ui0, vi1,
        // right
        ui1, vi0, u1, vi0, ui1, vi1,
        ui1, vi1, u1, vi0, u1, vi1,
    ];

    Ok(Mesh {
        positions,
        uvs,
        insets: BorderInsets {
            inset_x,
            inset_y,
            inner_left: xi0,
            inner_right: xi1,
            inner_top: yi0,
            inner_bottom: yi1,
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const SIZES: [u32; 9] = [1, 2, 3, 7, 16, 150, 301, 600, 4096];
    const THICKNESSES: [f32; 7] = [0.0, 0.5, 1.0, 8.0, 20.0, 64.0, 10_000.0];

    #[test]
    fn emits_fixed_vertex_count_with_finite_values() {
        for &w in &SIZES {
            for &h in &SIZES {
                for &border in &THICKNESSES {
                    for &glow in &THICKNESSES {
                        let mesh = build_border_mesh(w, h, border, glow).unwrap();
                        assert_eq!(mesh.positions().len(), 48);
                        assert_eq!(mesh.uvs().len(), 48);
                        assert!(mesh.positions().iter().all(|v| v.is_finite()));
                        assert!(mesh
                            .uvs()
                            .iter()
                            .all(|v| v.is_finite() && (0.0..=1.0).contains(v)));
                        assert!(mesh
                            .positions()
                            .iter()
                            .all(|v| (-1.0..=1.0).contains(v)));
                    }
                }
            }
        }
    }

    #[test]
    fn inner_rectangle_never_inverts() {
        for &w in &SIZES {
            for &h in &SIZES {
                for &glow in &THICKNESSES {
                    let insets = build_border_mesh(w, h, 20.0, glow).unwrap().insets();
                    assert!(insets.inset_x <= (f64::from(w) / 2.0).floor());
                    assert!(insets.inset_y <= (f64::from(h) / 2.0).floor());
                    assert!(insets.inner_left <= insets.inner_right, "{w}x{h} glow {glow}");
                    assert!(insets.inner_top <= insets.inner_bottom, "{w}x{h} glow {glow}");
                }
            }
        }
    }

    #[test]
    fn border_is_clamped_before_insetting() {
        let clamped = build_border_mesh(400, 400, 500.0, 0.0).unwrap();
        assert_eq!(clamped.insets().inset_x, 20.0);
        assert_eq!(clamped.insets().inset_y, 20.0);
    }

    #[test]
    fn glow_is_limited_by_short_side_and_half_axis() {
        // 600x300 backing store with 16px border and 400px glow.
        let mesh = build_border_mesh(600, 300, 16.0, 400.0).unwrap();
        let insets = mesh.insets();
        assert_eq!(insets.inset_x, 300.0);
        assert_eq!(insets.inset_y, 150.0);
        assert!(insets.is_collapsed());
        assert_eq!(insets.inner_top, insets.inner_bottom);
    }

    #[test]
    fn top_strip_spans_outer_edge() {
        let mesh = build_border_mesh(100, 50, 5.0, 5.0).unwrap();
        let p = mesh.positions();
        // First triangle of the top strip: (x0,y0) (x1,y0) (x0,yi0).
        assert_eq!(&p[0..6], &[-1.0, -1.0, 1.0, -1.0, -1.0, -0.6]);
        let uv = mesh.uvs();
        assert_eq!(&uv[0..6], &[0.0, 0.0, 1.0, 0.0, 0.0, 0.2]);
    }

    #[test]
    fn identical_inputs_are_bit_identical() {
        let a = build_border_mesh(1234, 567, 7.5, 133.0).unwrap();
        let b = build_border_mesh(1234, 567, 7.5, 133.0).unwrap();
        let bits = |values: &[f32]| values.iter().map(|v| v.to_bits()).collect::<Vec<_>>();
        assert_eq!(bits(a.positions()), bits(b.positions()));
        assert_eq!(bits(a.uvs()), bits(b.uvs()));
    }

    #[test]
    fn rejects_degenerate_input() {
        assert!(build_border_mesh(0, 10, 1.0, 1.0).is_err());
        assert!(build_border_mesh(10, 10, f32::NAN, 1.0).is_err());
        assert!(build_border_mesh(10, 10, 1.0, -1.0).is_err());
    }
}
