use bytemuck::{Pod, Zeroable};

use super::{UniformLocation, UniformValue};

/// Vertex attributes and their fixed shader locations.
///
/// Must match `shaders/border.vert`.
pub(crate) const ATTRIBUTE_LOCATIONS: [(&str, u32); 2] = [("aPosition", 0), ("aUV", 1)];

/// Uniform names understood by the border program, in location order.
///
/// Must match the `BorderParams` block in `shaders/border.frag`.
pub const UNIFORM_NAMES: [&str; 11] = [
    "uResolution",
    "uTime",
    "uBorderWidth",
    "uGlowWidth",
    "uBorderRadius",
    "uGlowExponent",
    "uGlowFactor",
    "uColors[0]",
    "uColors[1]",
    "uColors[2]",
    "uColors[3]",
];

/// Resolves a uniform name to its location index.
///
/// `uColors` addresses the first array element, as GL does.
pub fn uniform_index(name: &str) -> Option<UniformLocation> {
    let name = if name == "uColors" { "uColors[0]" } else { name };
    UNIFORM_NAMES
        .iter()
        .position(|candidate| *candidate == name)
        .map(|index| UniformLocation(index as u32))
}

/// Shape of the value stored at a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum UniformKind {
    Float,
    Vec2,
    Vec3,
}

impl UniformKind {
    pub(crate) fn matches(self, value: &UniformValue) -> bool {
        matches!(
            (self, value),
            (UniformKind::Float, UniformValue::Float(_))
                | (UniformKind::Vec2, UniformValue::Vec2(_))
                | (UniformKind::Vec3, UniformValue::Vec3(_))
        )
    }
}

/// std140 byte offset and kind of each entry of [`UNIFORM_NAMES`].
const LAYOUT: [(u64, UniformKind); 11] = [
    (0, UniformKind::Vec2),
    (8, UniformKind::Float),
    (12, UniformKind::Float),
    (16, UniformKind::Float),
    (20, UniformKind::Float),
    (24, UniformKind::Float),
    (28, UniformKind::Float),
    (32, UniformKind::Vec3),
    (48, UniformKind::Vec3),
    (64, UniformKind::Vec3),
    (80, UniformKind::Vec3),
];

pub(crate) fn layout_of(location: UniformLocation) -> Option<(u64, UniformKind)> {
    LAYOUT.get(location.0 as usize).copied()
}

/// CPU mirror of the `BorderParams` std140 block.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, Pod, Zeroable)]
pub(crate) struct BorderUniforms {
    pub resolution: [f32; 2],
    pub time: f32,
    pub border_width: f32,
    pub glow_width: f32,
    pub border_radius: f32,
    pub glow_exponent: f32,
    pub glow_factor: f32,
    /// vec3 array elements are padded to 16 bytes under std140.
    pub colors: [[f32; 4]; 4],
}

impl BorderUniforms {
    pub const SIZE: u64 = std::mem::size_of::<BorderUniforms>() as u64;

    /// Stores `value` at `location`; returns the written byte range.
    pub fn write(
        &mut self,
        location: UniformLocation,
        value: UniformValue,
    ) -> Option<std::ops::Range<usize>> {
        let (offset, kind) = layout_of(location)?;
        if !kind.matches(&value) {
            return None;
        }
        let bytes: &mut [u8] = bytemuck::bytes_of_mut(self);
        let start = offset as usize;
        let written = match value {
            UniformValue::Float(v) => write_floats(&mut bytes[start..], &[v]),
            UniformValue::Vec2(v) => write_floats(&mut bytes[start..], &v),
            UniformValue::Vec3(v) => write_floats(&mut bytes[start..], &v),
        };
        Some(start..start + written)
    }
}

fn write_floats(target: &mut [u8], values: &[f32]) -> usize {
    let source: &[u8] = bytemuck::cast_slice(values);
    target[..source.len()].copy_from_slice(source);
    source.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_matches_std140_size() {
        assert_eq!(BorderUniforms::SIZE, 96);
    }

    #[test]
    fn names_resolve_to_layout_order() {
        assert_eq!(uniform_index("uResolution"), Some(UniformLocation(0)));
        assert_eq!(uniform_index("uColors"), Some(UniformLocation(7)));
        assert_eq!(uniform_index("uColors[3]"), Some(UniformLocation(10)));
        assert_eq!(uniform_index("iTime"), None);
    }

    #[test]
    fn writes_land_at_std140_offsets() {
        let mut block = BorderUniforms::default();
        let range = block
            .write(UniformLocation(1), UniformValue::Float(2.5))
            .unwrap();
        assert_eq!(range, 8..12);
        assert_eq!(block.time, 2.5);

        block
            .write(uniform_index("uColors[2]").unwrap(), UniformValue::Vec3([0.1, 0.2, 0.3]))
            .unwrap();
        assert_eq!(block.colors[2], [0.1, 0.2, 0.3, 0.0]);
    }

    #[test]
    fn mismatched_kind_is_rejected() {
        let mut block = BorderUniforms::default();
        assert!(block
            .write(UniformLocation(0), UniformValue::Float(1.0))
            .is_none());
    }
}
