use crate::error::{RenderError, Result};
use crate::gpu::{Gpu, ProgramHandle, ShaderStage};

const VERTEX_SHADER_GLSL: &str = include_str!("../shaders/border.vert");
const FRAGMENT_SHADER_GLSL: &str = include_str!("../shaders/border.frag");

/// Vertex and fragment sources for the border program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderSources {
    pub vertex: String,
    pub fragment: String,
}

impl ShaderSources {
    pub fn new(vertex: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self {
            vertex: vertex.into(),
            fragment: fragment.into(),
        }
    }

    /// The glowing-border shaders shipped with the crate.
    pub fn bundled() -> Self {
        Self::new(VERTEX_SHADER_GLSL, FRAGMENT_SHADER_GLSL)
    }
}

impl Default for ShaderSources {
    fn default() -> Self {
        Self::bundled()
    }
}

/// Compiles both stages and links them into a program.
///
/// Shader objects never outlive this call: on success both are deleted after
/// linking, on failure everything created so far is deleted before the error
/// is returned. Compiler and linker logs are passed through verbatim.
pub fn compile_program<G: Gpu + ?Sized>(
    gpu: &mut G,
    vertex_source: &str,
    fragment_source: &str,
) -> Result<ProgramHandle> {
    let vertex = gpu
        .create_shader(ShaderStage::Vertex, vertex_source)
        .map_err(|log| compile_error(ShaderStage::Vertex, log))?;

    let fragment = match gpu.create_shader(ShaderStage::Fragment, fragment_source) {
        Ok(fragment) => fragment,
        Err(log) => {
            gpu.delete_shader(vertex);
            return Err(compile_error(ShaderStage::Fragment, log));
        }
    };

    let linked = gpu.link_program(&vertex, &fragment);
    gpu.delete_shader(vertex);
    gpu.delete_shader(fragment);

    match linked {
        Ok(program) => {
            tracing::debug!(program = program.id(), "linked border program");
            Ok(program)
        }
        Err(log) => {
            tracing::error!(%log, "border program failed to link");
            Err(RenderError::ProgramLink { log })
        }
    }
}

fn compile_error(stage: ShaderStage, log: String) -> RenderError {
    tracing::error!(%stage, %log, "shader failed to compile");
    RenderError::ShaderCompile { stage, log }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{GpuCall, RecordingGpu};

    #[test]
    fn bundled_sources_declare_expected_interface() {
        let sources = ShaderSources::bundled();
        assert!(sources.vertex.contains("aPosition"));
        assert!(sources.vertex.contains("aUV"));
        for name in ["uResolution", "uTime", "uGlowExponent", "uColors"] {
            assert!(sources.fragment.contains(name), "missing {name}");
        }
    }

    #[test]
    fn successful_link_leaves_only_the_program() {
        let mut gpu = RecordingGpu::new();
        let sources = ShaderSources::bundled();
        let program = compile_program(&mut gpu, &sources.vertex, &sources.fragment).unwrap();
        let live = gpu.live_objects();
        assert_eq!(live.shaders, 0);
        assert_eq!(live.programs, 1);
        gpu.delete_program(program);
        assert_eq!(gpu.live_objects().total(), 0);
    }

    #[test]
    fn vertex_failure_reports_stage_and_log() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_compile(ShaderStage::Vertex, "ERROR: 0:4: 'foo' : undeclared identifier");
        let err = compile_program(&mut gpu, "void main() {}", "void main() {}").unwrap_err();
        match err {
            RenderError::ShaderCompile { stage, log } => {
                assert_eq!(stage, ShaderStage::Vertex);
                assert_eq!(log, "ERROR: 0:4: 'foo' : undeclared identifier");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gpu.live_objects().total(), 0);
    }

    #[test]
    fn fragment_failure_deletes_vertex_shader() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_compile(ShaderStage::Fragment, "0:12: syntax error");
        let err = compile_program(&mut gpu, "void main() {}", "void main() {}").unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShaderCompile {
                stage: ShaderStage::Fragment,
                ..
            }
        ));
        assert_eq!(gpu.live_objects().total(), 0);
        assert!(!gpu.calls().contains(&GpuCall::LinkProgram));
    }

    #[test]
    fn link_failure_deletes_both_shaders() {
        let mut gpu = RecordingGpu::new();
        gpu.fail_next_link("varying vUV not written by vertex shader");
        let err = compile_program(&mut gpu, "void main() {}", "void main() {}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "failed to link shader program:\nvarying vUV not written by vertex shader"
        );
        assert_eq!(gpu.live_objects().total(), 0);
    }

    #[test]
    fn empty_source_is_a_compile_error() {
        let mut gpu = RecordingGpu::new();
        let err = compile_program(&mut gpu, "   ", "void main() {}").unwrap_err();
        assert!(matches!(
            err,
            RenderError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
    }
}
