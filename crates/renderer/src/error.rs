use crate::gpu::ShaderStage;

/// Failures surfaced by the border renderer.
///
/// GPU error-queue contents are not part of this enum: they are advisory and
/// only ever logged (see [`crate::gpu::GpuDiagnostic`]).
#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("GPU setup failed: {0}")]
    Setup(String),
    #[error("failed to compile {stage} shader:\n{log}")]
    ShaderCompile { stage: ShaderStage, log: String },
    #[error("failed to link shader program:\n{log}")]
    ProgramLink { log: String },
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("render surface has already been disposed")]
    Disposed,
}

impl RenderError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        RenderError::InvalidState(message.into())
    }
}

pub type Result<T, E = RenderError> = std::result::Result<T, E>;
