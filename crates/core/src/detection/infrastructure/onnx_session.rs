use std::path::Path;

/// Return the preferred ONNX execution providers for the current platform.
///
/// ONNX Runtime falls back to CPU if the platform provider fails to register.
fn preferred_execution_providers() -> Vec<ort::execution_providers::ExecutionProviderDispatch> {
    #[cfg(target_os = "macos")]
    {
        vec![ort::execution_providers::CoreMLExecutionProvider::default().build()]
    }
    #[cfg(target_os = "windows")]
    {
        vec![ort::execution_providers::DirectMLExecutionProvider::default().build()]
    }
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        vec![]
    }
}

/// Loads a model for single-frame, low-latency inference.
///
/// The detector worker runs one inference at a time, so inter-op
/// parallelism is pinned to one thread.
pub fn load_session(model_path: &Path) -> Result<ort::session::Session, Box<dyn std::error::Error>> {
    let intra_threads = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1);
    let session = ort::session::Session::builder()?
        .with_optimization_level(ort::session::builder::GraphOptimizationLevel::Level3)?
        .with_inter_threads(1)?
        .with_intra_threads(intra_threads)?
        .with_execution_providers(preferred_execution_providers())?
        .commit_from_file(model_path)?;
    Ok(session)
}

/// Static NCHW or NHWC input dimensions of the first model input.
///
/// Returns `(dims, channels_first)` where `dims` is the spatial size, or
/// `None` if the shape is dynamic or not rank 4.
pub fn input_dims(session: &ort::session::Session) -> Option<(u32, bool)> {
    let input = session.inputs().first()?;
    let ort::value::ValueType::Tensor { ref shape, .. } = input.dtype() else {
        return None;
    };
    if shape.len() != 4 {
        return None;
    }
    if shape[1] == 3 && shape[2] > 0 {
        Some((shape[2] as u32, true))
    } else if shape[3] == 3 && shape[1] > 0 {
        Some((shape[1] as u32, false))
    } else {
        None
    }
}
