use super::config::{
    AsrError, Device, BATCH_SAMPLE_RATE, LABELS_FILE, MODEL_FILE, QUANTIZED_MODEL_FILE,
};
use crate::asr::decoder::CtcVocabulary;
use ndarray::{ArrayView2, Axis, Ix3};
use num_cpus::get_physical;
use ort::{
    execution_providers::{
        CPUExecutionProvider, CUDAExecutionProvider, CoreMLExecutionProvider, ExecutionProvider,
    },
    session::{builder::GraphOptimizationLevel, Session},
    value::TensorRef,
};
use std::{fs, path::Path, time::Instant};

const THREAD_ENV: &str = "ORT_THREADS";

fn resolve_thread_count() -> usize {
    std::env::var(THREAD_ENV)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(get_physical)
}

/// Prefers an accelerator when the runtime reports one.
fn select_device() -> Device {
    if CUDAExecutionProvider::default().is_available().unwrap_or(false) {
        Device::Cuda
    } else if CoreMLExecutionProvider::default().is_available().unwrap_or(false) {
        Device::CoreMl
    } else {
        Device::Cpu
    }
}

/// Single-pass acoustic model over a whole utterance.
pub trait AcousticModel: Send {
    fn sample_rate(&self) -> u32;

    /// `samples` are mono at [`AcousticModel::sample_rate`].
    fn transcribe(&mut self, samples: &[f32]) -> Result<String, AsrError>;
}

/// CTC model exported to ONNX: `[batch, samples] -> [batch, frames, labels]`.
pub struct OnnxCtcModel {
    session: Session,
    input_name: String,
    output_name: String,
    vocab: CtcVocabulary,
}

impl Drop for OnnxCtcModel {
    fn drop(&mut self) {
        log::debug!("Dropping batch ASR model");
    }
}

impl OnnxCtcModel {
    pub fn new<P: AsRef<Path>>(model_dir: P) -> Result<Self, AsrError> {
        let start = Instant::now();
        let dir = model_dir.as_ref();
        let device = select_device();
        let session = Self::init_session(dir, device, resolve_thread_count())?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .ok_or_else(|| AsrError::ModelLoad(format!("{} has no inputs", dir.display())))?;
        let output_name = session
            .outputs
            .first()
            .map(|o| o.name.clone())
            .ok_or_else(|| AsrError::OutputNotFound("logits".into()))?;

        let labels = fs::read_to_string(dir.join(LABELS_FILE))
            .map_err(|e| AsrError::ModelLoad(format!("{}: {e}", dir.join(LABELS_FILE).display())))?;
        let vocab = CtcVocabulary::from_json(&labels)?;

        log::info!(
            "Batch ASR model initialized on {:?} with {} labels in {:?}",
            device,
            vocab.len(),
            start.elapsed()
        );
        Ok(Self {
            session,
            input_name,
            output_name,
            vocab,
        })
    }

    fn init_session(dir: &Path, device: Device, threads: usize) -> Result<Session, AsrError> {
        let file = if dir.join(QUANTIZED_MODEL_FILE).exists() {
            QUANTIZED_MODEL_FILE
        } else {
            MODEL_FILE
        };
        let path = dir.join(file);
        if !path.is_file() {
            return Err(AsrError::SnapshotNotFound(dir.display().to_string()));
        }
        log::info!("Loading {} on {:?}", path.display(), device);

        let providers = match device {
            Device::Cuda => vec![
                CUDAExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
            Device::CoreMl => vec![
                CoreMLExecutionProvider::default().build(),
                CPUExecutionProvider::default().build(),
            ],
            Device::Cpu => vec![CPUExecutionProvider::default().build()],
        };

        Ok(Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_execution_providers(providers)?
            .with_intra_threads(threads)?
            .commit_from_file(path)?)
    }
}

impl AcousticModel for OnnxCtcModel {
    fn sample_rate(&self) -> u32 {
        BATCH_SAMPLE_RATE
    }

    fn transcribe(&mut self, samples: &[f32]) -> Result<String, AsrError> {
        if samples.is_empty() {
            return Ok(String::new());
        }

        let start = Instant::now();
        let audio = ArrayView2::from_shape((1, samples.len()), samples)?;
        let outputs = self.session.run(ort::inputs![
            self.input_name.as_str() => TensorRef::from_array_view(audio)?,
        ])?;

        let logits = outputs
            .get(self.output_name.as_str())
            .ok_or_else(|| AsrError::OutputNotFound(self.output_name.clone()))?
            .try_extract_array::<f32>()?
            .into_dimensionality::<Ix3>()?;
        log::debug!("Batch inference completed in {:?}", start.elapsed());

        self.vocab.decode_greedy(logits.index_axis(Axis(0), 0))
    }
}
