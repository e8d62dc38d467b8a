//! Generation run: scenario -> record -> frame -> capture, one record at a time.
use std::io::Write;
use std::path::Path;

use thiserror::Error;
use tracing::{info, info_span};

use crate::capture::{self, CaptureError, CaptureStats, CaptureWriter, DEFAULT_BASE_TS};
use crate::frame::{Addressing, ChecksumMode, FrameBuilder, FrameError, Identification};
use crate::scenario::{Profile, ScenarioClass, ScenarioGenerator};

/// Everything a run needs. `Default` matches the CLI defaults.
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub count: u64,
    pub profile: Profile,
    pub seed: u64,
    pub base_ts: u32,
    pub addressing: Addressing,
    pub checksums: ChecksumMode,
    pub identification: Identification,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            count: 100,
            profile: Profile::Mixed,
            seed: 42,
            base_ts: DEFAULT_BASE_TS,
            addressing: Addressing::default(),
            checksums: ChecksumMode::Zero,
            identification: Identification::Random,
        }
    }
}

/// A failed run, tagged with the stage that broke.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("frame stage failed at record {index}: {source}")]
    Frame {
        index: u64,
        #[source]
        source: FrameError,
    },
    #[error("write stage failed: {0}")]
    Write(#[from] CaptureError),
}

impl PipelineError {
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::Frame { .. } => "frame",
            PipelineError::Write(_) => "write",
        }
    }
}

/// Per-class record counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassCounts {
    pub small: u64,
    pub tight: u64,
    pub large: u64,
}

impl ClassCounts {
    fn record(&mut self, class: ScenarioClass) {
        match class {
            ScenarioClass::Small => self.small += 1,
            ScenarioClass::Tight => self.tight += 1,
            ScenarioClass::Large => self.large += 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub profile: Profile,
    pub seed: u64,
    pub base_ts: u32,
    pub classes: ClassCounts,
    pub capture: CaptureStats,
}

/// Produce a full capture into `out`.
pub fn generate<W: Write>(cfg: &GeneratorConfig, out: W) -> Result<RunSummary, PipelineError> {
    let _span = info_span!(
        "generate",
        profile = %cfg.profile,
        seed = cfg.seed,
        count = cfg.count,
        checksums = ?cfg.checksums,
        ip_id = ?cfg.identification
    )
    .entered();

    let mut scenarios = ScenarioGenerator::new(cfg.profile, cfg.seed);
    let builder = FrameBuilder::new(cfg.addressing, cfg.checksums);
    let mut writer = CaptureWriter::new(out, cfg.base_ts)?;
    let mut classes = ClassCounts::default();

    for index in 0..cfg.count {
        let (class, intent) = scenarios.intent(index);
        let payload = intent.encode();
        // drawn after the intent, keeping one ordered random stream per run
        let ident = cfg.identification.next(index, scenarios.rng_mut());
        let frame = builder
            .wrap(&payload, ident)
            .map_err(|source| PipelineError::Frame { index, source })?;
        writer.write_frame(frame.as_bytes())?;
        classes.record(class);
    }

    let capture = writer.finish()?;
    info!(
        frames = capture.frames,
        bytes = capture.bytes,
        crc32 = %format!("{:08x}", capture.crc32),
        "capture complete"
    );
    Ok(RunSummary {
        profile: cfg.profile,
        seed: cfg.seed,
        base_ts: cfg.base_ts,
        classes,
        capture,
    })
}

/// Produce a capture file at `path`, creating parent directories.
pub fn generate_capture(cfg: &GeneratorConfig, path: &Path) -> Result<RunSummary, PipelineError> {
    info!(path = %path.display(), "writing capture");
    let out = capture::create_output(path).map_err(CaptureError::from)?;
    generate(cfg, out)
}
