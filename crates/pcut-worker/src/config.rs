//! Worker configuration.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use pcut_models::RenderEncodingConfig;
use pcut_stitch::{IdentityPolicy, SearchConfig, StitchOptions};

use crate::error::{WorkerError, WorkerResult};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Directory scanned for source videos
    pub input_dir: PathBuf,
    /// Directory holding per-stream analysis artifacts
    pub artifact_dir: PathBuf,
    /// Directory for the snapshot, timeline, report and rendered video
    pub output_dir: PathBuf,
    /// Maximum streams loaded in parallel during analysis
    pub max_analysis_parallel: usize,
    /// Transformation order search parameters
    pub search: SearchConfig,
    /// How verified matches combine with pose candidates
    pub identity_policy: IdentityPolicy,
    /// Timeout for each FFmpeg invocation
    pub render_timeout: Duration,
    /// Encoder settings
    pub encoding: RenderEncodingConfig,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("videos"),
            artifact_dir: PathBuf::from("artifacts"),
            output_dir: PathBuf::from("output"),
            max_analysis_parallel: 4,
            search: SearchConfig::default(),
            identity_policy: IdentityPolicy::default(),
            render_timeout: Duration::from_secs(3600), // 1 hour
            encoding: RenderEncodingConfig::default(),
        }
    }
}

fn env_parse<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.trim().parse().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let search = SearchConfig {
            exploration_budget: env_parse("PCUT_EXPLORATION_BUDGET")
                .unwrap_or(defaults.search.exploration_budget),
            seed: env_parse("PCUT_SEED").unwrap_or(defaults.search.seed),
            allow_revisits: env_parse("PCUT_ALLOW_REVISITS")
                .unwrap_or(defaults.search.allow_revisits),
            lookahead_depth: env_parse("PCUT_LOOKAHEAD_DEPTH")
                .unwrap_or(defaults.search.lookahead_depth),
            max_expansions: defaults.search.max_expansions,
        };

        let mut encoding = defaults.encoding;
        if let Some(codec) = env_string("PCUT_CODEC") {
            encoding.codec = codec;
        }
        if let Ok(preset) = std::env::var("PCUT_PRESET") {
            // An empty value disables the preset flag
            encoding.preset = Some(preset).filter(|p| !p.trim().is_empty());
        }
        if let Some(pixel_format) = env_string("PCUT_PIXEL_FORMAT") {
            encoding.pixel_format = pixel_format;
        }
        if let Some(bitrate) = env_string("PCUT_BITRATE") {
            encoding.bitrate = Some(bitrate);
        }

        Self {
            input_dir: env_string("PCUT_INPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.input_dir),
            artifact_dir: env_string("PCUT_ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            output_dir: env_string("PCUT_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            max_analysis_parallel: env_parse("PCUT_MAX_ANALYSIS_PARALLEL")
                .unwrap_or(defaults.max_analysis_parallel),
            search,
            identity_policy: env_parse("PCUT_IDENTITY_POLICY").unwrap_or(defaults.identity_policy),
            render_timeout: Duration::from_secs(
                env_parse("PCUT_RENDER_TIMEOUT_SECS").unwrap_or(defaults.render_timeout.as_secs()),
            ),
            encoding,
        }
    }

    /// Reject settings that would fail later in the run.
    pub fn validate(&self) -> WorkerResult<()> {
        if self.max_analysis_parallel == 0 {
            return Err(WorkerError::config_error(
                "PCUT_MAX_ANALYSIS_PARALLEL must be at least 1",
            ));
        }
        if self.search.exploration_budget == 0 {
            return Err(WorkerError::config_error(
                "PCUT_EXPLORATION_BUDGET must be at least 1",
            ));
        }
        if self.render_timeout.is_zero() {
            return Err(WorkerError::config_error(
                "PCUT_RENDER_TIMEOUT_SECS must be positive",
            ));
        }
        self.encoding.validate().map_err(WorkerError::config_error)
    }

    pub fn stitch_options(&self) -> StitchOptions {
        StitchOptions {
            search: self.search.clone(),
            identity_policy: self.identity_policy,
        }
    }

    pub fn snapshot_path(&self) -> PathBuf {
        self.output_dir.join(crate::snapshot_store::SNAPSHOT_FILE)
    }
}
