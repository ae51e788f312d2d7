use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::browser::ProfileSelection;
use crate::error::{ConfigError, Result};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "snake_case")]
pub struct DecoyConfig {
    pub chromium: ChromiumSection,
    pub flags: FlagsSection,
    pub simulation: SimulationSection,
    pub guard: GuardSection,
    pub session: SessionSection,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ChromiumSection {
    pub executable_path: Option<String>,
    pub headless: bool,
    pub sandbox: bool,
    pub disable_gpu: bool,
    pub request_timeout_seconds: Option<u64>,
}

impl Default for ChromiumSection {
    fn default() -> Self {
        Self {
            executable_path: None,
            headless: true,
            sandbox: true,
            disable_gpu: false,
            request_timeout_seconds: Some(30),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FlagsSection {
    pub no_first_run: bool,
    pub disable_automation_controlled: bool,
    pub mute_audio: bool,
    pub extra_args: Vec<String>,
}

impl Default for FlagsSection {
    fn default() -> Self {
        Self {
            no_first_run: true,
            disable_automation_controlled: true,
            mute_audio: true,
            extra_args: Vec::new(),
        }
    }
}

/// Bounds for every randomized behavior of the input simulator. Defaults are
/// the cadences observed in manual browsing sessions.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SimulationSection {
    pub typing_cadence_cpm: [u32; 2],
    pub typing_jitter: [f64; 2],
    pub pause_char_factor: f64,
    pub pointer_steps: [u32; 2],
    pub pointer_jitter_px: f64,
    pub pointer_step_pause_ms: [u64; 2],
    pub click_hesitation_ms: [u64; 2],
    pub click_settle_ms: [u64; 2],
    pub scan_move_delay_ms: [u64; 2],
    pub scroll_events: [u32; 2],
    pub scroll_pause_ms: [u64; 2],
    pub scroll_down_bias: f64,
    pub typing_closing_pause_ms: [u64; 2],
}

impl Default for SimulationSection {
    fn default() -> Self {
        Self {
            typing_cadence_cpm: [200, 500],
            typing_jitter: [0.75, 1.25],
            pause_char_factor: 2.0,
            pointer_steps: [5, 10],
            pointer_jitter_px: 10.0,
            pointer_step_pause_ms: [20, 50],
            click_hesitation_ms: [50, 150],
            click_settle_ms: [150, 400],
            scan_move_delay_ms: [50, 100],
            scroll_events: [2, 4],
            scroll_pause_ms: [500, 1500],
            scroll_down_bias: 0.8,
            typing_closing_pause_ms: [300, 800],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GuardSection {
    pub timeout_ms: u64,
    pub max_retries: usize,
    pub backoff_base_ms: u64,
}

impl Default for GuardSection {
    fn default() -> Self {
        Self {
            timeout_ms: 30_000,
            max_retries: 3,
            backoff_base_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SessionSection {
    pub profile_selection: ProfileSelection,
    pub user_data_base: Option<PathBuf>,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self {
            profile_selection: ProfileSelection::Random,
            user_data_base: None,
        }
    }
}

impl DecoyConfig {
    /// Rejects settings the simulator or guard cannot work with. Inverted
    /// bounds inside a range are tolerated downstream; impossible values are
    /// not.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if sim.typing_cadence_cpm[0] == 0 {
            return Err(ConfigError::validation(
                "simulation",
                "typing_cadence_cpm must start at 1 cpm or more",
            ));
        }
        if sim.typing_jitter[0] <= 0.0 {
            return Err(ConfigError::validation(
                "simulation",
                format!(
                    "typing_jitter lower bound must be positive, got {}",
                    sim.typing_jitter[0]
                ),
            ));
        }
        if sim.pause_char_factor < 1.0 {
            return Err(ConfigError::validation(
                "simulation",
                format!(
                    "pause_char_factor must not speed typing up, got {}",
                    sim.pause_char_factor
                ),
            ));
        }
        if !(0.0..=1.0).contains(&sim.scroll_down_bias) {
            return Err(ConfigError::validation(
                "simulation",
                format!(
                    "scroll_down_bias is a probability, got {}",
                    sim.scroll_down_bias
                ),
            ));
        }
        if self.guard.timeout_ms == 0 {
            return Err(ConfigError::validation(
                "guard",
                "timeout_ms of zero would fail every operation",
            ));
        }
        if self.guard.max_retries == 0 {
            return Err(ConfigError::validation(
                "guard",
                "max_retries counts total attempts and must be at least 1",
            ));
        }
        Ok(())
    }
}

pub fn load_decoy_config<P: AsRef<Path>>(path: P) -> Result<DecoyConfig> {
    let config: DecoyConfig = load_toml(path)?;
    config.validate()?;
    Ok(config)
}

fn load_toml<T, P>(path: P) -> Result<T>
where
    T: DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        source,
        path: path.to_path_buf(),
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        source,
        path: path.to_path_buf(),
    })
}
