pub mod browser;
pub mod config;
pub mod error;

pub use browser::{
    AutomationError, AutomationResult, BrowserTools, DeviceProfile, ExecutionGuard, GuardPolicy,
    InputSimulator, ProfileSelection, Session, SessionManager, SessionMetrics, TimingModel,
};
pub use config::{
    load_decoy_config, ChromiumSection, DecoyConfig, FlagsSection, GuardSection, SessionSection,
    SimulationSection,
};
pub use error::{ConfigError, Result};
