mod error;
mod guard;
mod metrics;
mod profiles;
mod session;
mod simulate;
mod timing;
mod tools;

pub use error::{AutomationError, AutomationResult};
pub use guard::{ExecutionGuard, GuardPolicy};
pub use metrics::SessionMetrics;
pub use profiles::{
    catalog, catalog_len, profile_by_index, random_profile, DeviceProfile, ProfileSelection,
};
pub use session::{Session, SessionManager};
pub use simulate::{is_pause_char, InputSimulator, KeyStep, TypingPlan};
pub use timing::TimingModel;
pub use tools::BrowserTools;
