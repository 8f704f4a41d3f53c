//! Automated follow-list pruning over a supervised browser session.
//!
//! # Layers
//!
//! * [`session`]: obtains a browser (remote attach, primary profile,
//!   fallback pool, temporary profile) and keeps it alive
//! * [`driver`]: the [`PageDriver`] seam between the engine and a page
//! * [`source`] and [`strategy`]: where candidates come from and the ordered
//!   fallback chain that removes them
//! * [`orchestrator`]: quotas, schedule, and the cycle loop
//!
//! Wire types live in `prune-protocol`; the DevTools connection in
//! `prune-runtime`.

pub mod auth;
pub mod candidate;
pub mod clock;
pub mod config;
pub mod cycle;
pub mod driver;
pub mod error;
pub mod executor;
pub mod filter;
pub mod orchestrator;
pub mod schedule;
pub mod session;
pub mod site;
pub mod source;
pub mod strategy;
pub mod wait;

pub use auth::Authenticator;
pub use candidate::Candidate;
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{BrowserConfig, Config, Credentials, IntervalMode, Pacing, ScheduleConfig, Timings};
pub use cycle::{CycleState, Quota};
pub use driver::{Intent, ListScope, PageDriver};
pub use error::{PruneError, Result};
pub use executor::{Executor, Outcome, VerifyPolicy};
pub use filter::SkipRules;
pub use orchestrator::Orchestrator;
pub use schedule::{Schedule, ScheduleMode};
pub use session::chrome::ChromeLauncher;
pub use session::{Acquirer, SessionHandle, SessionState, SessionSupervisor};
pub use site::Site;
pub use strategy::{CycleReport, StrategyChain};
