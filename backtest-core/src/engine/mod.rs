//! Backtest engine: the Simulated Exchange and the bar-by-bar loop that
//! drives it against incremental state, the Snapshot View, and rules.

pub mod exchange;
pub mod loop_runner;
pub mod state;

pub use exchange::{BarOutcome, PendingEntry, SimulatedExchange};
pub use loop_runner::Engine;
pub use state::{EngineConfig, EngineDiagnostic, EquityPoint, RunResult};
