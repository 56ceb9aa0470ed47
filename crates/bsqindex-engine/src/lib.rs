//! bsqindex-engine: keeps a BSQ snapshot in step with the producer's dump.
//!
//! # Architecture
//!
//! ```text
//! Engine
//!     ├── Supervisor        (select loop, owns watchers + reload task)
//!     │     ├── ReloadMachine   (debounce, single-flight, restart handling)
//!     │     ├── ScopeWatcher    (json/ and json/all/, via notify)
//!     │     └── SnapshotLoader  (parse → index → publish)
//!     └── PricePoller       (hourly median of recent trades)
//! ```

pub mod builder;
pub mod engine;
pub mod error;
pub mod machine;
pub mod supervisor;
pub mod watcher;

pub use builder::EngineBuilder;
pub use engine::Engine;
pub use error::EngineError;
pub use machine::{Action, MachineTiming, ReloadMachine, ReloadPhase, StructuralPhase};
pub use supervisor::ReloadEvent;
pub use watcher::{Scope, ScopeEvent, ScopeWatcher};
