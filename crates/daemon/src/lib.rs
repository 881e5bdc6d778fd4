pub mod learner;
pub mod lifecycle;
pub mod predict;
pub mod routes;
pub mod server;
pub mod state;
pub mod sweeper;

pub use learner::{DomainLearner, LearnerStats, TuneOutcome};
pub use lifecycle::{Daemon, LifecycleError};
pub use predict::{Prediction, predict};
pub use routes::router;
pub use server::{Server, ServerError, ShutdownHandle};
pub use state::{AppState, now_epoch};
pub use sweeper::spawn_sweeper;
