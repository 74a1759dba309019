pub mod backend;
pub mod cli;
pub mod config;
pub mod drivers;
pub mod error;
pub mod pipeline;
pub mod policy;
pub mod poller;
pub mod probe;
pub mod report;
pub mod resource;
pub mod util;

pub use error::{PollError, PolicyError, ProbeError};
pub use policy::PollPolicy;
pub use poller::{poll, CancelToken, PollOutcome, PollState, Poller, StatusSample};
