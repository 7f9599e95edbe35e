//! Provider module - contract, sessions, transport, resolution strategies,
//! adapters and the model registry

pub mod adapters;
pub mod factory;
pub mod registry;
pub mod resolve;
pub mod session;
pub mod traits;
pub mod transport;

pub use factory::create_provider;
pub use registry::{strip_tag, DerivedModel, ModelRegistry};
pub use resolve::{MatchRule, PollConfig};
pub use session::{SessionCell, SessionLifecycle};
pub use traits::{LlmResponse, PromptDecoration, Provider};
pub use transport::HttpTransport;
