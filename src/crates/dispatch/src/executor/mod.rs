//! Executing prompts end to end.
//!
//! The [`Dispatcher`] owns the request pipeline. Its supporting pieces:
//!
//! - [`guard`]: deadlines on collaborator calls
//! - [`retry`]: backoff for transient collaborator failures
//! - [`pipeline`]: the stage machine every request walks
//! - [`renderer`]: optional natural-language summary of a result

pub mod dispatcher;
pub mod guard;
pub mod pipeline;
pub mod renderer;
pub mod retry;

pub use dispatcher::{Dispatcher, DispatcherSettings, QueryReply, QueryRequest};
pub use guard::call_with_timeout;
pub use pipeline::{PipelineStage, PipelineTrace};
pub use renderer::{summarize, NaturalLanguageRenderer};
pub use retry::{classify_provider_error, retry_with_backoff, ErrorClass, RetryConfig};
