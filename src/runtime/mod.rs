//! Runtime adapters: tokio spawner, local process runner, and API surface.

pub mod api;
pub mod process;
pub mod tokio_spawner;

pub use api::{
    CancelRequest, CancelResponse, EnqueueRequest, EnqueueResponse, Health, PolicySetRequest,
    PolicySetResponse, TaskView,
};
pub use process::{LocalProcessHandle, LocalProcessRunner};
pub use tokio_spawner::TokioSpawner;
