// msgsync-client: synchronization core that keeps a local object graph
// consistent with an asynchronous remote messaging service.

pub mod actor;
pub mod cache;
pub mod collaborators;
pub mod config;
pub mod emoji_groups;
pub mod logging;
pub mod managers;
pub mod promise;
pub mod query;
pub mod registry;
pub mod runtime;
pub mod store;
pub mod transcription;
pub mod transport;
pub mod updates;
