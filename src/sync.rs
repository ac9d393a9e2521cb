pub mod assets;
pub use assets::{AssetOutcome, AssetReplicator};
pub mod coordinator;
pub use coordinator::SyncCoordinator;
pub mod pull;
pub use pull::PullPipeline;
pub mod push;
pub use push::PushPipeline;
pub mod transport;
pub use transport::{HttpTransport, SyncTransport};
