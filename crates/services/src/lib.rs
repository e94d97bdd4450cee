pub mod auth;
pub mod dao;
pub mod negotiation;
pub mod relay;
pub mod requests;
pub mod store;

pub use auth::AuthService;
pub use dao::*;
pub use relay::NotificationRelay;
pub use requests::{ConnectionRequestService, JoinRequestService};
pub use store::{MemoryStore, MongoStore, Query, RealtimeStore, Snapshot, StoreError, Subscription};
