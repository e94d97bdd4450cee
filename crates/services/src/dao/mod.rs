pub mod base;
pub mod connection_request;
pub mod idea;
pub mod idea_join_request;
pub mod negotiation;
pub mod notification;
pub mod user;

pub use base::{DaoError, DaoResult, PaginatedResult, PaginationParams};
pub use connection_request::ConnectionRequestDao;
pub use idea::IdeaDao;
pub use idea_join_request::IdeaJoinRequestDao;
pub use negotiation::NegotiationDao;
pub use notification::NotificationDao;
pub use user::UserDao;
