pub mod connection_request;
pub mod idea;
pub mod idea_join_request;
pub mod negotiation;
pub mod notification;
pub mod user;

pub use connection_request::{ConnectionRequest, RequestStatus};
pub use idea::{Idea, IdeaInvestmentDetails, IdeaStatus};
pub use idea_join_request::IdeaJoinRequest;
pub use negotiation::{Negotiation, NegotiationStatus, Offer, Party};
pub use notification::{Notification, NotificationType};
pub use user::User;
