mod channel_member;
mod platform;
mod session;
mod staff;
mod visitor;

pub use channel_member::{ChannelMember, MemberType};
pub use platform::{AiMode, Platform};
pub use session::{SessionStatus, VisitorSession};
pub use staff::Staff;
pub use visitor::{ServiceStatus, Visitor, MAX_AI_FALLBACK_RETRIES};
