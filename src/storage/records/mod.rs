pub mod announcement;
pub mod conversation;
pub mod message;
pub mod user;

pub(crate) use announcement::AnnouncementRecord;
pub(crate) use conversation::{ConversationRecord, ConversationSummaryRecord};
pub(crate) use message::{MessageRecord, MessageViewRecord};
pub(crate) use user::UserRecord;
