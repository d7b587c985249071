//! Business logic services.

#![allow(missing_docs)]

pub mod audience;
pub mod delivery;
pub mod feed;
pub mod following;
pub mod hashtag;
pub mod note;
pub mod poll;
pub mod share;

pub use audience::AudienceService;
pub use delivery::{ActivityDelivery, DeliveryService, NoOpDelivery, OutboxDelivery};
pub use feed::FeedService;
pub use following::{FollowResult, FollowingService};
pub use hashtag::HashtagService;
pub use note::{CreateNoteInput, NoteService, UpdateNoteInput};
pub use poll::{CreatePollInput, PollService, PollWithStatus};
pub use share::ShareService;
