//! Repository layer: one struct per aggregate, each owning an
//! `Arc<DatabaseConnection>` and exposing the query shapes its callers
//! need (never a generic CRUD trait).

pub mod feed;
pub mod following;
pub mod hashtag;
pub mod inbox;
pub mod note;
pub mod outbox;
pub mod person;
pub mod person_keypair;
pub mod poll;
pub mod share;

pub use feed::FeedRepository;
pub use following::{FollowRequestRepository, FollowingRepository};
pub use hashtag::HashtagRepository;
pub use inbox::InboxRepository;
pub use note::NoteRepository;
pub use outbox::{DeliveryRepository, OutboxRepository};
pub use person::PersonRepository;
pub use person_keypair::PersonKeypairRepository;
pub use poll::{PollRepository, PollVoteRepository};
pub use share::ShareRepository;
