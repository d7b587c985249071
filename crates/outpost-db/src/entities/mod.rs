//! `SeaORM` entity definitions, one module per table.

pub mod delivery;
pub mod feed;
pub mod follow_request;
pub mod following;
pub mod hashtag;
pub mod inbox;
pub mod note;
pub mod outbox;
pub mod person;
pub mod person_keypair;
pub mod poll;
pub mod poll_vote;
pub mod share;

pub use delivery::Entity as Delivery;
pub use feed::Entity as Feed;
pub use follow_request::Entity as FollowRequest;
pub use following::Entity as Following;
pub use hashtag::Entity as Hashtag;
pub use inbox::Entity as Inbox;
pub use note::Entity as Note;
pub use outbox::Entity as Outbox;
pub use person::Entity as Person;
pub use person_keypair::Entity as PersonKeypair;
pub use poll::Entity as Poll;
pub use poll_vote::Entity as PollVote;
pub use share::Entity as Share;
