//! `ActivityPub` request handlers.

#![allow(missing_docs)]

mod collections;
mod inbox;
mod nodeinfo;
mod user;
mod webfinger;

pub use collections::{
    CollectionState, OrderedCollection, OrderedCollectionPage, followers_handler,
    following_handler, outbox_handler,
};
pub use inbox::{InboxState, inbox_handler, user_inbox_handler};
pub use nodeinfo::{NodeInfoState, nodeinfo_2_1, well_known_nodeinfo};
pub use user::{UserApState, user_handler};
pub use webfinger::{WebfingerResponse, WebfingerState, webfinger_handler};
