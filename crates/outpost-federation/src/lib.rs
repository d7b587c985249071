//! `ActivityPub` federation for outpost.
//!
//! - `wire`/`convert`: the closed `ActivityStreams` vocabulary spec.md §3
//!   needs, and the conversions to/from the database's actor and note
//!   shapes.
//! - `signature`: draft-cavage-http-signatures signing and verification.
//! - `cache`: in-process remote actor cache (spec.md §9 — no Redis, this
//!   instance is the only process that needs it).
//! - `client`: outbound signed HTTP delivery, actor/object fetch, `WebFinger`.
//! - `handler`: the inbound HTTP surface — actor documents, collections,
//!   `WebFinger`, `NodeInfo`, and the inbox endpoint that admits activities
//!   onto the queue (spec.md §2).

pub mod cache;
pub mod client;
pub mod convert;
pub mod handler;
pub mod signature;
pub mod wire;

pub use cache::{CacheError, CacheStats, CachedRemoteActor, RemoteActorCache};
pub use client::{ApClient, ApClientError, DeliveryOutcome};
pub use convert::{
    LocalActor, LocalNote, LocalPoll, ParsedActor, ParsedNote, ParsedPoll, local_actor_to_json,
    local_note_to_json, parse_actor_json, parse_note_json,
};
pub use handler::*;
pub use signature::{HttpSigner, HttpVerifier, SignatureComponents, SignatureError};
pub use wire::{
    AS_PUBLIC, ActorJson, Endpoints, NoteJson, PollOptionJson, PollOptionRepliesJson,
    PublicKeyJson, TagJson, TombstoneJson, UrlConfig, as_context,
};
