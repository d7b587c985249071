//! Relationship and profile commands: `follow/{actor}`, `unfollow/{actor}`,
//! `bio`, `bio/set`, `resolve` (spec.md §6).

use outpost_core::services::FollowResult;
use outpost_db::entities::person;
use sea_orm::Set;

use crate::context::TextContext;
use crate::render::handle_of;
use crate::resolver::resolve_handle;
use crate::response::Response;

/// `follow/{actor}`.
pub async fn follow(ctx: &TextContext, caller: &person::Model, target_handle: &str) -> Response {
    let target = match resolve_handle(ctx, target_handle).await {
        Ok(a) => a,
        Err(e) => return e.into(),
    };
    match ctx.following_service.follow(&caller.id, &target.id).await {
        Ok(FollowResult::Accepted) => Response::success(format!("Following {}.\n", handle_of(&target))),
        Ok(FollowResult::Pending) => Response::success(format!("Follow request sent to {}.\n", handle_of(&target))),
        Err(e) => e.into(),
    }
}

/// `unfollow/{actor}`.
pub async fn unfollow(ctx: &TextContext, caller: &person::Model, target_handle: &str) -> Response {
    let target = match resolve_handle(ctx, target_handle).await {
        Ok(a) => a,
        Err(e) => return e.into(),
    };
    match ctx.following_service.unfollow(&caller.id, &target.id).await {
        Ok(()) => {
            // spec.md §8 invariant 3: previously inserted `feed` rows are
            // purged once the follow backing them is undone.
            if let Err(e) = ctx.feed_service.purge_for_unfollow(&caller.id, &target.id).await {
                return e.into();
            }
            Response::success(format!("Unfollowed {}.\n", handle_of(&target)))
        }
        Err(e) => e.into(),
    }
}

/// `bio` — the caller's current bio.
pub async fn bio(caller: &person::Model) -> Response {
    match &caller.bio {
        Some(bio) if !bio.is_empty() => Response::success(format!("{bio}\n")),
        _ => Response::success("No bio set.\n"),
    }
}

/// `bio/set` — the body is the new bio verbatim.
pub async fn bio_set(ctx: &TextContext, caller: &person::Model, text: &str) -> Response {
    if text.chars().count() > ctx.max_bio_length {
        return Response::failure("Bio is too long");
    }
    let mut active: person::ActiveModel = caller.clone().into();
    active.bio = Set(if text.trim().is_empty() { None } else { Some(text.to_string()) });
    match ctx.person_repo.update(active).await {
        Ok(_) => Response::success("Bio updated.\n"),
        Err(e) => e.into(),
    }
}

/// `resolve` — looks a handle up without following or messaging it.
pub async fn resolve(ctx: &TextContext, handle: &str) -> Response {
    match resolve_handle(ctx, handle).await {
        Ok(actor) => Response::success(format!("{}\n{}\n", handle_of(&actor), actor.id)),
        Err(e) => e.into(),
    }
}
