//! Instance-level and share commands: `status`, `stats`, `share/{id}`,
//! `unshare/{id}` (spec.md §6).

use outpost_db::entities::person;

use crate::context::TextContext;
use crate::render::note_list;
use crate::response::Response;

const DEFAULT_PAGE: u64 = 20;

/// `status` — the caller's personal feed (followees' posts, materialized
/// per spec.md §4.6's feed fan-out).
pub async fn status(ctx: &TextContext, caller: &person::Model) -> Response {
    let notes = match ctx.feed_service.timeline(&caller.id, DEFAULT_PAGE, None).await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };
    let mut rows = Vec::with_capacity(notes.len());
    for note in notes {
        let handle = match ctx.person_repo.get_by_id(&note.actor_id).await {
            Ok(a) => crate::render::handle_of(&a),
            Err(_) => note.actor_id.clone(),
        };
        rows.push((note, handle));
    }
    Response::success(note_list(&rows))
}

/// `stats` — coarse instance-wide counts, no authentication required.
pub async fn stats(ctx: &TextContext) -> Response {
    let people = match ctx.person_repo.count_local().await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };
    let posts = match ctx.note_repo.count_local().await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };
    Response::success(format!("{people} local users\n{posts} local posts\n"))
}

/// `share/{id}`.
pub async fn share(ctx: &TextContext, caller: &person::Model, local_id: &str) -> Response {
    let Some(note) = ctx.note_repo.find_by_local_id(local_id).await.ok().flatten() else {
        return Response::failure("Post not found");
    };
    match ctx.share_service.share(&caller.id, &note.id).await {
        Ok(()) => Response::success("Shared.\n"),
        Err(e) => e.into(),
    }
}

/// `unshare/{id}`.
pub async fn unshare(ctx: &TextContext, caller: &person::Model, local_id: &str) -> Response {
    let Some(note) = ctx.note_repo.find_by_local_id(local_id).await.ok().flatten() else {
        return Response::failure("Post not found");
    };
    match ctx.share_service.unshare(&caller.id, &note.id).await {
        Ok(()) => Response::success("Unshared.\n"),
        Err(e) => e.into(),
    }
}
