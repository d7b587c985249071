//! Authoring and reading commands: `say`, `whisper`, `dm/{actor}`,
//! `post/private`, `post/followers`, `reply/{id}`, `edit/{id}`,
//! `delete/{id}`, `view/{id}`, `outbox/{actor}`, `hashtag/{tag}`,
//! `hashtags`, `local` (spec.md §6).

use outpost_core::services::{CreateNoteInput, UpdateNoteInput};
use outpost_db::entities::note::Visibility;
use outpost_db::entities::person;

use crate::context::TextContext;
use crate::render::{handle_of, note_list};
use crate::resolver::resolve_handle;
use crate::response::Response;

const DEFAULT_PAGE: u64 = 20;

fn extract_mention_handles(text: &str) -> Vec<String> {
    text.split_whitespace()
        .filter(|w| w.starts_with('@') && w.len() > 1)
        .map(|w| w[1..].trim_end_matches(|c: char| !c.is_alphanumeric() && c != '.' && c != '@').to_string())
        .collect()
}

async fn resolve_mentions(ctx: &TextContext, text: &str) -> Result<Vec<String>, Response> {
    let mut ids = Vec::new();
    for handle in extract_mention_handles(text) {
        match resolve_handle(ctx, &handle).await {
            Ok(actor) => ids.push(actor.id),
            Err(e) => return Err(e.into()),
        }
    }
    Ok(ids)
}

fn author(
    text: String,
    visibility: Visibility,
    reply_id: Option<String>,
    recipients: Vec<String>,
    mentioned_actor_ids: Vec<String>,
) -> CreateNoteInput {
    CreateNoteInput {
        text,
        cw: None,
        visibility,
        reply_id,
        explicit_recipients: recipients,
        mentioned_actor_ids,
    }
}

/// `say` — public post, no path argument; the whole query is the body. A
/// `@mention` of a local Group is resolved so `NoteService` can relay the
/// post through that Group to its followers (spec.md §4.4 case 2).
pub async fn say(ctx: &TextContext, caller: &person::Model, text: &str) -> Response {
    let mentioned = match resolve_mentions(ctx, text).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let input = author(text.to_string(), Visibility::Public, None, vec![], mentioned);
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `whisper` — followers-only post.
pub async fn whisper(ctx: &TextContext, caller: &person::Model, text: &str) -> Response {
    let input = author(text.to_string(), Visibility::Followers, None, vec![], vec![]);
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `dm/{actor}` — a single explicit recipient, addressed by handle.
pub async fn dm(ctx: &TextContext, caller: &person::Model, target_handle: &str, text: &str) -> Response {
    let target = match resolve_handle(ctx, target_handle).await {
        Ok(a) => a,
        Err(e) => return e.into(),
    };
    let input = author(text.to_string(), Visibility::Specified, None, vec![target.id], vec![]);
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `post/private` — explicit audience drawn from `@mentions` in the text.
pub async fn post_private(ctx: &TextContext, caller: &person::Model, text: &str) -> Response {
    let recipients = match resolve_mentions(ctx, text).await {
        Ok(r) => r,
        Err(resp) => return resp,
    };
    let input = author(text.to_string(), Visibility::Specified, None, recipients, vec![]);
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `post/followers` — long-form followers-only post.
pub async fn post_followers(ctx: &TextContext, caller: &person::Model, text: &str) -> Response {
    let input = author(text.to_string(), Visibility::Followers, None, vec![], vec![]);
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `reply/{id}` — disambiguates a poll vote (exact option-name match) from
/// an ordinary reply (spec.md S5).
pub async fn reply(ctx: &TextContext, caller: &person::Model, local_id: &str, text: &str) -> Response {
    let Some(parent) = find_note(ctx, local_id).await else {
        return Response::failure("Post not found");
    };

    if let Ok(poll) = ctx.poll_service.get_poll(&parent.id).await {
        let options: Vec<String> = serde_json::from_value(poll.options.clone()).unwrap_or_default();
        if let Some(choice) = options.iter().position(|o| o == text.trim()) {
            return match ctx.poll_service.vote(&caller.id, &parent.id, choice as i32).await {
                Ok(_) => Response::success("Voted.\n"),
                Err(e) => e.into(),
            };
        }
    }

    let input = author(
        text.to_string(),
        parent.visibility.clone(),
        Some(parent.id.clone()),
        vec![],
        vec![],
    );
    match ctx.note_service.create(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `edit/{id}`.
pub async fn edit(ctx: &TextContext, caller: &person::Model, local_id: &str, text: &str) -> Response {
    let Some(note) = find_note(ctx, local_id).await else {
        return Response::failure("Post not found");
    };
    let input = UpdateNoteInput {
        note_id: note.id,
        text: Some(text.to_string()),
        cw: None,
    };
    match ctx.note_service.update(&caller.id, input).await {
        Ok(note) => Response::redirect(format!("/view/{}", note.local_id)),
        Err(e) => e.into(),
    }
}

/// `delete/{id}`.
pub async fn delete(ctx: &TextContext, caller: &person::Model, local_id: &str) -> Response {
    let Some(note) = find_note(ctx, local_id).await else {
        return Response::failure("Post not found");
    };
    match ctx.note_service.delete(&caller.id, &note.id).await {
        Ok(()) => Response::success("Deleted.\n"),
        Err(e) => e.into(),
    }
}

/// `view/{id}` — readable with or without authentication, gated by
/// `AudienceService`.
pub async fn view(ctx: &TextContext, viewer: Option<&person::Model>, local_id: &str) -> Response {
    let Some(note) = find_note(ctx, local_id).await else {
        return Response::failure("Post not found");
    };
    let viewer_id = viewer.map(|v| v.id.as_str());
    match ctx.audience_service.is_visible_to(&note, viewer_id).await {
        Ok(true) => {}
        Ok(false) => return Response::failure("Post not found"),
        Err(e) => return e.into(),
    }

    let author_handle = match ctx.person_repo.get_by_id(&note.actor_id).await {
        Ok(a) => handle_of(&a),
        Err(_) => note.actor_id.clone(),
    };
    Response::success(note_list(&[(note, author_handle)]))
}

/// `outbox/{actor}` — the actor's public timeline, audience-filtered
/// (spec.md S7: a DM's non-recipients see "No posts.").
pub async fn outbox(ctx: &TextContext, viewer: Option<&person::Model>, handle: &str) -> Response {
    let actor = match resolve_handle(ctx, handle).await {
        Ok(a) => a,
        Err(e) => return e.into(),
    };
    let viewer_id = viewer.map(|v| v.id.as_str());

    let notes = match ctx.note_repo.find_by_actor(&actor.id, DEFAULT_PAGE, None).await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };

    let mut visible = Vec::new();
    for note in notes {
        match ctx.audience_service.is_visible_to(&note, viewer_id).await {
            Ok(true) => visible.push((note, handle_of(&actor))),
            Ok(false) => {}
            Err(e) => return e.into(),
        }
    }
    Response::success(note_list(&visible))
}

/// `hashtag/{tag}` — notes tagged with `tag`, audience-filtered since
/// hashtags are extracted regardless of a note's visibility.
pub async fn hashtag(ctx: &TextContext, viewer: Option<&person::Model>, tag: &str) -> Response {
    let notes = match ctx.hashtag_service.notes_for_tag(tag, DEFAULT_PAGE).await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };
    render_audience_filtered(ctx, viewer, notes).await
}

/// `search` — spec.md's Non-goals restrict this to hashtag lookup.
pub async fn search(ctx: &TextContext, viewer: Option<&person::Model>, query: &str) -> Response {
    let tag = query.trim().trim_start_matches('#');
    if tag.is_empty() {
        return Response::failure("Search term required");
    }
    hashtag(ctx, viewer, tag).await
}

/// `hashtags` — distinct known tags.
pub async fn hashtags(ctx: &TextContext) -> Response {
    match ctx.hashtag_service.known_tags(DEFAULT_PAGE).await {
        Ok(tags) if tags.is_empty() => Response::success("No tags yet.\n"),
        Ok(tags) => Response::success(tags.into_iter().map(|t| format!("#{t}\n")).collect::<String>()),
        Err(e) => e.into(),
    }
}

/// `local` — the public local timeline.
pub async fn local(ctx: &TextContext, viewer: Option<&person::Model>) -> Response {
    let notes = match ctx.note_repo.find_local_public(DEFAULT_PAGE, None).await {
        Ok(n) => n,
        Err(e) => return e.into(),
    };
    render_audience_filtered(ctx, viewer, notes).await
}

async fn render_audience_filtered(
    ctx: &TextContext,
    viewer: Option<&person::Model>,
    notes: Vec<outpost_db::entities::note::Model>,
) -> Response {
    let viewer_id = viewer.map(|v| v.id.as_str());
    let mut rows = Vec::new();
    for note in notes {
        match ctx.audience_service.is_visible_to(&note, viewer_id).await {
            Ok(true) => {
                let handle = match ctx.person_repo.get_by_id(&note.actor_id).await {
                    Ok(a) => handle_of(&a),
                    Err(_) => note.actor_id.clone(),
                };
                rows.push((note, handle));
            }
            Ok(false) => {}
            Err(e) => return e.into(),
        }
    }
    Response::success(note_list(&rows))
}

async fn find_note(ctx: &TextContext, local_id: &str) -> Option<outpost_db::entities::note::Model> {
    ctx.note_repo.find_by_local_id(local_id).await.ok().flatten().filter(|n| !n.is_deleted())
}
