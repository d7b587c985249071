//! Plain-text rendering helpers shared by the command handlers. Gemini
//! bodies are freeform `text/plain`; these just keep the formatting
//! consistent across commands rather than each reaching for its own
//! ad-hoc `format!`.

use outpost_db::entities::{note, person};

/// One line per note: `<local_id> <handle>: <text>` (or `[deleted]`).
#[must_use]
pub fn note_line(note: &note::Model, author_handle: &str) -> String {
    if note.is_deleted() {
        return format!("{} {author_handle}: [deleted]\n", note.local_id);
    }
    let text = note.text.as_deref().unwrap_or("");
    match &note.cw {
        Some(cw) => format!("{} {author_handle}: [{cw}] {text}\n", note.local_id),
        None => format!("{} {author_handle}: {text}\n", note.local_id),
    }
}

/// Renders a list of notes, each paired with its author's handle, falling
/// back to "No posts." when the list is empty (spec.md S7).
#[must_use]
pub fn note_list(rows: &[(note::Model, String)]) -> String {
    if rows.is_empty() {
        return "No posts.\n".to_string();
    }
    rows.iter().map(|(n, handle)| note_line(n, handle)).collect()
}

/// A displayable handle for an actor: `user@host` for remote, bare `user`
/// for local.
#[must_use]
pub fn handle_of(actor: &person::Model) -> String {
    match &actor.host {
        Some(host) => format!("{}@{host}", actor.preferred_username),
        None => actor.preferred_username.clone(),
    }
}
