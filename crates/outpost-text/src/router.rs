//! The Gemini-style request router (spec.md §6): parses a request line
//! shaped like `/users/<verb>[/<arg>]?<query>` (authenticated) or
//! `/<verb>[/<arg>]?<query>` (anonymous) and dispatches to the matching
//! command handler, which returns a `<code> <meta>\r\n[body]` `Response`.
//!
//! Transport and identity are deliberately out of this module's scope:
//! spec.md §1 treats the TLS listener and client-certificate → local-actor
//! mapping as external collaborators "reimplemented straightforwardly
//! once the core is correct." `route` only ever consumes an
//! already-resolved `Option<person::Model>` caller; `outpost-server`
//! decides how that caller was authenticated.

use outpost_db::entities::person;

use crate::checkers;
use crate::commands::{meta, notes, social};
use crate::context::TextContext;
use crate::response::Response;

/// Percent-decodes a Gemini query string. Unlike
/// `application/x-www-form-urlencoded`, a literal `+` is left alone —
/// only `%XX` escapes are unescaped.
#[must_use]
pub fn percent_decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).unwrap_or("");
            if let Ok(byte) = u8::from_str_radix(hex, 16) {
                out.push(byte);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

/// Strips a `gemini://host` (or any `scheme://host`) prefix, leaving the
/// path and query untouched. A request line that is already a bare path
/// passes through unchanged.
#[must_use]
fn strip_authority(request: &str) -> &str {
    match request.find("://") {
        Some(idx) => {
            let after_scheme = &request[idx + 3..];
            match after_scheme.find('/') {
                Some(slash) => &after_scheme[slash..],
                None => "",
            }
        }
        None => request,
    }
}

/// Splits a request line into its path segments (sans `users` prefix) and
/// decoded query text.
fn parse(request: &str) -> (bool, Vec<&str>, String) {
    let request = strip_authority(request.trim());
    let (path, query) = request.split_once('?').unwrap_or((request, ""));
    let text = percent_decode(query);

    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    let authenticated_scope = segments.first().copied() == Some("users");
    if authenticated_scope {
        segments.remove(0);
    }
    (authenticated_scope, segments, text)
}

/// Routes one request line. `caller` is `None` for an anonymous/
/// unauthenticated connection.
pub async fn route(ctx: &TextContext, caller: Option<&person::Model>, request: &str) -> Response {
    let (authenticated_scope, segments, text) = parse(request);

    let Some(verb) = segments.first().copied() else {
        return Response::failure("Unknown command");
    };
    let rest = &segments[1..];

    if authenticated_scope {
        let Some(caller) = caller else {
            return Response::failure("Authentication required");
        };
        dispatch_authenticated(ctx, caller, verb, rest, &text).await
    } else {
        dispatch_anonymous(ctx, caller, verb, rest, &text).await
    }
}

async fn dispatch_authenticated(
    ctx: &TextContext,
    caller: &person::Model,
    verb: &str,
    rest: &[&str],
    text: &str,
) -> Response {
    match verb {
        "say" => {
            if text.is_empty() {
                return Response::input("Post text?");
            }
            notes::say(ctx, caller, text).await
        }
        "whisper" => {
            if text.is_empty() {
                return Response::input("Post text?");
            }
            notes::whisper(ctx, caller, text).await
        }
        "dm" => {
            let Some(target) = rest.first() else {
                return Response::input("Recipient?");
            };
            if text.is_empty() {
                return Response::input("Message?");
            }
            notes::dm(ctx, caller, target, text).await
        }
        "post" => match rest.first().copied() {
            Some("private") => {
                if text.is_empty() {
                    return Response::input("Post text?");
                }
                notes::post_private(ctx, caller, text).await
            }
            Some("followers") => {
                if text.is_empty() {
                    return Response::input("Post text?");
                }
                notes::post_followers(ctx, caller, text).await
            }
            _ => Response::failure("Unknown command"),
        },
        "reply" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            if text.is_empty() {
                return Response::input("Reply text?");
            }
            notes::reply(ctx, caller, id, text).await
        }
        "edit" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            if text.is_empty() {
                return Response::input("New text?");
            }
            notes::edit(ctx, caller, id, text).await
        }
        "delete" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            notes::delete(ctx, caller, id).await
        }
        "share" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            meta::share(ctx, caller, id).await
        }
        "unshare" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            meta::unshare(ctx, caller, id).await
        }
        "follow" => {
            let Some(target) = rest.first() else {
                return Response::input("Follow whom?");
            };
            social::follow(ctx, caller, target).await
        }
        "unfollow" => {
            let Some(target) = rest.first() else {
                return Response::input("Unfollow whom?");
            };
            social::unfollow(ctx, caller, target).await
        }
        "bio" => match rest.first().copied() {
            Some("set") => social::bio_set(ctx, caller, text).await,
            _ => social::bio(caller).await,
        },
        "status" => meta::status(ctx, caller).await,
        "checkers" => checkers::handle(ctx, Some(caller), rest, text).await,
        // Read-only verbs work the same whether or not the caller
        // authenticated under `/users/`; fall through to the anonymous
        // table rather than duplicating them.
        _ => dispatch_anonymous(ctx, Some(caller), verb, rest, text).await,
    }
}

async fn dispatch_anonymous(
    ctx: &TextContext,
    viewer: Option<&person::Model>,
    verb: &str,
    rest: &[&str],
    text: &str,
) -> Response {
    match verb {
        "view" => {
            let Some(id) = rest.first() else {
                return Response::failure("Post not found");
            };
            notes::view(ctx, viewer, id).await
        }
        "outbox" => {
            let Some(handle) = rest.first() else {
                return Response::failure("Actor not found");
            };
            notes::outbox(ctx, viewer, handle).await
        }
        "hashtag" => {
            let Some(tag) = rest.first() else {
                return Response::failure("Hashtag required");
            };
            notes::hashtag(ctx, viewer, tag).await
        }
        "hashtags" => notes::hashtags(ctx).await,
        "local" => notes::local(ctx, viewer).await,
        "stats" => meta::stats(ctx).await,
        "resolve" => {
            if text.is_empty() {
                return Response::input("Handle?");
            }
            social::resolve(ctx, text).await
        }
        "search" => {
            if text.is_empty() {
                return Response::input("Search query?");
            }
            notes::search(ctx, viewer, text).await
        }
        "checkers" => checkers::handle(ctx, viewer, rest, text).await,
        _ => Response::failure("Unknown command"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn percent_decode_unescapes_space() {
        assert_eq!(percent_decode("Hello%20world"), "Hello world");
    }

    #[test]
    fn percent_decode_leaves_bare_plus() {
        assert_eq!(percent_decode("a+b"), "a+b");
    }

    #[test]
    fn percent_decode_tolerates_trailing_percent() {
        assert_eq!(percent_decode("abc%"), "abc%");
    }

    #[test]
    fn strip_authority_removes_scheme_and_host() {
        assert_eq!(
            strip_authority("gemini://localhost:8443/users/say?hi"),
            "/users/say?hi"
        );
        assert_eq!(strip_authority("/users/say?hi"), "/users/say?hi");
    }

    #[test]
    fn parse_splits_users_prefix_path_and_query() {
        let (auth, segments, text) = parse("/users/reply/abc123?vanilla");
        assert!(auth);
        assert_eq!(segments, vec!["reply", "abc123"]);
        assert_eq!(text, "vanilla");
    }

    #[test]
    fn parse_anonymous_path_has_no_users_prefix() {
        let (auth, segments, _) = parse("/local");
        assert!(!auth);
        assert_eq!(segments, vec!["local"]);
    }
}
