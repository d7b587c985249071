//! Checkers mini-game seam.
//!
//! spec.md §1 lists the checkers game logic among the external
//! collaborators the core only describes an interface for ("may be
//! reimplemented straightforwardly once the core is correct"). This
//! module supplies that interface — a single `apply_move` trait method —
//! so `outpost-text` can route `/checkers/*` requests without pretending
//! to specify game rules the core never covers.

use outpost_db::entities::person;

use crate::context::TextContext;
use crate::response::Response;

/// A single checkers move, in whatever notation a concrete engine wants.
pub struct CheckersMove {
    pub notation: String,
}

/// A checkers game engine. `outpost-text` only needs `apply_move`; board
/// representation, legality, and win conditions belong to the
/// implementation that plugs in here.
pub trait CheckersEngine: Send + Sync {
    /// Applies `mv` to the game `game_id` on behalf of `player`, returning
    /// the resulting board rendered as plain text.
    ///
    /// # Errors
    /// Returns a human-readable reason the move was rejected.
    fn apply_move(
        &self,
        game_id: &str,
        player: &str,
        mv: CheckersMove,
    ) -> Result<String, String>;
}

/// Placeholder engine. The federation engine this crate specifies has no
/// opinion on checkers rules, so this always reports the game as
/// unavailable rather than silently accepting moves.
#[derive(Default)]
pub struct StubCheckersEngine;

impl CheckersEngine for StubCheckersEngine {
    fn apply_move(
        &self,
        _game_id: &str,
        _player: &str,
        _mv: CheckersMove,
    ) -> Result<String, String> {
        Err("Checkers is not available on this instance".to_string())
    }
}

/// Routes `/checkers/*`. `rest` is the path segments after `checkers`
/// (e.g. `["<game-id>"]`); `text` is the query body, taken as the move's
/// notation.
pub async fn handle(
    _ctx: &TextContext,
    caller: Option<&person::Model>,
    rest: &[&str],
    text: &str,
) -> Response {
    let Some(caller) = caller else {
        return Response::failure("Authentication required");
    };
    let game_id = rest.first().copied().unwrap_or("default");
    let engine = StubCheckersEngine;
    match engine.apply_move(
        game_id,
        &caller.preferred_username,
        CheckersMove {
            notation: text.to_string(),
        },
    ) {
        Ok(board) => Response::success(board),
        Err(reason) => Response::failure(reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stub_engine_rejects_every_move() {
        let engine = StubCheckersEngine;
        let result = engine.apply_move(
            "game1",
            "alice",
            CheckersMove {
                notation: "a3-b4".to_string(),
            },
        );
        assert!(result.is_err());
    }
}
