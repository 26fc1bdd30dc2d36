//! Identity of the game a patch document is evaluated against.
//!
//! A disc's 6-character game id is laid out as `GGGRMM`: a three-character game code,
//! one region character and a two-character maker (developer) code. Patch documents
//! filter on these pieces and can splice them into paths with the `{$__gameid}`,
//! `{$__region}` and `{$__maker}` variables.

use crate::error::{Error, Result};

const VAR_GAME_ID: &str = "{$__gameid}";
const VAR_REGION: &str = "{$__region}";
const VAR_MAKER: &str = "{$__maker}";

/// The facts about the running game that a patch document is matched against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameIdentity {
    game_id: String,
    revision: u16,
    disc_number: u8,
}

impl GameIdentity {
    /// Create a game identity.
    ///
    /// Fails with [`Error::InvalidGameId`] unless `game_id` is exactly six ASCII
    /// characters.
    pub fn new(game_id: impl Into<String>, revision: u16, disc_number: u8) -> Result<Self> {
        let game_id = game_id.into();
        if game_id.len() != 6 || !game_id.is_ascii() {
            return Err(Error::InvalidGameId(game_id));
        }

        Ok(Self {
            game_id,
            revision,
            disc_number,
        })
    }

    /// The full 6-character id, e.g. `RMCP01`.
    pub fn full(&self) -> &str {
        &self.game_id
    }

    /// The game code without region or maker, e.g. `RMC`.
    pub fn game_code(&self) -> &str {
        &self.game_id[0..3]
    }

    /// The region character, e.g. `P`.
    pub fn region(&self) -> char {
        self.game_id.as_bytes()[3] as char
    }

    /// The region as a string slice (for substitution).
    fn region_str(&self) -> &str {
        &self.game_id[3..4]
    }

    /// The two-character maker code, e.g. `01`.
    pub fn maker(&self) -> &str {
        &self.game_id[4..6]
    }

    pub fn revision(&self) -> u16 {
        self.revision
    }

    pub fn disc_number(&self) -> u8 {
        self.disc_number
    }

    /// Replace the game identity variables in `input`.
    ///
    /// The input is scanned left to right and each variable occurrence is replaced
    /// once. Replacement text is never re-scanned.
    pub fn substitute(&self, input: &str) -> String {
        let vars = [
            (VAR_GAME_ID, self.game_code()),
            (VAR_REGION, self.region_str()),
            (VAR_MAKER, self.maker()),
        ];

        let mut out = String::with_capacity(input.len());
        let mut rest = input;
        'scan: while !rest.is_empty() {
            for (var, value) in vars {
                if let Some(tail) = rest.strip_prefix(var) {
                    out.push_str(value);
                    rest = tail;
                    continue 'scan;
                }
            }

            let mut chars = rest.chars();
            if let Some(c) = chars.next() {
                out.push(c);
            }
            rest = chars.as_str();
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn game() -> GameIdentity {
        GameIdentity::new("RMCP01", 0, 0).unwrap()
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert!(matches!(
            GameIdentity::new("RMCP0", 0, 0),
            Err(Error::InvalidGameId(_))
        ));
        assert!(GameIdentity::new("RMCP011", 0, 0).is_err());
    }

    #[test]
    fn test_id_parts() {
        let game = game();
        assert_eq!(game.full(), "RMCP01");
        assert_eq!(game.game_code(), "RMC");
        assert_eq!(game.region(), 'P');
        assert_eq!(game.maker(), "01");
    }

    #[test]
    fn test_substitute_all_variables() {
        let game = game();
        assert_eq!(
            game.substitute("/{$__gameid}{$__region}{$__maker}/x"),
            "/RMCP01/x"
        );
    }

    #[test]
    fn test_substitute_leaves_unknown_text() {
        let game = game();
        assert_eq!(game.substitute("{$__other}/{$__region"), "{$__other}/{$__region");
        assert_eq!(game.substitute(""), "");
    }

    #[test]
    fn test_substitute_is_not_recursive() {
        // The substituted game code and the following text spell `{$__maker}`.
        let game = GameIdentity::new("{$_P01", 0, 0).unwrap();
        assert_eq!(game.substitute("{$__gameid}_maker}"), "{$__maker}");
    }
}
