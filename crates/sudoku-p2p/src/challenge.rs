//! The multiplayer challenge state machine.
//!
//! A [`Challenge`] owns the authoritative puzzle every participant plays
//! against plus one private [`PlayerGame`] per participant. All methods are
//! pure mutations of the record; persisting and broadcasting them is the
//! coordinator's job.

use crate::directory::DirectoryEntry;
use crate::error::ChallengeError;
use crate::player::{Nickname, PlayerIdentity};
use once_cell::sync::Lazy;
use rand::seq::IteratorRandom;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use sudoku_core::{Board, Generator, GeneratorConfig, Grid, PlacementRule, Position, EMPTY, SIDE};

/// Score change for a value accepted on the shared board
pub const CORRECT_NUMBER_SCORE: i32 = 1;
/// Score change for a value rejected by the board constraints
pub const WRONG_NUMBER_SCORE: i32 = -1;

static CHALLENGE_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[A-Za-z0-9]+( [A-Za-z0-9]+)*$").expect("valid challenge name pattern")
});

/// Challenge name: 3 to 24 characters, alphanumeric words separated by single spaces.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ChallengeName(String);

impl ChallengeName {
    pub fn parse(raw: &str) -> Result<Self, ChallengeError> {
        let len = raw.chars().count();
        if (3..=24).contains(&len) && CHALLENGE_NAME.is_match(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(ChallengeError::InvalidChallengeName {
                name: raw.to_owned(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ChallengeName {
    type Error = ChallengeError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        Self::parse(&raw)
    }
}

impl From<ChallengeName> for String {
    fn from(name: ChallengeName) -> Self {
        name.0
    }
}

impl fmt::Display for ChallengeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeStatus {
    Waiting,
    Playing,
    Ended,
}

impl fmt::Display for ChallengeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Waiting => "waiting",
            Self::Playing => "playing",
            Self::Ended => "ended",
        };
        f.write_str(label)
    }
}

/// A participant's private view of the puzzle and their score
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerGame {
    pub player: PlayerIdentity,
    pub board: Board,
    pub score: i32,
    pub completed: bool,
}

impl PlayerGame {
    fn new(player: PlayerIdentity, board: Board) -> Self {
        Self {
            player,
            board,
            score: 0,
            completed: false,
        }
    }

    fn refresh_completed(&mut self) -> bool {
        self.completed = self.board.iter().flatten().all(|&v| v != EMPTY);
        self.completed
    }
}

/// What a placement did to the record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaceOutcome {
    /// The value was accepted on the shared board, score +1
    Correct,
    /// Someone else solved the cell first; the player's board now shows their value
    AlreadyGuessed,
    /// The value broke a constraint, score -1
    Invalid,
    /// The player already completed their board
    Ignored,
}

impl PlaceOutcome {
    /// The error reported to the player for this outcome, once the record is stored
    pub fn into_result(self, row: usize, col: usize, value: u8) -> Result<(), ChallengeError> {
        match self {
            Self::Correct | Self::Ignored => Ok(()),
            Self::AlreadyGuessed => Err(ChallengeError::AlreadyGuessed { row, col }),
            Self::Invalid => Err(ChallengeError::InvalidValue { row, col, value }),
        }
    }
}

/// Result of removing a participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoveOutcome {
    /// The player was not part of the challenge
    Absent,
    /// The player left; `new_owner` is set when ownership was handed over
    Left { new_owner: Option<PlayerIdentity> },
    /// Nobody is left: the record should be deleted
    Empty,
}

/// A shared challenge record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Challenge {
    name: ChallengeName,
    owner: PlayerIdentity,
    listed: bool,
    status: ChallengeStatus,
    puzzle: Grid,
    initial: Board,
    games: BTreeMap<Nickname, PlayerGame>,
}

impl Challenge {
    /// Generate a fresh puzzle for a new challenge in the waiting state.
    ///
    /// The owner is not added as a player; the coordinator joins them separately.
    pub fn new(
        owner: PlayerIdentity,
        name: ChallengeName,
        seed: Option<u64>,
        listed: bool,
        generator: GeneratorConfig,
    ) -> Self {
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let puzzle = Generator::from_rng(generator, rng).generate();
        let initial = puzzle.values();
        Self {
            name,
            owner,
            listed,
            status: ChallengeStatus::Waiting,
            puzzle,
            initial,
            games: BTreeMap::new(),
        }
    }

    pub fn name(&self) -> &ChallengeName {
        &self.name
    }

    pub fn owner(&self) -> &PlayerIdentity {
        &self.owner
    }

    pub fn is_listed(&self) -> bool {
        self.listed
    }

    pub fn status(&self) -> ChallengeStatus {
        self.status
    }

    /// The authoritative board shared by every participant
    pub fn puzzle(&self) -> &Grid {
        &self.puzzle
    }

    /// The clue layout players start from
    pub fn initial_board(&self) -> &Board {
        &self.initial
    }

    pub fn game(&self, nickname: &Nickname) -> Option<&PlayerGame> {
        self.games.get(nickname)
    }

    pub fn games(&self) -> impl Iterator<Item = &PlayerGame> {
        self.games.values()
    }

    pub fn players(&self) -> impl Iterator<Item = &PlayerIdentity> {
        self.games.values().map(|g| &g.player)
    }

    pub fn player_count(&self) -> usize {
        self.games.len()
    }

    pub fn contains(&self, nickname: &Nickname) -> bool {
        self.games.contains_key(nickname)
    }

    /// Move from waiting to playing; only the owner may do this.
    pub fn start(&mut self, by: &PlayerIdentity, min_players: usize) -> Result<(), ChallengeError> {
        if *by != self.owner {
            return Err(ChallengeError::Unauthorized);
        }
        if self.status != ChallengeStatus::Waiting {
            return Err(ChallengeError::InvalidTransition);
        }
        if self.games.len() < min_players {
            return Err(ChallengeError::NotEnoughPlayers {
                required: min_players,
                found: self.games.len(),
            });
        }
        self.status = ChallengeStatus::Playing;
        Ok(())
    }

    /// Add a participant with a fresh copy of the initial board. Returns
    /// `false` when the player was already in.
    pub fn add_player(&mut self, player: PlayerIdentity) -> bool {
        if self.games.contains_key(player.nickname()) {
            return false;
        }
        let game = PlayerGame::new(player.clone(), self.initial);
        self.games.insert(player.nickname().clone(), game);
        true
    }

    /// Drop a participant, handing ownership to a random remaining player
    /// when the owner leaves.
    pub fn remove_player<R: Rng>(&mut self, player: &PlayerIdentity, rng: &mut R) -> RemoveOutcome {
        if self.games.remove(player.nickname()).is_none() {
            return RemoveOutcome::Absent;
        }
        if self.games.is_empty() {
            return RemoveOutcome::Empty;
        }
        if *player != self.owner {
            return RemoveOutcome::Left { new_owner: None };
        }

        match self.games.values().choose(rng) {
            Some(heir) => {
                self.owner = heir.player.clone();
                RemoveOutcome::Left {
                    new_owner: Some(self.owner.clone()),
                }
            }
            None => RemoveOutcome::Empty,
        }
    }

    /// Place `value` for `player` at (`row`, `col`) against the shared board.
    ///
    /// `Ok` means the record changed (or the player's board is already
    /// complete) and must be stored; [`PlaceOutcome::into_result`] then gives
    /// the player-facing result. `Err` means nothing changed.
    pub fn place_number(
        &mut self,
        player: &PlayerIdentity,
        row: usize,
        col: usize,
        value: u8,
        rule: PlacementRule,
    ) -> Result<PlaceOutcome, ChallengeError> {
        let Some(pos) = Position::checked(row, col) else {
            return Err(ChallengeError::CellNotFound { row, col });
        };
        if self.status != ChallengeStatus::Playing {
            return Err(ChallengeError::InvalidState);
        }
        let game = self
            .games
            .get_mut(player.nickname())
            .ok_or_else(|| ChallengeError::UnknownPlayer {
                nickname: player.nickname().to_string(),
            })?;
        if game.completed {
            return Ok(PlaceOutcome::Ignored);
        }
        if self.puzzle.is_fixed(pos) {
            return Err(ChallengeError::FixedCell { row, col });
        }
        if game.board[row][col] != EMPTY {
            return Err(ChallengeError::AlreadyFilled { row, col });
        }
        if !(1..=SIDE as u8).contains(&value) {
            return Err(ChallengeError::ValueOutOfRange { value });
        }

        let outcome = match self.puzzle.place(pos, value, rule).map_err(ChallengeError::from) {
            Ok(()) => {
                game.board[row][col] = value;
                game.score += CORRECT_NUMBER_SCORE;
                PlaceOutcome::Correct
            }
            Err(ChallengeError::AlreadyGuessed { .. }) => {
                game.board[row][col] = self.puzzle.value(pos);
                PlaceOutcome::AlreadyGuessed
            }
            Err(ChallengeError::InvalidValue { .. }) => {
                game.score += WRONG_NUMBER_SCORE;
                PlaceOutcome::Invalid
            }
            Err(err) => return Err(err),
        };

        if game.refresh_completed() {
            self.status = ChallengeStatus::Ended;
        }
        Ok(outcome)
    }

    /// `(nickname, score)` pairs, best first, ties broken by nickname
    pub fn scores(&self) -> Vec<(Nickname, i32)> {
        let mut scores: Vec<_> = self
            .games
            .iter()
            .map(|(nickname, game)| (nickname.clone(), game.score))
            .collect();
        scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        scores
    }

    /// Summary published in the public directory
    pub fn info(&self) -> DirectoryEntry {
        DirectoryEntry {
            name: self.name.clone(),
            owner: self.owner.nickname().clone(),
            status: self.status,
            players: self.games.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::player::PeerAddress;

    fn player(name: &str) -> PlayerIdentity {
        PlayerIdentity::new(
            Nickname::parse(name).unwrap(),
            PeerAddress::new(format!("{name}-peer")),
        )
    }

    fn challenge(seed: u64) -> Challenge {
        Challenge::new(
            player("Alice"),
            ChallengeName::parse("Challenge 1").unwrap(),
            Some(seed),
            true,
            GeneratorConfig::default(),
        )
    }

    fn playing(seed: u64) -> Challenge {
        let mut c = challenge(seed);
        c.add_player(player("Alice"));
        c.add_player(player("Bob"));
        c.start(&player("Alice"), 2).unwrap();
        c
    }

    fn first_empty(c: &Challenge) -> Position {
        Position::all().find(|&p| c.puzzle().value(p) == EMPTY).unwrap()
    }

    /// A digit already present in the cell's row
    fn conflicting_value(c: &Challenge, pos: Position) -> u8 {
        (0..SIDE)
            .map(|col| c.puzzle().value(Position::new(pos.row, col)))
            .find(|&v| v != EMPTY)
            .unwrap()
    }

    #[test]
    fn test_challenge_name_validation() {
        assert!(ChallengeName::parse("Challenge 1").is_ok());
        assert!(ChallengeName::parse("abc").is_ok());
        assert!(ChallengeName::parse("Challenge 1!").is_err());
        assert!(ChallengeName::parse("ab").is_err());
        assert!(ChallengeName::parse("two  spaces").is_err());
        assert!(ChallengeName::parse(" lead").is_err());
        assert!(ChallengeName::parse(&"a".repeat(25)).is_err());
    }

    #[test]
    fn test_start_transitions() {
        let mut c = challenge(7);
        c.add_player(player("Alice"));

        assert_eq!(c.start(&player("Bob"), 2), Err(ChallengeError::Unauthorized));
        assert_eq!(
            c.start(&player("Alice"), 2),
            Err(ChallengeError::NotEnoughPlayers {
                required: 2,
                found: 1
            })
        );

        c.add_player(player("Bob"));
        assert!(c.start(&player("Alice"), 2).is_ok());
        assert_eq!(c.status(), ChallengeStatus::Playing);
        assert_eq!(c.start(&player("Alice"), 2), Err(ChallengeError::InvalidTransition));
    }

    #[test]
    fn test_add_player_is_idempotent() {
        let mut c = challenge(7);
        assert!(c.add_player(player("Alice")));
        assert!(!c.add_player(player("Alice")));
        assert_eq!(c.player_count(), 1);

        let game = c.game(&Nickname::parse("Alice").unwrap()).unwrap();
        assert_eq!(&game.board, c.initial_board());
        assert_eq!(game.score, 0);
    }

    #[test]
    fn test_owner_handover() {
        let mut c = challenge(7);
        let mut rng = StdRng::seed_from_u64(1);
        c.add_player(player("Alice"));
        c.add_player(player("Bob"));

        let outcome = c.remove_player(&player("Alice"), &mut rng);
        assert_eq!(
            outcome,
            RemoveOutcome::Left {
                new_owner: Some(player("Bob"))
            }
        );
        assert_eq!(c.owner().nickname(), "Bob");

        assert_eq!(c.remove_player(&player("Alice"), &mut rng), RemoveOutcome::Absent);
        assert_eq!(c.remove_player(&player("Bob"), &mut rng), RemoveOutcome::Empty);
    }

    #[test]
    fn test_non_owner_leaving_keeps_owner() {
        let mut c = challenge(7);
        let mut rng = StdRng::seed_from_u64(1);
        c.add_player(player("Alice"));
        c.add_player(player("Bob"));
        c.add_player(player("Carol"));

        let outcome = c.remove_player(&player("Bob"), &mut rng);
        assert_eq!(outcome, RemoveOutcome::Left { new_owner: None });
        assert_eq!(c.owner().nickname(), "Alice");
    }

    #[test]
    fn test_place_requires_playing() {
        let mut c = challenge(7);
        c.add_player(player("Alice"));
        let pos = first_empty(&c);
        let result = c.place_number(&player("Alice"), pos.row, pos.col, 1, PlacementRule::default());
        assert_eq!(result, Err(ChallengeError::InvalidState));

        // Bounds are checked before the status
        let result = c.place_number(&player("Alice"), 9, 0, 1, PlacementRule::default());
        assert_eq!(result, Err(ChallengeError::CellNotFound { row: 9, col: 0 }));
    }

    #[test]
    fn test_place_correct_scores() {
        let mut c = playing(7);
        let pos = first_empty(&c);
        let answer = c.puzzle().solution(pos);

        let outcome = c
            .place_number(&player("Alice"), pos.row, pos.col, answer, PlacementRule::default())
            .unwrap();
        assert_eq!(outcome, PlaceOutcome::Correct);

        let alice = c.game(&Nickname::parse("Alice").unwrap()).unwrap();
        assert_eq!(alice.board[pos.row][pos.col], answer);
        assert_eq!(alice.score, CORRECT_NUMBER_SCORE);

        // Bob's private board does not see Alice's guess yet
        let bob = c.game(&Nickname::parse("Bob").unwrap()).unwrap();
        assert_eq!(bob.board[pos.row][pos.col], EMPTY);
    }

    #[test]
    fn test_place_already_guessed_converges() {
        let mut c = playing(7);
        let pos = first_empty(&c);
        let answer = c.puzzle().solution(pos);
        let rule = PlacementRule::default();

        c.place_number(&player("Alice"), pos.row, pos.col, answer, rule)
            .unwrap();
        let outcome = c
            .place_number(&player("Bob"), pos.row, pos.col, answer, rule)
            .unwrap();
        assert_eq!(outcome, PlaceOutcome::AlreadyGuessed);
        assert_eq!(
            outcome.into_result(pos.row, pos.col, answer),
            Err(ChallengeError::AlreadyGuessed {
                row: pos.row,
                col: pos.col
            })
        );

        let bob = c.game(&Nickname::parse("Bob").unwrap()).unwrap();
        assert_eq!(bob.board[pos.row][pos.col], answer);
        assert_eq!(bob.score, 0);
    }

    #[test]
    fn test_place_invalid_penalizes() {
        let mut c = playing(7);
        let pos = first_empty(&c);
        let wrong = conflicting_value(&c, pos);

        let outcome = c
            .place_number(&player("Alice"), pos.row, pos.col, wrong, PlacementRule::default())
            .unwrap();
        assert_eq!(outcome, PlaceOutcome::Invalid);

        let alice = c.game(&Nickname::parse("Alice").unwrap()).unwrap();
        assert_eq!(alice.board[pos.row][pos.col], EMPTY);
        assert_eq!(alice.score, WRONG_NUMBER_SCORE);
        assert_eq!(c.puzzle().value(pos), EMPTY);
    }

    #[test]
    fn test_refusals_leave_score_alone() {
        let mut c = playing(7);
        let rule = PlacementRule::default();
        let fixed = Position::all().find(|&p| c.puzzle().is_fixed(p)).unwrap();
        assert_eq!(
            c.place_number(&player("Alice"), fixed.row, fixed.col, 1, rule),
            Err(ChallengeError::FixedCell {
                row: fixed.row,
                col: fixed.col
            })
        );

        let pos = first_empty(&c);
        let answer = c.puzzle().solution(pos);
        c.place_number(&player("Alice"), pos.row, pos.col, answer, rule)
            .unwrap();
        assert_eq!(
            c.place_number(&player("Alice"), pos.row, pos.col, answer, rule),
            Err(ChallengeError::AlreadyFilled {
                row: pos.row,
                col: pos.col
            })
        );

        let other = Position::all().find(|&p| c.puzzle().value(p) == EMPTY).unwrap();
        assert_eq!(
            c.place_number(&player("Alice"), other.row, other.col, 0, rule),
            Err(ChallengeError::ValueOutOfRange { value: 0 })
        );
        assert!(matches!(
            c.place_number(&player("Mallory"), other.row, other.col, 1, rule),
            Err(ChallengeError::UnknownPlayer { .. })
        ));

        let alice = c.game(&Nickname::parse("Alice").unwrap()).unwrap();
        assert_eq!(alice.score, CORRECT_NUMBER_SCORE);
    }

    #[test]
    fn test_completion_ends_challenge() {
        let mut c = playing(3);
        let rule = PlacementRule::MatchSolution;
        let empties: Vec<_> = Position::all()
            .filter(|&p| c.puzzle().value(p) == EMPTY)
            .collect();

        for pos in &empties {
            assert_eq!(c.status(), ChallengeStatus::Playing);
            let answer = c.puzzle().solution(*pos);
            let outcome = c
                .place_number(&player("Alice"), pos.row, pos.col, answer, rule)
                .unwrap();
            assert_eq!(outcome, PlaceOutcome::Correct);
        }

        assert_eq!(c.status(), ChallengeStatus::Ended);
        let alice = c.game(&Nickname::parse("Alice").unwrap()).unwrap();
        assert!(alice.completed);
        assert_eq!(alice.score, empties.len() as i32);

        // Bob has not finished but the game is over for him too
        let pos = empties[0];
        assert_eq!(
            c.place_number(&player("Bob"), pos.row, pos.col, 1, rule),
            Err(ChallengeError::InvalidState)
        );
    }

    #[test]
    fn test_scores_sorted() {
        let mut c = playing(7);
        c.add_player(player("Carol"));
        let rule = PlacementRule::default();
        let pos = first_empty(&c);
        let answer = c.puzzle().solution(pos);
        c.place_number(&player("Bob"), pos.row, pos.col, answer, rule)
            .unwrap();
        let next = first_empty(&c);
        let wrong = conflicting_value(&c, next);
        c.place_number(&player("Carol"), next.row, next.col, wrong, rule)
            .unwrap();

        let scores: Vec<_> = c
            .scores()
            .into_iter()
            .map(|(n, s)| (n.to_string(), s))
            .collect();
        assert_eq!(
            scores,
            vec![
                ("Bob".to_string(), 1),
                ("Alice".to_string(), 0),
                ("Carol".to_string(), -1)
            ]
        );
    }

    #[test]
    fn test_record_survives_serialization() {
        let mut c = playing(7);
        let pos = first_empty(&c);
        let answer = c.puzzle().solution(pos);
        c.place_number(&player("Alice"), pos.row, pos.col, answer, PlacementRule::default())
            .unwrap();

        let bytes = serde_json::to_vec(&c).unwrap();
        let restored: Challenge = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(restored, c);
        assert_eq!(restored.puzzle().groups().len(), 27);
    }
}
