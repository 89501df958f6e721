//! The 16-action discrete space the Q-learning selector chooses over.

use serde::{Deserialize, Serialize};

/// Number of discrete actions the selector can emit.
pub const ACTION_COUNT: usize = 16;

/// One of the 16 discrete tactical actions. The selector never emits a
/// value outside this set; `Action::from_id` is total over `0..16`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    Move(Direction),
    AttackNearest,
    AttackWeakest,
    AttackStrongest,
    Retreat,
    HoldPosition,
    Patrol,
    GatherNearestResource,
    Idle,
}

/// One of the 8 cardinal/diagonal headings for `Action::Move`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Direction {
    N,
    Ne,
    E,
    Se,
    S,
    Sw,
    W,
    Nw,
}

impl Direction {
    pub fn to_vector(self) -> (f32, f32) {
        let s = std::f32::consts::FRAC_1_SQRT_2;
        match self {
            Direction::N => (0.0, 1.0),
            Direction::Ne => (s, s),
            Direction::E => (1.0, 0.0),
            Direction::Se => (s, -s),
            Direction::S => (0.0, -1.0),
            Direction::Sw => (-s, -s),
            Direction::W => (-1.0, 0.0),
            Direction::Nw => (-s, s),
        }
    }
}

const DIRECTIONS: [Direction; 8] = [
    Direction::N,
    Direction::Ne,
    Direction::E,
    Direction::Se,
    Direction::S,
    Direction::Sw,
    Direction::W,
    Direction::Nw,
];

impl Action {
    /// Action ids `0..16` are total and stable: the selector's arg-max and
    /// replay buffer both index by this id, so the mapping must never
    /// change once chosen.
    pub fn from_id(id: u8) -> Self {
        match id {
            0..=7 => Action::Move(DIRECTIONS[id as usize]),
            8 => Action::AttackNearest,
            9 => Action::AttackWeakest,
            10 => Action::AttackStrongest,
            11 => Action::Retreat,
            12 => Action::HoldPosition,
            13 => Action::Patrol,
            14 => Action::GatherNearestResource,
            _ => Action::Idle,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Action::Move(dir) => DIRECTIONS.iter().position(|&d| d == dir).unwrap() as u8,
            Action::AttackNearest => 8,
            Action::AttackWeakest => 9,
            Action::AttackStrongest => 10,
            Action::Retreat => 11,
            Action::HoldPosition => 12,
            Action::Patrol => 13,
            Action::GatherNearestResource => 14,
            Action::Idle => 15,
        }
    }
}

/// The action id the selector falls back to on a malformed state vector or
/// a backend failure.
pub const IDLE_ACTION_ID: u8 = 15;
