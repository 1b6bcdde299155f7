//! Round configuration and state machine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// RoundConfig
// ---------------------------------------------------------------------------

/// Timing and size settings for quiz rounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoundConfig {
    /// Questions asked per round, if the category has that many.
    pub questions_per_round: usize,

    /// Seconds each question stays open.
    pub answer_deadline_secs: u64,

    /// Seconds players have to `!join` after a round is started.
    pub recruitment_window_secs: u64,

    /// Minimum seconds between two accepted answers from one player.
    /// Adjustable at runtime.
    pub answer_cooldown_secs: u64,
}

impl Default for RoundConfig {
    fn default() -> Self {
        Self {
            questions_per_round: 10,
            answer_deadline_secs: 30,
            recruitment_window_secs: 45,
            answer_cooldown_secs: 2,
        }
    }
}

impl RoundConfig {
    pub fn answer_deadline(&self) -> Duration {
        Duration::from_secs(self.answer_deadline_secs)
    }

    pub fn recruitment_window(&self) -> Duration {
        Duration::from_secs(self.recruitment_window_secs)
    }

    pub fn answer_cooldown(&self) -> Duration {
        Duration::from_secs(self.answer_cooldown_secs)
    }
}

// ---------------------------------------------------------------------------
// RoundState
// ---------------------------------------------------------------------------

/// The lifecycle state of the quiz round.
///
/// ```text
///          start                 window closes (≥1 player)
/// Idle ───────────→ Recruiting ─────────────────────────→ Active
///  ↑                    │                                   │
///  │   no players       │          last question / stop     │
///  ├────────────────────┘                                   │
///  ├────────────────────────────────────────────────────────┘
///  │
///  │   reconnect                disconnect
///  └──────────── Concluded ←──────────────── (Recruiting | Active)
/// ```
///
/// A normally finished round passes through **Concluded** only while its
/// results are computed and is immediately reset to **Idle**. A round cut
/// short by a disconnect stays in Concluded, flagged interrupted, until
/// the connection comes back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RoundState {
    #[default]
    Idle,
    Recruiting,
    Active,
    Concluded,
}

impl RoundState {
    /// Returns `true` if players may `!join`.
    pub fn is_joinable(&self) -> bool {
        matches!(self, Self::Recruiting)
    }

    /// Returns `true` while a round is under way (stoppable).
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Recruiting | Self::Active)
    }

    /// Returns `true` if transitioning to `target` is valid.
    pub fn can_transition_to(self, target: Self) -> bool {
        use RoundState::*;
        matches!(
            (self, target),
            (Idle, Recruiting)
                | (Recruiting, Active)
                | (Recruiting, Idle)
                | (Recruiting, Concluded)
                | (Active, Idle)
                | (Active, Concluded)
                | (Concluded, Idle)
        )
    }
}

impl std::fmt::Display for RoundState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Recruiting => write!(f, "Recruiting"),
            Self::Active => write!(f, "Active"),
            Self::Concluded => write!(f, "Concluded"),
        }
    }
}
