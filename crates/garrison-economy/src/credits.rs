//! Per-team credit accounting: a non-negative integer counter per team.
//! Build orders debit; refinery unloads credit.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
#[error("team {team} has {available} credits, cannot debit {requested}")]
pub struct InsufficientCredits {
    pub team: u8,
    pub available: u32,
    pub requested: u32,
}

/// Why a team's balance changed, surfaced on `economy_delta` events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeltaReason {
    RefineryUnload,
    BuildOrder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EconomyDelta {
    pub team: u8,
    pub before: u32,
    pub after: u32,
    pub reason: DeltaReason,
}

/// Tracks every team's credit balance. Balances never go negative: a debit
/// that would overdraw is rejected rather than clamped, since silently
/// clamping would hide a blueprint-affordability bug from the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TeamLedger {
    balances: HashMap<u8, u32>,
}

impl TeamLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self, team: u8) -> u32 {
        *self.balances.get(&team).unwrap_or(&0)
    }

    pub fn credit(&mut self, team: u8, amount: u32, reason: DeltaReason) -> EconomyDelta {
        let before = self.balance(team);
        let after = before.saturating_add(amount);
        self.balances.insert(team, after);
        debug!(team, before, after, ?reason, "team credited");
        EconomyDelta { team, before, after, reason }
    }

    pub fn debit(&mut self, team: u8, amount: u32, reason: DeltaReason) -> Result<EconomyDelta, InsufficientCredits> {
        let before = self.balance(team);
        if amount > before {
            return Err(InsufficientCredits {
                team,
                available: before,
                requested: amount,
            });
        }
        let after = before - amount;
        self.balances.insert(team, after);
        debug!(team, before, after, ?reason, "team debited");
        Ok(EconomyDelta { team, before, after, reason })
    }
}
