//! Budgeted round state machine.
//!
//! A session starts `Active` with a signed budget. Every round moves the
//! budget by a reward or a penalty; the machine then settles into `Lost` when
//! the budget reaches zero or `Won` when it reaches the win threshold. Both,
//! and `Surrendered`, are terminal.

use tracing::debug;

use crate::{Error, Result};

/// Default starting budget for the guessing game.
pub const DEFAULT_START_BUDGET: i64 = 5000;
/// Default reward for a correct guess.
pub const DEFAULT_REWARD: i64 = 400;
/// Default penalty for a wrong guess.
pub const DEFAULT_PENALTY: i64 = 1000;
/// Default win threshold for the guessing game.
pub const DEFAULT_WIN_THRESHOLD: i64 = 12000;

/// Budget parameters of one session.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct BudgetRules {
    pub start: i64,
    pub reward: i64,
    pub penalty: i64,
    pub win_threshold: Option<i64>,
}

impl BudgetRules {
    /// Rules of the scored guessing game.
    ///
    /// # Errors
    ///
    /// Returns an error unless `0 < start < win_threshold` and both
    /// `reward` and `penalty` are positive.
    pub fn scored(start: i64, reward: i64, penalty: i64, win_threshold: i64) -> Result<Self> {
        if start <= 0 || start >= win_threshold {
            return Err(Error::InvalidParams(format!(
                "start budget {start} must lie strictly between 0 and the win threshold {win_threshold}"
            )));
        }
        if reward <= 0 || penalty <= 0 {
            return Err(Error::InvalidParams(
                "reward and penalty must be positive".to_string(),
            ));
        }
        Ok(Self {
            start,
            reward,
            penalty,
            win_threshold: Some(win_threshold),
        })
    }

    /// A query budget: each charge costs one unit, there is no way to win.
    ///
    /// # Errors
    ///
    /// Returns an error if `limit` is not positive.
    pub fn metered(limit: i64) -> Result<Self> {
        if limit <= 0 {
            return Err(Error::InvalidParams(format!(
                "query limit must be positive, got {limit}"
            )));
        }
        Ok(Self {
            start: limit,
            reward: 0,
            penalty: 1,
            win_threshold: None,
        })
    }

    /// A budget that never runs out.
    pub fn unmetered() -> Self {
        Self {
            start: 1,
            reward: 0,
            penalty: 0,
            win_threshold: None,
        }
    }
}

impl Default for BudgetRules {
    fn default() -> Self {
        Self {
            start: DEFAULT_START_BUDGET,
            reward: DEFAULT_REWARD,
            penalty: DEFAULT_PENALTY,
            win_threshold: Some(DEFAULT_WIN_THRESHOLD),
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundState {
    Active,
    Won,
    Lost,
    Surrendered,
}

impl RoundState {
    pub fn is_terminal(self) -> bool {
        self != RoundState::Active
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RoundOutcome {
    Hit,
    Miss,
}

/// Tracks the budget, the state and whether the protected secret was released.
#[derive(Clone, Debug)]
pub struct RoundMachine {
    rules: BudgetRules,
    budget: i64,
    state: RoundState,
    rounds: u64,
    disclosed: bool,
}

impl RoundMachine {
    pub fn new(rules: BudgetRules) -> Self {
        Self {
            rules,
            budget: rules.start,
            state: RoundState::Active,
            rounds: 0,
            disclosed: false,
        }
    }

    pub fn rules(&self) -> &BudgetRules {
        &self.rules
    }

    pub fn budget(&self) -> i64 {
        self.budget
    }

    pub fn state(&self) -> RoundState {
        self.state
    }

    /// Number of rounds that changed the budget.
    pub fn rounds(&self) -> u64 {
        self.rounds
    }

    /// Applies the reward or penalty of one scored round.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] once the machine is terminal.
    pub fn record(&mut self, outcome: RoundOutcome) -> Result<RoundState> {
        let delta = match outcome {
            RoundOutcome::Hit => self.rules.reward,
            RoundOutcome::Miss => -self.rules.penalty,
        };
        self.adjust(delta)
    }

    /// Charges one metered query.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] once the machine is terminal.
    pub fn charge(&mut self) -> Result<RoundState> {
        self.adjust(-self.rules.penalty)
    }

    /// Gives up. Never discloses anything.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ProtocolViolation`] once the machine is terminal.
    pub fn surrender(&mut self) -> Result<RoundState> {
        self.ensure_active()?;
        self.state = RoundState::Surrendered;
        debug!(budget = self.budget, "session surrendered");
        Ok(self.state)
    }

    /// Returns `true` exactly once, and only after the machine reached `Won`.
    pub fn claim_disclosure(&mut self) -> bool {
        if self.state == RoundState::Won && !self.disclosed {
            self.disclosed = true;
            true
        } else {
            false
        }
    }

    pub fn has_disclosed(&self) -> bool {
        self.disclosed
    }

    fn adjust(&mut self, delta: i64) -> Result<RoundState> {
        self.ensure_active()?;
        self.budget = self.budget.saturating_add(delta);
        self.rounds += 1;

        if self.budget <= 0 {
            self.state = RoundState::Lost;
        } else if self
            .rules
            .win_threshold
            .is_some_and(|threshold| self.budget >= threshold)
        {
            self.state = RoundState::Won;
        }

        if self.state.is_terminal() {
            debug!(budget = self.budget, rounds = self.rounds, state = ?self.state, "session settled");
        }
        Ok(self.state)
    }

    fn ensure_active(&self) -> Result<()> {
        if self.state.is_terminal() {
            return Err(Error::ProtocolViolation(format!(
                "session already ended ({:?})",
                self.state
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eighteen_hits_win_on_the_eighteenth_round() {
        let mut machine = RoundMachine::new(BudgetRules::default());
        for round in 1..=17 {
            assert_eq!(machine.record(RoundOutcome::Hit).unwrap(), RoundState::Active);
            assert!(!machine.claim_disclosure(), "round {round}");
        }
        assert_eq!(machine.record(RoundOutcome::Hit).unwrap(), RoundState::Won);
        assert_eq!(machine.budget(), 12200);
        assert!(machine.claim_disclosure());
        assert!(!machine.claim_disclosure());
    }

    #[test]
    fn five_misses_lose_on_the_fifth_round() {
        let mut machine = RoundMachine::new(BudgetRules::default());
        for _ in 0..4 {
            assert_eq!(machine.record(RoundOutcome::Miss).unwrap(), RoundState::Active);
        }
        assert_eq!(machine.record(RoundOutcome::Miss).unwrap(), RoundState::Lost);
        assert_eq!(machine.budget(), 0);
        assert!(!machine.claim_disclosure());
    }

    #[test]
    fn terminal_states_are_sticky() {
        let mut machine = RoundMachine::new(BudgetRules::default());
        for _ in 0..5 {
            machine.record(RoundOutcome::Miss).unwrap();
        }
        assert!(matches!(
            machine.record(RoundOutcome::Hit),
            Err(Error::ProtocolViolation(_))
        ));
        assert!(machine.surrender().is_err());
        assert!(machine.charge().is_err());
        assert_eq!(machine.state(), RoundState::Lost);
        assert_eq!(machine.rounds(), 5);
    }

    #[test]
    fn surrender_is_terminal_without_disclosure() {
        let mut machine = RoundMachine::new(BudgetRules::default());
        machine.record(RoundOutcome::Hit).unwrap();
        assert_eq!(machine.surrender().unwrap(), RoundState::Surrendered);
        assert!(!machine.claim_disclosure());
        assert_eq!(machine.budget(), 5400);
    }

    #[test]
    fn metered_budget_runs_out() {
        let mut machine = RoundMachine::new(BudgetRules::metered(3).unwrap());
        assert_eq!(machine.charge().unwrap(), RoundState::Active);
        assert_eq!(machine.charge().unwrap(), RoundState::Active);
        assert_eq!(machine.charge().unwrap(), RoundState::Lost);
    }

    #[test]
    fn unmetered_budget_never_runs_out() {
        let mut machine = RoundMachine::new(BudgetRules::unmetered());
        for _ in 0..10_000 {
            assert_eq!(machine.charge().unwrap(), RoundState::Active);
        }
    }

    #[test]
    fn scored_rules_are_validated() {
        assert!(BudgetRules::scored(5000, 400, 1000, 12000).is_ok());
        assert!(BudgetRules::scored(0, 400, 1000, 12000).is_err());
        assert!(BudgetRules::scored(12000, 400, 1000, 12000).is_err());
        assert!(BudgetRules::scored(5000, 0, 1000, 12000).is_err());
        assert!(BudgetRules::scored(5000, 400, -1, 12000).is_err());
        assert!(BudgetRules::metered(0).is_err());
    }
}
