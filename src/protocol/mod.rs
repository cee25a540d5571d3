/// Per-session dispatchers for the guessing game and the oracles.
pub mod dispatcher;
/// Line-delimited JSON records.
pub mod message;
/// Budgeted round state machine.
pub mod round;

pub use dispatcher::{Dispatcher, GuessingGame, GuessingRules, GuessingSetup, OracleGame, Reply};
pub use message::Record;
pub use round::{BudgetRules, RoundMachine, RoundOutcome, RoundState};
