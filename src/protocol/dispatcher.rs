//! Per-session message dispatch.
//!
//! A dispatcher turns one inbound line into zero or more outbound lines and
//! decides whether the session keeps going. Malformed input never touches the
//! session state; it only earns an `{"error": ...}` reply.

use num_bigint::{BigInt, BigUint};
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use super::message::{
    line, Announcement, Encryption, GroupAnnouncement, GuessReply, LeakReply, Notice,
    PublicValues, Record, Rejection, SignatureReply, Verdict, VerifyReply,
};
use super::round::{BudgetRules, RoundMachine, RoundOutcome, RoundState};
use crate::oracle::PrimitiveAdapter;
use crate::primitives::crypto::field::reduce;
use crate::primitives::groups::loak::loak_modulus;
use crate::primitives::{BasePoint, LoakGroup, LoakRng, DEFAULT_SHIFT_BITS};
use crate::{Error, Group, Result, SecureRng};

/// Outbound lines produced by one inbound message.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Reply {
    lines: Vec<String>,
    close: bool,
}

impl Reply {
    pub fn keep_open(lines: Vec<String>) -> Self {
        Self { lines, close: false }
    }

    pub fn close(lines: Vec<String>) -> Self {
        Self { lines, close: true }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn into_lines(self) -> Vec<String> {
        self.lines
    }

    /// Whether the session ends after these lines are written.
    pub fn closes(&self) -> bool {
        self.close
    }
}

/// One session's protocol driver.
pub trait Dispatcher: Send {
    fn name(&self) -> &'static str;

    /// Lines sent as soon as the client connects.
    fn greeting(&mut self) -> Vec<String>;

    /// Handles one inbound line.
    ///
    /// # Errors
    ///
    /// Only fatal failures are returned; the caller must drop the connection
    /// without writing anything further.
    fn handle(&mut self, line: &str) -> Result<Reply>;

    fn state(&self) -> RoundState;
}

/// Maps the outcome of one message onto a reply, keeping fatal errors fatal.
fn settle(name: &'static str, outcome: Result<Reply>) -> Result<Reply> {
    match outcome {
        Ok(reply) => Ok(reply),
        Err(e) if e.is_recoverable() => {
            debug!(session = name, error = %e, "rejected message");
            Ok(Reply::keep_open(vec![line(&Rejection {
                error: e.to_string(),
            })]))
        }
        Err(Error::ProtocolViolation(reason)) => {
            debug!(session = name, %reason, "message after session end");
            Ok(Reply::close(vec![line(&Rejection {
                error: format!("session is over: {reason}"),
            })]))
        }
        Err(e) => {
            warn!(session = name, error = %e, "fatal session error");
            Err(e)
        }
    }
}

/// Public randomness of one guessing game.
#[derive(Clone, Debug)]
pub struct GuessingSetup {
    /// Structural constant `a` of the client's group.
    pub a1: BigUint,
    /// Server-side group and base point `Q`.
    pub second: BasePoint,
    /// Initial PRNG seed.
    pub seed: BigUint,
}

impl GuessingSetup {
    /// Draws `a1`, `a2`, `b2`, the base point and the seed from the CSPRNG.
    pub fn random(rng: &mut SecureRng) -> Self {
        let p = loak_modulus();
        let one = BigUint::from(1u32);
        let a1 = rng.range(&one, &p);
        let a2 = rng.range(&one, &p);
        let b2 = rng.range(&one, &p);
        let group = LoakGroup::standard(a2, b2);
        let point = group.random_element(rng);
        let seed = rng.range(&one, &p);
        Self {
            a1,
            second: BasePoint::new(group, point),
            seed,
        }
    }
}

/// Tunables of the guessing game.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct GuessingRules {
    pub budget: BudgetRules,
    pub shift_bits: u32,
}

impl Default for GuessingRules {
    fn default() -> Self {
        Self {
            budget: BudgetRules::default(),
            shift_bits: DEFAULT_SHIFT_BITS,
        }
    }
}

enum Phase {
    AwaitingPoint,
    Playing(LoakRng),
}

/// The loak guessing game.
///
/// The client picks `b1` and a point of its own group; the server then walks
/// both groups to produce outputs the client has to predict.
pub struct GuessingGame {
    setup: GuessingSetup,
    rules: GuessingRules,
    machine: RoundMachine,
    phase: Phase,
    flag: Zeroizing<String>,
}

impl GuessingGame {
    pub fn new(setup: GuessingSetup, rules: GuessingRules, flag: Zeroizing<String>) -> Self {
        Self {
            setup,
            machine: RoundMachine::new(rules.budget),
            rules,
            phase: Phase::AwaitingPoint,
            flag,
        }
    }

    pub fn setup(&self) -> &GuessingSetup {
        &self.setup
    }

    pub fn budget(&self) -> i64 {
        self.machine.budget()
    }

    pub fn is_playing(&self) -> bool {
        matches!(self.phase, Phase::Playing(_))
    }

    fn handshake(&mut self, record: &Record) -> Result<Reply> {
        let p = loak_modulus();
        let b1 = reduce(&record.integer("b1")?, &p)?;
        let x = record.integer("x")?;
        let y = record.integer("y")?;

        let group = LoakGroup::standard(self.setup.a1.clone(), b1);
        let point = group.element_reduced(&x, &y)?;
        group.validate_element(&point)?;
        debug!(group = group.name(), "client point accepted");

        let rng = LoakRng::new(
            self.setup.seed.clone(),
            BasePoint::new(group, point),
            self.setup.second.clone(),
            self.rules.shift_bits,
        );
        self.phase = Phase::Playing(rng);
        info!("guessing game started");

        Ok(Reply::keep_open(vec![line(&Notice {
            message: "Drakloak accepts your point. Predict the next loak!",
        })]))
    }

    fn guess(&mut self, record: &Record) -> Result<Reply> {
        let guess = record.integer("nextLoak")?;
        let Phase::Playing(rng) = &mut self.phase else {
            return Err(Error::Validation(
                "send b1 and a point before guessing".to_string(),
            ));
        };

        let output = rng.next_output();
        let hit = guess == BigInt::from(output.clone());
        let outcome = if hit {
            RoundOutcome::Hit
        } else {
            RoundOutcome::Miss
        };
        let state = self.machine.record(outcome)?;
        debug!(hit, budget = self.machine.budget(), "guess scored");

        let mut lines = vec![line(&GuessReply {
            message: (!hit).then_some("Your loak is fake..."),
            next_loak: &output,
        })];

        match state {
            RoundState::Active => Ok(Reply::keep_open(lines)),
            RoundState::Won => {
                if self.machine.claim_disclosure() {
                    info!(rounds = self.machine.rounds(), "guessing game won");
                    lines.push(line(&Verdict {
                        message: "Drakloak approves of you!",
                        flag: self.flag.as_str(),
                    }));
                }
                Ok(Reply::close(lines))
            }
            RoundState::Lost | RoundState::Surrendered => {
                info!(rounds = self.machine.rounds(), "guessing game lost");
                lines.push(line(&Notice {
                    message: "Drakloak runs away...",
                }));
                Ok(Reply::close(lines))
            }
        }
    }

    fn dispatch(&mut self, input: &str) -> Result<Reply> {
        if self.machine.state().is_terminal() {
            return Err(Error::ProtocolViolation(format!(
                "game already {:?}",
                self.machine.state()
            )));
        }

        let record = Record::parse(input)?;
        if record.contains("action") {
            return match record.text("action")? {
                "surrender" => {
                    self.machine.surrender()?;
                    info!("guessing game surrendered");
                    Ok(Reply::close(vec![line(&Notice {
                        message: "You flee from Drakloak.",
                    })]))
                }
                other => Err(Error::Validation(format!("unknown action `{other}`"))),
            };
        }

        match self.phase {
            Phase::AwaitingPoint => self.handshake(&record),
            Phase::Playing(_) => self.guess(&record),
        }
    }
}

impl Dispatcher for GuessingGame {
    fn name(&self) -> &'static str {
        "loak"
    }

    fn greeting(&mut self) -> Vec<String> {
        let second = &self.setup.second;
        vec![
            line(&Notice {
                message: "Drakloak challenges you...",
            }),
            line(&Notice {
                message: "Drakloak demands b1 and a point of E1!",
            }),
            line(&GroupAnnouncement {
                a1: &self.setup.a1,
                a2: second.group.a(),
                b2: second.group.b(),
                gx: second.point.x(),
                gy: second.point.y(),
            }),
        ]
    }

    fn handle(&mut self, input: &str) -> Result<Reply> {
        let outcome = self.dispatch(input);
        settle(self.name(), outcome)
    }

    fn state(&self) -> RoundState {
        self.machine.state()
    }
}

/// Menu-driven oracle session over a hosted primitive.
pub struct OracleGame {
    adapter: Box<dyn PrimitiveAdapter>,
    machine: RoundMachine,
    flag: Zeroizing<String>,
}

impl OracleGame {
    pub fn new(
        adapter: Box<dyn PrimitiveAdapter>,
        budget: BudgetRules,
        flag: Zeroizing<String>,
    ) -> Self {
        Self {
            adapter,
            machine: RoundMachine::new(budget),
            flag,
        }
    }

    /// Queries left before the session is closed.
    pub fn remaining(&self) -> i64 {
        self.machine.budget()
    }

    fn answer(&mut self, record: &Record) -> Result<Option<String>> {
        let choice = record.unsigned("choice")?;
        let choice = u8::try_from(&choice)
            .map_err(|_| Error::Validation(format!("unknown choice {choice}")))?;

        let reply = match choice {
            1 => {
                let plaintext = if record.contains("plaintext") {
                    BigUint::from_bytes_be(&record.hex_bytes("plaintext")?)
                } else {
                    let flag = BigUint::from_bytes_be(self.flag.as_bytes());
                    if &flag >= self.adapter.modulus() {
                        return Err(Error::PrimitiveFailure(format!(
                            "the flag does not fit under a {}-bit modulus",
                            self.adapter.modulus().bits()
                        )));
                    }
                    flag
                };
                let ciphertext = self.adapter.encrypt(&plaintext)?;
                line(&Encryption {
                    public_key: PublicValues(self.adapter.public_key()),
                    ciphertext,
                })
            }
            2 => {
                let ciphertext = record.flexible_unsigned("ciphertext")?;
                let leak = self.adapter.decrypt_oracle(&ciphertext)?;
                line(&LeakReply { leak })
            }
            3 => return Ok(None),
            4 => {
                let message = record.hex_bytes("message")?;
                let signature = self.adapter.sign(&message)?;
                line(&SignatureReply { signature })
            }
            5 => {
                let message = record.hex_bytes("message")?;
                let signature = record.flexible_unsigned("signature")?;
                let valid = self.adapter.verify(&message, &signature)?;
                line(&VerifyReply { valid })
            }
            other => return Err(Error::Validation(format!("unknown choice {other}"))),
        };
        Ok(Some(reply))
    }

    fn dispatch(&mut self, input: &str) -> Result<Reply> {
        if self.machine.state().is_terminal() {
            return Err(Error::ProtocolViolation(format!(
                "oracle already {:?}",
                self.machine.state()
            )));
        }

        let record = Record::parse(input)?;
        let Some(answer) = self.answer(&record)? else {
            self.machine.surrender()?;
            info!(oracle = self.adapter.name(), "oracle session surrendered");
            return Ok(Reply::close(vec![line(&Notice {
                message: "You surrender. Farewell.",
            })]));
        };

        let mut lines = vec![answer];
        match self.machine.charge()? {
            RoundState::Active => Ok(Reply::keep_open(lines)),
            _ => {
                info!(oracle = self.adapter.name(), "query budget exhausted");
                lines.push(line(&Notice {
                    message: "The oracle has no more answers for you.",
                }));
                Ok(Reply::close(lines))
            }
        }
    }
}

impl Dispatcher for OracleGame {
    fn name(&self) -> &'static str {
        self.adapter.name()
    }

    fn greeting(&mut self) -> Vec<String> {
        let banner = format!("The {} oracle challenges you...", self.adapter.name());
        vec![
            line(&Announcement {
                message: &banner,
                values: PublicValues(self.adapter.greeting()),
            }),
            line(&Notice {
                message: "1. Encrypt the flag  2. Decrypt a message  3. Surrender  4. Sign  5. Verify",
            }),
        ]
    }

    fn handle(&mut self, input: &str) -> Result<Reply> {
        let outcome = self.dispatch(input);
        settle(self.name(), outcome)
    }

    fn state(&self) -> RoundState {
        self.machine.state()
    }
}
