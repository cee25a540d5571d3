use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::oracle::rsa::MIN_MODULUS_BITS;
use crate::primitives::groups::loak::loak_modulus;
use crate::primitives::DEFAULT_SHIFT_BITS;
use crate::protocol::round::{
    DEFAULT_PENALTY, DEFAULT_REWARD, DEFAULT_START_BUDGET, DEFAULT_WIN_THRESHOLD,
};
use crate::protocol::{BudgetRules, GuessingRules};
use crate::{Error, Result};

/// Query limit of the claw oracle when none is configured.
pub const DEFAULT_CLAW_QUERY_LIMIT: i64 = 1500;

/// Which challenge every session on this server plays.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ChallengeKind {
    /// Predict the chained loak PRNG.
    Loak,
    /// RSA parity oracle.
    Parity,
    /// RSA oracle leaking parity or the upper half, at random.
    Claw,
    /// RSA plaintext length oracle.
    Length,
    /// Unpadded RSA decryption oracle that refuses its own ciphertexts.
    Textbook,
}

impl ChallengeKind {
    pub fn name(self) -> &'static str {
        match self {
            ChallengeKind::Loak => "loak",
            ChallengeKind::Parity => "parity",
            ChallengeKind::Claw => "claw",
            ChallengeKind::Length => "length",
            ChallengeKind::Textbook => "textbook",
        }
    }

    /// Whether this challenge encrypts the flag under RSA.
    pub fn is_oracle(self) -> bool {
        self != ChallengeKind::Loak
    }
}

/// Server configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listener and connection limits.
    pub server: ListenSettings,
    /// Hosted challenge and its secret.
    pub challenge: ChallengeSettings,
    /// Guessing game budget.
    pub guessing: GuessingSettings,
    /// RSA oracle settings.
    pub oracle: OracleSettings,
}

/// Listener and connection limits.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ListenSettings {
    pub host: String,
    pub port: u16,
    /// Concurrent sessions accepted before new connections are turned away.
    pub max_sessions: usize,
    /// Seconds a session may stay silent before it is dropped.
    pub idle_timeout_secs: u64,
    /// Longest accepted inbound line, newline included.
    pub max_line_bytes: usize,
}

impl ListenSettings {
    /// Converts host and port into a socket address.
    ///
    /// # Errors
    /// Returns an error if the pair does not form a valid address.
    pub fn addr(&self) -> Result<SocketAddr> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| {
                Error::InvalidParams(format!(
                    "invalid listen address {}:{}: {e}",
                    self.host, self.port
                ))
            })
    }
}

impl Default for ListenSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1337,
            max_sessions: 64,
            idle_timeout_secs: 300,
            max_line_bytes: 65536,
        }
    }
}

/// Hosted challenge settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ChallengeSettings {
    pub kind: ChallengeKind,
    /// Inline secret, used when no `flag_file` is set.
    pub flag: String,
    /// File holding the secret. Surrounding whitespace is stripped.
    pub flag_file: Option<PathBuf>,
}

impl Default for ChallengeSettings {
    fn default() -> Self {
        Self {
            kind: ChallengeKind::Loak,
            flag: "flag{this_is_not_the_real_flag}".to_string(),
            flag_file: None,
        }
    }
}

/// Budget of the guessing game.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GuessingSettings {
    pub start_budget: i64,
    pub reward: i64,
    pub penalty: i64,
    pub win_threshold: i64,
    /// Low bits dropped from every PRNG output.
    pub shift_bits: u32,
}

impl GuessingSettings {
    /// # Errors
    /// Returns an error if the budget or shift is out of range.
    pub fn rules(&self) -> Result<GuessingRules> {
        let budget = BudgetRules::scored(
            self.start_budget,
            self.reward,
            self.penalty,
            self.win_threshold,
        )?;
        if u64::from(self.shift_bits) >= loak_modulus().bits() {
            return Err(Error::InvalidParams(format!(
                "shift_bits {} would discard the whole output",
                self.shift_bits
            )));
        }
        Ok(GuessingRules {
            budget,
            shift_bits: self.shift_bits,
        })
    }
}

impl Default for GuessingSettings {
    fn default() -> Self {
        Self {
            start_budget: DEFAULT_START_BUDGET,
            reward: DEFAULT_REWARD,
            penalty: DEFAULT_PENALTY,
            win_threshold: DEFAULT_WIN_THRESHOLD,
            shift_bits: DEFAULT_SHIFT_BITS,
        }
    }
}

/// RSA oracle settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct OracleSettings {
    /// Modulus size of freshly generated keys.
    pub rsa_bits: u64,
    /// Queries per session. Unset means the per-oracle default.
    pub query_limit: Option<i64>,
}

impl OracleSettings {
    /// Query budget for one oracle session.
    ///
    /// # Errors
    /// Returns an error if the configured limit is not positive.
    pub fn budget(&self, kind: ChallengeKind) -> Result<BudgetRules> {
        match (self.query_limit, kind) {
            (Some(limit), _) => BudgetRules::metered(limit),
            (None, ChallengeKind::Claw) => BudgetRules::metered(DEFAULT_CLAW_QUERY_LIMIT),
            (None, _) => Ok(BudgetRules::unmetered()),
        }
    }
}

impl OracleSettings {
    /// Checks that `flag`, read as a big-endian integer, stays below every
    /// modulus of `rsa_bits` bits.
    ///
    /// Generated moduli are at least `2^(rsa_bits - 2)`.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParams`] if the flag is too wide.
    pub fn check_flag_fits(&self, flag: &str) -> Result<()> {
        let flag_bits = u64::try_from(flag.len())
            .unwrap_or(u64::MAX)
            .saturating_mul(8);
        if flag_bits >= self.rsa_bits.saturating_sub(1) {
            return Err(Error::InvalidParams(format!(
                "a {}-byte flag does not fit under a {}-bit modulus",
                flag.len(),
                self.rsa_bits
            )));
        }
        Ok(())
    }
}

impl Default for OracleSettings {
    fn default() -> Self {
        Self {
            rsa_bits: 1024,
            query_limit: None,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from `.env`, a TOML file and environment variables.
    ///
    /// Priority, highest first: `SERVER_`-prefixed environment variables
    /// (sections separated by `__`, e.g. `SERVER_ORACLE__RSA_BITS=512`), the
    /// TOML file at `SERVER_CONFIG_PATH` (default `config/server.toml`, skipped
    /// if missing), then built-in defaults.
    ///
    /// # Errors
    /// Returns an error if a source is malformed.
    #[allow(clippy::result_large_err)]
    pub fn from_env() -> figment::error::Result<Self> {
        use figment::providers::{Env, Format, Serialized, Toml};
        use figment::Figment;

        let _ = dotenvy::dotenv();

        let config_path = std::env::var("SERVER_CONFIG_PATH")
            .unwrap_or_else(|_| "config/server.toml".to_string());

        Figment::from(Serialized::defaults(ServerConfig::default()))
            .merge(Toml::file(&config_path))
            .merge(Env::prefixed("SERVER_").split("__"))
            .extract()
    }

    /// Checks every section for values the server cannot run with.
    ///
    /// # Errors
    /// Returns [`Error::InvalidParams`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.server.addr()?;

        if self.server.max_sessions == 0 {
            return Err(Error::InvalidParams(
                "max_sessions cannot be zero".to_string(),
            ));
        }
        if self.server.idle_timeout_secs == 0 {
            return Err(Error::InvalidParams(
                "idle_timeout_secs cannot be zero".to_string(),
            ));
        }
        if self.server.max_line_bytes < 64 {
            return Err(Error::InvalidParams(
                "max_line_bytes must be at least 64".to_string(),
            ));
        }

        if self.challenge.flag_file.is_none() && self.challenge.flag.is_empty() {
            return Err(Error::InvalidParams(
                "either flag or flag_file must be set".to_string(),
            ));
        }

        self.guessing.rules()?;

        if self.oracle.rsa_bits < MIN_MODULUS_BITS {
            return Err(Error::InvalidParams(format!(
                "rsa_bits must be at least {MIN_MODULUS_BITS}"
            )));
        }
        self.oracle.budget(self.challenge.kind)?;
        if self.challenge.kind.is_oracle() && self.challenge.flag_file.is_none() {
            self.oracle.check_flag_fits(&self.challenge.flag)?;
        }

        Ok(())
    }

    /// Reads the protected secret.
    ///
    /// # Errors
    /// Returns an error if the flag file cannot be read or the secret is empty.
    pub fn load_flag(&self) -> Result<Zeroizing<String>> {
        let flag = match &self.challenge.flag_file {
            Some(path) => {
                let raw = Zeroizing::new(std::fs::read_to_string(path)?);
                Zeroizing::new(raw.trim().to_string())
            }
            None => Zeroizing::new(self.challenge.flag.clone()),
        };
        if flag.is_empty() {
            return Err(Error::InvalidParams("the flag is empty".to_string()));
        }
        Ok(flag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = ServerConfig::default();
        config.validate().unwrap();
        assert_eq!(config.server.addr().unwrap().port(), 1337);
        let rules = config.guessing.rules().unwrap();
        assert_eq!(rules.budget, BudgetRules::default());
        assert_eq!(rules.shift_bits, 12);
    }

    #[test]
    fn oracle_budget_defaults_per_kind() {
        let settings = OracleSettings::default();
        assert_eq!(
            settings.budget(ChallengeKind::Claw).unwrap(),
            BudgetRules::metered(1500).unwrap()
        );
        assert_eq!(
            settings.budget(ChallengeKind::Parity).unwrap(),
            BudgetRules::unmetered()
        );
        let limited = OracleSettings {
            query_limit: Some(10),
            ..OracleSettings::default()
        };
        assert_eq!(
            limited.budget(ChallengeKind::Textbook).unwrap(),
            BudgetRules::metered(10).unwrap()
        );
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = ServerConfig::default();
        config.server.max_sessions = 0;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.guessing.win_threshold = 100;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.guessing.shift_bits = 400;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.oracle.rsa_bits = 32;
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.oracle.query_limit = Some(0);
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.server.host = "not a host".to_string();
        assert!(config.validate().is_err());

        let mut config = ServerConfig::default();
        config.challenge.flag.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn oracle_flag_must_fit_under_the_modulus() {
        let mut config = ServerConfig::default();
        config.challenge.kind = ChallengeKind::Parity;
        config.oracle.rsa_bits = 64;
        assert!(matches!(config.validate(), Err(Error::InvalidParams(_))));

        // 7 bytes is 56 bits, below 2^62.
        config.challenge.flag = "flag{x}".to_string();
        config.validate().unwrap();
        config.challenge.flag = "flag{xy}".to_string();
        assert!(config.validate().is_err());

        // The guessing game never encrypts the flag.
        config.challenge.kind = ChallengeKind::Loak;
        config.challenge.flag = "flag{this_is_not_the_real_flag}".to_string();
        config.validate().unwrap();
    }

    #[test]
    fn kind_parses_lowercase() {
        let settings: ChallengeSettings =
            serde_json::from_str(r#"{"kind": "claw", "flag": "f"}"#).unwrap();
        assert_eq!(settings.kind, ChallengeKind::Claw);
        assert_eq!(settings.kind.name(), "claw");
    }

    #[test]
    fn flag_file_is_trimmed() {
        let path = std::env::temp_dir().join(format!(
            "oracle-arena-flag-{}",
            std::process::id()
        ));
        std::fs::write(&path, "flag{from_file}\n").unwrap();

        let mut config = ServerConfig::default();
        config.challenge.flag_file = Some(path.clone());
        assert_eq!(config.load_flag().unwrap().as_str(), "flag{from_file}");

        std::fs::remove_file(&path).unwrap();
        assert!(matches!(config.load_flag(), Err(Error::Io(_))));
    }
}
