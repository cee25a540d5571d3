use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedWriteHalf;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, info_span, warn, Instrument};
use zeroize::Zeroizing;

use super::config::{ChallengeKind, ServerConfig};
use super::state::ServerState;
use crate::oracle::{ClawOracle, LengthOracle, ParityOracle, PrimitiveAdapter, TextbookOracle};
use crate::protocol::message::{line, Rejection};
use crate::protocol::{
    BudgetRules, Dispatcher, GuessingGame, GuessingRules, GuessingSetup, OracleGame,
};
use crate::{Error, Result, SecureRng};

/// Builds a fresh dispatcher, with fresh randomness, for every connection.
pub struct SessionFactory {
    kind: ChallengeKind,
    guessing: GuessingRules,
    rsa_bits: u64,
    oracle_budget: BudgetRules,
    flag: Zeroizing<String>,
}

impl SessionFactory {
    /// # Errors
    /// Returns an error if the configured budgets are invalid or an oracle
    /// flag is wider than the modulus.
    pub fn from_config(config: &ServerConfig, flag: Zeroizing<String>) -> Result<Self> {
        let kind = config.challenge.kind;
        if kind.is_oracle() {
            config.oracle.check_flag_fits(&flag)?;
        }
        Ok(Self {
            kind,
            guessing: config.guessing.rules()?,
            rsa_bits: config.oracle.rsa_bits,
            oracle_budget: config.oracle.budget(kind)?,
            flag,
        })
    }

    pub fn kind(&self) -> ChallengeKind {
        self.kind
    }

    /// Draws session randomness and builds the dispatcher.
    ///
    /// Oracle sessions generate an RSA key here, so call this off the async runtime.
    ///
    /// # Errors
    /// Returns an error if key generation fails.
    pub fn build(&self) -> Result<Box<dyn Dispatcher>> {
        let mut rng = SecureRng::new();
        let flag = Zeroizing::new(self.flag.as_str().to_owned());

        let adapter: Box<dyn PrimitiveAdapter> = match self.kind {
            ChallengeKind::Loak => {
                let setup = GuessingSetup::random(&mut rng);
                return Ok(Box::new(GuessingGame::new(setup, self.guessing, flag)));
            }
            ChallengeKind::Parity => Box::new(ParityOracle::generate(self.rsa_bits, &mut rng)?),
            ChallengeKind::Claw => Box::new(ClawOracle::generate(self.rsa_bits, &mut rng)?),
            ChallengeKind::Length => Box::new(LengthOracle::generate(self.rsa_bits, &mut rng)?),
            ChallengeKind::Textbook => {
                Box::new(TextbookOracle::generate(self.rsa_bits, &mut rng)?)
            }
        };
        Ok(Box::new(OracleGame::new(adapter, self.oracle_budget, flag)))
    }
}

/// Line-oriented TCP front end. One task, and one dispatcher, per connection.
#[derive(Clone)]
pub struct ChallengeService {
    factory: Arc<SessionFactory>,
    state: ServerState,
    idle_timeout: Duration,
    max_line_bytes: usize,
}

impl ChallengeService {
    pub fn new(config: &ServerConfig, factory: SessionFactory, state: ServerState) -> Self {
        Self {
            factory: Arc::new(factory),
            state,
            idle_timeout: Duration::from_secs(config.server.idle_timeout_secs),
            max_line_bytes: config.server.max_line_bytes,
        }
    }

    pub fn state(&self) -> &ServerState {
        &self.state
    }

    /// Accepts connections forever.
    ///
    /// # Errors
    /// Accept failures are logged and retried, so this only returns `Ok`.
    pub async fn serve(self, listener: TcpListener) -> Result<()> {
        self.serve_with_shutdown(listener, std::future::pending())
            .await
    }

    /// Accepts connections until `shutdown` resolves. Running sessions are left to finish.
    ///
    /// A failed `accept` never stops the listener. Errors tied to one
    /// connection are skipped at once; anything else, such as running out of
    /// file descriptors, pauses the loop for [`ACCEPT_BACKOFF`] first.
    ///
    /// # Errors
    /// Accept failures are logged and retried, so this only returns `Ok`.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        info!(
            addr = ?listener.local_addr().ok(),
            kind = self.factory.kind().name(),
            "accepting connections"
        );

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            let pause = accept_backoff(&e);
                            warn!(error = %e, ?pause, "accept failed");
                            if let Some(pause) = pause {
                                tokio::time::sleep(pause).await;
                            }
                            continue;
                        }
                    };
                    let service = self.clone();
                    tokio::spawn(async move { service.handle_connection(stream, peer).await });
                }
                () = &mut shutdown => {
                    info!("listener shutting down");
                    return Ok(());
                }
            }
        }
    }

    async fn handle_connection(self, mut stream: TcpStream, peer: SocketAddr) {
        let session_id = match self.state.register(peer, self.factory.kind()).await {
            Ok(id) => id,
            Err(e) => {
                warn!(%peer, error = %e, "turning connection away");
                let refusal = format!("{}\n", line(&Rejection { error: e.to_string() }));
                let _ = stream.write_all(refusal.as_bytes()).await;
                return;
            }
        };

        let span = info_span!("session", id = %session_id, %peer);
        async {
            info!("session opened");
            match self.run_session(stream).await {
                Ok(()) => info!("session closed"),
                Err(e) => error!(error = %e, "session aborted"),
            }
        }
        .instrument(span)
        .await;

        self.state.unregister(&session_id).await;
    }

    async fn run_session(&self, stream: TcpStream) -> Result<()> {
        let factory = Arc::clone(&self.factory);
        let mut dispatcher = tokio::task::spawn_blocking(move || factory.build())
            .await
            .map_err(|e| Error::PrimitiveFailure(format!("session setup panicked: {e}")))??;

        let (read_half, mut writer) = stream.into_split();
        let mut reader = BufReader::new(read_half);
        write_lines(&mut writer, &dispatcher.greeting()).await?;

        let limit = u64::try_from(self.max_line_bytes).unwrap_or(u64::MAX);
        let mut buf = Vec::with_capacity(256);
        loop {
            buf.clear();
            let read = tokio::time::timeout(
                self.idle_timeout,
                (&mut reader).take(limit).read_until(b'\n', &mut buf),
            )
            .await;

            match read {
                Err(_) => {
                    info!(timeout = ?self.idle_timeout, "idle session dropped");
                    return Ok(());
                }
                Ok(Err(e)) => return Err(e.into()),
                Ok(Ok(0)) => {
                    debug!("client disconnected");
                    return Ok(());
                }
                Ok(Ok(_)) => {}
            }

            if buf.last() != Some(&b'\n') && buf.len() >= self.max_line_bytes {
                warn!(limit = self.max_line_bytes, "line too long");
                let rejection = Rejection {
                    error: format!("line exceeds {} bytes", self.max_line_bytes),
                };
                write_lines(&mut writer, &[line(&rejection)]).await?;
                writer.shutdown().await?;
                return Ok(());
            }

            let reply = match std::str::from_utf8(&buf) {
                Ok(text) if text.trim().is_empty() => continue,
                Ok(text) => dispatcher.handle(text)?,
                Err(_) => {
                    let rejection = Rejection {
                        error: Error::Validation("line is not valid UTF-8".to_string())
                            .to_string(),
                    };
                    write_lines(&mut writer, &[line(&rejection)]).await?;
                    continue;
                }
            };

            write_lines(&mut writer, reply.lines()).await?;
            if reply.closes() {
                debug!(state = ?dispatcher.state(), "dispatcher closed the session");
                writer.shutdown().await?;
                return Ok(());
            }
        }
    }
}

/// Pause after an accept error that is not tied to a single connection.
pub const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

fn accept_backoff(error: &std::io::Error) -> Option<Duration> {
    use std::io::ErrorKind;

    match error.kind() {
        ErrorKind::ConnectionRefused
        | ErrorKind::ConnectionAborted
        | ErrorKind::ConnectionReset
        | ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

async fn write_lines(writer: &mut OwnedWriteHalf, lines: &[String]) -> Result<()> {
    let mut out = String::with_capacity(lines.iter().map(|l| l.len() + 1).sum());
    for l in lines {
        out.push_str(l);
        out.push('\n');
    }
    writer.write_all(out.as_bytes()).await?;
    writer.flush().await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::protocol::RoundState;

    #[test]
    fn accept_errors_pick_a_backoff() {
        use std::io::{Error as IoError, ErrorKind};

        let aborted = IoError::new(ErrorKind::ConnectionAborted, "peer left");
        assert_eq!(accept_backoff(&aborted), None);
        // EMFILE surfaces as an uncategorized OS error.
        let exhausted = IoError::from_raw_os_error(24);
        assert_eq!(accept_backoff(&exhausted), Some(ACCEPT_BACKOFF));
    }

    #[tokio::test]
    async fn listener_keeps_serving_after_a_client_vanishes() {
        let config = ServerConfig::default();
        let factory =
            SessionFactory::from_config(&config, Zeroizing::new("flag{x}".to_string())).unwrap();
        let state = ServerState::new(config.server.max_sessions);
        let service = ChallengeService::new(&config, factory, state);

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(service.serve(listener));

        drop(TcpStream::connect(addr).await.unwrap());

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut lines = BufReader::new(stream).lines();
        let first = tokio::time::timeout(Duration::from_secs(10), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert!(first.contains("Drakloak"));
        assert!(!server.is_finished());
        server.abort();
    }

    #[test]
    fn factory_rejects_a_flag_wider_than_the_modulus() {
        let mut config = ServerConfig::default();
        config.challenge.kind = ChallengeKind::Textbook;
        config.oracle.rsa_bits = 64;
        let flag = Zeroizing::new("flag{too_wide}".to_string());
        assert!(matches!(
            SessionFactory::from_config(&config, flag),
            Err(Error::InvalidParams(_))
        ));
    }

    #[test]
    fn factory_builds_every_kind() {
        for kind in [
            ChallengeKind::Loak,
            ChallengeKind::Parity,
            ChallengeKind::Claw,
            ChallengeKind::Length,
            ChallengeKind::Textbook,
        ] {
            let mut config = ServerConfig::default();
            config.challenge.kind = kind;
            config.oracle.rsa_bits = 128;
            let factory =
                SessionFactory::from_config(&config, Zeroizing::new("flag{x}".to_string()))
                    .unwrap();
            let mut dispatcher = factory.build().unwrap();
            assert_eq!(dispatcher.name(), kind.name());
            assert_eq!(dispatcher.state(), RoundState::Active);
            assert!(!dispatcher.greeting().is_empty());
        }
    }
}
