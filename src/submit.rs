//! Score submission
//!
//! A finished session's score goes through a `ScoreSubmitter`: first a
//! single-use session hash is issued, then the score is submitted against it
//! and a signed receipt comes back. `LocalLedger` keeps that bookkeeping on
//! disk. Whatever the submitter says, a fallback record is always written.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::leaderboard::{Leaderboard, LeaderboardEntry};
use crate::persistence;
use crate::sim::FinalScore;
use crate::tuning::Difficulty;

/// Environment variable holding the receipt signing key
pub const SIGNING_KEY_VAR: &str = "SNOWMOTION_SIGNING_KEY";

/// Longest accepted player name
pub const MAX_PLAYER_LEN: usize = 64;

/// Opaque single-use token tying a submission to a started session
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionHash(pub String);

impl std::fmt::Display for SessionHash {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubmitRequest {
    pub player: String,
    pub score: u64,
    pub difficulty: Difficulty,
    pub session: SessionHash,
}

/// Proof that a submission was accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// Hex-encoded keyed SHA-256 over the submission
    pub digest: String,
    /// Unix seconds at acceptance
    pub timestamp: u64,
    pub nonce: u32,
}

/// Something that can accept final scores
pub trait ScoreSubmitter {
    /// Issue a fresh session hash for a player
    fn start_session(&mut self, player: &str) -> Result<SessionHash>;

    /// Submit a score against a previously issued, unused session
    fn submit(&mut self, request: &SubmitRequest) -> Result<Receipt>;
}

/// Check a player name is usable
pub fn validate_player(player: &str) -> Result<()> {
    let trimmed = player.trim();
    if trimmed.is_empty() || trimmed.chars().count() > MAX_PLAYER_LEN {
        bail!("Valid player name required");
    }
    if !trimmed
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!("Valid player name required");
    }
    Ok(())
}

/// Configuration for the local ledger
#[derive(Clone)]
pub struct LedgerConfig {
    signing_key: String,
}

impl std::fmt::Debug for LedgerConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LedgerConfig")
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

impl LedgerConfig {
    pub fn new(signing_key: impl Into<String>) -> Self {
        Self {
            signing_key: signing_key.into(),
        }
    }

    /// Read configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Read configuration through a variable lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let required = [SIGNING_KEY_VAR];
        let missing: Vec<&str> = required
            .into_iter()
            .filter(|name| lookup(*name).is_none_or(|v| v.trim().is_empty()))
            .collect();
        if !missing.is_empty() {
            bail!(
                "Missing required environment variables: {}",
                missing.join(", ")
            );
        }
        let signing_key = lookup(SIGNING_KEY_VAR).unwrap_or_default();
        Ok(Self { signing_key })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct SessionRecord {
    hash: SessionHash,
    /// Lowercased player name
    player: String,
    created_at: u64,
    used: bool,
    score: Option<u64>,
    difficulty: Option<Difficulty>,
    submitted_at: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct LedgerBook {
    sessions: Vec<SessionRecord>,
}

/// Session and submission bookkeeping, optionally backed by a JSON file
#[derive(Debug)]
pub struct LocalLedger {
    config: LedgerConfig,
    book: LedgerBook,
    path: Option<PathBuf>,
}

impl LocalLedger {
    /// In-memory ledger
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            book: LedgerBook::default(),
            path: None,
        }
    }

    /// Ledger persisted at `path`
    pub fn open(config: LedgerConfig, path: &Path) -> Result<Self> {
        let book = persistence::load_json(path)?.unwrap_or_default();
        Ok(Self {
            config,
            book,
            path: Some(path.to_path_buf()),
        })
    }

    /// Ledger in the data directory, configured from the environment
    pub fn open_default() -> Result<Self> {
        let config = LedgerConfig::from_env()?;
        let path = persistence::data_file(persistence::LEDGER_FILE)?;
        Self::open(config, &path)
    }

    pub fn session_count(&self) -> usize {
        self.book.sessions.len()
    }

    fn persist(&self) -> Result<()> {
        match &self.path {
            Some(path) => persistence::save_json(path, &self.book).context("saving ledger"),
            None => Ok(()),
        }
    }

    fn sign(&self, request: &SubmitRequest, timestamp: u64, nonce: u32) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.config.signing_key.as_bytes());
        hasher.update(request.player.to_lowercase().as_bytes());
        hasher.update(request.score.to_be_bytes());
        hasher.update([request.difficulty.index()]);
        hasher.update(timestamp.to_be_bytes());
        hasher.update(nonce.to_be_bytes());
        hasher.update(request.session.0.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// SHA-256 of `player-timestamp-salt`, hex encoded
pub fn session_hash(player: &str, timestamp_ms: u64, salt: &str) -> SessionHash {
    let digest = Sha256::digest(format!("{}-{}-{}", player.to_lowercase(), timestamp_ms, salt));
    SessionHash(format!("0x{}", hex::encode(digest)))
}

impl ScoreSubmitter for LocalLedger {
    fn start_session(&mut self, player: &str) -> Result<SessionHash> {
        validate_player(player)?;
        let now = crate::now_millis();
        let salt = hex::encode(rand::random::<[u8; 32]>());
        let hash = session_hash(player, now, &salt);
        self.book.sessions.push(SessionRecord {
            hash: hash.clone(),
            player: player.to_lowercase(),
            created_at: now,
            used: false,
            score: None,
            difficulty: None,
            submitted_at: None,
        });
        self.persist().context("Failed to create game session")?;
        log::debug!("Session {} issued to {}", hash, player);
        Ok(hash)
    }

    fn submit(&mut self, request: &SubmitRequest) -> Result<Receipt> {
        validate_player(&request.player)?;
        let player = request.player.to_lowercase();
        let Some(index) = self
            .book
            .sessions
            .iter()
            .position(|s| s.hash == request.session && s.player == player)
        else {
            bail!("Invalid game session");
        };
        if self.book.sessions[index].used {
            bail!("Game session already used");
        }

        let now = crate::now_millis();
        let timestamp = now / 1000;
        let nonce: u32 = rand::random();
        let digest = self.sign(request, timestamp, nonce);

        let record = &mut self.book.sessions[index];
        record.used = true;
        record.score = Some(request.score);
        record.difficulty = Some(request.difficulty);
        record.submitted_at = Some(now);
        self.persist()?;

        log::info!(
            "Accepted {} ({}) for {}",
            request.score,
            request.difficulty,
            request.player
        );
        Ok(Receipt {
            digest,
            timestamp,
            nonce,
        })
    }
}

/// One locally kept score, written whether or not submission succeeded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackRecord {
    pub player: String,
    pub score: u64,
    pub difficulty: Difficulty,
    /// Unix ms
    pub timestamp: u64,
    #[serde(default)]
    pub receipt: Option<String>,
}

/// Append-only JSON list of fallback records
#[derive(Debug, Clone)]
pub struct FallbackLog {
    path: PathBuf,
}

impl FallbackLog {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn open_default() -> Result<Self> {
        Ok(Self::new(persistence::data_file(persistence::FALLBACK_FILE)?))
    }

    pub fn records(&self) -> Result<Vec<FallbackRecord>> {
        Ok(persistence::load_json(&self.path)?.unwrap_or_default())
    }

    pub fn append(&self, record: FallbackRecord) -> Result<()> {
        let mut records = self.records()?;
        records.push(record);
        persistence::save_json(&self.path, &records)
    }

    /// Build a leaderboard out of the fallback records
    pub fn to_leaderboard(&self) -> Result<Leaderboard> {
        let mut board = Leaderboard::new();
        for r in self.records()? {
            board.add(LeaderboardEntry {
                player: r.player,
                score: r.score,
                difficulty: r.difficulty,
                timestamp: r.timestamp,
            });
        }
        Ok(board)
    }

    /// Local records to show in place of `shared`, or None while `shared` has entries
    pub fn board_for(&self, shared: &Leaderboard) -> Option<Leaderboard> {
        if !shared.is_empty() {
            return None;
        }
        Some(self.to_leaderboard().unwrap_or_else(|e| {
            log::warn!("Could not read fallback scores: {:#}", e);
            Leaderboard::new()
        }))
    }
}

/// What happened to a final score
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitReport {
    pub receipt: Option<Receipt>,
    /// Overall rank on the leaderboard if it was recorded there
    pub rank: Option<usize>,
    pub fallback_saved: bool,
    pub message: String,
}

impl SubmitReport {
    pub fn accepted(&self) -> bool {
        self.receipt.is_some()
    }
}

fn submit_through(
    submitter: &mut dyn ScoreSubmitter,
    player: &str,
    result: FinalScore,
) -> Result<Receipt> {
    let session = submitter
        .start_session(player)
        .context("starting session")?;
    submitter
        .submit(&SubmitRequest {
            player: player.to_string(),
            score: result.score,
            difficulty: result.difficulty,
            session,
        })
        .context("submitting score")
}

/// Submit a finished session's score.
///
/// Accepted scores are added to `board`. A fallback record is written in
/// every case. Failures are logged and reported in the message, never
/// returned.
pub fn submit_final_score(
    submitter: Option<&mut dyn ScoreSubmitter>,
    fallback: &FallbackLog,
    board: &mut Leaderboard,
    player: &str,
    result: FinalScore,
) -> SubmitReport {
    let now = crate::now_millis();

    let outcome = match submitter {
        Some(submitter) => submit_through(submitter, player, result),
        None => Err(anyhow::anyhow!("no score submitter configured")),
    };

    let (receipt, rank, mut message) = match outcome {
        Ok(receipt) => {
            let rank = board.add(LeaderboardEntry::new(player, result, now));
            let message = match rank {
                Some(rank) => format!("Score submitted! Rank #{rank}"),
                None => "Score submitted!".to_string(),
            };
            (Some(receipt), rank, message)
        }
        Err(e) => {
            log::warn!("Score submission failed: {:#}", e);
            (None, None, format!("Failed to submit score: {:#}", e))
        }
    };

    let fallback_saved = match fallback.append(FallbackRecord {
        player: player.to_string(),
        score: result.score,
        difficulty: result.difficulty,
        timestamp: now,
        receipt: receipt.as_ref().map(|r| r.digest.clone()),
    }) {
        Ok(()) => true,
        Err(e) => {
            log::warn!("Could not write fallback score: {:#}", e);
            if receipt.is_none() {
                message.push_str(" (local copy not saved)");
            }
            false
        }
    };

    SubmitReport {
        receipt,
        rank,
        fallback_saved,
        message,
    }
}
