//! Card content: pack file format, the process-wide card pool and its backing store.
//!
//! The pool is loaded once at startup and only ever grows (write-your-own cards).
//! Rooms copy a snapshot into their own decks at creation, so appends never disturb
//! a running game's iteration over its deck.

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use crate::types::BlackCard;

/// Pack that receives cards written by players
pub const USER_PACK_NAME: &str = "User-Submitted Pack";
/// Pack number stamped on player-written cards
const USER_PACK_ID: u32 = 999;

pub type CardResult<T> = Result<T, CardError>;

#[derive(Debug, thiserror::Error)]
pub enum CardError {
    #[error("failed to read or write card file: {0}")]
    Io(#[from] std::io::Error),

    #[error("card file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("card pool is missing {0} cards")]
    Empty(&'static str),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardPack {
    pub name: String,
    #[serde(default)]
    pub white: Vec<WhiteCardEntry>,
    #[serde(default)]
    pub black: Vec<BlackCardEntry>,
    #[serde(default)]
    pub official: bool,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WhiteCardEntry {
    pub text: String,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlackCardEntry {
    pub text: String,
    #[serde(default = "default_pick", deserialize_with = "lenient_pick")]
    pub pick: u32,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_pick() -> u32 {
    1
}

/// Some packs store `pick` as a string; anything unusable falls back to 1
fn lenient_pick<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    let value = Value::deserialize(deserializer)?;
    let pick = match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    Ok(pick.filter(|p| *p > 0).unwrap_or(1))
}

/// Flatten every pack into (white texts, black prompts)
pub fn merge_packs(packs: &[CardPack]) -> (Vec<String>, Vec<BlackCard>) {
    let white = packs
        .iter()
        .flat_map(|pack| pack.white.iter().map(|card| card.text.clone()))
        .collect();
    let black = packs
        .iter()
        .flat_map(|pack| {
            pack.black.iter().map(|card| BlackCard {
                text: card.text.clone(),
                pick: card.pick,
            })
        })
        .collect();
    (white, black)
}

#[derive(Debug, Default)]
struct PoolCards {
    white: Vec<String>,
    black: Vec<BlackCard>,
}

/// Process-wide card pool shared by all rooms
#[derive(Debug, Clone, Default)]
pub struct CardPool {
    inner: Arc<RwLock<PoolCards>>,
}

impl CardPool {
    pub fn new(white: Vec<String>, black: Vec<BlackCard>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(PoolCards { white, black })),
        }
    }

    pub fn from_packs(packs: &[CardPack]) -> CardResult<Self> {
        let (white, black) = merge_packs(packs);
        if white.is_empty() {
            return Err(CardError::Empty("white"));
        }
        if black.is_empty() {
            return Err(CardError::Empty("black"));
        }
        Ok(Self::new(white, black))
    }

    /// Copy of both lists for seeding a new room's decks
    pub async fn snapshot(&self) -> (Vec<String>, Vec<BlackCard>) {
        let cards = self.inner.read().await;
        (cards.white.clone(), cards.black.clone())
    }

    /// Add a white card unless an equal text (ignoring case) already exists.
    /// Returns whether the card was added.
    pub async fn append_white(&self, text: &str) -> bool {
        let mut cards = self.inner.write().await;
        let needle = text.to_lowercase();
        if cards.white.iter().any(|c| c.to_lowercase() == needle) {
            return false;
        }
        cards.white.push(text.to_string());
        true
    }

    pub async fn counts(&self) -> (usize, usize) {
        let cards = self.inner.read().await;
        (cards.white.len(), cards.black.len())
    }
}

/// Durable home of the card packs
#[async_trait]
pub trait CardRepository: Send + Sync {
    /// Read every pack
    async fn load(&self) -> CardResult<Vec<CardPack>>;

    /// Store a player-written white card in the user pack.
    /// Returns false when the user pack already holds that text.
    async fn append_white(&self, text: &str) -> CardResult<bool>;
}

/// Add `text` to the user pack (creating it if needed), ignoring case duplicates
fn add_to_user_pack(packs: &mut Vec<CardPack>, text: &str) -> bool {
    let index = match packs.iter().position(|p| p.name == USER_PACK_NAME) {
        Some(index) => index,
        None => {
            packs.push(CardPack {
                name: USER_PACK_NAME.to_string(),
                white: Vec::new(),
                black: Vec::new(),
                official: false,
                extra: Map::new(),
            });
            packs.len() - 1
        }
    };
    let pack = &mut packs[index];

    let needle = text.to_lowercase();
    if pack.white.iter().any(|c| c.text.to_lowercase() == needle) {
        return false;
    }

    let mut extra = Map::new();
    extra.insert("pack".to_string(), Value::from(USER_PACK_ID));
    pack.white.push(WhiteCardEntry {
        text: text.to_string(),
        extra,
    });
    true
}

/// JSON file holding an array of packs
pub struct JsonFileRepository {
    path: PathBuf,
    /// Serializes read-modify-write cycles on the file
    write_lock: Mutex<()>,
}

impl JsonFileRepository {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    async fn read_packs(&self) -> CardResult<Vec<CardPack>> {
        let content = tokio::fs::read_to_string(&self.path).await?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[async_trait]
impl CardRepository for JsonFileRepository {
    async fn load(&self) -> CardResult<Vec<CardPack>> {
        self.read_packs().await
    }

    async fn append_white(&self, text: &str) -> CardResult<bool> {
        let _guard = self.write_lock.lock().await;

        let mut packs = match self.read_packs().await {
            Ok(packs) => packs,
            Err(CardError::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e),
        };

        if !add_to_user_pack(&mut packs, text) {
            return Ok(false);
        }

        let json = serde_json::to_string_pretty(&packs)?;
        tokio::fs::write(&self.path, json).await?;
        tracing::info!("Saved custom card to {}", self.path.display());
        Ok(true)
    }
}

/// Packs held in memory only
#[derive(Default)]
pub struct MemoryRepository {
    packs: Mutex<Vec<CardPack>>,
}

impl MemoryRepository {
    pub fn new(packs: Vec<CardPack>) -> Self {
        Self {
            packs: Mutex::new(packs),
        }
    }
}

#[async_trait]
impl CardRepository for MemoryRepository {
    async fn load(&self) -> CardResult<Vec<CardPack>> {
        Ok(self.packs.lock().await.clone())
    }

    async fn append_white(&self, text: &str) -> CardResult<bool> {
        let mut packs = self.packs.lock().await;
        Ok(add_to_user_pack(&mut packs, text))
    }
}
