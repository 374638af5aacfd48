//! Synthetic viewer profiles
//!
//! The platform exposes no viewer data, so the profile panel shows a
//! plausible stand-in. Numbers are derived from a SHA-256 of the username
//! and the first profile built for a username is kept for the life of the
//! process.

use chrono::{Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::sync::Mutex;

pub const DEFAULT_AVATAR: &str = "https://placehold.co/128x128.png";

const MAX_FOLLOWERS: u32 = 10_000;
const MAX_FOLLOWING: u32 = 500;
const MAX_LIKES: u32 = 100_000;
const MAX_PURCHASES: u8 = 5;
const HISTORY_DAYS: u8 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PurchaseRecord {
    pub item: String,
    /// `YYYY-MM-DD`
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewerProfile {
    pub username: String,
    pub avatar: String,
    pub followers: u32,
    pub following: u32,
    pub likes: u32,
    pub bio: String,
    pub purchase_history: Vec<PurchaseRecord>,
}

fn word(digest: &[u8], at: usize) -> u32 {
    u32::from_be_bytes([digest[at], digest[at + 1], digest[at + 2], digest[at + 3]])
}

impl ViewerProfile {
    /// Build the profile for `username` as of `today`
    pub fn generate(username: &str, avatar: Option<&str>, today: NaiveDate) -> Self {
        let digest = Sha256::digest(username.as_bytes());

        let purchases = digest[12] % MAX_PURCHASES;
        let purchase_history = (0..purchases)
            .map(|i| {
                let days_ago = digest[13 + i as usize] % HISTORY_DAYS;
                PurchaseRecord {
                    item: format!("Product {}", i + 1),
                    date: (today - Duration::days(days_ago as i64))
                        .format("%Y-%m-%d")
                        .to_string(),
                }
            })
            .collect();

        Self {
            username: username.to_string(),
            avatar: avatar
                .map(str::trim)
                .filter(|a| !a.is_empty())
                .unwrap_or(DEFAULT_AVATAR)
                .to_string(),
            followers: word(&digest, 0) % MAX_FOLLOWERS,
            following: word(&digest, 4) % MAX_FOLLOWING,
            likes: word(&digest, 8) % MAX_LIKES,
            bio: format!("Bio for {}. Lover of great products!", username),
            purchase_history,
        }
    }

    /// Short fingerprint for log lines
    pub fn fingerprint(&self) -> String {
        hex::encode(&Sha256::digest(self.username.as_bytes())[..4])
    }
}

/// Process-wide memo of generated profiles
#[derive(Debug, Default)]
pub struct ProfileCache {
    profiles: Mutex<HashMap<String, ViewerProfile>>,
}

impl ProfileCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The memoized profile, generated on first lookup
    ///
    /// Later lookups return the first result even if `avatar` differs.
    pub fn get_or_generate(&self, username: &str, avatar: Option<&str>) -> ViewerProfile {
        let mut profiles = match self.profiles.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        profiles
            .entry(username.to_string())
            .or_insert_with(|| {
                let profile = ViewerProfile::generate(username, avatar, Utc::now().date_naive());
                tracing::debug!(
                    "Generated profile for {} ({})",
                    username,
                    profile.fingerprint()
                );
                profile
            })
            .clone()
    }

    pub fn len(&self) -> usize {
        self.profiles.lock().map(|p| p.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
