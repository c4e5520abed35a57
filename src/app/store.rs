use anyhow::Result;
use serde_json::{Value, json};

use crate::db::KvStore;

pub(crate) const PROGRESS_KEY_PREFIX: &str = "currentEpisode-";
const SKIP_DELAY_KEY_PREFIX: &str = "skipDelay-";

/// Upper bound matches the injected panel's slider range.
pub(crate) const SKIP_DELAY_MAX_SECONDS: i64 = 240;

/// Last-write-wins progress record for one series, overwritten every poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct EpisodeProgress {
    pub(crate) current_episode: usize,
    pub(crate) current_time: String,
    pub(crate) duration: String,
    pub(crate) is_finished: bool,
}

impl EpisodeProgress {
    pub(crate) fn to_json(&self) -> String {
        json!({
            "currentEpisode": self.current_episode,
            "currentTime": self.current_time,
            "duration": self.duration,
            "isFinished": self.is_finished,
        })
        .to_string()
    }

    pub(crate) fn from_json(raw: &str) -> Option<Self> {
        let parsed: Value = serde_json::from_str(raw).ok()?;
        Some(Self {
            current_episode: parsed.get("currentEpisode")?.as_u64()? as usize,
            current_time: parsed.get("currentTime")?.as_str()?.to_string(),
            duration: parsed.get("duration")?.as_str()?.to_string(),
            is_finished: parsed.get("isFinished")?.as_bool()?,
        })
    }
}

pub(crate) fn progress_key(series_id: &str) -> String {
    format!("{PROGRESS_KEY_PREFIX}{series_id}")
}

fn skip_delay_key(series_id: &str) -> String {
    format!("{SKIP_DELAY_KEY_PREFIX}{series_id}")
}

pub(crate) trait ProgressStore {
    fn save(&self, series_id: &str, progress: &EpisodeProgress) -> Result<()>;
    fn load(&self, series_id: &str) -> Result<Option<EpisodeProgress>>;
}

pub(crate) trait SettingsStore {
    fn skip_delay(&self, series_id: &str) -> Result<u32>;
    fn save_skip_delay(&self, series_id: &str, seconds: i64) -> Result<()>;
}

pub(crate) struct KvBackedStore<'a> {
    kv: &'a KvStore,
}

impl<'a> KvBackedStore<'a> {
    pub(crate) fn new(kv: &'a KvStore) -> Self {
        Self { kv }
    }
}

impl ProgressStore for KvBackedStore<'_> {
    fn save(&self, series_id: &str, progress: &EpisodeProgress) -> Result<()> {
        self.kv.put(&progress_key(series_id), &progress.to_json())
    }

    // A malformed stored record reads as absent; the next tick overwrites it.
    fn load(&self, series_id: &str) -> Result<Option<EpisodeProgress>> {
        let Some(raw) = self.kv.get(&progress_key(series_id))? else {
            return Ok(None);
        };
        Ok(EpisodeProgress::from_json(&raw))
    }
}

impl SettingsStore for KvBackedStore<'_> {
    fn skip_delay(&self, series_id: &str) -> Result<u32> {
        let Some(raw) = self.kv.get(&skip_delay_key(series_id))? else {
            return Ok(0);
        };
        Ok(raw.trim().parse::<u32>().unwrap_or(0))
    }

    fn save_skip_delay(&self, series_id: &str, seconds: i64) -> Result<()> {
        let clamped = seconds.clamp(0, SKIP_DELAY_MAX_SECONDS);
        self.kv.put(&skip_delay_key(series_id), &clamped.to_string())
    }
}
