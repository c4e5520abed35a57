use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use serde_json::json;

use super::series::EpisodeButton;
use super::timecode::format_time;
use crate::webdriver::WebDriver;

const VIDEO_SELECTOR: &str = "video";

const RESUME_SCRIPT: &str = "\
const video = document.querySelector('video');\n\
if (!video) { throw new Error('video element not found'); }\n\
video.currentTime = arguments[0];\n\
video.play();";

/// What the live video element looked like at one poll instant. Never
/// persisted directly; mapped into an `EpisodeProgress` record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PlaybackSnapshot {
    pub(crate) is_paused: bool,
    pub(crate) current_seconds: f64,
    pub(crate) duration_seconds: f64,
}

impl PlaybackSnapshot {
    pub(crate) fn is_finished(&self) -> bool {
        self.current_seconds >= self.duration_seconds
    }

    pub(crate) fn remaining_seconds(&self) -> f64 {
        (self.duration_seconds - self.current_seconds).max(0.0)
    }

    pub(crate) fn current_display(&self) -> String {
        format_time(self.current_seconds)
    }

    pub(crate) fn duration_display(&self) -> String {
        format_time(self.duration_seconds)
    }
}

pub(crate) trait PlaybackInspector {
    fn snapshot(&self) -> Result<PlaybackSnapshot>;
    fn resume(&self, at_seconds: u64) -> Result<()>;
    fn advance(&self, button: &EpisodeButton) -> Result<()>;
}

pub(crate) struct PagePlaybackInspector<'a> {
    driver: &'a WebDriver,
    settle: Duration,
}

impl<'a> PagePlaybackInspector<'a> {
    pub(crate) fn new(driver: &'a WebDriver, settle: Duration) -> Self {
        Self { driver, settle }
    }
}

impl PlaybackInspector for PagePlaybackInspector<'_> {
    fn snapshot(&self) -> Result<PlaybackSnapshot> {
        let video = self
            .driver
            .find_element(VIDEO_SELECTOR)?
            .context("video element not found")?;
        let is_paused = self
            .driver
            .element_property(&video, "paused")?
            .as_bool()
            .unwrap_or(false);
        let current_seconds = self
            .driver
            .element_property(&video, "currentTime")?
            .as_f64()
            .context("video currentTime not available")?;
        // duration is NaN (serialized as null) until the player has metadata.
        let duration_seconds = self
            .driver
            .element_property(&video, "duration")?
            .as_f64()
            .context("video duration not available")?;
        Ok(PlaybackSnapshot {
            is_paused,
            current_seconds,
            duration_seconds,
        })
    }

    fn resume(&self, at_seconds: u64) -> Result<()> {
        // Give the player time to swap the episode in before seeking.
        thread::sleep(self.settle);
        self.driver.execute(RESUME_SCRIPT, vec![json!(at_seconds)])?;
        Ok(())
    }

    fn advance(&self, button: &EpisodeButton) -> Result<()> {
        // The target player drops a single activation while the previous
        // episode is still tearing down: click, settle, click again.
        self.driver.click(&button.handle)?;
        thread::sleep(self.settle);
        self.driver.click(&button.handle)?;
        Ok(())
    }
}
