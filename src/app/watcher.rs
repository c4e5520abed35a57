use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};

use super::panel::ControlPanel;
use super::player::PlaybackInspector;
use super::series::{SeriesIdentity, SeriesInspector, selected_index};
use super::store::{EpisodeProgress, ProgressStore, SettingsStore};
use super::timecode::parse_time;

/// Start/stop token for the repeating poll. `stop` is idempotent.
#[derive(Debug, Default)]
pub(crate) struct PollHandle {
    running: bool,
}

impl PollHandle {
    pub(crate) fn start(&mut self) {
        self.running = true;
    }

    pub(crate) fn stop(&mut self) {
        self.running = false;
    }

    pub(crate) fn is_running(&self) -> bool {
        self.running
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TickOutcome {
    Continue,
    Finished,
}

/// Drives one series page: resumes stored progress, then polls playback,
/// persisting a fresh progress record each tick and advancing to the next
/// episode when the current one finishes (or enters its skip window).
pub(crate) struct Watcher<'a> {
    series: &'a dyn SeriesInspector,
    player: &'a dyn PlaybackInspector,
    progress: &'a dyn ProgressStore,
    settings: &'a dyn SettingsStore,
    panel: &'a dyn ControlPanel,
    identity: SeriesIdentity,
    poll: PollHandle,
}

impl<'a> Watcher<'a> {
    /// Without a series identity there is nothing to track, so this is the
    /// one step whose failure aborts the run. Panel injection is cosmetic
    /// and only warns.
    pub(crate) fn bootstrap(
        series: &'a dyn SeriesInspector,
        player: &'a dyn PlaybackInspector,
        progress: &'a dyn ProgressStore,
        settings: &'a dyn SettingsStore,
        panel: &'a dyn ControlPanel,
    ) -> Result<Self> {
        let identity = series.identity().context("cannot track this page")?;
        println!(
            "Tracking {} ({} episodes, series id {})",
            identity.name, identity.episode_count, identity.id
        );

        let current_delay = settings.skip_delay(&identity.id)?;
        if let Err(err) = panel.render(current_delay) {
            eprintln!("Warning: skip-delay panel injection failed: {err}");
        }

        Ok(Self {
            series,
            player,
            progress,
            settings,
            panel,
            identity,
            poll: PollHandle::default(),
        })
    }

    pub(crate) fn identity(&self) -> &SeriesIdentity {
        &self.identity
    }

    pub(crate) fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    /// Acts on progress stored by a previous run: a finished episode starts
    /// the next one, an unfinished episode is reloaded and seeked back to
    /// where playback left off.
    pub(crate) fn resume_stored(&self) -> Result<()> {
        let Some(stored) = self.progress.load(&self.identity.id)? else {
            println!("No stored progress for this series yet.");
            return Ok(());
        };

        let buttons = self.series.episode_buttons()?;
        if stored.current_episode >= buttons.len() {
            eprintln!(
                "Warning: stored episode index {} is outside the current episode list ({} buttons); ignoring stored progress",
                stored.current_episode,
                buttons.len()
            );
            return Ok(());
        }

        if stored.is_finished {
            match buttons.get(stored.current_episode + 1) {
                Some(button) => {
                    println!(
                        "Episode {} already finished; starting episode {}",
                        stored.current_episode + 1,
                        stored.current_episode + 2
                    );
                    self.player.advance(button)?;
                }
                None => println!("Stored episode was the last one; nothing to resume."),
            }
            return Ok(());
        }

        let at_seconds = parse_time(&stored.current_time).unwrap_or(0);
        println!(
            "Resuming episode {} at {}",
            stored.current_episode + 1,
            stored.current_time
        );
        // Re-activating the stored episode forces the player to load it
        // before the seek.
        self.player.advance(&buttons[stored.current_episode])?;
        self.player.resume(at_seconds)?;
        Ok(())
    }

    /// One poll: snapshot playback, re-read the selected episode (the user
    /// may have switched manually), persist, then advance if the episode is
    /// finished or inside the skip window.
    pub(crate) fn tick(&self) -> Result<TickOutcome> {
        if let Err(err) = self.pick_up_panel_delay() {
            eprintln!("Warning: skip-delay panel read failed: {err}");
        }

        let snapshot = self.player.snapshot()?;
        let buttons = self.series.episode_buttons()?;
        let current = selected_index(&buttons)?;

        let record = EpisodeProgress {
            current_episode: current,
            current_time: snapshot.current_display(),
            duration: snapshot.duration_display(),
            is_finished: snapshot.is_finished(),
        };
        self.progress.save(&self.identity.id, &record)?;
        println!(
            "Episode {} at {} / {}{}",
            current + 1,
            record.current_time,
            record.duration,
            if snapshot.is_paused { " (paused)" } else { "" }
        );

        let skip_delay = self.settings.skip_delay(&self.identity.id)?;
        let should_advance =
            snapshot.is_finished() || snapshot.remaining_seconds() < f64::from(skip_delay);
        if !should_advance {
            return Ok(TickOutcome::Continue);
        }

        // Next episode is relative to the freshly read selection, so the
        // record written above still names the episode that just ended; the
        // new index lands with the next tick's re-read.
        match buttons.get(current + 1) {
            Some(button) => {
                println!(
                    "Episode {} done; advancing to episode {}",
                    current + 1,
                    current + 2
                );
                self.player.advance(button)?;
                Ok(TickOutcome::Continue)
            }
            None => {
                println!("Last episode finished.");
                Ok(TickOutcome::Finished)
            }
        }
    }

    /// Fixed-interval wall-clock loop, not drift-corrected. A failed tick is
    /// logged and skipped; the next tick is simply the next firing.
    pub(crate) fn run(&mut self, interval: Duration) {
        self.poll.start();
        while self.poll.is_running() {
            thread::sleep(interval);
            match self.tick() {
                Ok(TickOutcome::Continue) => {}
                Ok(TickOutcome::Finished) => self.poll.stop(),
                Err(err) => eprintln!("Warning: poll tick skipped: {err}"),
            }
        }
    }

    fn pick_up_panel_delay(&self) -> Result<()> {
        if let Some(seconds) = self.panel.take_saved_delay()? {
            self.settings.save_skip_delay(&self.identity.id, seconds)?;
            println!(
                "Skip-delay for {} set to {}s",
                self.identity.name,
                self.settings.skip_delay(&self.identity.id)?
            );
        }
        Ok(())
    }
}
