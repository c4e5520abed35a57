mod panel;
mod player;
mod series;
mod store;
mod timecode;
mod watcher;


use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Local};

use crate::cli::{Cli, Command};
use crate::db::KvStore;
use crate::paths::database_file_path;
use crate::webdriver::WebDriver;

use self::panel::PagePanel;
use self::player::PagePlaybackInspector;
use self::series::PageSeriesInspector;
use self::store::{
    EpisodeProgress, KvBackedStore, PROGRESS_KEY_PREFIX, SettingsStore, progress_key,
};
use self::watcher::Watcher;

pub fn run(cli: Cli) -> Result<()> {
    let kv = open_store()?;

    match cli.command {
        Command::Watch {
            url,
            webdriver_url,
            interval,
            settle,
        } => run_watch(&kv, &url, &webdriver_url, interval, settle)?,
        Command::Progress => run_progress(&kv)?,
        Command::SkipDelay { series_id, seconds } => run_skip_delay(&kv, &series_id, seconds)?,
        Command::Forget { series_id } => run_forget(&kv, &series_id)?,
    }

    Ok(())
}

fn run_watch(
    kv: &KvStore,
    url: &str,
    webdriver_url: &str,
    interval: u64,
    settle: u64,
) -> Result<()> {
    let driver = WebDriver::new_session(webdriver_url)?;
    let outcome = watch_session(kv, &driver, url, interval, settle);
    if let Err(err) = driver.quit() {
        eprintln!("Warning: failed to close webdriver session: {err}");
    }
    outcome
}

fn watch_session(
    kv: &KvStore,
    driver: &WebDriver,
    url: &str,
    interval: u64,
    settle: u64,
) -> Result<()> {
    driver.navigate(url)?;

    let series = PageSeriesInspector::new(driver);
    let player = PagePlaybackInspector::new(driver, Duration::from_secs(settle));
    let stores = KvBackedStore::new(kv);
    let panel = PagePanel::new(driver);

    let mut watcher = Watcher::bootstrap(&series, &player, &stores, &stores, &panel)?;
    if let Err(err) = watcher.resume_stored() {
        eprintln!("Warning: resume skipped: {err}");
    }
    watcher.run(Duration::from_secs(interval));
    println!(
        "Done watching {}; progress is stored under series id {}.",
        watcher.identity().name,
        watcher.identity().id
    );
    Ok(())
}

fn run_progress(kv: &KvStore) -> Result<()> {
    let entries = kv.list_prefix(PROGRESS_KEY_PREFIX)?;
    if entries.is_empty() {
        println!("No tracked series yet. Run `bingetrack watch <url>` first.");
        return Ok(());
    }

    println!(
        "{:<24} {:<6} {:<18} {:<10} {:<28}",
        "SERIES ID", "EP", "POSITION", "FINISHED", "UPDATED"
    );
    for entry in entries {
        let series_id = entry.key.trim_start_matches(PROGRESS_KEY_PREFIX);
        match EpisodeProgress::from_json(&entry.value) {
            Some(progress) => println!(
                "{:<24} {:<6} {:<18} {:<10} {:<28}",
                truncate(series_id, 24),
                progress.current_episode + 1,
                format!("{} / {}", progress.current_time, progress.duration),
                if progress.is_finished { "yes" } else { "no" },
                format_updated_display(&entry.updated_at)
            ),
            None => println!("{:<24} (malformed record)", truncate(series_id, 24)),
        }
    }
    Ok(())
}

fn run_skip_delay(kv: &KvStore, series_id: &str, seconds: Option<i64>) -> Result<()> {
    let store = KvBackedStore::new(kv);
    if let Some(seconds) = seconds {
        store.save_skip_delay(series_id, seconds)?;
    }
    println!(
        "Skip-delay for {series_id}: {}s",
        store.skip_delay(series_id)?
    );
    Ok(())
}

fn run_forget(kv: &KvStore, series_id: &str) -> Result<()> {
    if kv.remove(&progress_key(series_id))? {
        println!("Dropped stored progress for {series_id}.");
    } else {
        println!("No stored progress for {series_id}.");
    }
    Ok(())
}

fn open_store() -> Result<KvStore> {
    let db_path = database_file_path()?;
    let store = KvStore::open(&db_path)?;
    store.migrate()?;
    Ok(store)
}

fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

fn format_updated_display(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}
