use anyhow::{Context, Result};

use crate::webdriver::{ElementRef, WebDriver};

const SERIES_NAME_SELECTOR: &str = ".movies-name.text-bold.q-my-sm.text-h5";
const EPISODE_SCROLL_AREA_SELECTOR: &str = ".q-scrollarea__content.absolute";
const EPISODE_ROW_SELECTOR: &str = ".row.no-wrap";
const SELECTED_MARKER_SELECTOR: &str = "i.q-icon.notranslate.material-icons";
const SERIES_PATH_PREFIX: &str = "/vod/details/0/";

#[derive(Debug, Clone)]
pub(crate) struct SeriesIdentity {
    pub(crate) id: String,
    pub(crate) name: String,
    pub(crate) episode_count: usize,
}

/// One episode control from the page's episode row, in DOM document order.
#[derive(Debug, Clone)]
pub(crate) struct EpisodeButton {
    pub(crate) handle: ElementRef,
    pub(crate) selected: bool,
}

pub(crate) trait SeriesInspector {
    fn identity(&self) -> Result<SeriesIdentity>;
    fn episode_buttons(&self) -> Result<Vec<EpisodeButton>>;
}

/// Position of the episode the page marks as selected. Full scan; when more
/// than one button carries the marker the last one wins.
pub(crate) fn selected_index(buttons: &[EpisodeButton]) -> Result<usize> {
    let mut selected = None;
    for (index, button) in buttons.iter().enumerate() {
        if button.selected {
            selected = Some(index);
        }
    }
    selected.context("selected episode not found")
}

pub(crate) fn series_id_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once(SERIES_PATH_PREFIX)?;
    let id: String = rest
        .chars()
        .take_while(|ch| ch.is_ascii_alphanumeric())
        .collect();
    if id.is_empty() { None } else { Some(id) }
}

pub(crate) struct PageSeriesInspector<'a> {
    driver: &'a WebDriver,
}

impl<'a> PageSeriesInspector<'a> {
    pub(crate) fn new(driver: &'a WebDriver) -> Self {
        Self { driver }
    }
}

impl SeriesInspector for PageSeriesInspector<'_> {
    fn identity(&self) -> Result<SeriesIdentity> {
        let url = self.driver.current_url()?;
        let id = series_id_from_url(&url)
            .with_context(|| format!("series id not found in page url {url}"))?;
        let name_element = self
            .driver
            .find_element(SERIES_NAME_SELECTOR)?
            .context("series name element not found")?;
        let name = self.driver.element_text(&name_element)?.trim().to_string();
        let episode_count = self.episode_buttons()?.len();
        Ok(SeriesIdentity {
            id,
            name,
            episode_count,
        })
    }

    fn episode_buttons(&self) -> Result<Vec<EpisodeButton>> {
        let scroll_area = self
            .driver
            .find_element(EPISODE_SCROLL_AREA_SELECTOR)?
            .context("episode list container not found")?;
        let row = self
            .driver
            .find_element_from(&scroll_area, EPISODE_ROW_SELECTOR)?
            .context("episode row not found")?;
        let handles = self.driver.find_elements_from(&row, "button")?;

        let mut buttons = Vec::with_capacity(handles.len());
        for handle in handles {
            let selected = !self
                .driver
                .find_elements_from(&handle, SELECTED_MARKER_SELECTOR)?
                .is_empty();
            buttons.push(EpisodeButton { handle, selected });
        }
        Ok(buttons)
    }
}
