use anyhow::Result;
use serde_json::json;

use crate::webdriver::WebDriver;

/// Floating skip-delay control injected into the page. Rendering is
/// idempotent per page load; saves are staged in a window global and picked
/// up by the next poll tick.
pub(crate) trait ControlPanel {
    fn render(&self, current_delay: u32) -> Result<()>;
    fn take_saved_delay(&self) -> Result<Option<i64>>;
}

const RENDER_SCRIPT: &str = r#"
if (document.getElementById('bingetrack-panel')) { return; }
const panel = document.createElement('div');
panel.id = 'bingetrack-panel';
panel.style.cssText = 'position:fixed;right:16px;bottom:16px;z-index:99999;' +
  'background:rgba(20,20,20,0.9);color:#fff;padding:10px 14px;border-radius:8px;' +
  'font:13px sans-serif;display:flex;gap:8px;align-items:center;';
const label = document.createElement('span');
const slider = document.createElement('input');
slider.type = 'range';
slider.min = '0';
slider.max = '240';
slider.value = String(arguments[0]);
label.textContent = 'Skip last ' + slider.value + 's';
slider.addEventListener('input', () => {
  label.textContent = 'Skip last ' + slider.value + 's';
});
const save = document.createElement('button');
save.textContent = 'Save';
save.addEventListener('click', () => {
  window.__bingetrackPendingSkipDelay = Number(slider.value);
});
panel.appendChild(label);
panel.appendChild(slider);
panel.appendChild(save);
document.body.appendChild(panel);
"#;

const TAKE_SAVED_SCRIPT: &str = r#"
const pending = window.__bingetrackPendingSkipDelay;
window.__bingetrackPendingSkipDelay = undefined;
return (pending === undefined || pending === null) ? null : pending;
"#;

pub(crate) struct PagePanel<'a> {
    driver: &'a WebDriver,
}

impl<'a> PagePanel<'a> {
    pub(crate) fn new(driver: &'a WebDriver) -> Self {
        Self { driver }
    }
}

impl ControlPanel for PagePanel<'_> {
    fn render(&self, current_delay: u32) -> Result<()> {
        self.driver
            .execute(RENDER_SCRIPT, vec![json!(current_delay)])?;
        Ok(())
    }

    fn take_saved_delay(&self) -> Result<Option<i64>> {
        let value = self.driver.execute(TAKE_SAVED_SCRIPT, vec![])?;
        Ok(value.as_i64())
    }
}
