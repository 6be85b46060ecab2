use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use headless_chrome::{protocol::cdp::DOM, Browser, Element, LaunchOptions, Tab};
use log::{debug, info, warn};

use crate::asset::Asset;
use crate::config::YearSelection;
use crate::product::Product;
use crate::upload::UploadBundle;

/// The DEFRA survey data download portal.
pub const PORTAL_URL: &str = "https://environment.data.gov.uk/DefraDataDownload/?Mode=survey";

// The portal is a React app with generated class names; these selectors are
// the stable-ish anchors the flow hangs off. When the portal breaks, look
// here first.
const MODE_SELECT: &str = ".fswiLB select";
const UPLOAD_MODE_VALUE: &str = "Upload shapefile";
const UPLOAD_INPUT: &str = ".shapefile-upload input";
const TILE_SELECTOR_BUTTON: &str = ".download-button";
const PRODUCT_SELECT: &str = "#productSelect";
const YEAR_SELECT: &str = "select.year-select";
const TILE_LINKS: &str = ".tiles-list a";

const STEP_RETRIES: usize = 3;
const STEP_RETRY_DELAY: Duration = Duration::from_secs(1);

/// A browser session on the survey download portal.
///
/// The underlying browser process is torn down when the session is dropped,
/// on both success and failure paths.
pub struct PortalSession {
    tab: Arc<Tab>,
    _browser: Browser,
    wait_timeout: Duration,
}

impl PortalSession {
    /// Launches a browser and opens a tab. Does not navigate yet; that
    /// happens once per upload bundle.
    pub fn open(headless: bool, wait_timeout: Duration) -> Result<Self> {
        let options = LaunchOptions::default_builder()
            .headless(headless)
            .window_size(Some((1920, 1080)))
            .sandbox(false)
            .idle_browser_timeout(Duration::from_secs(3600))
            .build()
            .map_err(|e| anyhow!("failed configuring browser: {}", e))?;

        let browser = Browser::new(options).context("failed launching browser")?;
        let tab = browser.new_tab().context("failed opening tab")?;

        Ok(Self {
            tab,
            _browser: browser,
            wait_timeout,
        })
    }

    /// Uploads the bundle and enumerates every downloadable asset for the
    /// given products and years.
    pub fn enumerate(
        &self,
        bundle: &UploadBundle,
        products: &[Product],
        years: &YearSelection,
    ) -> Result<Vec<Asset>> {
        info!("querying portal for {}", bundle.label);

        self.tab
            .navigate_to(PORTAL_URL)
            .and_then(|tab| tab.wait_until_navigated())
            .context("failed opening the download portal")?;
        self.upload(bundle)?;

        let mut assets = Vec::new();
        for &product in products {
            let found = with_retries(STEP_RETRIES, STEP_RETRY_DELAY, || {
                self.enumerate_product(product, years)
            });

            match found {
                Ok(mut found) => assets.append(&mut found),
                // a product can be missing entirely for this region
                Err(e) => warn!("skipping product {}: {:#}", product, e),
            }
        }

        Ok(assets)
    }

    fn upload(&self, bundle: &UploadBundle) -> Result<()> {
        self.select_by_value(MODE_SELECT, UPLOAD_MODE_VALUE)?;

        let input = self.wait_for(UPLOAD_INPUT)?;
        self.tab
            .call_method(DOM::SetFileInputFiles {
                files: vec![bundle.zip_path.to_string_lossy().into_owned()],
                node_id: None,
                backend_node_id: None,
                object_id: Some(input.remote_object_id.clone()),
            })
            .context("failed attaching the shapefile to the upload input")?;

        self.wait_for(TILE_SELECTOR_BUTTON)?
            .click()
            .context("failed requesting the tile selector")?;

        Ok(())
    }

    fn enumerate_product(&self, product: Product, years: &YearSelection) -> Result<Vec<Asset>> {
        self.select_by_label(PRODUCT_SELECT, product.portal_label())?;

        let offered = self.offered_years()?;
        debug!("portal offers years {:?} for {}", offered, product);

        let mut assets = Vec::new();
        for year in years.select(&offered) {
            self.select_by_label(YEAR_SELECT, &year)?;

            let links = self.tile_links(product, &year)?;
            debug!("{} assets listed for {} {}", links.len(), product, year);
            assets.extend(links);
        }

        Ok(assets)
    }

    /// The year options currently offered for the selected product.
    fn offered_years(&self) -> Result<Vec<String>> {
        self.wait_for(YEAR_SELECT)?;

        let raw = self.evaluate_json(&format!(
            "JSON.stringify(Array.from(document.querySelector({:?}).options).map(o => o.text.trim()))",
            YEAR_SELECT,
        ))?;

        serde_json::from_str(&raw).context("failed parsing the portal's year options")
    }

    /// Collects `(name, href)` off the tile list shown for the current
    /// product/year selection.
    fn tile_links(&self, product: Product, year: &str) -> Result<Vec<Asset>> {
        self.wait_for(TILE_LINKS)?;

        let raw = self.evaluate_json(&format!(
            "JSON.stringify(Array.from(document.querySelectorAll({:?})).map(a => [a.textContent.trim(), a.href]))",
            TILE_LINKS,
        ))?;

        let links: Vec<(String, String)> =
            serde_json::from_str(&raw).context("failed parsing the portal's tile list")?;

        Ok(links
            .into_iter()
            .map(|(name, url)| Asset::from_portal_link(name, url, product, year.to_owned()))
            .collect())
    }

    /// Picks the option with the given `value` in a `<select>` and fires a
    /// change event so the portal's framework notices.
    fn select_by_value(&self, selector: &str, value: &str) -> Result<()> {
        self.wait_for(selector)?;

        let picked = self.tab.evaluate(
            &format!(
                r#"(() => {{
                    const select = document.querySelector({selector:?});
                    const option = Array.from(select.options).find(o => o.value === {value:?});
                    if (!option) return false;
                    select.value = option.value;
                    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()"#,
            ),
            false,
        )?;

        if picked.value != Some(serde_json::Value::Bool(true)) {
            bail!("no option {:?} in {:?}", value, selector);
        }

        Ok(())
    }

    /// Like [`Self::select_by_value`], but matches the option's visible text.
    fn select_by_label(&self, selector: &str, label: &str) -> Result<()> {
        self.wait_for(selector)?;

        let picked = self.tab.evaluate(
            &format!(
                r#"(() => {{
                    const select = document.querySelector({selector:?});
                    const option = Array.from(select.options).find(o => o.text.trim() === {label:?});
                    if (!option) return false;
                    select.value = option.value;
                    select.dispatchEvent(new Event('change', {{ bubbles: true }}));
                    return true;
                }})()"#,
            ),
            false,
        )?;

        if picked.value != Some(serde_json::Value::Bool(true)) {
            bail!("no option labelled {:?} in {:?}", label, selector);
        }

        Ok(())
    }

    fn evaluate_json(&self, expression: &str) -> Result<String> {
        let result = self.tab.evaluate(expression, false)?;
        result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("expected a string result from {:?}", expression))
    }

    fn wait_for(&self, selector: &str) -> Result<Element<'_>> {
        self.tab
            .wait_for_element_with_custom_timeout(selector, self.wait_timeout)
            .with_context(|| {
                format!(
                    "element {:?} didn't appear within {:?}",
                    selector, self.wait_timeout
                )
            })
    }
}

/// Retries a portal step with linearly increasing delay.
fn with_retries<T>(
    retries: usize,
    delay: Duration,
    mut op: impl FnMut() -> Result<T>,
) -> Result<T> {
    let mut last_error = None;

    for attempt in 0..retries {
        match op() {
            Ok(v) => return Ok(v),
            Err(e) => {
                warn!("attempt {} failed: {:#}", attempt + 1, e);
                last_error = Some(e);

                if attempt + 1 < retries {
                    std::thread::sleep(delay * (attempt as u32 + 1));
                }
            }
        }
    }

    Err(last_error.unwrap_or_else(|| anyhow!("no attempts were made")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn retries_until_success() {
        let attempts = Cell::new(0);
        let result = with_retries(3, Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            if attempts.get() < 3 {
                bail!("transient")
            }
            Ok(attempts.get())
        });

        assert_eq!(result.unwrap(), 3);
    }

    #[test]
    fn gives_up_after_the_last_attempt() {
        let attempts = Cell::new(0);
        let result: Result<()> = with_retries(3, Duration::ZERO, || {
            attempts.set(attempts.get() + 1);
            bail!("persistent")
        });

        assert!(result.is_err());
        assert_eq!(attempts.get(), 3);
    }
}
