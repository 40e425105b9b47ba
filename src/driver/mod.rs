#[cfg(test)]
pub mod fake;
pub mod traits;
pub mod web;

use anyhow::Result;

use crate::utils::config::Config;
use traits::UiDriver;

/// Launch the browser driver described by the configuration
pub async fn launch(
    config: &Config,
    storage: Option<serde_json::Value>,
) -> Result<Box<dyn UiDriver>> {
    let web_config = web::WebDriverConfig {
        browser_type: web::BrowserType::parse(&config.browser.name),
        headless: config.browser.headless,
        viewport_width: config.browser.viewport_width,
        viewport_height: config.browser.viewport_height,
        cookie_url: format!("{}/", config.base_url.trim_end_matches('/')),
    };
    Ok(Box::new(web::WebDriver::new(web_config, storage).await?))
}
