mod browser;
mod chrome;
mod layout;
mod portal;
pub mod table;

pub use browser::{BrowserEngine, BrowserError, BrowserLauncher, BrowserPage, Locator};
pub use chrome::{ChromeEngine, ChromeLauncher, ChromeOptions, ChromePage};
pub use layout::{ItemColumns, PlanColumns, PortalLayout};
pub use portal::{
    css_path, locate_category_blocks, parse_block, parse_block_page, parse_plan_rows, BlockPage,
    CategoryMarker, ExtractError, ItemRow, NextControl, PlanRow,
};

pub const CRATE_NAME: &str = "pca-adapters";
