pub const APP_NAME: &str = "Abyssal Loot Tracker";
pub const APP_AUTHOR: &str = "SetScallywag";
pub const APP_REPO_URL: &str = "https://github.com/skynatbs/abyssal_loot_tracker";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identifiers for the platform config and data directories.
pub const APP_QUALIFIER: &str = "com";
pub const APP_ORG: &str = "AbyssalLootTracker";

pub fn version_label() -> String {
    format!("v{APP_VERSION}")
}

/// User agent sent to the pricing service.
pub fn user_agent() -> String {
    format!("{}/{} (+{})", APP_NAME, version_label(), APP_REPO_URL)
}
