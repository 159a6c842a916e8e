use crate::conflict_checker::SlotOptions;
use std::path::PathBuf;

pub trait Configuration: Clone + Send + Sync + 'static {
    fn website_title(&self) -> String;
    fn password(&self) -> String;
    fn frontend_path(&self) -> PathBuf;
    fn database_url(&self) -> Option<String>;
    fn port(&self) -> String;
    /// `None` means replies are drafted from the local template only.
    fn ai_api_key(&self) -> Option<String>;
    fn ai_model(&self) -> String;
    fn ai_endpoint(&self) -> String;
    fn slot_options(&self) -> SlotOptions;
}
