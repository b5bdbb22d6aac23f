// tests/common/mod.rs
//! Shared doubles for the cross-surface integration tests.

pub mod scripted_llm;

pub use scripted_llm::ScriptedLlm;

use std::sync::Arc;

use byoa_lib::clipboard::MemoryClipboard;
use byoa_lib::config::AppConfig;
use byoa_lib::vault::MemoryVault;
use byoa_lib::App;

/// An app over an in-memory vault, with a scripted LLM and clipboard.
pub fn app(llm: Arc<ScriptedLlm>, clipboard: Arc<MemoryClipboard>) -> App {
    let config = AppConfig::from_lookup(|key| match key {
        "BYOA_DATA_DIR" => Some(std::env::temp_dir().join("byoa-it").display().to_string()),
        _ => None,
    });
    App::with_parts(config, Arc::new(MemoryVault::new()), llm, clipboard)
}
