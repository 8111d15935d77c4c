use std::sync::Arc;
use tokio::sync::{broadcast, RwLock};

use crate::config::SiteConfig;
use crate::content_loader::SiteContent;
use crate::markdown::syntax_stylesheet;

pub type RefreshBroadcaster = broadcast::Sender<()>;

pub struct AppState {
    pub config: SiteConfig,
    /// Swapped as a whole on reload so readers never see templates and posts from different loads.
    pub content: RwLock<SiteContent>,
    pub syntax_css: String,
}

impl AppState {
    pub fn new(config: SiteConfig, content: SiteContent) -> Self {
        AppState {
            config,
            content: RwLock::new(content),
            syntax_css: syntax_stylesheet(),
        }
    }
}

#[derive(Clone)]
pub struct RouterState {
    pub app_state: Arc<AppState>,
    pub broadcaster: RefreshBroadcaster,
}

impl axum::extract::FromRef<RouterState> for Arc<AppState> {
    fn from_ref(state: &RouterState) -> Self {
        state.app_state.clone()
    }
}

impl axum::extract::FromRef<RouterState> for RefreshBroadcaster {
    fn from_ref(state: &RouterState) -> Self {
        state.broadcaster.clone()
    }
}
