use session::WebcamSession;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub session: Arc<WebcamSession>,
}

impl AppState {
    pub fn new(session: Arc<WebcamSession>) -> Self {
        Self { session }
    }
}
