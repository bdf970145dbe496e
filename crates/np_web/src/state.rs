use np_pipeline::Pipeline;
use std::path::PathBuf;
use std::sync::Arc;

pub struct AppState {
    pub pipeline: Arc<Pipeline>,
    pub static_dir: PathBuf,
}
