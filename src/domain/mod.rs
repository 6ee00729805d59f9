pub mod error;
pub mod model;

pub use error::AppError;
pub use model::{
    AbortAction, AdvancedOptions, DownloadRequest, MediaInfo, ProgressUpdate, StatusLevel,
};
