pub mod controller;

pub use controller::{ControllerEvent, DownloadController};
