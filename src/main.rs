mod app;
mod application;
mod domain;
mod engine;
mod preview;
mod storage;
mod ui;
mod utils;

use iced::window;

fn main() -> iced::Result {
    tracing_subscriber::fmt::init();

    iced::application(app::DownloadApp::default, app::update, app::view)
        .title("TubeGrab")
        .window(window::Settings {
            size: iced::Size::new(600.0, 800.0),
            ..Default::default()
        })
        .run()
}
