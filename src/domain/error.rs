use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum AppError {
    #[error("Please enter a URL")]
    EmptyUrl,

    #[error("A download is already in progress")]
    TransferInProgress,

    #[error("Resume data lost. Please restart the download.")]
    ResumeDataLost,
}
