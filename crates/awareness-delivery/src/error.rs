use awareness_store::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("Email API returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Email transport error: {0}")]
    Transport(String),

    #[error("Delivery bookkeeping failed: {0}")]
    Store(#[from] StoreError),
}

pub type Result<T> = std::result::Result<T, DeliveryError>;
