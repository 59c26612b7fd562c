use thiserror::Error;

#[derive(Error, Debug)]
pub enum IdError {
    #[error("Invalid identifier length: expected 16 bytes, got {0}")]
    InvalidLength(usize),

    #[error("Hex decode error: {0}")]
    Hex(#[from] hex::FromHexError),
}
