use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
  #[error("Config: {0}")]
  Config(String),

  #[error("Validation: {0}")]
  Validation(String),

  #[error("Store: {0}")]
  Store(String),

  #[error("JSON: {0}")]
  Json(#[from] serde_json::Error),

  #[error("IO: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
