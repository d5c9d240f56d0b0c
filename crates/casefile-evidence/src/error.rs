use thiserror::Error;

/// Errors raised by evidence lifecycle hooks.
#[derive(Debug, Error)]
pub enum EvidenceError {
  /// Preparing the evidence failed (bad type, unreadable, mount failure).
  #[error("preprocessing {name} failed: {message}")]
  Preprocess { name: String, message: String },

  /// Releasing the evidence failed.
  #[error("postprocessing {name} failed: {message}")]
  Postprocess { name: String, message: String },
}

impl EvidenceError {
  pub fn preprocess(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Preprocess {
      name: name.into(),
      message: message.into(),
    }
  }

  pub fn postprocess(name: impl Into<String>, message: impl Into<String>) -> Self {
    Self::Postprocess {
      name: name.into(),
      message: message.into(),
    }
  }
}
