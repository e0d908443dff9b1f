use ipnet::IpNet;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TreeError {
    #[error("no node matches {network}")]
    NotFound { network: IpNet },

    #[error("malformed address {input:?}: {reason}")]
    Malformed { input: String, reason: String },

    #[error("invalid prefix limits: {reason}")]
    Misconfigured { reason: String },
}
