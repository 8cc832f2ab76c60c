use std::io;

use thiserror::Error;

/// The byte source could not be opened or stopped working
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        #[source]
        source: io::Error,
    },

    #[error("serial link failed: {0}")]
    Link(#[from] io::Error),
}
