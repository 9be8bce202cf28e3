use tokio_tungstenite::tungstenite;

/// Client-side failure talking to the chat server.
///
/// `Unavailable` is the boundary the shell cares about ("is the server
/// even there?"); everything else is carried as-is.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("chat server is unavailable")]
    Unavailable,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ClientError {
    pub fn from_tungstenite(err: tungstenite::Error) -> Self {
        let is_connect = match &err {
            tungstenite::Error::Io(io_err) => matches!(
                io_err.kind(),
                std::io::ErrorKind::ConnectionRefused
                    | std::io::ErrorKind::ConnectionReset
                    | std::io::ErrorKind::ConnectionAborted
            ),
            _ => false,
        };
        if is_connect {
            Self::Unavailable
        } else {
            Self::Other(err.into())
        }
    }
}
