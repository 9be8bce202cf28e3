/// A frame the peer sent that we could not make sense of.
///
/// Protocol errors are never fatal: the offending frame is dropped and
/// the connection stays open.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}
