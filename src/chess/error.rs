use thiserror::Error;

/// Rejections from the rules layer; all carry a human-readable detail
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChessError {
    #[error("bad FEN: {0}")]
    InvalidFen(String),

    #[error("bad piece: {0}")]
    InvalidPiece(String),

    #[error("bad square: {0}")]
    InvalidSquare(String),

    #[error("bad move: {0}")]
    InvalidMove(String),
}
