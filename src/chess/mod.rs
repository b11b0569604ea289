//! Minimal chess rules: enough to generate random legal squares, validate
//! suite FENs, and translate expected moves between SAN and UCI notation.

pub use self::board::{Board, CastlingRights, STARTING_FEN};
pub use self::error::ChessError;
pub use self::moves::Move;
pub use self::piece::{Color, Piece, PieceType};
pub use self::square::Square;
pub use self::random::random_legal_fen;

mod board;
mod error;
mod moves;
mod piece;
mod square;
mod random;
