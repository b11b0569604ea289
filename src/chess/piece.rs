use super::error::ChessError;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Color {
    White,
    Black,
}

impl Color {
    /// Opposite color
    pub fn opposite(&self) -> Color {
        match self {
            Color::White => Color::Black,
            Color::Black => Color::White,
        }
    }

    /// Direction a pawn of this color advances along the rank axis
    pub(crate) fn pawn_direction(&self) -> i8 {
        match self {
            Color::White => 1,
            Color::Black => -1,
        }
    }

    /// Rank index of the back rank (where the king starts)
    pub(crate) fn back_rank(&self) -> u8 {
        match self {
            Color::White => 0,
            Color::Black => 7,
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Color::White => "white",
            Color::Black => "black",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PieceType {
    Pawn,
    Rook,
    Knight,
    Bishop,
    Queen,
    King,
}

impl PieceType {
    /// Pieces a pawn may promote to, strongest first
    pub const PROMOTIONS: [PieceType; 4] = [
        PieceType::Queen,
        PieceType::Rook,
        PieceType::Bishop,
        PieceType::Knight,
    ];

    /// Uppercase SAN letter; pawns have none
    pub fn san_letter(&self) -> Option<char> {
        match self {
            PieceType::Pawn => None,
            PieceType::Rook => Some('R'),
            PieceType::Knight => Some('N'),
            PieceType::Bishop => Some('B'),
            PieceType::Queen => Some('Q'),
            PieceType::King => Some('K'),
        }
    }

    /// Lowercase letter used by UCI promotion suffixes
    pub fn uci_letter(&self) -> char {
        match self {
            PieceType::Pawn => 'p',
            PieceType::Rook => 'r',
            PieceType::Knight => 'n',
            PieceType::Bishop => 'b',
            PieceType::Queen => 'q',
            PieceType::King => 'k',
        }
    }
}

impl fmt::Display for PieceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uci_letter().to_ascii_uppercase())
    }
}

impl FromStr for PieceType {
    type Err = ChessError;

    /// Accepts a single letter in either case
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let piece = match (chars.next().map(|c| c.to_ascii_lowercase()), chars.next()) {
            (Some('p'), None) => PieceType::Pawn,
            (Some('r'), None) => PieceType::Rook,
            (Some('n'), None) => PieceType::Knight,
            (Some('b'), None) => PieceType::Bishop,
            (Some('q'), None) => PieceType::Queen,
            (Some('k'), None) => PieceType::King,
            _ => return Err(ChessError::InvalidPiece(format!("'{s}' is not one of PNBRQK"))),
        };
        Ok(piece)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Piece {
    pub piece_type: PieceType,
    pub color: Color,
}

impl Piece {
    pub const fn new(piece_type: PieceType, color: Color) -> Self {
        Self { piece_type, color }
    }

    /// Parse a FEN placement character (uppercase = White)
    pub fn from_fen_char(c: char) -> Result<Self, ChessError> {
        let piece_type = c
            .to_string()
            .parse::<PieceType>()
            .map_err(|_| ChessError::InvalidFen(format!("unknown placement character '{c}'")))?;
        let color = if c.is_ascii_uppercase() {
            Color::White
        } else {
            Color::Black
        };
        Ok(Self::new(piece_type, color))
    }

    pub fn to_fen_char(&self) -> char {
        let c = self.piece_type.uci_letter();
        match self.color {
            Color::White => c.to_ascii_uppercase(),
            Color::Black => c,
        }
    }
}
