use super::error::ChessError;
use std::fmt;
use std::str::FromStr;

/// A board square; `file` 0..8 is a..h and `rank` 0..8 is 1..8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Square {
    pub file: u8,
    pub rank: u8,
}

impl Square {
    /// Caller guarantees both coordinates are below 8
    pub const fn new_unchecked(file: u8, rank: u8) -> Self {
        Self { file, rank }
    }

    /// Step by a file/rank delta, `None` when the result leaves the board
    pub fn offset(&self, file_delta: i8, rank_delta: i8) -> Option<Square> {
        let file = self.file as i8 + file_delta;
        let rank = self.rank as i8 + rank_delta;
        ((0..8).contains(&file) && (0..8).contains(&rank))
            .then(|| Square::new_unchecked(file as u8, rank as u8))
    }

    pub fn file_char(&self) -> char {
        char::from(b'a' + self.file)
    }

    pub fn rank_char(&self) -> char {
        char::from(b'1' + self.rank)
    }

    /// a1, b1, ..., h8
    pub fn all() -> impl Iterator<Item = Square> {
        (0..64u8).map(|index| Square::new_unchecked(index % 8, index / 8))
    }
}

impl fmt::Display for Square {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.file_char(), self.rank_char())
    }
}

impl FromStr for Square {
    type Err = ChessError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.as_bytes() {
            [file @ b'a'..=b'h', rank @ b'1'..=b'8'] => {
                Ok(Square::new_unchecked(file - b'a', rank - b'1'))
            }
            _ => Err(ChessError::InvalidSquare(format!("'{s}' is not a square like e4"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let sq: Square = "g7".parse().unwrap();
        assert_eq!((sq.file, sq.rank), (6, 6));
        assert_eq!(sq.to_string(), "g7");
        assert!("i1".parse::<Square>().is_err());
        assert!("e44".parse::<Square>().is_err());
        assert_eq!(sq.offset(2, 0), None);
        assert_eq!(Square::all().count(), 64);
    }
}
