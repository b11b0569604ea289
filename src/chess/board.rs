use super::moves::Move;
use super::{ChessError, Color, Piece, PieceType, Square};

/// Standard initial position
pub const STARTING_FEN: &str = "rnbqkbnr/pppppppp/8/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1";

const KNIGHT_STEPS: [(i8, i8); 8] = [
    (1, 2),
    (2, 1),
    (2, -1),
    (1, -2),
    (-1, -2),
    (-2, -1),
    (-2, 1),
    (-1, 2),
];
const KING_STEPS: [(i8, i8); 8] = [
    (1, 0),
    (1, 1),
    (0, 1),
    (-1, 1),
    (-1, 0),
    (-1, -1),
    (0, -1),
    (1, -1),
];
const ROOK_RAYS: [(i8, i8); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
const BISHOP_RAYS: [(i8, i8); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Castling rights as a four-bit set, in FEN order `KQkq`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct CastlingRights(u8);

impl CastlingRights {
    const FEN_LETTERS: [char; 4] = ['K', 'Q', 'k', 'q'];

    pub fn all() -> Self {
        Self(0b1111)
    }

    fn bit(color: Color, kingside: bool) -> u8 {
        let index = match (color, kingside) {
            (Color::White, true) => 0,
            (Color::White, false) => 1,
            (Color::Black, true) => 2,
            (Color::Black, false) => 3,
        };
        1 << index
    }

    /// `-` or any subset of `KQkq`
    pub fn from_fen(field: &str) -> Result<Self, ChessError> {
        if field == "-" {
            return Ok(Self::default());
        }
        field.chars().try_fold(Self::default(), |rights, c| {
            match Self::FEN_LETTERS.iter().position(|&letter| letter == c) {
                Some(index) => Ok(Self(rights.0 | 1 << index)),
                None => Err(ChessError::InvalidFen(format!("castling field has stray '{c}'"))),
            }
        })
    }

    pub fn to_fen(&self) -> String {
        let field: String = Self::FEN_LETTERS
            .iter()
            .enumerate()
            .filter(|(index, _)| self.0 & (1 << index) != 0)
            .map(|(_, &letter)| letter)
            .collect();
        if field.is_empty() {
            "-".to_string()
        } else {
            field
        }
    }

    fn kingside(&self, color: Color) -> bool {
        self.0 & Self::bit(color, true) != 0
    }

    fn queenside(&self, color: Color) -> bool {
        self.0 & Self::bit(color, false) != 0
    }

    fn clear_color(&mut self, color: Color) {
        self.0 &= !(Self::bit(color, true) | Self::bit(color, false));
    }

    /// A rook left or was captured on a corner square
    fn clear_corner(&mut self, corner: Square) {
        let color = match corner.rank {
            0 => Color::White,
            7 => Color::Black,
            _ => return,
        };
        match corner.file {
            0 => self.0 &= !Self::bit(color, false),
            7 => self.0 &= !Self::bit(color, true),
            _ => {}
        }
    }
}

/// Chess position: placement, side to move and the irreversible state FEN carries.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Board {
    /// Indexed `[rank][file]`, a1 first
    squares: [[Option<Piece>; 8]; 8],
    side_to_move: Color,
    castling_rights: CastlingRights,
    en_passant_target: Option<Square>,
    halfmove_clock: u16,
    fullmove_number: u16,
}

impl Board {
    /// The initial position
    pub fn new() -> Self {
        let back_rank = [
            PieceType::Rook,
            PieceType::Knight,
            PieceType::Bishop,
            PieceType::Queen,
            PieceType::King,
            PieceType::Bishop,
            PieceType::Knight,
            PieceType::Rook,
        ];
        let mut squares = [[None; 8]; 8];
        for (file, &piece_type) in back_rank.iter().enumerate() {
            squares[0][file] = Some(Piece::new(piece_type, Color::White));
            squares[1][file] = Some(Piece::new(PieceType::Pawn, Color::White));
            squares[6][file] = Some(Piece::new(PieceType::Pawn, Color::Black));
            squares[7][file] = Some(Piece::new(piece_type, Color::Black));
        }

        Self {
            squares,
            side_to_move: Color::White,
            castling_rights: CastlingRights::all(),
            en_passant_target: None,
            halfmove_clock: 0,
            fullmove_number: 1,
        }
    }

    /// Parse a FEN string. The two move counters may be omitted.
    pub fn from_fen(fen: &str) -> Result<Board, ChessError> {
        let parts: Vec<&str> = fen.split_whitespace().collect();
        if parts.len() != 4 && parts.len() != 6 {
            return Err(ChessError::InvalidFen(format!(
                "Expected 4 or 6 space-separated fields, got {}",
                parts.len()
            )));
        }

        let squares = Self::parse_placement(parts[0])?;

        let side_to_move = match parts[1] {
            "w" => Color::White,
            "b" => Color::Black,
            other => {
                return Err(ChessError::InvalidFen(format!(
                    "Active color must be 'w' or 'b', got '{other}'"
                )))
            }
        };

        let castling_rights = CastlingRights::from_fen(parts[2])?;

        let en_passant_target = match parts[3] {
            "-" => None,
            square => {
                let pos = square
                    .parse::<Square>()
                    .map_err(|e| ChessError::InvalidFen(e.to_string()))?;
                if pos.rank != 2 && pos.rank != 5 {
                    return Err(ChessError::InvalidFen(format!(
                        "En passant square {pos} must be on rank 3 or 6"
                    )));
                }
                Some(pos)
            }
        };

        let (halfmove_clock, fullmove_number) = if parts.len() == 6 {
            let halfmove = parts[4].parse::<u16>().map_err(|e| {
                ChessError::InvalidFen(format!("Invalid halfmove clock '{}': {e}", parts[4]))
            })?;
            let fullmove = parts[5].parse::<u16>().map_err(|e| {
                ChessError::InvalidFen(format!("Invalid fullmove number '{}': {e}", parts[5]))
            })?;
            (halfmove, fullmove.max(1))
        } else {
            (0, 1)
        };

        let board = Board {
            squares,
            side_to_move,
            castling_rights,
            en_passant_target,
            halfmove_clock,
            fullmove_number,
        };

        for color in [Color::White, Color::Black] {
            let kings = Square::all()
                .filter(|&pos| board.get_piece(pos) == Some(Piece::new(PieceType::King, color)))
                .count();
            if kings != 1 {
                return Err(ChessError::InvalidFen(format!(
                    "{color} must have exactly one king, found {kings}"
                )));
            }
        }

        Ok(board)
    }

    fn parse_placement(placement: &str) -> Result<[[Option<Piece>; 8]; 8], ChessError> {
        let rows: Vec<&str> = placement.split('/').collect();
        if rows.len() != 8 {
            return Err(ChessError::InvalidFen(format!(
                "Piece placement must have 8 ranks, got {}",
                rows.len()
            )));
        }

        let mut squares = [[None; 8]; 8];
        // FEN lists rank 8 first
        for (row_idx, row) in rows.iter().enumerate() {
            let rank = 7 - row_idx;
            let mut file = 0usize;
            for c in row.chars() {
                if let Some(skip) = c.to_digit(10) {
                    if skip == 0 || skip > 8 {
                        return Err(ChessError::InvalidFen(format!(
                            "Invalid empty-square count '{c}' in rank {}",
                            rank + 1
                        )));
                    }
                    file += skip as usize;
                } else {
                    if file >= 8 {
                        return Err(ChessError::InvalidFen(format!(
                            "Rank {} has more than 8 squares",
                            rank + 1
                        )));
                    }
                    squares[rank][file] = Some(Piece::from_fen_char(c)?);
                    file += 1;
                }
            }
            if file != 8 {
                return Err(ChessError::InvalidFen(format!(
                    "Rank {} describes {file} squares instead of 8",
                    rank + 1
                )));
            }
        }

        Ok(squares)
    }

    pub fn to_fen(&self) -> String {
        let placement: Vec<String> = self
            .squares
            .iter()
            .rev()
            .map(|row| {
                let mut text = String::new();
                let mut gap = 0u8;
                for square in row {
                    match square {
                        Some(piece) => {
                            if gap > 0 {
                                text.push(char::from(b'0' + gap));
                                gap = 0;
                            }
                            text.push(piece.to_fen_char());
                        }
                        None => gap += 1,
                    }
                }
                if gap > 0 {
                    text.push(char::from(b'0' + gap));
                }
                text
            })
            .collect();

        let side = if self.side_to_move == Color::White { "w" } else { "b" };
        let en_passant = self
            .en_passant_target
            .map_or_else(|| "-".to_string(), |sq| sq.to_string());

        format!(
            "{} {side} {} {en_passant} {} {}",
            placement.join("/"),
            self.castling_rights.to_fen(),
            self.halfmove_clock,
            self.fullmove_number
        )
    }

    pub fn get_piece(&self, sq: Square) -> Option<Piece> {
        self.squares
            .get(usize::from(sq.rank))
            .and_then(|row| row.get(usize::from(sq.file)))
            .copied()
            .flatten()
    }

    fn set_piece(&mut self, sq: Square, piece: Option<Piece>) {
        self.squares[usize::from(sq.rank)][usize::from(sq.file)] = piece;
    }

    pub fn side_to_move(&self) -> Color {
        self.side_to_move
    }

    pub fn halfmove_clock(&self) -> u16 {
        self.halfmove_clock
    }

    pub fn fullmove_number(&self) -> u16 {
        self.fullmove_number
    }

    fn king_position(&self, color: Color) -> Option<Square> {
        Square::all()
            .find(|&pos| self.get_piece(pos) == Some(Piece::new(PieceType::King, color)))
    }

    /// Whether any piece of `by` attacks `target`
    pub fn is_attacked(&self, target: Square, by: Color) -> bool {
        let holds = |pos: Option<Square>, kinds: &[PieceType]| {
            pos.and_then(|p| self.get_piece(p))
                .map(|piece| piece.color == by && kinds.contains(&piece.piece_type))
                .unwrap_or(false)
        };

        // A pawn of `by` attacks diagonally forward, so look one rank behind the target.
        let pawn_rank = -by.pawn_direction();
        if holds(target.offset(1, pawn_rank), &[PieceType::Pawn])
            || holds(target.offset(-1, pawn_rank), &[PieceType::Pawn])
        {
            return true;
        }

        if KNIGHT_STEPS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), &[PieceType::Knight]))
        {
            return true;
        }

        if KING_STEPS
            .iter()
            .any(|&(df, dr)| holds(target.offset(df, dr), &[PieceType::King]))
        {
            return true;
        }

        let ray_hits = |rays: &[(i8, i8)], kinds: &[PieceType]| {
            rays.iter().any(|&(df, dr)| {
                let mut cursor = target.offset(df, dr);
                while let Some(pos) = cursor {
                    if let Some(piece) = self.get_piece(pos) {
                        return piece.color == by && kinds.contains(&piece.piece_type);
                    }
                    cursor = pos.offset(df, dr);
                }
                false
            })
        };

        ray_hits(&ROOK_RAYS, &[PieceType::Rook, PieceType::Queen])
            || ray_hits(&BISHOP_RAYS, &[PieceType::Bishop, PieceType::Queen])
    }

    /// Whether the side to move is in check
    pub fn in_check(&self) -> bool {
        self.king_position(self.side_to_move)
            .map(|king| self.is_attacked(king, self.side_to_move.opposite()))
            .unwrap_or(false)
    }

    /// All legal moves for the side to move
    pub fn legal_moves(&self) -> Vec<Move> {
        let mover = self.side_to_move;
        self.pseudo_legal_moves()
            .into_iter()
            .filter(|&mv| {
                let mut next = self.clone();
                next.apply(mv);
                next.king_position(mover)
                    .map(|king| !next.is_attacked(king, mover.opposite()))
                    .unwrap_or(false)
            })
            .collect()
    }

    fn pseudo_legal_moves(&self) -> Vec<Move> {
        let mover = self.side_to_move;
        let mut moves = Vec::with_capacity(48);

        for from in Square::all() {
            let Some(piece) = self.get_piece(from) else {
                continue;
            };
            if piece.color != mover {
                continue;
            }

            match piece.piece_type {
                PieceType::Pawn => self.pawn_moves(from, &mut moves),
                PieceType::Knight => self.step_moves(from, &KNIGHT_STEPS, &mut moves),
                PieceType::King => {
                    self.step_moves(from, &KING_STEPS, &mut moves);
                    self.castling_moves(from, &mut moves);
                }
                PieceType::Bishop => self.ray_moves(from, &BISHOP_RAYS, &mut moves),
                PieceType::Rook => self.ray_moves(from, &ROOK_RAYS, &mut moves),
                PieceType::Queen => {
                    self.ray_moves(from, &ROOK_RAYS, &mut moves);
                    self.ray_moves(from, &BISHOP_RAYS, &mut moves);
                }
            }
        }

        moves
    }

    fn can_land(&self, to: Square) -> bool {
        self.get_piece(to)
            .map(|piece| piece.color != self.side_to_move)
            .unwrap_or(true)
    }

    fn step_moves(&self, from: Square, steps: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(df, dr) in steps {
            if let Some(to) = from.offset(df, dr) {
                if self.can_land(to) {
                    moves.push(Move::new_unchecked(from, to, None));
                }
            }
        }
    }

    fn ray_moves(&self, from: Square, rays: &[(i8, i8)], moves: &mut Vec<Move>) {
        for &(df, dr) in rays {
            let mut cursor = from.offset(df, dr);
            while let Some(to) = cursor {
                match self.get_piece(to) {
                    None => moves.push(Move::new_unchecked(from, to, None)),
                    Some(piece) => {
                        if piece.color != self.side_to_move {
                            moves.push(Move::new_unchecked(from, to, None));
                        }
                        break;
                    }
                }
                cursor = to.offset(df, dr);
            }
        }
    }

    fn pawn_moves(&self, from: Square, moves: &mut Vec<Move>) {
        let color = self.side_to_move;
        let dir = color.pawn_direction();
        let start_rank = match color {
            Color::White => 1,
            Color::Black => 6,
        };
        let promotion_rank = color.opposite().back_rank();

        let push = |to: Square, moves: &mut Vec<Move>| {
            if to.rank == promotion_rank {
                for promotion in PieceType::PROMOTIONS {
                    moves.push(Move::new_unchecked(from, to, Some(promotion)));
                }
            } else {
                moves.push(Move::new_unchecked(from, to, None));
            }
        };

        if let Some(one) = from.offset(0, dir) {
            if self.get_piece(one).is_none() {
                push(one, moves);
                if from.rank == start_rank {
                    if let Some(two) = from.offset(0, 2 * dir) {
                        if self.get_piece(two).is_none() {
                            moves.push(Move::new_unchecked(from, two, None));
                        }
                    }
                }
            }
        }

        for df in [-1, 1] {
            let Some(to) = from.offset(df, dir) else {
                continue;
            };
            let enemy = self
                .get_piece(to)
                .map(|piece| piece.color != color)
                .unwrap_or(false);
            if enemy || self.en_passant_target == Some(to) {
                push(to, moves);
            }
        }
    }

    fn castling_moves(&self, from: Square, moves: &mut Vec<Move>) {
        let color = self.side_to_move;
        let rank = color.back_rank();
        if from != Square::new_unchecked(4, rank) || self.in_check() {
            return;
        }
        let enemy = color.opposite();
        let rook = Some(Piece::new(PieceType::Rook, color));
        let empty = |files: &[u8]| {
            files
                .iter()
                .all(|&file| self.get_piece(Square::new_unchecked(file, rank)).is_none())
        };
        let safe = |files: &[u8]| {
            files
                .iter()
                .all(|&file| !self.is_attacked(Square::new_unchecked(file, rank), enemy))
        };

        if self.castling_rights.kingside(color)
            && self.get_piece(Square::new_unchecked(7, rank)) == rook
            && empty(&[5, 6])
            && safe(&[5, 6])
        {
            moves.push(Move::new_unchecked(from, Square::new_unchecked(6, rank), None));
        }

        if self.castling_rights.queenside(color)
            && self.get_piece(Square::new_unchecked(0, rank)) == rook
            && empty(&[1, 2, 3])
            && safe(&[2, 3])
        {
            moves.push(Move::new_unchecked(from, Square::new_unchecked(2, rank), None));
        }
    }

    /// Apply a move after checking it is legal in this position
    pub fn make_move(&mut self, mv: Move) -> Result<(), ChessError> {
        if !self.legal_moves().contains(&mv) {
            return Err(ChessError::InvalidMove(format!(
                "{mv} is not legal in {}",
                self.to_fen()
            )));
        }
        self.apply(mv);
        Ok(())
    }

    /// Apply a move known to be pseudo-legal
    pub(crate) fn apply(&mut self, mv: Move) {
        let Some(piece) = self.get_piece(mv.from) else {
            return;
        };
        let captured = self.get_piece(mv.to);
        let is_pawn = piece.piece_type == PieceType::Pawn;
        let is_en_passant =
            is_pawn && mv.from.file != mv.to.file && captured.is_none() && self.en_passant_target == Some(mv.to);
        let is_castling = piece.piece_type == PieceType::King && mv.from.file.abs_diff(mv.to.file) == 2;

        if piece.piece_type == PieceType::King {
            self.castling_rights.clear_color(piece.color);
        }
        if piece.piece_type == PieceType::Rook {
            self.castling_rights.clear_corner(mv.from);
        }
        if captured.map(|p| p.piece_type == PieceType::Rook).unwrap_or(false) {
            self.castling_rights.clear_corner(mv.to);
        }

        let landed = mv
            .promotion
            .map(|promotion| Piece::new(promotion, piece.color))
            .unwrap_or(piece);
        self.set_piece(mv.from, None);
        self.set_piece(mv.to, Some(landed));

        if is_en_passant {
            self.set_piece(Square::new_unchecked(mv.to.file, mv.from.rank), None);
        }

        if is_castling {
            let (rook_from, rook_to) = if mv.to.file == 6 { (7, 5) } else { (0, 3) };
            let rook = self.get_piece(Square::new_unchecked(rook_from, mv.from.rank));
            self.set_piece(Square::new_unchecked(rook_from, mv.from.rank), None);
            self.set_piece(Square::new_unchecked(rook_to, mv.from.rank), rook);
        }

        self.en_passant_target = if is_pawn && mv.from.rank.abs_diff(mv.to.rank) == 2 {
            Some(Square::new_unchecked(
                mv.from.file,
                (mv.from.rank + mv.to.rank) / 2,
            ))
        } else {
            None
        };

        if is_pawn || captured.is_some() || is_en_passant {
            self.halfmove_clock = 0;
        } else {
            self.halfmove_clock = self.halfmove_clock.saturating_add(1);
        }
        if self.side_to_move == Color::Black {
            self.fullmove_number = self.fullmove_number.saturating_add(1);
        }
        self.side_to_move = self.side_to_move.opposite();
    }

    /// Checkmate, stalemate, the 75-move rule or bare kings end the game
    pub fn is_game_over(&self) -> bool {
        self.halfmove_clock >= 150 || self.insufficient_material() || self.legal_moves().is_empty()
    }

    fn insufficient_material(&self) -> bool {
        let mut minors = 0;
        for pos in Square::all() {
            match self.get_piece(pos).map(|piece| piece.piece_type) {
                None | Some(PieceType::King) => {}
                Some(PieceType::Knight) | Some(PieceType::Bishop) => minors += 1,
                Some(_) => return false,
            }
        }
        minors <= 1
    }

    /// Standard algebraic notation for a legal move
    pub fn san(&self, mv: Move) -> String {
        let Some(piece) = self.get_piece(mv.from) else {
            return mv.to_string();
        };

        let mut san = String::new();
        if piece.piece_type == PieceType::King && mv.from.file.abs_diff(mv.to.file) == 2 {
            san.push_str(if mv.to.file == 6 { "O-O" } else { "O-O-O" });
        } else {
            let is_capture = self.get_piece(mv.to).is_some()
                || (piece.piece_type == PieceType::Pawn && mv.from.file != mv.to.file);

            match piece.piece_type.san_letter() {
                None => {
                    if is_capture {
                        san.push(mv.from.file_char());
                    }
                }
                Some(letter) => {
                    san.push(letter);
                    let rivals: Vec<Move> = self
                        .legal_moves()
                        .into_iter()
                        .filter(|other| {
                            other.to == mv.to
                                && other.from != mv.from
                                && self.get_piece(other.from) == Some(piece)
                        })
                        .collect();
                    if !rivals.is_empty() {
                        if rivals.iter().all(|other| other.from.file != mv.from.file) {
                            san.push(mv.from.file_char());
                        } else if rivals.iter().all(|other| other.from.rank != mv.from.rank) {
                            san.push(mv.from.rank_char());
                        } else {
                            san.push_str(&mv.from.to_string());
                        }
                    }
                }
            }

            if is_capture {
                san.push('x');
            }
            san.push_str(&mv.to.to_string());
            if let Some(promotion) = mv.promotion {
                san.push('=');
                san.push_str(&promotion.to_string());
            }
        }

        let mut next = self.clone();
        next.apply(mv);
        if next.in_check() {
            san.push(if next.legal_moves().is_empty() { '#' } else { '+' });
        }
        san
    }

    /// Resolve a SAN string (check marks, annotations and `=` optional)
    pub fn parse_san(&self, text: &str) -> Result<Move, ChessError> {
        fn normalise(s: &str) -> String {
            s.trim()
                .replace("0-0-0", "O-O-O")
                .replace("0-0", "O-O")
                .chars()
                .filter(|c| !matches!(c, '+' | '#' | '!' | '?' | '='))
                .collect()
        }

        let wanted = normalise(text);
        if wanted.is_empty() {
            return Err(ChessError::InvalidMove("empty SAN string".to_string()));
        }

        self.legal_moves()
            .into_iter()
            .find(|&mv| normalise(&self.san(mv)) == wanted)
            .ok_or_else(|| {
                ChessError::InvalidMove(format!("'{text}' is not a legal move in {}", self.to_fen()))
            })
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn perft(board: &Board, depth: u32) -> u64 {
        if depth == 0 {
            return 1;
        }
        board
            .legal_moves()
            .into_iter()
            .map(|mv| {
                let mut next = board.clone();
                next.apply(mv);
                perft(&next, depth - 1)
            })
            .sum()
    }

    #[test]
    fn test_starting_position_round_trips_through_fen() {
        let board = Board::new();
        assert_eq!(board.to_fen(), STARTING_FEN);
        assert_eq!(Board::from_fen(STARTING_FEN).unwrap(), board);
    }

    #[test]
    fn test_perft_from_start() {
        let board = Board::new();
        assert_eq!(perft(&board, 1), 20);
        assert_eq!(perft(&board, 2), 400);
        assert_eq!(perft(&board, 3), 8902);
    }

    #[test]
    fn test_perft_castling_and_promotion_heavy_position() {
        let board =
            Board::from_fen("r3k2r/p1ppqpb1/bn2pnp1/3PN3/1p2P3/2N2Q1p/PPPBBPPP/R3K2R w KQkq - 0 1")
                .unwrap();
        assert_eq!(perft(&board, 1), 48);
        assert_eq!(perft(&board, 2), 2039);
    }

    #[test]
    fn test_perft_en_passant_pins() {
        let board = Board::from_fen("8/2p5/3p4/KP5r/1R3p1k/8/4P1P1/8 w - - 0 1").unwrap();
        assert_eq!(perft(&board, 1), 14);
        assert_eq!(perft(&board, 2), 191);
        assert_eq!(perft(&board, 3), 2812);
    }

    #[test]
    fn test_checkmate_is_game_over() {
        // Fool's mate
        let board =
            Board::from_fen("rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3")
                .unwrap();
        assert!(board.in_check());
        assert!(board.legal_moves().is_empty());
        assert!(board.is_game_over());
    }

    #[test]
    fn test_san_rendering_and_parsing() {
        let board = Board::new();
        let e4 = board.parse_san("e4").unwrap();
        assert_eq!(e4.to_string(), "e2e4");
        assert_eq!(board.san(e4), "e4");
        assert_eq!(board.parse_san("Nf3").unwrap().to_string(), "g1f3");
        assert!(board.parse_san("Ke2").is_err());

        let castle = Board::from_fen("r3k2r/8/8/8/8/8/8/R3K2R w KQkq - 0 1").unwrap();
        assert_eq!(castle.parse_san("O-O").unwrap().to_string(), "e1g1");
        assert_eq!(castle.parse_san("0-0-0").unwrap().to_string(), "e1c1");

        let knights = Board::from_fen("4k3/8/8/8/8/8/8/1N2KN2 w - - 0 1").unwrap();
        let mv = knights.parse_san("Nbd2").unwrap();
        assert_eq!(mv.to_string(), "b1d2");
    }

    #[test]
    fn test_rejects_malformed_fen() {
        assert!(Board::from_fen("").is_err());
        assert!(Board::from_fen("X Y Z").is_err());
        assert!(Board::from_fen("8/8/8/8/8/8/8/8 w - - 0 1").is_err());
        assert!(Board::from_fen("rnbqkbnr/pppppppp/9/8/8/8/PPPPPPPP/RNBQKBNR w KQkq - 0 1").is_err());
    }
}
