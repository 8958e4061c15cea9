//! Frame tokenizer.
//!
//! Every message from the command station is a single bracketed frame:
//!
//! ```text
//! <opcode param param "quoted text" KEYWORD ...>
//! ```
//!
//! The tokenizer only splits a frame into its opcode and parameters; it knows
//! nothing about what the opcodes mean. Parameters come in three wire shapes:
//!
//! - **Numbers**: an optional `-` followed by decimal digits.
//! - **Keywords**: runs of letters, digits and `_` that are not purely numeric.
//!   They are folded into an integer with [`keyword_hash`] so callers can
//!   compare them against constants in [`keyword`] without allocating.
//! - **Text**: anything between a pair of double quotes.
//!
//! Numbers and keywords both surface as [`Param::Number`]. Text surfaces as
//! [`Param::Text`] borrowing straight from the input buffer, so parsing never
//! copies. Copy the text out before the buffer is dropped if it must outlive
//! the frame.
//!
//! The `i` opcode (server banner) breaks the rules: everything between the
//! opcode and the closing `>` is captured verbatim as one text parameter.

use crate::error::FrameError;

/// Default cap on the number of parameters in one frame.
pub const DEFAULT_MAX_PARAMS: usize = 50;

/// Opcode of the server self-description banner.
const INFO_OPCODE: char = 'i';

/// Fold a keyword into the integer the tokenizer stores for it.
///
/// Each character is uppercased and mixed in as `hash * 33 ^ upper`, with
/// 32-bit wrapping arithmetic.
pub const fn keyword_hash(word: &str) -> i32 {
    let bytes = word.as_bytes();
    let mut hash: i32 = 0;
    let mut i = 0;
    while i < bytes.len() {
        hash = mix_keyword(hash, bytes[i]);
        i += 1;
    }
    hash
}

const fn mix_keyword(hash: i32, ch: u8) -> i32 {
    hash.wrapping_shl(5).wrapping_add(hash) ^ (ch.to_ascii_uppercase() as i32)
}

/// Hashed values of the keywords the protocol uses.
pub mod keyword {
    use super::keyword_hash;

    /// `MAIN` track.
    pub const MAIN: i32 = keyword_hash("MAIN");
    /// `PROG` track.
    pub const PROG: i32 = keyword_hash("PROG");
    /// `DC` track mode.
    pub const DC: i32 = keyword_hash("DC");
    /// `DCX` (reverse polarity DC) track mode.
    pub const DCX: i32 = keyword_hash("DCX");
    /// `NONE` track mode.
    pub const NONE: i32 = keyword_hash("NONE");
    /// `A`: route/automation list selector and automation route type.
    pub const A: i32 = keyword_hash("A");
    /// `C`: closed turnout state.
    pub const C: i32 = keyword_hash("C");
    /// `O`: turntable list selector.
    pub const O: i32 = keyword_hash("O");
    /// `P`: turntable position list selector.
    pub const P: i32 = keyword_hash("P");
    /// `R`: roster list selector and plain route type.
    pub const R: i32 = keyword_hash("R");
    /// `T`: turnout list selector and thrown turnout state.
    pub const T: i32 = keyword_hash("T");
}

/// A single frame parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Param<'a> {
    /// A signed number or a hashed keyword.
    Number(i32),
    /// A quoted string, borrowed from the parsed buffer.
    Text(&'a str),
}

impl<'a> Param<'a> {
    /// The numeric value, if this is not a text parameter.
    pub fn as_number(&self) -> Option<i32> {
        match self {
            Param::Number(n) => Some(*n),
            Param::Text(_) => None,
        }
    }

    /// The text value, if this is a text parameter.
    pub fn as_text(&self) -> Option<&'a str> {
        match *self {
            Param::Text(s) => Some(s),
            Param::Number(_) => None,
        }
    }

    /// Whether the parameter was quoted on the wire.
    pub fn is_text(&self) -> bool {
        matches!(self, Param::Text(_))
    }
}

/// One tokenized frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame<'a> {
    opcode: char,
    params: Vec<Param<'a>>,
}

impl<'a> Frame<'a> {
    /// The opcode character.
    pub fn opcode(&self) -> char {
        self.opcode
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Whether the frame has no parameters.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// All parameters in wire order.
    pub fn params(&self) -> &[Param<'a>] {
        &self.params
    }

    /// Parameter at `index`, if present.
    pub fn param(&self, index: usize) -> Option<Param<'a>> {
        self.params.get(index).copied()
    }

    /// Numeric value of parameter `index`.
    ///
    /// Missing and text parameters read as `0`.
    pub fn number(&self, index: usize) -> i32 {
        self.param(index).and_then(|p| p.as_number()).unwrap_or(0)
    }

    /// Whether parameter `index` exists and is text.
    pub fn is_text(&self, index: usize) -> bool {
        self.param(index).is_some_and(|p| p.is_text())
    }

    /// Text of parameter `index`, if it exists and is text.
    pub fn text(&self, index: usize) -> Option<&'a str> {
        self.param(index).and_then(|p| p.as_text())
    }
}

#[derive(Debug, Clone, Copy)]
enum SplitState {
    FindStart,
    Opcode,
    SkipSpaces,
    CheckSign,
    BuildParam { start: usize, keyword: bool },
    Text { start: usize },
    InfoText { start: usize },
}

/// Splits raw frames into opcode and parameters.
#[derive(Debug, Clone, Copy)]
pub struct Tokenizer {
    max_params: usize,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_PARAMS)
    }
}

impl Tokenizer {
    /// Create a tokenizer accepting at most `max_params` parameters per frame.
    pub fn new(max_params: usize) -> Self {
        Tokenizer { max_params }
    }

    /// The configured parameter cap.
    pub fn max_params(&self) -> usize {
        self.max_params
    }

    /// Tokenize the first frame found in `input`.
    ///
    /// Anything before the first `<` is skipped. Characters that cannot start
    /// a parameter are skipped as separators.
    pub fn parse<'a>(&self, input: &'a str) -> Result<Frame<'a>, FrameError> {
        let bytes = input.as_bytes();
        let mut state = SplitState::FindStart;
        let mut opcode = '\0';
        let mut params = Vec::new();
        let mut value: i32 = 0;
        let mut negative = false;
        let mut pos = 0;

        // `continue` rescans the current byte, falling through advances.
        while pos < bytes.len() {
            let hot = bytes[pos];
            match state {
                SplitState::FindStart => {
                    if hot == b'<' {
                        state = SplitState::Opcode;
                    }
                }
                SplitState::Opcode => {
                    let Some(ch) = input[pos..].chars().next() else {
                        break;
                    };
                    if ch == '>' {
                        return Err(FrameError::MissingOpcode);
                    }
                    opcode = ch;
                    pos += ch.len_utf8();
                    state = if ch == INFO_OPCODE {
                        SplitState::InfoText { start: pos }
                    } else {
                        SplitState::SkipSpaces
                    };
                    continue;
                }
                SplitState::SkipSpaces => {
                    if hot == b'>' {
                        return Ok(Frame { opcode, params });
                    }
                    if !hot.is_ascii_whitespace() {
                        state = SplitState::CheckSign;
                        continue;
                    }
                }
                SplitState::CheckSign => {
                    if hot == b'"' {
                        state = SplitState::Text { start: pos + 1 };
                    } else if hot == b'-' {
                        value = 0;
                        negative = true;
                        state = SplitState::BuildParam {
                            start: pos + 1,
                            keyword: false,
                        };
                    } else if hot.is_ascii_alphanumeric() || hot == b'_' {
                        value = 0;
                        negative = false;
                        state = SplitState::BuildParam {
                            start: pos,
                            keyword: false,
                        };
                        continue;
                    } else {
                        state = SplitState::SkipSpaces;
                    }
                }
                SplitState::BuildParam { start, keyword } => {
                    if hot.is_ascii_digit() {
                        value = value.wrapping_mul(10).wrapping_add(i32::from(hot - b'0'));
                    } else if hot.is_ascii_alphabetic() || hot == b'_' {
                        state = SplitState::BuildParam { start, keyword: true };
                    } else {
                        // A token with any letter is hashed whole, digits included.
                        if keyword {
                            value = keyword_hash(&input[start..pos]);
                        }
                        let n = if negative { value.wrapping_neg() } else { value };
                        self.push(&mut params, Param::Number(n))?;
                        state = SplitState::SkipSpaces;
                        continue;
                    }
                }
                SplitState::Text { start } => {
                    if hot == b'"' {
                        self.push(&mut params, Param::Text(&input[start..pos]))?;
                        state = SplitState::SkipSpaces;
                    }
                }
                SplitState::InfoText { start } => {
                    if hot == b'>' {
                        self.push(&mut params, Param::Text(&input[start..pos]))?;
                        return Ok(Frame { opcode, params });
                    }
                }
            }
            pos += 1;
        }

        Err(match state {
            SplitState::FindStart => FrameError::MissingStart,
            SplitState::Opcode => FrameError::MissingOpcode,
            SplitState::Text { start } => FrameError::UnterminatedText { offset: start },
            _ => FrameError::Unterminated,
        })
    }

    fn push<'a>(&self, params: &mut Vec<Param<'a>>, param: Param<'a>) -> Result<(), FrameError> {
        if params.len() >= self.max_params {
            return Err(FrameError::TooManyParameters {
                max: self.max_params,
            });
        }
        params.push(param);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> Result<Frame<'_>, FrameError> {
        Tokenizer::default().parse(input)
    }

    #[test]
    fn test_keyword_hash_fold() {
        let mut expected: i32 = 0;
        for ch in "HELLO".bytes() {
            expected = expected.wrapping_mul(33) ^ i32::from(ch);
        }
        assert_eq!(keyword_hash("HELLO"), expected);
        assert_eq!(keyword_hash("hello"), expected);
        assert_eq!(keyword_hash("HELLO"), keyword_hash("HELLO"));
    }

    #[test]
    fn test_known_keyword_values() {
        assert_eq!(keyword::MAIN, 2698315);
        assert_eq!(keyword::PROG, 2788330);
        assert_eq!(keyword::DC, 2183);
        assert_eq!(keyword::DCX, 71999);
        assert_eq!(keyword::NONE, 2857034);
        assert_eq!(keyword::T, 'T' as i32);
    }

    #[test]
    fn test_text_parameter() {
        let frame = parse(r#"<m "Hello World">"#).unwrap();
        assert_eq!(frame.opcode(), 'm');
        assert_eq!(frame.len(), 1);
        assert!(frame.is_text(0));
        assert_eq!(frame.text(0), Some("Hello World"));
        assert_eq!(frame.number(0), 0);
    }

    #[test]
    fn test_numeric_parameter() {
        let frame = parse("<m 42>").unwrap();
        assert_eq!(frame.len(), 1);
        assert!(!frame.is_text(0));
        assert_eq!(frame.number(0), 42);
        assert_eq!(frame.text(0), None);
    }

    #[test]
    fn test_mixed_parameters() {
        let frame = parse(r#"<m "Text" 100 ABC>"#).unwrap();
        assert_eq!(frame.len(), 3);
        assert_eq!(frame.param(0), Some(Param::Text("Text")));
        assert_eq!(frame.param(1), Some(Param::Number(100)));
        assert_eq!(frame.param(2), Some(Param::Number(keyword_hash("ABC"))));
    }

    #[test]
    fn test_keyword_with_digits_matches_hash() {
        let frame = parse("<m DC1 A2B 3C>").unwrap();
        assert_eq!(frame.number(0), keyword_hash("DC1"));
        assert_eq!(frame.number(1), keyword_hash("A2B"));
        assert_eq!(frame.number(2), keyword_hash("3C"));
        assert_ne!(frame.number(0), keyword::DC);
    }

    #[test]
    fn test_negative_and_bare_sign() {
        let frame = parse("<m -17 - 5>").unwrap();
        assert_eq!(frame.params(), &[Param::Number(-17), Param::Number(0), Param::Number(5)]);
    }

    #[test]
    fn test_underscore_keyword() {
        let frame = parse("<m _>").unwrap();
        assert_eq!(frame.number(0), '_' as i32);
    }

    #[test]
    fn test_info_banner_captured_whole() {
        let frame = parse("<iHelloDcc>").unwrap();
        assert_eq!(frame.opcode(), 'i');
        assert_eq!(frame.len(), 1);
        assert_eq!(frame.text(0), Some("HelloDcc"));

        let frame = parse(r#"<iDCCEX V-5.0.4 / "MEGA">"#).unwrap();
        assert_eq!(frame.text(0), Some(r#"DCCEX V-5.0.4 / "MEGA""#));
    }

    #[test]
    fn test_no_parameters() {
        let frame = parse("<s>").unwrap();
        assert_eq!(frame.opcode(), 's');
        assert!(frame.is_empty());
    }

    #[test]
    fn test_leading_noise_is_skipped() {
        let frame = parse("xx\r\n<jR 1 2>").unwrap();
        assert_eq!(frame.opcode(), 'j');
        assert_eq!(frame.number(0), keyword::R);
        assert_eq!(frame.number(2), 2);
    }

    #[test]
    fn test_missing_close_fails() {
        assert_eq!(parse("<m 123"), Err(FrameError::Unterminated));
        assert_eq!(parse("m 123>"), Err(FrameError::MissingStart));
        assert_eq!(parse("<>"), Err(FrameError::MissingOpcode));
    }

    #[test]
    fn test_unterminated_text_fails() {
        assert_eq!(
            parse(r#"<m "abc>"#),
            Err(FrameError::UnterminatedText { offset: 4 })
        );
    }

    #[test]
    fn test_parameter_cap() {
        let tokenizer = Tokenizer::new(2);
        assert!(tokenizer.parse("<m 1 2>").is_ok());
        assert_eq!(
            tokenizer.parse("<m 1 2 3>"),
            Err(FrameError::TooManyParameters { max: 2 })
        );
    }
}
