//! A block: one line of G-code, already lexed into words.

use crate::modal_group::ModalGroup;
use crate::word::Word;
use crate::error::ValidateError;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Block(pub Vec<Word>);

impl Block {
    pub fn new(words: Vec<Word>) -> Self {
        Self(words)
    }

    /// First occurrence of `letter`'s argument, if present.
    pub fn arg(&self, letter: u8) -> Option<f64> {
        self.0.iter().find(|w| w.letter == letter).map(|w| w.arg)
    }

    /// Overwrites the first occurrence of `letter`; no-op if absent.
    pub fn set_arg(&mut self, letter: u8, val: f64) {
        if let Some(w) = self.0.iter_mut().find(|w| w.letter == letter) {
            w.arg = val;
        }
    }

    /// The words that aren't themselves a modal command (axis values,
    /// anything outside G/M/F's group table).
    pub fn args(&self) -> Block {
        Block(
            self.0
                .iter()
                .copied()
                .filter(|w| w.modal_group() == ModalGroup::None)
                .collect(),
        )
    }

    pub fn has_modal(&self) -> bool {
        self.0.iter().any(|w| w.modal_group() != ModalGroup::None)
    }

    /// Rejects a block with an invalid letter, a repeated non-`G` word, or
    /// two words from the same modal group.
    pub fn validate(&self) -> Result<(), ValidateError> {
        let mut seen_word = [false; 256];
        let mut seen_modal = [false; 256];

        for w in &self.0 {
            if !w.is_valid() {
                return Err(ValidateError::InvalidWord);
            }
            if w.letter != b'G' {
                if seen_word[w.letter as usize] {
                    return Err(ValidateError::RepeatedWord);
                }
                seen_word[w.letter as usize] = true;
            }
            if let Some(idx) = w.modal_group().index() {
                if seen_modal[idx] {
                    return Err(ValidateError::ConflictingModalGroup);
                }
                seen_modal[idx] = true;
            }
        }
        Ok(())
    }
}

impl fmt::Display for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for w in &self.0 {
            write!(f, "{w}")?;
        }
        Ok(())
    }
}

use std::fmt;

#[cfg(test)]
mod tests {
    use super::*;

    fn block(words: &[(u8, f64)]) -> Block {
        Block::new(words.iter().map(|&(l, a)| Word::new(l, a)).collect())
    }

    #[test]
    fn arg_finds_first_matching_letter() {
        let b = block(&[(b'G', 1.0), (b'X', 10.0)]);
        assert_eq!(b.arg(b'X'), Some(10.0));
        assert_eq!(b.arg(b'Z'), None);
    }

    #[test]
    fn set_arg_overwrites_existing_only() {
        let mut b = block(&[(b'X', 1.0)]);
        b.set_arg(b'X', 5.0);
        b.set_arg(b'Y', 99.0);
        assert_eq!(b.arg(b'X'), Some(5.0));
        assert_eq!(b.arg(b'Y'), None);
    }

    #[test]
    fn args_excludes_modal_command_words() {
        let b = block(&[(b'G', 1.0), (b'X', 10.0), (b'F', 500.0)]);
        assert_eq!(b.args(), block(&[(b'X', 10.0)]));
    }

    #[test]
    fn display_concatenates_words_with_no_separator() {
        let b = block(&[(b'G', 1.0), (b'G', 2.0)]);
        assert_eq!(b.to_string(), "G1G2");
    }

    #[test]
    fn validate_rejects_duplicate_motion_codes() {
        let b = block(&[(b'G', 0.0), (b'G', 1.0)]);
        assert_eq!(b.validate(), Err(ValidateError::ConflictingModalGroup));
    }

    #[test]
    fn validate_rejects_repeated_non_g_word() {
        let b = block(&[(b'X', 1.0), (b'X', 2.0)]);
        assert_eq!(b.validate(), Err(ValidateError::RepeatedWord));
    }

    #[test]
    fn validate_accepts_a_typical_move() {
        let b = block(&[(b'G', 1.0), (b'X', 1.0), (b'Y', 2.0), (b'F', 500.0)]);
        assert!(b.validate().is_ok());
    }
}
