//! Deterministic asset-key derivation.
//!
//! Every item carries a stable 128-bit hex handle derived from its text,
//! used to look up pre-generated audio assets out of band ("does an audio
//! file exist for this exact text"). The per-kind salt keeps a word and a
//! sentence with identical text from sharing an asset. The key is not a
//! credential and the salt is a fixed constant, not a secret.

use crate::models::ContentKind;

const WORD_SALT: &str = "word-tts";
const SENTENCE_SALT: &str = "sentence-tts";
const SHADOWING_SALT: &str = "shadowing-tts";

/// Derive the asset-lookup key for `text` under the given content kind.
/// Pure and total: same inputs always produce the same 32-char hex digest.
pub fn derive_key(kind: ContentKind, text: &str) -> String {
    let salt = match kind {
        ContentKind::Word => WORD_SALT,
        ContentKind::Sentence => SENTENCE_SALT,
        ContentKind::Shadowing => SHADOWING_SALT,
    };
    format!("{:x}", md5::compute(format!("{}{}", text, salt)))
}
