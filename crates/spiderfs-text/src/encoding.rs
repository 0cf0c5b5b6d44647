//! Encoding detection, decoding and encoding.
//!
//! Labels follow the WHATWG Encoding Standard as implemented by
//! `encoding_rs`, so `latin1` resolves to `windows-1252` and `utf-16` to
//! `UTF-16LE`. Detection sniffs a byte-order mark first, then accepts valid
//! UTF-8, and only then falls back to `chardetng`'s statistical guess.
//!
//! Unpaired surrogates never reach a Rust `String`: a lone UTF-16 code unit,
//! or its generalised UTF-8 spelling (`ED A0..BF ..`), is a malformed
//! sequence. [`DecodePolicy::Ignore`] drops it, [`DecodePolicy::Replace`]
//! substitutes U+FFFD and [`DecodePolicy::Strict`] reports the byte offset.

use std::borrow::Cow;
use std::fmt;

use chardetng::EncodingDetector;
use encoding_rs::{DecoderResult, Encoding, REPLACEMENT, UTF_8, UTF_16BE, UTF_16LE};
use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumString};

use crate::error::TextError;

/// How malformed byte sequences are treated while decoding.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Deserialize, Serialize, EnumString, Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum DecodePolicy {
    /// Fail on the first malformed sequence.
    #[default]
    Strict,
    /// Drop malformed sequences.
    Ignore,
    /// Substitute U+FFFD for each malformed sequence.
    Replace,
}

/// A resolved text encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextEncoding(&'static Encoding);

impl TextEncoding {
    /// UTF-8, the default when no encoding is supplied.
    #[must_use]
    pub fn utf8() -> Self {
        Self(UTF_8)
    }

    /// Resolves a user-supplied label such as `utf-8`, `latin1` or
    /// `utf-16be`.
    ///
    /// # Errors
    ///
    /// Returns [`TextError::UnknownEncoding`] when the label is not part of
    /// the Encoding Standard or names the write-only `replacement` encoding.
    pub fn for_label(label: &str) -> Result<Self, TextError> {
        match Encoding::for_label(label.as_bytes()) {
            Some(encoding) if encoding != REPLACEMENT => Ok(Self(encoding)),
            _ => Err(TextError::UnknownEncoding {
                label: label.to_owned(),
            }),
        }
    }

    /// Canonical name of the encoding.
    #[must_use]
    pub fn name(self) -> &'static str {
        self.0.name()
    }

    /// Width in bytes of the code unit that carries line terminators.
    #[must_use]
    pub fn unit_width(self) -> u64 {
        if self.is_utf16() { 2 } else { 1 }
    }

    /// True for the two UTF-16 byte orders.
    #[must_use]
    pub fn is_utf16(self) -> bool {
        self.0 == UTF_16LE || self.0 == UTF_16BE
    }

    /// True when code units are stored most significant byte first.
    #[must_use]
    pub fn is_big_endian(self) -> bool {
        self.0 == UTF_16BE
    }

    /// Length of this encoding's byte-order mark at the start of `bytes`,
    /// or zero when no matching mark is present.
    #[must_use]
    pub fn bom_len(self, bytes: &[u8]) -> usize {
        match Encoding::for_bom(bytes) {
            Some((encoding, len)) if encoding == self.0 => len,
            _ => 0,
        }
    }

    /// Encoding announced by a byte-order mark at the start of `bytes`,
    /// with the mark's length.
    #[must_use]
    pub fn sniff_bom(bytes: &[u8]) -> Option<(Self, usize)> {
        Encoding::for_bom(bytes).map(|(encoding, len)| (Self(encoding), len))
    }

    pub(crate) const fn inner(self) -> &'static Encoding {
        self.0
    }
}

impl Default for TextEncoding {
    fn default() -> Self {
        Self::utf8()
    }
}

impl fmt::Debug for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("TextEncoding").field(&self.name()).finish()
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for TextEncoding {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

/// Guesses the encoding of `bytes`.
///
/// `bytes` may be a prefix of a larger file; a multi-byte UTF-8 sequence cut
/// off at the end of the sample does not disqualify UTF-8.
#[must_use]
pub fn detect(bytes: &[u8]) -> TextEncoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return TextEncoding(encoding);
    }
    match std::str::from_utf8(bytes) {
        Ok(_) => return TextEncoding::utf8(),
        Err(error) if error.error_len().is_none() => return TextEncoding::utf8(),
        Err(_) => {}
    }
    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    TextEncoding(detector.guess(None, true))
}

/// Decodes `bytes`, which must not include a byte-order mark.
///
/// # Errors
///
/// With [`DecodePolicy::Strict`], returns [`TextError::Decode`] carrying the
/// offset of the first malformed sequence. The other policies never fail.
pub fn decode(
    bytes: &[u8],
    encoding: TextEncoding,
    policy: DecodePolicy,
) -> Result<Cow<'_, str>, TextError> {
    let inner = encoding.inner();
    match policy {
        DecodePolicy::Replace => Ok(inner.decode_without_bom_handling(bytes).0),
        DecodePolicy::Strict | DecodePolicy::Ignore => {
            if let Some(text) = inner.decode_without_bom_handling_and_without_replacement(bytes) {
                return Ok(text);
            }
            decode_slow(bytes, encoding, policy == DecodePolicy::Ignore).map(Cow::Owned)
        }
    }
}

fn decode_slow(bytes: &[u8], encoding: TextEncoding, skip_malformed: bool) -> Result<String, TextError> {
    let mut decoder = encoding.inner().new_decoder_without_bom_handling();
    let mut output = String::new();
    let mut consumed = 0usize;
    loop {
        let remaining = bytes.get(consumed..).unwrap_or_default();
        let needed = decoder
            .max_utf8_buffer_length_without_replacement(remaining.len())
            .unwrap_or(remaining.len());
        output.reserve(needed.max(4));
        let (result, read) = decoder.decode_to_string_without_replacement(remaining, &mut output, true);
        consumed += read;
        match result {
            DecoderResult::InputEmpty => return Ok(output),
            DecoderResult::OutputFull => {}
            DecoderResult::Malformed(bad, pending) => {
                if !skip_malformed {
                    let offset = consumed
                        .saturating_sub(usize::from(pending))
                        .saturating_sub(usize::from(bad));
                    return Err(TextError::Decode {
                        encoding: encoding.name(),
                        offset,
                    });
                }
            }
        }
    }
}

/// Encodes `text` into `encoding` without a byte-order mark.
///
/// # Errors
///
/// Returns [`TextError::Unrepresentable`] naming the first character the
/// target encoding cannot express.
pub fn encode(text: &str, encoding: TextEncoding) -> Result<Cow<'_, [u8]>, TextError> {
    if encoding.is_utf16() {
        return Ok(Cow::Owned(encode_utf16(text, encoding.is_big_endian())));
    }
    let (bytes, _, had_errors) = encoding.inner().encode(text);
    if !had_errors {
        return Ok(bytes);
    }
    let mut scratch = [0u8; 4];
    let character = text
        .chars()
        .find(|c| encoding.inner().encode(c.encode_utf8(&mut scratch)).2)
        .unwrap_or(char::REPLACEMENT_CHARACTER);
    Err(TextError::Unrepresentable {
        encoding: encoding.name(),
        character,
    })
}

fn encode_utf16(text: &str, big_endian: bool) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(text.len() * 2);
    for unit in text.encode_utf16() {
        let high = u8::try_from(unit >> 8).unwrap_or(u8::MAX);
        let low = u8::try_from(unit & 0x00FF).unwrap_or(u8::MAX);
        if big_endian {
            bytes.extend_from_slice(&[high, low]);
        } else {
            bytes.extend_from_slice(&[low, high]);
        }
    }
    bytes
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    const LONE_SURROGATE_UTF8: &[u8] = b"a\xED\xA0\x80b";
    const LONE_SURROGATE_UTF16LE: &[u8] = &[0x61, 0x00, 0x00, 0xD8, 0x62, 0x00];

    fn utf16le() -> TextEncoding {
        TextEncoding::for_label("utf-16le").expect("utf-16le label")
    }

    #[rstest]
    #[case("utf-8", "UTF-8")]
    #[case("UTF8", "UTF-8")]
    #[case("latin1", "windows-1252")]
    #[case("utf-16be", "UTF-16BE")]
    fn resolves_labels(#[case] label: &str, #[case] expected: &str) {
        let encoding = TextEncoding::for_label(label).expect("known label");
        assert_eq!(encoding.name(), expected);
    }

    #[rstest]
    #[case("klingon")]
    #[case("iso-2022-kr")]
    fn rejects_unknown_labels(#[case] label: &str) {
        let error = TextEncoding::for_label(label).expect_err("label should be rejected");
        assert!(matches!(error, TextError::UnknownEncoding { .. }));
    }

    #[test]
    fn detect_prefers_bom() {
        assert_eq!(detect(&[0xFF, 0xFE, 0x61, 0x00]).name(), "UTF-16LE");
        assert_eq!(detect(&[0xFE, 0xFF, 0x00, 0x61]).name(), "UTF-16BE");
        assert_eq!(detect(b"\xEF\xBB\xBFplain").name(), "UTF-8");
    }

    #[test]
    fn detect_accepts_truncated_utf8_sample() {
        // "é" split after its lead byte.
        assert_eq!(detect(b"caf\xC3").name(), "UTF-8");
    }

    #[test]
    fn detect_falls_back_to_statistics() {
        let latin = b"Les \xE9l\xE8ves \xE9taient tr\xE8s contents de la f\xEAte de l'\xE9t\xE9.";
        let guessed = detect(latin);
        assert_ne!(guessed.name(), "UTF-8");
        let text = decode(latin, guessed, DecodePolicy::Strict).expect("decodes with guess");
        assert!(text.contains("été"));
    }

    #[test]
    fn ignore_drops_lone_surrogate() {
        let text = decode(LONE_SURROGATE_UTF8, TextEncoding::utf8(), DecodePolicy::Ignore)
            .expect("ignore never fails");
        assert_eq!(text, "ab");

        let wide = decode(LONE_SURROGATE_UTF16LE, utf16le(), DecodePolicy::Ignore)
            .expect("ignore never fails");
        assert_eq!(wide, "ab");
    }

    #[test]
    fn replace_substitutes_placeholder() {
        let text = decode(LONE_SURROGATE_UTF8, TextEncoding::utf8(), DecodePolicy::Replace)
            .expect("replace never fails");
        assert!(text.starts_with('a'));
        assert!(text.ends_with('b'));
        assert!(text.contains(char::REPLACEMENT_CHARACTER));
    }

    #[rstest]
    #[case(LONE_SURROGATE_UTF8, TextEncoding::utf8(), 1)]
    #[case(LONE_SURROGATE_UTF16LE, utf16le(), 2)]
    fn strict_reports_offset(
        #[case] bytes: &[u8],
        #[case] encoding: TextEncoding,
        #[case] expected_offset: usize,
    ) {
        let error = decode(bytes, encoding, DecodePolicy::Strict).expect_err("strict rejects");
        let TextError::Decode { offset, .. } = error else {
            panic!("expected decode error, got {error:?}");
        };
        assert_eq!(offset, expected_offset);
    }

    #[test]
    fn valid_multibyte_sequences_survive_every_policy() {
        let source = "naïve 日本語 🦀";
        for policy in [DecodePolicy::Strict, DecodePolicy::Ignore, DecodePolicy::Replace] {
            let text = decode(source.as_bytes(), TextEncoding::utf8(), policy).expect("valid utf-8");
            assert_eq!(text, source);
        }
    }

    #[test]
    fn encodes_utf16_in_both_byte_orders() {
        let le = encode("a\n", utf16le()).expect("encodable");
        assert_eq!(le.as_ref(), &[0x61, 0x00, 0x0A, 0x00]);
        let be = encode("a\n", TextEncoding::for_label("utf-16be").expect("label"))
            .expect("encodable");
        assert_eq!(be.as_ref(), &[0x00, 0x61, 0x00, 0x0A]);
    }

    #[test]
    fn encode_reports_unrepresentable_character() {
        let latin = TextEncoding::for_label("latin1").expect("label");
        let error = encode("price: 5€ or 5₽", latin).expect_err("rouble is not in windows-1252");
        let TextError::Unrepresentable { character, .. } = error else {
            panic!("expected unrepresentable error, got {error:?}");
        };
        assert_eq!(character, '₽');
    }

    #[test]
    fn policy_parses_from_config_spelling() {
        assert_eq!("replace".parse::<DecodePolicy>().ok(), Some(DecodePolicy::Replace));
        assert_eq!(DecodePolicy::Ignore.to_string(), "ignore");
    }
}
