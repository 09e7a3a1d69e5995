use chardetng::EncodingDetector;
use encoding_rs::{Encoding, UTF_8};

/// How an encoding was determined, strongest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confidence {
    /// A byte order mark.
    Bom,
    /// The bytes are valid UTF-8.
    Valid,
    /// The document declares its charset (HTML `<meta>`).
    Declared,
    /// Statistical guess.
    Guessed,
}

#[derive(Debug, Clone, Copy)]
pub struct DetectedEncoding {
    pub encoding: &'static Encoding,
    pub confidence: Confidence,
    /// Length of the BOM to strip before decoding.
    pub bom_len: usize,
}

/// Work out the encoding of `bytes`: BOM, then UTF-8 validity, then a
/// chardetng guess.
pub fn detect_encoding(bytes: &[u8]) -> DetectedEncoding {
    if let Some((encoding, bom_len)) = Encoding::for_bom(bytes) {
        return DetectedEncoding {
            encoding,
            confidence: Confidence::Bom,
            bom_len,
        };
    }

    if std::str::from_utf8(bytes).is_ok() {
        return DetectedEncoding {
            encoding: UTF_8,
            confidence: Confidence::Valid,
            bom_len: 0,
        };
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let encoding = detector.guess(None, true);
    tracing::debug!(encoding = encoding.name(), "guessed encoding");

    DetectedEncoding {
        encoding,
        confidence: Confidence::Guessed,
        bom_len: 0,
    }
}

/// Decode with a previously detected encoding. The flag is true when
/// malformed sequences were replaced with U+FFFD.
pub fn decode_with(bytes: &[u8], detected: &DetectedEncoding) -> (String, bool) {
    let body = bytes.get(detected.bom_len..).unwrap_or_default();
    let (text, had_errors) = detected.encoding.decode_without_bom_handling(body);
    (text.into_owned(), had_errors)
}

/// Detect and decode in one step.
pub fn decode(bytes: &[u8]) -> (String, &'static Encoding) {
    let detected = detect_encoding(bytes);
    let (text, _) = decode_with(bytes, &detected);
    (text, detected.encoding)
}
