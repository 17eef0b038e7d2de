//! Envelope codec
//!
//! Builds and parses the wire form of a resolver message: one tagged
//! element per envelope, the tag being the channel name. The element body
//! is the postcard encoding of the document, optionally gzip-compressed
//! and marked with the gzip media type.

use std::borrow::Cow;
use std::io::{Read, Write};

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;

use mycel_core::{Envelope, PayloadElement, GZIP_MEDIA_TYPE, NATIVE_MEDIA_TYPE};

use crate::error::CodecError;

/// Encode a document into a fresh single-element envelope
pub fn encode<T: Serialize>(
    tag: &str,
    document: &T,
    compress: bool,
) -> Result<Envelope, CodecError> {
    let mut envelope = Envelope::new();
    envelope.add_element(encode_element(tag, document, compress)?);
    Ok(envelope)
}

/// Encode a document into a tagged element
pub(crate) fn encode_element<T: Serialize>(
    tag: &str,
    document: &T,
    compress: bool,
) -> Result<PayloadElement, CodecError> {
    let bytes = postcard::to_allocvec(document).map_err(CodecError::Serialize)?;

    if compress {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(&bytes).map_err(CodecError::Compress)?;
        let deflated = encoder.finish().map_err(CodecError::Compress)?;
        Ok(PayloadElement::new(tag, GZIP_MEDIA_TYPE, deflated))
    } else {
        Ok(PayloadElement::new(tag, NATIVE_MEDIA_TYPE, bytes))
    }
}

/// Decode the document carried by the element tagged `tag`
///
/// Inflates gzip-marked elements before parsing. A missing tag is the
/// malformed-message case: the envelope arrived on a channel it carries
/// no payload for.
pub fn decode<T: DeserializeOwned>(envelope: &Envelope, tag: &str) -> Result<T, CodecError> {
    let element = envelope
        .element(tag)
        .ok_or_else(|| CodecError::MissingElement(tag.to_string()))?;

    let bytes: Cow<'_, [u8]> = if element.is_compressed() {
        let mut decoder = GzDecoder::new(element.data.as_slice());
        let mut inflated = Vec::new();
        decoder
            .read_to_end(&mut inflated)
            .map_err(CodecError::Decompress)?;
        Cow::Owned(inflated)
    } else {
        Cow::Borrowed(&element.data)
    };

    postcard::from_bytes(&bytes).map_err(CodecError::Deserialize)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::{QueryMessage, SrdiMessage};
    use mycel_core::SimPeerId;

    fn make_query() -> QueryMessage<SimPeerId> {
        QueryMessage::new("search", 42, b"who has chunk 9?".to_vec())
    }

    #[test]
    fn test_roundtrip_uncompressed() {
        let query = make_query();
        let envelope = encode("gORes", &query, false).unwrap();

        let element = envelope.element("gORes").unwrap();
        assert_eq!(element.media_type, NATIVE_MEDIA_TYPE);

        let decoded: QueryMessage<SimPeerId> = decode(&envelope, "gORes").unwrap();
        assert_eq!(decoded, query);
    }

    #[test]
    fn test_roundtrip_compressed() {
        let msg = SrdiMessage::new("index", vec![7; 512]);
        let envelope = encode("gSrdi", &msg, true).unwrap();

        let element = envelope.element("gSrdi").unwrap();
        assert_eq!(element.media_type, GZIP_MEDIA_TYPE);
        // A long run of identical bytes deflates well below its raw size.
        assert!(element.data.len() < 512);

        let decoded: SrdiMessage = decode(&envelope, "gSrdi").unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_missing_tag_is_malformed() {
        let envelope = encode("gORes", &make_query(), false).unwrap();
        let err = decode::<QueryMessage<SimPeerId>>(&envelope, "gIRes").unwrap_err();
        assert!(matches!(err, CodecError::MissingElement(tag) if tag == "gIRes"));
    }

    #[test]
    fn test_corrupt_gzip_body_is_rejected() {
        let mut envelope = Envelope::new();
        envelope.add_element(PayloadElement::new(
            "gSrdi",
            GZIP_MEDIA_TYPE,
            vec![0xde, 0xad, 0xbe, 0xef],
        ));
        let err = decode::<SrdiMessage>(&envelope, "gSrdi").unwrap_err();
        assert!(matches!(err, CodecError::Decompress(_)));
    }

    #[test]
    fn test_truncated_native_body_is_rejected() {
        let envelope = encode("gORes", &make_query(), false).unwrap();
        let element = envelope.element("gORes").unwrap();

        let mut truncated = Envelope::new();
        truncated.add_element(PayloadElement::new(
            "gORes",
            NATIVE_MEDIA_TYPE,
            element.data[..element.data.len() / 2].to_vec(),
        ));
        let err = decode::<QueryMessage<SimPeerId>>(&truncated, "gORes").unwrap_err();
        assert!(matches!(err, CodecError::Deserialize(_)));
    }
}
