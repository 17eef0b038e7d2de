//! Wire envelope: a container of tagged payload elements
//!
//! Every resolver message travels as exactly one tagged element inside an
//! [`Envelope`]. The element tag is the logical channel name; the media
//! type records whether the element body is the native encoding or a
//! gzip-compressed form of it.

use serde::{Deserialize, Serialize};

/// Media type of an element carrying the native document encoding
pub const NATIVE_MEDIA_TYPE: &str = "application/x-postcard";

/// Media type of a gzip-compressed element
pub const GZIP_MEDIA_TYPE: &str = "application/gzip";

/// One tagged payload inside an envelope
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayloadElement {
    /// Element tag; resolver messages use the channel name
    pub tag: String,
    /// Media type of `data`
    pub media_type: String,
    /// The element body
    pub data: Vec<u8>,
}

impl PayloadElement {
    /// Create a new payload element
    pub fn new(tag: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            tag: tag.into(),
            media_type: media_type.into(),
            data,
        }
    }

    /// Whether the element body is gzip-compressed
    pub fn is_compressed(&self) -> bool {
        self.media_type == GZIP_MEDIA_TYPE
    }
}

/// Generic wire container of tagged payload elements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    elements: Vec<PayloadElement>,
}

impl Envelope {
    /// Create an empty envelope
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an element
    pub fn add_element(&mut self, element: PayloadElement) {
        self.elements.push(element);
    }

    /// Replace the element with the same tag, or append if none exists
    pub fn replace_element(&mut self, element: PayloadElement) {
        match self.elements.iter_mut().find(|e| e.tag == element.tag) {
            Some(existing) => *existing = element,
            None => self.elements.push(element),
        }
    }

    /// Find the element with the given tag
    pub fn element(&self, tag: &str) -> Option<&PayloadElement> {
        self.elements.iter().find(|e| e.tag == tag)
    }

    /// Number of elements in the envelope
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// Whether the envelope carries no elements
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_lookup_by_tag() {
        let mut env = Envelope::new();
        env.add_element(PayloadElement::new("gORes", NATIVE_MEDIA_TYPE, vec![1, 2]));
        env.add_element(PayloadElement::new("gSrdi", GZIP_MEDIA_TYPE, vec![3]));

        assert_eq!(env.len(), 2);
        assert_eq!(env.element("gORes").unwrap().data, vec![1, 2]);
        assert!(env.element("gSrdi").unwrap().is_compressed());
        assert!(env.element("gIRes").is_none());
    }

    #[test]
    fn test_replace_element_swaps_same_tag() {
        let mut env = Envelope::new();
        env.add_element(PayloadElement::new("gORes", NATIVE_MEDIA_TYPE, vec![1]));
        env.replace_element(PayloadElement::new("gORes", NATIVE_MEDIA_TYPE, vec![9]));

        assert_eq!(env.len(), 1);
        assert_eq!(env.element("gORes").unwrap().data, vec![9]);
    }

    #[test]
    fn test_replace_element_appends_when_absent() {
        let mut env = Envelope::new();
        env.replace_element(PayloadElement::new("gIRes", NATIVE_MEDIA_TYPE, vec![7]));
        assert_eq!(env.len(), 1);
    }
}
