// src/protocol/metadata.rs
//! Metadata key/value encoding: record separator `0x01` between pairs,
//! field separator `0x02` between key and value within a pair.

use crate::error::{CoreError, CoreResult};

const RECORD_SEP: u8 = 0x01;
const FIELD_SEP: u8 = 0x02;

/// Encodes an ordered list of key/value pairs into the wire form.
///
/// Order is preserved exactly — FastDFS metadata is a sequence, not a set,
/// and this core never deduplicates or sorts keys on a caller's behalf.
pub fn encode(pairs: &[(String, String)]) -> Vec<u8> {
    let mut out = Vec::new();
    for (i, (k, v)) in pairs.iter().enumerate() {
        if i > 0 {
            out.push(RECORD_SEP);
        }
        out.extend_from_slice(k.as_bytes());
        out.push(FIELD_SEP);
        out.extend_from_slice(v.as_bytes());
    }
    out
}

/// Decodes the wire form back into ordered key/value pairs.
///
/// `Protocol` error if any record is missing its field separator. An empty
/// input decodes to an empty list.
pub fn decode(bytes: &[u8]) -> CoreResult<Vec<(String, String)>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    bytes
        .split(|&b| b == RECORD_SEP)
        .map(|record| {
            let idx = record
                .iter()
                .position(|&b| b == FIELD_SEP)
                .ok_or_else(|| CoreError::Protocol("metadata record missing field separator".into()))?;
            let key = String::from_utf8_lossy(&record[..idx]).into_owned();
            let val = String::from_utf8_lossy(&record[idx + 1..]).into_owned();
            Ok((key, val))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_multiple_pairs_in_order() {
        let pairs = vec![
            ("width".to_string(), "800".to_string()),
            ("height".to_string(), "600".to_string()),
            ("author".to_string(), "jane doe".to_string()),
        ];
        let wire = encode(&pairs);
        assert_eq!(decode(&wire).unwrap(), pairs);
    }

    #[test]
    fn empty_list_round_trips() {
        assert_eq!(encode(&[]), Vec::<u8>::new());
        assert_eq!(decode(&[]).unwrap(), Vec::<(String, String)>::new());
    }

    #[test]
    fn single_pair_has_no_record_separator() {
        let pairs = vec![("k".to_string(), "v".to_string())];
        let wire = encode(&pairs);
        assert!(!wire.contains(&RECORD_SEP));
        assert_eq!(decode(&wire).unwrap(), pairs);
    }

    #[test]
    fn missing_field_separator_is_protocol_error() {
        let bad = b"keyonly".to_vec();
        assert!(matches!(decode(&bad), Err(CoreError::Protocol(_))));
    }
}
