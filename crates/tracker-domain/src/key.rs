//! Human-readable ticket keys: `SENS-3` for board tickets and `SENS-3.1`,
//! `SENS-3.1.2` for sub-tickets.

use tracker_core::{TrackerError, TrackerResult};

pub fn ticket_key(prefix: &str, counter: u32) -> String {
    format!("{}-{}", prefix, counter)
}

pub fn sub_ticket_key(parent_key: &str, ordinal: u32) -> String {
    format!("{}.{}", parent_key, ordinal)
}

/// A parsed key: board prefix plus the ordinal path (`SENS-3.1` is
/// `("SENS", [3, 1])`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedKey {
    pub prefix: String,
    pub path: Vec<u32>,
}

impl ParsedKey {
    pub fn depth(&self) -> usize {
        self.path.len().saturating_sub(1)
    }

    pub fn is_sub_ticket(&self) -> bool {
        self.path.len() > 1
    }
}

pub fn parse_key(key: &str) -> TrackerResult<ParsedKey> {
    let invalid = || TrackerError::Validation(format!("Malformed ticket key '{}'", key));
    let (prefix, rest) = key.split_once('-').ok_or_else(invalid)?;
    crate::validation::validate_prefix(prefix).map_err(|_| invalid())?;

    let path = rest
        .split('.')
        .map(|part| match part.parse::<u32>() {
            Ok(n) if n > 0 && !part.starts_with('+') => Ok(n),
            _ => Err(invalid()),
        })
        .collect::<TrackerResult<Vec<_>>>()?;

    Ok(ParsedKey {
        prefix: prefix.to_string(),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ticket_key() {
        assert_eq!(ticket_key("SENS", 1), "SENS-1");
        assert_eq!(sub_ticket_key("SENS-1", 1), "SENS-1.1");
        assert_eq!(sub_ticket_key("SENS-3.1", 2), "SENS-3.1.2");
    }

    #[test]
    fn test_parse_key() {
        let parsed = parse_key("SENS-3").unwrap();
        assert_eq!(parsed.prefix, "SENS");
        assert_eq!(parsed.path, vec![3]);
        assert!(!parsed.is_sub_ticket());

        let parsed = parse_key("OPS-12.4.1").unwrap();
        assert_eq!(parsed.path, vec![12, 4, 1]);
        assert_eq!(parsed.depth(), 2);
    }

    #[test]
    fn test_parse_key_rejects_malformed() {
        for key in ["SENS", "sens-1", "SENS-", "SENS-0", "SENS-1.", "SENS-a", "TOOLONG-1", "SENS-+1"] {
            assert!(parse_key(key).is_err(), "{} should be rejected", key);
        }
    }
}
