use std::fmt;
use url::Url;

use crate::ScannerError;

/// Query parameter of the hosting page that carries the operator identity.
pub const IDENTITY_QUERY_PARAM: &str = "user_id";

const MIN_LEN: usize = 4;
const MAX_LEN: usize = 6;

/// Operator session identity. Only constructed through [`IdentityToken::parse`],
/// so holding one means the format check already passed.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IdentityToken(String);

impl IdentityToken {
    pub fn parse(raw: &str) -> Result<Self, ScannerError> {
        if is_valid_identity(raw) {
            Ok(Self(raw.to_string()))
        } else {
            Err(ScannerError::InvalidIdentity(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 4 to 6 characters, ASCII letters and digits only.
pub fn is_valid_identity(raw: &str) -> bool {
    (MIN_LEN..=MAX_LEN).contains(&raw.len()) && raw.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Pulls the raw identity out of the hosting page URL, e.g.
/// `http://host/?user_id=ab12`. The value is not validated here.
pub fn identity_from_query(page: &Url) -> Option<String> {
    page.query_pairs()
        .find(|(k, _)| k == IDENTITY_QUERY_PARAM)
        .map(|(_, v)| v.into_owned())
}
