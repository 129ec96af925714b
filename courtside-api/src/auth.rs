use serde::{Deserialize, Serialize};

/// The role of an account. Every mutating playoff operation requires
/// [`Role::Admin`].
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn from_u8(role: u8) -> Option<Self> {
        match role {
            1 => Some(Self::User),
            2 => Some(Self::Admin),
            _ => None,
        }
    }

    #[inline]
    pub fn to_u8(self) -> u8 {
        match self {
            Self::User => 1,
            Self::Admin => 2,
        }
    }
}

/// The claims carried by every token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject (user id)
    pub sub: u64,
    /// Role of the subject
    #[serde(default)]
    pub role: Role,
    /// Issued at
    pub iat: u64,
    /// Not before time
    pub nbf: u64,
    /// Expiration time
    pub exp: u64,
}

impl Claims {
    pub fn new(sub: u64, role: Role) -> Self {
        Self {
            sub,
            role,
            iat: 0,
            nbf: 0,
            exp: 0,
        }
    }
}

/// A signed JWT together with its decoded claims.
///
/// `Token` does not validate the signature; that is the server's job. It only
/// splits the wire string and decodes the claims segment.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Token {
    token: String,
    claims: Claims,
}

impl Token {
    /// Parses a `Token` from its wire string, decoding the claims segment.
    ///
    /// # Errors
    ///
    /// Returns a [`TokenError`] if the string is not a three-segment JWT or
    /// the claims segment fails to decode.
    pub fn new<T>(token: T) -> Result<Self, TokenError>
    where
        T: ToString,
    {
        let token = token.to_string();

        let claims = token
            .split('.')
            .nth(1)
            .ok_or(TokenError::InvalidToken)?;
        let claims = base64::decode_config(claims, base64::URL_SAFE_NO_PAD)?;
        let claims = serde_json::from_slice(&claims)?;

        Ok(Self { token, claims })
    }

    /// Creates a `Token` from a wire string and already-decoded claims.
    #[inline]
    pub fn from_parts(token: String, claims: Claims) -> Self {
        Self { token, claims }
    }

    #[inline]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    #[inline]
    pub fn into_claims(self) -> Claims {
        self.claims
    }

    #[inline]
    pub fn into_token(self) -> String {
        self.token
    }
}

impl AsRef<str> for Token {
    #[inline]
    fn as_ref(&self) -> &str {
        &self.token
    }
}

impl std::fmt::Display for Token {
    #[inline]
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.token)
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.token == other.token
    }
}

impl TryFrom<String> for Token {
    type Error = TokenError;

    fn try_from(token: String) -> Result<Self, Self::Error> {
        Self::new(token)
    }
}

impl From<Token> for String {
    fn from(token: Token) -> Self {
        token.token
    }
}

/// A pair of two tokens. The `auth_token` is used to make requests, the
/// `refresh_token` only to request a new pair.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TokenPair {
    pub auth_token: Token,
    pub refresh_token: Token,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RefreshToken {
    pub refresh_token: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoginData {
    pub username: String,
    pub password: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("invalid token")]
    InvalidToken,
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("json decode error: {0}")]
    Json(#[from] serde_json::Error),
}

#[cfg(test)]
mod tests {
    use super::{Claims, Role, Token};

    use serde_test::{assert_tokens, Token as SerdeToken};

    #[test]
    fn test_role_u8() {
        for role in [Role::User, Role::Admin] {
            assert_eq!(Role::from_u8(role.to_u8()), Some(role));
        }

        assert_eq!(Role::from_u8(0), None);
    }

    #[test]
    fn test_role_serde() {
        assert_tokens(
            &Role::User,
            &[SerdeToken::UnitVariant {
                name: "Role",
                variant: "user",
            }],
        );

        assert_tokens(
            &Role::Admin,
            &[SerdeToken::UnitVariant {
                name: "Role",
                variant: "admin",
            }],
        );
    }

    #[test]
    fn test_token_new() {
        let claims = Claims {
            sub: 7,
            role: Role::Admin,
            iat: 1,
            nbf: 1,
            exp: 2,
        };

        let header = base64::encode_config(b"{\"alg\":\"HS256\"}", base64::URL_SAFE_NO_PAD);
        let payload = base64::encode_config(
            serde_json::to_vec(&claims).unwrap(),
            base64::URL_SAFE_NO_PAD,
        );

        let token = Token::new(format!("{}.{}.sig", header, payload)).unwrap();
        assert_eq!(*token.claims(), claims);

        Token::new("garbage").unwrap_err();
        Token::new("a.!!!.c").unwrap_err();
    }
}
