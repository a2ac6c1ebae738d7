//! Stream token issuer
//!
//! ## 責務
//!
//! - 接続試行ごとに新しい connection id を採番し、署名付きトークンに束縛する
//! - ハンドシェイク時にトークンを検証し、クレームを取り出す
//!
//! トークンは HS256 の JWT で、`type = "sse_stream"` の用途マーカーを持ちます。
//! 有効期限の判定は注入された `Clock` で行うため、テストで境界を検証できます。

use std::sync::Arc;

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use switchboard_shared::time::Clock;

use crate::domain::{ConnectionId, ConnectionIdFactory, Role, TokenError, UserId};

/// Purpose marker carried in the `type` claim.
pub const STREAM_TOKEN_TYPE: &str = "sse_stream";

/// Default lifetime of a stream token.
pub const DEFAULT_TOKEN_TTL_SECS: i64 = 300;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StreamTokenClaims {
    sub: String,
    user_id: String,
    role: String,
    connection_id: String,
    #[serde(rename = "type")]
    token_type: String,
    iat: i64,
    exp: i64,
}

/// A freshly minted token and the connection id it binds.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub token: String,
    pub connection_id: ConnectionId,
    pub expires_in_secs: i64,
}

/// Verified contents of a stream token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamClaims {
    pub user_id: UserId,
    pub role: Role,
    pub connection_id: ConnectionId,
    pub issued_at: i64,
    pub expires_at: i64,
}

pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    ttl_secs: i64,
    ids: ConnectionIdFactory,
    clock: Arc<dyn Clock>,
}

impl TokenIssuer {
    pub fn new(secret: &[u8], ttl_secs: i64, clock: Arc<dyn Clock>) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // 期限は注入された Clock で判定する
        validation.validate_exp = false;
        validation.leeway = 0;

        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
            validation,
            ttl_secs,
            ids: ConnectionIdFactory::new(),
            clock,
        }
    }

    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Mint a token for a new connection attempt. The registry is not touched.
    pub fn issue(&self, user_id: &UserId, role: Role) -> Result<IssuedToken, TokenError> {
        let connection_id = self.ids.generate();
        let iat = self.clock.now_secs();
        let claims = StreamTokenClaims {
            sub: user_id.as_str().to_string(),
            user_id: user_id.as_str().to_string(),
            role: role.as_str().to_string(),
            connection_id: connection_id.as_str().to_string(),
            token_type: STREAM_TOKEN_TYPE.to_string(),
            iat,
            exp: iat + self.ttl_secs,
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|e| TokenError::Signing(e.to_string()))?;

        tracing::debug!(
            user_id = %user_id,
            role = %role,
            connection_id = %connection_id,
            "stream token issued"
        );

        Ok(IssuedToken {
            token,
            connection_id,
            expires_in_secs: self.ttl_secs,
        })
    }

    /// Verify signature, purpose marker and expiry (`now >= exp` is expired).
    pub fn verify(&self, token: &str) -> Result<StreamClaims, TokenError> {
        let data = decode::<StreamTokenClaims>(token, &self.decoding_key, &self.validation)
            .map_err(|e| TokenError::Invalid(e.to_string()))?;
        let claims = data.claims;

        if claims.token_type != STREAM_TOKEN_TYPE {
            return Err(TokenError::WrongType(claims.token_type));
        }
        if self.clock.now_secs() >= claims.exp {
            return Err(TokenError::Expired);
        }
        if claims.sub != claims.user_id {
            return Err(TokenError::InvalidClaim("sub does not match userId".to_string()));
        }

        let user_id =
            UserId::new(claims.user_id).map_err(|e| TokenError::InvalidClaim(e.to_string()))?;
        let role = claims
            .role
            .parse::<Role>()
            .map_err(|e| TokenError::InvalidClaim(e.to_string()))?;
        let connection_id = ConnectionId::new(claims.connection_id)
            .map_err(|e| TokenError::InvalidClaim(e.to_string()))?;

        Ok(StreamClaims {
            user_id,
            role,
            connection_id,
            issued_at: claims.iat,
            expires_at: claims.exp,
        })
    }
}
