//! UseCase: ストリームトークンの発行
//!
//! 接続試行ごとに新しい connection id を採番し、呼び出し元の identity と
//! 束縛したトークンを返します。レジストリは変更しません。

use std::sync::Arc;

use crate::{
    domain::Identity,
    infrastructure::token::{IssuedToken, TokenIssuer},
};

use super::error::IssueTokenError;

pub struct IssueTokenUseCase {
    issuer: Arc<TokenIssuer>,
}

impl IssueTokenUseCase {
    pub fn new(issuer: Arc<TokenIssuer>) -> Self {
        Self { issuer }
    }

    pub fn execute(&self, caller: &Identity) -> Result<IssuedToken, IssueTokenError> {
        Ok(self.issuer.issue(&caller.user_id, caller.role)?)
    }
}
