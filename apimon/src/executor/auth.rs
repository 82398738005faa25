//! 認証ヘッダーの適用

use crate::types::request::AuthConfig;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;

/// 認証設定から送信するヘッダー（小文字名, 値）を求める
///
/// `api-key`でヘッダー名が指定されていなければ`default_api_key_header`を使う。
pub fn auth_header(auth: &AuthConfig, default_api_key_header: &str) -> Option<(String, String)> {
    match auth {
        AuthConfig::None => None,
        AuthConfig::Bearer { value } => {
            Some(("authorization".to_string(), format!("Bearer {}", value)))
        }
        AuthConfig::ApiKey { value, header } => {
            let name = header.as_deref().unwrap_or(default_api_key_header);
            Some((name.to_ascii_lowercase(), value.clone()))
        }
        AuthConfig::Basic { value } => Some((
            "authorization".to_string(),
            format!("Basic {}", STANDARD.encode(value.as_bytes())),
        )),
    }
}
