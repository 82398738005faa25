//! ネットワークエラーの分類
//!
//! reqwestのエラーチェーンを辿り、`timeout` / `connection refused` / `tls error` /
//! `unknown network error` のいずれかに分類する。

use crate::types::response::NetworkErrorKind;
use std::error::Error as StdError;

/// reqwestエラーを分類
pub fn classify_error(err: &reqwest::Error) -> NetworkErrorKind {
    if err.is_timeout() {
        return NetworkErrorKind::Timeout;
    }
    classify_chain(err)
}

/// 任意のエラーチェーンを分類
pub fn classify_chain(err: &(dyn StdError + 'static)) -> NetworkErrorKind {
    let mut messages = Vec::new();
    let mut current: Option<&(dyn StdError + 'static)> = Some(err);

    while let Some(e) = current {
        if let Some(io) = e.downcast_ref::<std::io::Error>() {
            match io.kind() {
                std::io::ErrorKind::ConnectionRefused => {
                    return NetworkErrorKind::ConnectionRefused
                }
                std::io::ErrorKind::TimedOut => return NetworkErrorKind::Timeout,
                _ => {}
            }
        }
        messages.push(e.to_string().to_ascii_lowercase());
        current = e.source();
    }

    let text = messages.join(": ");
    if text.contains("connection refused") {
        NetworkErrorKind::ConnectionRefused
    } else if text.contains("timed out") {
        NetworkErrorKind::Timeout
    } else if ["tls", "ssl", "certificate", "handshake"]
        .iter()
        .any(|needle| text.contains(needle))
    {
        NetworkErrorKind::Tls
    } else {
        NetworkErrorKind::Unknown
    }
}

/// エラーチェーン全体を1行の文字列にまとめる
pub fn describe_chain(err: &(dyn StdError + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !parts.iter().any(|p| p.contains(&text)) {
            parts.push(text);
        }
        current = e.source();
    }
    parts.join(": ")
}
