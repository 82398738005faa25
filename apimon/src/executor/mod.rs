//! リクエスト実行器
//!
//! `RequestSpec`から1回のHTTP呼び出しを行い、`ResponseResult`を生成する。
//! 認証ヘッダーの適用・タイムアウトの強制・ネットワークエラーの分類を担い、
//! 履歴やヘルスレジストリへの書き込みは行わない（呼び出し側の責務）。

pub mod auth;
pub mod classify;

use crate::common::error::{MonitorError, MonitorResult, ValidationError};
use crate::config::MonitorConfig;
use crate::types::request::{HttpMethod, RequestBody, RequestSpec};
use crate::types::response::{NetworkErrorKind, ResponseResult};
use reqwest::Client;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// 既定のAcceptヘッダー
const DEFAULT_ACCEPT: &str = "application/json, text/plain, */*";

/// コンテンツタイプテストの既定対象
pub const DEFAULT_CONTENT_TYPES: [&str; 3] = ["application/json", "application/xml", "text/plain"];

/// リクエスト実行器
#[derive(Clone)]
pub struct RequestExecutor {
    /// 共有HTTPクライアント（接続プーリング有効）
    client: Client,
    /// `api-key`認証の既定ヘッダー名
    api_key_header: String,
    /// 既定のUser-Agent
    user_agent: String,
    /// レスポンスボディ読み取り上限（バイト）
    max_body_bytes: usize,
}

impl RequestExecutor {
    /// 設定から実行器を作成
    pub fn new(config: &MonitorConfig) -> MonitorResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| MonitorError::Http(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self::with_client(client, config))
    }

    /// 既存のクライアントから実行器を作成
    pub fn with_client(client: Client, config: &MonitorConfig) -> Self {
        Self {
            client,
            api_key_header: config.api_key_header.clone(),
            user_agent: config.user_agent.clone(),
            max_body_bytes: config.max_body_bytes,
        }
    }

    /// リクエストを1回実行
    ///
    /// HTTPレスポンスを受信すれば、ステータスコードに関わらず`success`となる。
    /// `timeout`を超えた呼び出しは中断され、`timeout`エラーとして返る。
    pub async fn execute(&self, spec: &RequestSpec, timeout: Duration) -> ResponseResult {
        let method = spec.method();
        let url = spec.effective_url();
        let url_str = url.to_string();
        let start = Instant::now();

        let request = match self.build_request(spec, url) {
            Ok(request) => request,
            Err(e) => {
                warn!(url = %url_str, error = %e, "Failed to build request");
                return ResponseResult::network_error(
                    method,
                    url_str,
                    NetworkErrorKind::Unknown,
                    Some(classify::describe_chain(&e)),
                    elapsed_ms(start),
                );
            }
        };

        let max_body_bytes = self.max_body_bytes;
        let call = async {
            let mut response = self.client.execute(request).await?;
            let status = response.status().as_u16();
            let headers = collect_headers(response.headers());

            let mut body = Vec::new();
            let mut truncated = false;
            while let Some(chunk) = response.chunk().await? {
                let remaining = max_body_bytes.saturating_sub(body.len());
                if chunk.len() > remaining {
                    body.extend_from_slice(&chunk[..remaining]);
                    truncated = true;
                    break;
                }
                body.extend_from_slice(&chunk);
            }

            Ok::<_, reqwest::Error>((status, headers, body, truncated))
        };

        let result = match tokio::time::timeout(timeout, call).await {
            Ok(Ok((status, headers, body, truncated))) => ResponseResult::received(
                method,
                url_str,
                status,
                elapsed_ms(start),
                headers,
                String::from_utf8_lossy(&body).into_owned(),
                truncated,
            ),
            Ok(Err(e)) => ResponseResult::network_error(
                method,
                url_str,
                classify::classify_error(&e),
                Some(classify::describe_chain(&e)),
                elapsed_ms(start),
            ),
            Err(_) => ResponseResult::network_error(
                method,
                url_str,
                NetworkErrorKind::Timeout,
                Some(format!("request exceeded {}ms", timeout.as_millis())),
                elapsed_ms(start),
            ),
        };

        debug!(
            method = %result.method,
            url = %result.url,
            status = %result.status,
            http_status = ?result.http_status_code,
            response_time_ms = result.response_time_ms,
            error = ?result.error,
            "Request executed"
        );

        result
    }

    /// 同じURLをGET/POST/PUT/PATCH/DELETEの順で実行
    ///
    /// 結果はメソッド順に1件ずつ返る。
    pub async fn execute_all_methods(
        &self,
        spec: &RequestSpec,
        timeout: Duration,
    ) -> Vec<ResponseResult> {
        let mut results = Vec::with_capacity(HttpMethod::ALL.len());
        for method in HttpMethod::ALL {
            let variant = spec.with_method(method);
            results.push(self.execute(&variant, timeout).await);
        }
        results
    }

    /// 指定したContent-Typeごとにボディを整形してPOSTする
    ///
    /// 結果は`content_types`の順に返る。Content-Typeがヘッダー値として
    /// 不正な場合はネットワーク呼び出し前にエラーとなる。
    pub async fn execute_content_types(
        &self,
        spec: &RequestSpec,
        content_types: &[&str],
        timeout: Duration,
    ) -> Result<Vec<ResponseResult>, ValidationError> {
        let variants = content_type_variants(spec, content_types)?;
        let mut results = Vec::with_capacity(variants.len());
        for variant in &variants {
            results.push(self.execute(variant, timeout).await);
        }
        Ok(results)
    }

    fn build_request(
        &self,
        spec: &RequestSpec,
        url: reqwest::Url,
    ) -> Result<reqwest::Request, reqwest::Error> {
        let mut headers: BTreeMap<String, String> = BTreeMap::new();
        headers.insert("user-agent".to_string(), self.user_agent.clone());
        headers.insert("accept".to_string(), DEFAULT_ACCEPT.to_string());
        for (name, value) in spec.headers() {
            headers.insert(name.clone(), value.clone());
        }

        let body = if spec.method().accepts_body() {
            spec.body()
        } else {
            None
        };

        if let Some(content_type) = body.and_then(RequestBody::default_content_type) {
            headers
                .entry("content-type".to_string())
                .or_insert_with(|| content_type.to_string());
        }

        if let Some((name, value)) = auth::auth_header(spec.auth(), &self.api_key_header) {
            headers.insert(name, value);
        }

        let mut builder = self.client.request(spec.method().to_reqwest(), url);
        for (name, value) in &headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(body) = body {
            builder = builder.body(body.encode());
        }
        builder.build()
    }
}

/// Content-Typeごとに、整形済みボディを持つPOSTリクエストを作成
pub fn content_type_variants(
    spec: &RequestSpec,
    content_types: &[&str],
) -> Result<Vec<RequestSpec>, ValidationError> {
    content_types
        .iter()
        .map(|content_type| {
            let body = format_body(spec.body(), content_type);
            spec.with_method(HttpMethod::Post)
                .with_body(body, content_type)
        })
        .collect()
}

/// 既存ボディをContent-Typeに合わせて整形
///
/// JSONボディはJSON・XML・フォーム・テキストに変換し、
/// それ以外のボディはそのまま送る。ボディがなければ`None`。
pub fn format_body(body: Option<&RequestBody>, content_type: &str) -> Option<RequestBody> {
    let value = match body? {
        RequestBody::Json(value) => value,
        other => return Some(other.clone()),
    };

    let media_type = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    let formatted = match media_type.as_str() {
        "application/json" => RequestBody::Json(value.clone()),
        "application/xml" | "text/xml" => RequestBody::Text(json_to_xml(value)),
        "application/x-www-form-urlencoded" => RequestBody::Form(json_to_form(value)),
        _ => RequestBody::Text(match value {
            serde_json::Value::String(s) => s.clone(),
            other => other.to_string(),
        }),
    };
    Some(formatted)
}

fn scalar_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn json_to_form(value: &serde_json::Value) -> BTreeMap<String, String> {
    match value {
        serde_json::Value::Object(map) => map
            .iter()
            .map(|(k, v)| (k.clone(), scalar_to_string(v)))
            .collect(),
        _ => BTreeMap::new(),
    }
}

fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// XML要素名として使えるか（ASCII範囲のみ許可、`xml`で始まる名前は予約済み）
fn is_xml_name(name: &str) -> bool {
    let mut chars = name.chars();
    let Some(first) = chars.next() else {
        return false;
    };
    (first.is_ascii_alphabetic() || first == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
        && !name.to_ascii_lowercase().starts_with("xml")
}

// フラットな<root>要素のみ（ネストはJSON文字列として埋め込む）
fn json_to_xml(value: &serde_json::Value) -> String {
    let mut xml = String::from("<root>");
    match value {
        serde_json::Value::Object(map) => {
            for (key, v) in map {
                if !is_xml_name(key) {
                    debug!(key = %key, "Skipping key that is not a valid XML element name");
                    continue;
                }
                xml.push_str(&format!(
                    "<{key}>{}</{key}>",
                    escape_xml(&scalar_to_string(v)),
                    key = key
                ));
            }
        }
        other => xml.push_str(&escape_xml(&scalar_to_string(other))),
    }
    xml.push_str("</root>");
    xml
}

fn collect_headers(headers: &reqwest::header::HeaderMap) -> BTreeMap<String, String> {
    let mut collected = BTreeMap::new();
    for (name, value) in headers {
        let value = String::from_utf8_lossy(value.as_bytes()).into_owned();
        collected
            .entry(name.as_str().to_string())
            .and_modify(|existing: &mut String| {
                existing.push_str(", ");
                existing.push_str(&value);
            })
            .or_insert(value);
    }
    collected
}

fn elapsed_ms(start: Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
