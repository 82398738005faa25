//! リクエスト定義型
//!
//! 送信するHTTPリクエストの不変な記述（`RequestSpec`）と、その構成要素

use crate::common::error::ValidationError;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::str::FromStr;

/// 認証情報をシリアライズ時に伏せる際の置換文字列
const REDACTED: &str = "********";

/// サポートするHTTPメソッド
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(try_from = "String", into = "String")]
pub enum HttpMethod {
    /// GET
    #[default]
    Get,
    /// POST
    Post,
    /// PUT
    Put,
    /// PATCH
    Patch,
    /// DELETE
    Delete,
}

impl HttpMethod {
    /// 複数メソッドテストで使用する順序
    pub const ALL: [HttpMethod; 5] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Patch,
        HttpMethod::Delete,
    ];

    /// HttpMethodを文字列に変換
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Get => "GET",
            Self::Post => "POST",
            Self::Put => "PUT",
            Self::Patch => "PATCH",
            Self::Delete => "DELETE",
        }
    }

    /// リクエストボディを送信するメソッドか
    pub fn accepts_body(&self) -> bool {
        matches!(self, Self::Post | Self::Put | Self::Patch)
    }

    /// reqwestのメソッド型に変換
    pub fn to_reqwest(self) -> reqwest::Method {
        match self {
            Self::Get => reqwest::Method::GET,
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
            Self::Patch => reqwest::Method::PATCH,
            Self::Delete => reqwest::Method::DELETE,
        }
    }
}

impl FromStr for HttpMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "GET" => Ok(Self::Get),
            "POST" => Ok(Self::Post),
            "PUT" => Ok(Self::Put),
            "PATCH" => Ok(Self::Patch),
            "DELETE" => Ok(Self::Delete),
            _ => Err(ValidationError::UnsupportedMethod(s.to_string())),
        }
    }
}

impl TryFrom<String> for HttpMethod {
    type Error = ValidationError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<HttpMethod> for String {
    fn from(method: HttpMethod) -> Self {
        method.as_str().to_string()
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 認証方式
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum AuthConfig {
    /// 認証なし
    #[default]
    None,
    /// `Authorization: Bearer <value>`
    Bearer {
        /// トークン
        value: String,
    },
    /// APIキーヘッダー
    ApiKey {
        /// APIキー
        value: String,
        /// ヘッダー名（未指定時は実行器の既定値）
        #[serde(default, skip_serializing_if = "Option::is_none")]
        header: Option<String>,
    },
    /// `Authorization: Basic <base64(value)>`
    Basic {
        /// `user:password` 形式の資格情報
        value: String,
    },
}

impl AuthConfig {
    /// 認証種別名
    pub fn kind_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bearer { .. } => "bearer",
            Self::ApiKey { .. } => "api-key",
            Self::Basic { .. } => "basic",
        }
    }

    /// 資格情報とヘッダー名を検証
    pub fn validate(&self) -> Result<(), ValidationError> {
        let value = match self {
            Self::None => return Ok(()),
            Self::Bearer { value } | Self::Basic { value } => value,
            Self::ApiKey { value, header } => {
                if let Some(name) = header {
                    HeaderName::from_bytes(name.as_bytes()).map_err(|e| {
                        ValidationError::InvalidHeader {
                            name: name.clone(),
                            reason: e.to_string(),
                        }
                    })?;
                }
                value
            }
        };

        if value.trim().is_empty() {
            return Err(ValidationError::MissingCredential(self.kind_str()));
        }
        // Basicはbase64化されるため対象外
        if !matches!(self, Self::Basic { .. }) {
            HeaderValue::from_str(value).map_err(|e| ValidationError::InvalidHeader {
                name: self.kind_str().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// 資格情報を伏せたコピーを返す
    pub fn redacted(&self) -> Self {
        match self {
            Self::None => Self::None,
            Self::Bearer { .. } => Self::Bearer {
                value: REDACTED.to_string(),
            },
            Self::ApiKey { header, .. } => Self::ApiKey {
                value: REDACTED.to_string(),
                header: header.clone(),
            },
            Self::Basic { .. } => Self::Basic {
                value: REDACTED.to_string(),
            },
        }
    }
}

/// リクエストボディ
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "content", rename_all = "snake_case")]
pub enum RequestBody {
    /// 生テキスト（そのまま送信）
    Text(String),
    /// JSONペイロード
    Json(serde_json::Value),
    /// `application/x-www-form-urlencoded`
    Form(BTreeMap<String, String>),
}

impl RequestBody {
    /// 呼び出し側がContent-Typeを指定しなかった場合の既定値
    pub fn default_content_type(&self) -> Option<&'static str> {
        match self {
            Self::Text(_) => None,
            Self::Json(_) => Some("application/json"),
            Self::Form(_) => Some("application/x-www-form-urlencoded"),
        }
    }

    /// 送信用の文字列に変換
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Json(value) => value.to_string(),
            Self::Form(fields) => serde_urlencoded::to_string(fields).unwrap_or_default(),
        }
    }

    /// 空のボディか
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text(text) => text.is_empty(),
            Self::Json(value) => value.is_null(),
            Self::Form(fields) => fields.is_empty(),
        }
    }
}

/// URLを検証し、http/httpsの絶対URIとしてパース
pub fn parse_absolute_url(raw: &str) -> Result<Url, ValidationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::EmptyUrl);
    }

    let url = Url::parse(trimmed).map_err(|e| ValidationError::InvalidUrl {
        url: trimmed.to_string(),
        reason: e.to_string(),
    })?;

    match url.scheme() {
        "http" | "https" => {}
        other => return Err(ValidationError::UnsupportedScheme(other.to_string())),
    }

    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(ValidationError::InvalidUrl {
            url: trimmed.to_string(),
            reason: "missing host".to_string(),
        });
    }

    Ok(url)
}

fn normalize_header(name: &str, value: &str) -> Result<(String, String), ValidationError> {
    let header_name =
        HeaderName::from_bytes(name.trim().as_bytes()).map_err(|e| ValidationError::InvalidHeader {
            name: name.to_string(),
            reason: e.to_string(),
        })?;
    HeaderValue::from_str(value).map_err(|e| ValidationError::InvalidHeader {
        name: name.to_string(),
        reason: e.to_string(),
    })?;
    // HeaderNameは小文字に正規化される
    Ok((header_name.as_str().to_string(), value.to_string()))
}

/// 送信リクエストの不変な記述
///
/// [`RequestSpec::builder`]またはデシリアライズでのみ構築でき、
/// どちらの経路でもURL・ヘッダー・認証情報が検証される。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawRequestSpec", into = "RawRequestSpec")]
pub struct RequestSpec {
    method: HttpMethod,
    url: Url,
    headers: BTreeMap<String, String>,
    body: Option<RequestBody>,
    query_params: BTreeMap<String, String>,
    auth: AuthConfig,
}

impl RequestSpec {
    /// ビルダーを作成
    pub fn builder(method: HttpMethod, url: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(method, url)
    }

    /// GETリクエストのビルダーを作成
    pub fn get(url: impl Into<String>) -> RequestSpecBuilder {
        RequestSpecBuilder::new(HttpMethod::Get, url)
    }

    /// HTTPメソッド
    pub fn method(&self) -> HttpMethod {
        self.method
    }

    /// 検証済みURL（クエリパラメータ適用前）
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// ヘッダー（名前は小文字に正規化済み）
    pub fn headers(&self) -> &BTreeMap<String, String> {
        &self.headers
    }

    /// ヘッダー値を大文字小文字を区別せずに取得
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    /// リクエストボディ
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// クエリパラメータ
    pub fn query_params(&self) -> &BTreeMap<String, String> {
        &self.query_params
    }

    /// 認証設定
    pub fn auth(&self) -> &AuthConfig {
        &self.auth
    }

    /// クエリパラメータを適用した実際の送信先URL
    ///
    /// 既存のクエリに同名キーがあれば上書きする。
    pub fn effective_url(&self) -> Url {
        let mut url = self.url.clone();
        if self.query_params.is_empty() {
            return url;
        }

        let retained: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(key, _)| !self.query_params.contains_key(key.as_ref()))
            .map(|(key, value)| (key.into_owned(), value.into_owned()))
            .collect();

        {
            let mut pairs = url.query_pairs_mut();
            pairs.clear();
            pairs.extend_pairs(retained.iter());
            pairs.extend_pairs(self.query_params.iter());
        }
        url
    }

    /// メソッドだけを差し替えた新しいRequestSpecを返す
    pub fn with_method(&self, method: HttpMethod) -> RequestSpec {
        RequestSpec {
            method,
            ..self.clone()
        }
    }

    /// ボディとContent-Typeを差し替えた新しいRequestSpecを返す
    ///
    /// `body`が`None`ならボディなしでContent-Typeのみ設定する。
    pub fn with_body(
        &self,
        body: Option<RequestBody>,
        content_type: &str,
    ) -> Result<RequestSpec, ValidationError> {
        let (name, value) = normalize_header("content-type", content_type)?;
        let mut headers = self.headers.clone();
        headers.insert(name, value);
        Ok(RequestSpec {
            headers,
            body,
            ..self.clone()
        })
    }
}

/// [`RequestSpec`]のビルダー
#[derive(Debug, Clone)]
pub struct RequestSpecBuilder {
    method: HttpMethod,
    url: String,
    headers: Vec<(String, String)>,
    body: Option<RequestBody>,
    query_params: Vec<(String, String)>,
    auth: AuthConfig,
}

impl RequestSpecBuilder {
    fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            query_params: Vec::new(),
            auth: AuthConfig::None,
        }
    }

    /// ヘッダーを追加（同名は後勝ち）
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// クエリパラメータを追加
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query_params.push((key.into(), value.into()));
        self
    }

    /// ボディを設定
    pub fn body(mut self, body: RequestBody) -> Self {
        self.body = Some(body);
        self
    }

    /// テキストボディを設定
    pub fn text(self, text: impl Into<String>) -> Self {
        self.body(RequestBody::Text(text.into()))
    }

    /// JSONボディを設定
    pub fn json(self, value: serde_json::Value) -> Self {
        self.body(RequestBody::Json(value))
    }

    /// 認証設定
    pub fn auth(mut self, auth: AuthConfig) -> Self {
        self.auth = auth;
        self
    }

    /// 検証してRequestSpecを構築
    pub fn build(self) -> Result<RequestSpec, ValidationError> {
        let url = parse_absolute_url(&self.url)?;

        let mut headers = BTreeMap::new();
        for (name, value) in &self.headers {
            let (name, value) = normalize_header(name, value)?;
            headers.insert(name, value);
        }

        let mut query_params = BTreeMap::new();
        for (key, value) in self.query_params {
            if key.trim().is_empty() {
                return Err(ValidationError::InvalidQueryParam(format!(
                    "empty key (value: {value})"
                )));
            }
            query_params.insert(key, value);
        }

        self.auth.validate()?;

        Ok(RequestSpec {
            method: self.method,
            url,
            headers,
            body: self.body,
            query_params,
            auth: self.auth,
        })
    }
}

/// RequestSpecのシリアライズ表現（設定ファイル・履歴出力用）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawRequestSpec {
    /// HTTPメソッド
    #[serde(default)]
    pub method: HttpMethod,
    /// URL
    pub url: String,
    /// ヘッダー
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,
    /// ボディ
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<RequestBody>,
    /// クエリパラメータ
    #[serde(default, alias = "params", skip_serializing_if = "BTreeMap::is_empty")]
    pub query_params: BTreeMap<String, String>,
    /// 認証
    #[serde(default)]
    pub auth: AuthConfig,
}

impl TryFrom<RawRequestSpec> for RequestSpec {
    type Error = ValidationError;

    fn try_from(raw: RawRequestSpec) -> Result<Self, Self::Error> {
        let mut builder = RequestSpec::builder(raw.method, raw.url).auth(raw.auth);
        for (name, value) in raw.headers {
            builder = builder.header(name, value);
        }
        for (key, value) in raw.query_params {
            builder = builder.query(key, value);
        }
        if let Some(body) = raw.body {
            builder = builder.body(body);
        }
        builder.build()
    }
}

impl From<RequestSpec> for RawRequestSpec {
    // 資格情報は出力しない
    fn from(spec: RequestSpec) -> Self {
        Self {
            method: spec.method,
            url: spec.url.to_string(),
            headers: spec.headers,
            body: spec.body,
            query_params: spec.query_params,
            auth: spec.auth.redacted(),
        }
    }
}
