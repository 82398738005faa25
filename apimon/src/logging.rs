//! ロギング初期化ユーティリティ
//!
//! `APIMON_LOG_LEVEL`（未設定時は`RUST_LOG`、さらに未設定なら`info`）でフィルタし、
//! 標準エラーへ出力する。`APIMON_LOG_DIR`が設定されていれば日次ローテーションの
//! ファイル出力も追加する。

use crate::config::get_env;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter, Layer};

/// ログファイル名のプレフィックス
const LOG_FILE_PREFIX: &str = "apimon.log";

/// tracingサブスクライバーを初期化
///
/// ファイル出力を有効にした場合は`WorkerGuard`を返す。
/// 呼び出し側はプロセス終了まで保持すること（dropするとバッファが破棄される）。
pub fn init() -> anyhow::Result<Option<WorkerGuard>> {
    let filter = create_env_filter()?;

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_writer(std::io::stderr)
        .boxed();

    let (file_layer, guard) = match get_env("APIMON_LOG_DIR") {
        Some(dir) => {
            std::fs::create_dir_all(&dir)?;
            let appender = tracing_appender::rolling::daily(&dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_ansi(false)
                .with_target(true)
                .with_writer(writer)
                .boxed();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    Ok(guard)
}

fn create_env_filter() -> anyhow::Result<EnvFilter> {
    let directive = get_env("APIMON_LOG_LEVEL")
        .or_else(|| get_env("RUST_LOG"))
        .unwrap_or_else(|| "info".to_string());
    EnvFilter::try_new(&directive)
        .map_err(|e| anyhow::anyhow!("Invalid log filter '{directive}': {e}"))
}
