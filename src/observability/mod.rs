//! 可观测性
//!
//! 日志默认 info，可通过 RUST_LOG 覆盖（如 `RUST_LOG=dualarm=debug` 查看每次推动与每个动作）。

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub fn init() {
    init_with("info");
}

/// 以 `default_directive` 为默认级别初始化；重复调用时保留已有的订阅者
pub fn init_with(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .try_init();
}
