//! bincoms - host-side driver for firmware-defined serial RPC
//!
//! A bincoms device describes its own function table over the serial link.
//! The host discovers that table at connect time and can then call any
//! function by name; the server crate publishes the same table to network
//! clients.
//!
//! # Architecture
//!
//! This library is organized as a workspace with multiple crates:
//!
//! - `bincoms-core`: Error type, device status table, field layouts, values
//! - `bincoms-transport`: Byte channels (serial port, async streams, simulated firmware)
//! - `bincoms-session`: Framing, capability discovery, invocation, event streams
//! - `bincoms-client`: Dispatch gate, connection builder, logic timer workflow
//! - `bincoms-server`: JSON-RPC over TCP
//!
//! # Implementation Status
//!
//! ## ✅ 已完成
//! - 帧格式和响应解码
//! - 能力发现（握手重试）
//! - 按名称调用、参数打包和返回值解码
//! - 链路损坏后的重新同步
//! - 多任务共享设备（调度门）
//! - 逻辑计时器事件流
//! - JSON-RPC 服务器
//!
//! ## 📋 计划中
//! - 帧校验和（固件尚未实现）

pub mod config;

// Re-export core types
pub use bincoms_core::{BincomsError, BincomsResult, StatusCode, Value};
pub use config::AppConfig;

// Re-export transport layer
pub mod transport {
    pub use bincoms_transport::*;
}

// Re-export session layer
pub mod session {
    pub use bincoms_session::*;
}

// Re-export client API
pub mod client {
    pub use bincoms_client::*;
}

// Re-export server API
pub mod server {
    pub use bincoms_server::*;
}
