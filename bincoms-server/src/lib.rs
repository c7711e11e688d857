//! JSON-RPC exposure of bincoms devices
//!
//! The server publishes every device function found by discovery, plus
//! optional host-side extension methods, to TCP clients. Requests are
//! newline-delimited JSON-RPC 2.0 objects. Calls from all connections are
//! serialized by the [`bincoms_client::DispatchGate`] behind the
//! [`MethodTable`].
//!
//! # TODO
//!
//! ## 服务器
//! - [x] 连接监听和接受
//! - [x] 多客户端连接
//! - [x] 方法允许列表（设备函数 + 扩展方法 + system.*）
//! - [x] 故障分类（未知操作 / 设备状态 / 链路损坏）
//! - [x] 远程关闭
//! - [ ] JSON-RPC 批量请求

pub mod convert;
pub mod methods;
pub mod protocol;
pub mod server;

pub use methods::{ExtensionMethods, MethodTable, NoExtensions, Route};
pub use protocol::{Fault, FaultData, FaultKind, RpcRequest, RpcResponse};
pub use server::{RpcServer, ServerConfig, ShutdownHandle};
