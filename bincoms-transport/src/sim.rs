//! Simulated firmware
//!
//! A host-side model of a device speaking the bincoms protocol, served over
//! an in-memory duplex pipe. The default table mirrors the logic timer
//! firmware: the two discovery functions, `start` and `enable_line`.

use crate::io::IoChannel;
use bincoms_core::{ArgumentLayout, StatusCode};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

const MARKER: u8 = b'b';

/// Number of input lines wired on the simulated board
pub const SIM_LINES: u8 = 2;

/// Answer produced by a simulated function
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    /// OK status followed by the payload
    Data(Vec<u8>),
    /// Error status without payload
    Status(StatusCode),
    /// Arbitrary bytes written as-is
    Raw(Vec<u8>),
}

type Handler = Arc<dyn Fn(&[u8]) -> Reply + Send + Sync>;

struct SimFunction {
    name: String,
    args: String,
    ret: String,
    handler: Handler,
}

/// Builder and state for a simulated device
pub struct SimulatedDevice {
    functions: Vec<SimFunction>,
    events: Vec<(u32, u8)>,
    latency: Option<Duration>,
    garbled_requests: usize,
    requests: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl SimulatedDevice {
    /// Device exposing only the discovery functions
    pub fn new() -> Self {
        // Handlers for ids 0 and 1 are answered by the device loop itself
        let reserved = |_: &[u8]| Reply::Status(StatusCode::Error);
        Self {
            functions: vec![
                SimFunction {
                    name: "command_count".to_string(),
                    args: String::new(),
                    ret: "B".to_string(),
                    handler: Arc::new(reserved),
                },
                SimFunction {
                    name: "get_command_names".to_string(),
                    args: "BB".to_string(),
                    ret: "s".to_string(),
                    handler: Arc::new(reserved),
                },
            ],
            events: Vec::new(),
            latency: None,
            garbled_requests: 0,
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Device with the logic timer function table
    ///
    /// `start(f) -> H` answers the duration in 32.768 ms ticks and then
    /// streams the configured event records. `enable_line(Bc)` accepts lines
    /// below [`SIM_LINES`] and edges `r`, `f` or `b`.
    pub fn logic_timer() -> Self {
        Self::new()
            .function("start", "f", "H", |args| {
                let seconds = f32::from_le_bytes([args[0], args[1], args[2], args[3]]);
                let ticks = (seconds / 0.032768) as u16;
                Reply::Data(ticks.to_le_bytes().to_vec())
            })
            .function("enable_line", "Bc", "", |args| {
                if args[0] >= SIM_LINES || !matches!(args[1], b'r' | b'f' | b'b') {
                    Reply::Status(StatusCode::ValueError)
                } else {
                    Reply::Data(Vec::new())
                }
            })
    }

    /// Register a user function; ids are assigned in registration order
    pub fn function<F>(mut self, name: &str, args: &str, ret: &str, handler: F) -> Self
    where
        F: Fn(&[u8]) -> Reply + Send + Sync + 'static,
    {
        self.functions.push(SimFunction {
            name: name.to_string(),
            args: args.to_string(),
            ret: ret.to_string(),
            handler: Arc::new(handler),
        });
        self
    }

    /// Records streamed after every successful `start`, sentinel included
    pub fn events(mut self, events: Vec<(u32, u8)>) -> Self {
        self.events = events;
        self
    }

    /// Delay applied before every answer
    pub fn latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Answer the first `count` requests with an unintelligible header
    pub fn garble_first(mut self, count: usize) -> Self {
        self.garbled_requests = count;
        self
    }

    /// Handle on the log of request frames received so far
    pub fn request_log(&self) -> Arc<Mutex<Vec<Vec<u8>>>> {
        self.requests.clone()
    }

    /// Spawn the device and return the host side of the pipe
    pub fn connect(self, timeout: Option<Duration>) -> (IoChannel<DuplexStream>, JoinHandle<()>) {
        let (host, device) = tokio::io::duplex(4096);
        let handle = tokio::spawn(self.run(device));
        (IoChannel::new(host, timeout), handle)
    }

    async fn run(mut self, mut stream: DuplexStream) {
        loop {
            let mut header = [0u8; 3];
            if stream.read_exact(&mut header).await.is_err() {
                break;
            }
            let mut body = vec![0u8; header[2] as usize];
            if stream.read_exact(&mut body).await.is_err() {
                break;
            }

            let mut frame = header.to_vec();
            frame.extend_from_slice(&body);
            let seen = {
                let mut log = match self.requests.lock() {
                    Ok(log) => log,
                    Err(poisoned) => poisoned.into_inner(),
                };
                log.push(frame);
                log.len()
            };

            let answer = if seen <= self.garbled_requests {
                vec![b'?', 0x00, 0x00]
            } else {
                self.answer(header, &body)
            };

            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            if stream.write_all(&answer).await.is_err() {
                break;
            }
        }
    }

    fn answer(&self, header: [u8; 3], body: &[u8]) -> Vec<u8> {
        if header[0] != MARKER || header[1] != 0 || body.is_empty() {
            return status_frame(StatusCode::CommunicationError);
        }

        let id = body[0] as usize;
        let args = &body[1..];
        let Some(function) = self.functions.get(id) else {
            return status_frame(StatusCode::UndefinedFunction);
        };
        if let Ok(ArgumentLayout::Fields(fields)) = ArgumentLayout::parse(&function.args) {
            let expected: usize = fields.iter().map(|f| f.size()).sum();
            if args.len() != expected {
                return status_frame(StatusCode::ByteCountError);
            }
        }

        let reply = match id {
            0 => Reply::Data(vec![self.functions.len() as u8]),
            1 => self.command_name(args[0] as usize, args[1]),
            _ => (function.handler)(args),
        };

        let mut out = encode_reply(&reply);
        if function.name == "start" && matches!(reply, Reply::Data(_)) {
            for &(counter, pin_state) in &self.events {
                let mut payload = counter.to_le_bytes().to_vec();
                payload.push(pin_state);
                out.extend(encode_reply(&Reply::Data(payload)));
            }
        }
        out
    }

    fn command_name(&self, id: usize, selector: u8) -> Reply {
        let Some(function) = self.functions.get(id) else {
            return Reply::Status(StatusCode::UndefinedFunction);
        };
        match selector {
            0 => Reply::Data(function.name.as_bytes().to_vec()),
            1 => Reply::Data(function.args.as_bytes().to_vec()),
            2 => Reply::Data(function.ret.as_bytes().to_vec()),
            _ => Reply::Status(StatusCode::ValueError),
        }
    }
}

impl Default for SimulatedDevice {
    fn default() -> Self {
        Self::logic_timer()
    }
}

fn status_frame(status: StatusCode) -> Vec<u8> {
    vec![MARKER, status.as_byte(), 0]
}

fn encode_reply(reply: &Reply) -> Vec<u8> {
    match reply {
        Reply::Data(payload) => {
            let mut out = vec![MARKER, 0x00, payload.len() as u8];
            out.extend_from_slice(payload);
            out
        }
        Reply::Status(status) => status_frame(*status),
        Reply::Raw(bytes) => bytes.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stream::ByteChannel;

    #[tokio::test]
    async fn test_command_count() {
        let (mut channel, _device) =
            SimulatedDevice::logic_timer().connect(Some(Duration::from_secs(1)));
        channel.write_all(&[b'b', 0, 1, 0]).await.unwrap();
        let mut buf = [0u8; 4];
        channel.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [b'b', 0, 1, 4]);
    }

    #[tokio::test]
    async fn test_wrong_byte_count() {
        let (mut channel, _device) =
            SimulatedDevice::logic_timer().connect(Some(Duration::from_secs(1)));
        // start expects four argument bytes
        channel.write_all(&[b'b', 0, 2, 2, 0]).await.unwrap();
        let mut buf = [0u8; 3];
        channel.read_exact(&mut buf).await.unwrap();
        assert_eq!(buf, [b'b', StatusCode::ByteCountError.as_byte(), 0]);
    }

    #[tokio::test]
    async fn test_every_start_streams_events() {
        let (mut channel, _device) = SimulatedDevice::logic_timer()
            .events(vec![(3, 1), (0, 0xFF)])
            .connect(Some(Duration::from_secs(1)));
        for _ in 0..2 {
            // start(1.0): answer of 30 ticks, then two record frames
            channel.write_all(&[b'b', 0, 5, 2, 0, 0, 0x80, 0x3F]).await.unwrap();
            let mut buf = [0u8; 21];
            channel.read_exact(&mut buf).await.unwrap();
            assert_eq!(&buf[..5], &[b'b', 0, 2, 30, 0]);
            assert_eq!(&buf[5..13], &[b'b', 0, 5, 3, 0, 0, 0, 1]);
            assert_eq!(&buf[13..], &[b'b', 0, 5, 0, 0, 0, 0, 0xFF]);
        }
    }
}
