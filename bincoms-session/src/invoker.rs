//! One request/response exchange

use crate::codec::FrameCodec;
use crate::descriptor::FunctionDescriptor;
use crate::frame::Frame;
use crate::statistics::SessionStatistics;
use bincoms_core::{BincomsError, BincomsResult, ReturnLayout, Value};
use bincoms_transport::ByteChannel;

/// Runs exchanges on a borrowed channel
///
/// `dirty` is set before the request is written and cleared only once the
/// whole answer has been consumed. A dirty link is drained before the next
/// request goes out, which covers exchanges abandoned halfway (a dropped
/// future, a timeout, a framing error).
pub struct CommandInvoker<'a, C: ?Sized> {
    channel: &'a mut C,
    statistics: &'a mut SessionStatistics,
    dirty: &'a mut bool,
}

impl<'a, C> CommandInvoker<'a, C>
where
    C: ByteChannel + ?Sized,
{
    pub fn new(
        channel: &'a mut C,
        statistics: &'a mut SessionStatistics,
        dirty: &'a mut bool,
    ) -> Self {
        Self {
            channel,
            statistics,
            dirty,
        }
    }

    /// Pack `args`, send the request and decode the answer
    ///
    /// # Errors
    /// * `ArgumentCount` / `ArgumentType` before anything is written
    /// * `Device` when the device answered with a non-OK status
    /// * `ProtocolFraming` / `FormatMismatch` when the link lost sync
    pub async fn invoke(
        &mut self,
        descriptor: &FunctionDescriptor,
        args: &[Value],
    ) -> BincomsResult<Value> {
        let expected = descriptor.argument_layout.arity();
        if args.len() != expected {
            return Err(BincomsError::ArgumentCount {
                function: descriptor.name.clone(),
                expected,
                got: args.len(),
            });
        }

        let mut packed = Vec::new();
        descriptor.argument_layout.pack(args, &mut packed)?;
        let frame = Frame::request(descriptor.id, &packed)?;
        let bytes = frame.encode();

        self.resync().await?;
        *self.dirty = true;

        log::debug!("Send #{} {}: {:02X?}", descriptor.id, descriptor.name, bytes);
        self.channel.write_all(&bytes).await?;
        self.channel.flush().await?;
        self.statistics.increment_requests_sent();

        self.receive(&descriptor.return_layout).await
    }

    /// Read and decode one answer frame without sending anything
    ///
    /// Used for frames the device pushes on its own, such as capture events.
    pub async fn receive(&mut self, layout: &ReturnLayout) -> BincomsResult<Value> {
        let result = match FrameCodec::read_response(&mut *self.channel).await {
            Ok(payload) => {
                log::debug!("Received: {:02X?}", payload);
                FrameCodec::decode_payload(&mut *self.channel, layout, &payload).await
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => {
                self.statistics.increment_responses_received();
                *self.dirty = false;
            }
            Err(e) if e.is_device_status() => {
                log::debug!("Device answered {}", e);
                self.statistics.increment_device_errors();
                *self.dirty = false;
            }
            Err(e) if e.is_link_corruption() => {
                log::warn!("Link error: {}", e);
                self.statistics.increment_link_errors();
            }
            Err(_) => {}
        }
        result
    }

    /// Drain leftovers of an abandoned exchange
    async fn resync(&mut self) -> BincomsResult<()> {
        if *self.dirty {
            let dropped = self.channel.discard_input().await?;
            log::debug!("Resynchronized link, dropped {} byte(s)", dropped.len());
            self.statistics.increment_resyncs();
            *self.dirty = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincoms_core::StatusCode;
    use bincoms_transport::IoChannel;
    use std::time::Duration;

    fn start() -> FunctionDescriptor {
        FunctionDescriptor::parse(2, "start", "f", "H").unwrap()
    }

    #[tokio::test]
    async fn test_exact_bytes_on_the_wire() {
        let mock = tokio_test::io::Builder::new()
            .write(&[b'b', 0x00, 5, 2, 0x00, 0x00, 0x80, 0x3F])
            .read(&[b'b', 0x00, 2, 0x1E, 0x00])
            .build();
        let mut channel = IoChannel::new(mock, Some(Duration::from_secs(1)));
        let mut stats = SessionStatistics::new();
        let mut dirty = false;

        let value = CommandInvoker::new(&mut channel, &mut stats, &mut dirty)
            .invoke(&start(), &[Value::F32(1.0)])
            .await
            .unwrap();
        assert_eq!(value, Value::U16(30));
        assert!(!dirty);
        assert_eq!(stats.requests_sent, 1);
        assert_eq!(stats.responses_received, 1);
    }

    #[tokio::test]
    async fn test_argument_count_checked_before_writing() {
        // Any write would fail against an empty script
        let mock = tokio_test::io::Builder::new().build();
        let mut channel = IoChannel::new(mock, Some(Duration::from_secs(1)));
        let mut stats = SessionStatistics::new();
        let mut dirty = false;

        let err = CommandInvoker::new(&mut channel, &mut stats, &mut dirty)
            .invoke(&start(), &[])
            .await
            .unwrap_err();
        match err {
            BincomsError::ArgumentCount {
                function,
                expected,
                got,
            } => {
                assert_eq!(function, "start");
                assert_eq!(expected, 1);
                assert_eq!(got, 0);
            }
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(stats.requests_sent, 0);
    }

    #[tokio::test]
    async fn test_device_status_clears_dirty() {
        let mock = tokio_test::io::Builder::new()
            .write(&[b'b', 0x00, 3, 3, 5, b'r'])
            .read(&[b'b', StatusCode::ValueError.as_byte(), 0])
            .build();
        let mut channel = IoChannel::new(mock, Some(Duration::from_secs(1)));
        let mut stats = SessionStatistics::new();
        let mut dirty = false;
        let enable = FunctionDescriptor::parse(3, "enable_line", "Bc", "").unwrap();

        let err = CommandInvoker::new(&mut channel, &mut stats, &mut dirty)
            .invoke(&enable, &[Value::U8(5), Value::Char(b'r')])
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(StatusCode::ValueError));
        assert!(!dirty);
        assert_eq!(stats.device_errors, 1);
    }

    #[tokio::test]
    async fn test_dirty_link_is_drained_first() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(Duration::from_millis(200)));
        let mut stats = SessionStatistics::new();
        let mut dirty = true;

        // Late answer of an abandoned exchange
        tokio::io::AsyncWriteExt::write_all(&mut device, &[b'b', 0, 2, 9, 9])
            .await
            .unwrap();

        let responder = tokio::spawn(async move {
            let mut request = [0u8; 8];
            tokio::io::AsyncReadExt::read_exact(&mut device, &mut request)
                .await
                .unwrap();
            assert_eq!(request, [b'b', 0, 5, 2, 0, 0, 0x80, 0x3F]);
            tokio::io::AsyncWriteExt::write_all(&mut device, &[b'b', 0, 2, 0x1E, 0])
                .await
                .unwrap();
            device
        });

        let value = CommandInvoker::new(&mut channel, &mut stats, &mut dirty)
            .invoke(&start(), &[Value::F32(1.0)])
            .await
            .unwrap();
        assert_eq!(value, Value::U16(30));
        assert_eq!(stats.resyncs, 1);
        responder.await.unwrap();
    }
}
