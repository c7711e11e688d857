//! Reading response frames off a channel
//!
//! Every failure path that can leave unread bytes in flight drains the
//! channel before returning, so the next request starts on a clean link.

use crate::frame::{FrameHeader, HEADER_LENGTH, MARKER};
use bincoms_core::{BincomsError, BincomsResult, ReturnLayout, StatusCode, Value};
use bincoms_transport::ByteChannel;

/// Response reader and payload decoder
pub struct FrameCodec;

impl FrameCodec {
    /// Read one response frame and return its payload
    ///
    /// A non-OK status ends the frame after the header and surfaces as
    /// [`BincomsError::Device`]. An incomplete or malformed header, or a
    /// payload shorter than announced, surfaces as
    /// [`BincomsError::ProtocolFraming`] after pending input was discarded.
    pub async fn read_response<C>(channel: &mut C) -> BincomsResult<Vec<u8>>
    where
        C: ByteChannel + ?Sized,
    {
        let mut raw = [0u8; HEADER_LENGTH];
        if let Err((filled, err)) = fill(channel, &mut raw).await {
            // Nothing arrived and the link itself failed
            if filled == 0 && matches!(err, BincomsError::Connection(_)) {
                return Err(err);
            }
            drain(channel).await;
            return Err(BincomsError::ProtocolFraming(format!(
                "Answer header {:02X?} does not match the expected format \"ccB\": {}",
                &raw[..filled],
                err
            )));
        }

        let header = FrameHeader::decode(raw);
        if header.marker != MARKER {
            drain(channel).await;
            return Err(BincomsError::ProtocolFraming(format!(
                "Answer header {:02X?} carries an unrecognized marker",
                raw
            )));
        }

        let status = match StatusCode::from_byte(header.status) {
            Some(status) => status,
            None => {
                drain(channel).await;
                return Err(BincomsError::ProtocolFraming(format!(
                    "Answer header {:02X?} carries an unrecognized status",
                    raw
                )));
            }
        };
        if !status.is_ok() {
            return Err(BincomsError::Device(status));
        }

        let mut payload = vec![0u8; header.length as usize];
        if let Err((filled, err)) = fill(channel, &mut payload).await {
            drain(channel).await;
            return Err(BincomsError::ProtocolFraming(format!(
                "Expected {} payload byte(s), received {}: {}",
                header.length, filled, err
            )));
        }
        Ok(payload)
    }

    /// Decode a payload against a return layout
    ///
    /// On mismatch the channel is drained and the drained bytes are reported
    /// alongside the payload.
    pub async fn decode_payload<C>(
        channel: &mut C,
        layout: &ReturnLayout,
        payload: &[u8],
    ) -> BincomsResult<Value>
    where
        C: ByteChannel + ?Sized,
    {
        match layout.unpack(payload) {
            Some(value) => Ok(value),
            None => {
                let residual = drain(channel).await;
                Err(BincomsError::FormatMismatch {
                    layout: layout.to_string(),
                    received: payload.to_vec(),
                    residual,
                })
            }
        }
    }
}

/// Drop pending input, keeping whatever was read before a failure
///
/// A failed drain is logged only; the caller reports the corruption it saw.
async fn drain<C>(channel: &mut C) -> Vec<u8>
where
    C: ByteChannel + ?Sized,
{
    match channel.discard_input().await {
        Ok(dropped) => dropped,
        Err(e) => {
            log::warn!("Failed to drain input after a corrupt answer: {}", e);
            Vec::new()
        }
    }
}

/// Fill `buf` completely, reporting how far it got on failure
async fn fill<C>(channel: &mut C, buf: &mut [u8]) -> Result<(), (usize, BincomsError)>
where
    C: ByteChannel + ?Sized,
{
    let mut filled = 0;
    while filled < buf.len() {
        match channel.read(&mut buf[filled..]).await {
            Ok(0) => {
                return Err((
                    filled,
                    BincomsError::Connection(std::io::Error::new(
                        std::io::ErrorKind::UnexpectedEof,
                        "Channel closed mid-frame",
                    )),
                ));
            }
            Ok(n) => filled += n,
            Err(e) => return Err((filled, e)),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use bincoms_transport::IoChannel;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    const TIMEOUT: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_read_ok_response() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        device.write_all(&[b'b', 0, 2, 0x34, 0x12]).await.unwrap();

        let payload = FrameCodec::read_response(&mut channel).await.unwrap();
        assert_eq!(payload, vec![0x34, 0x12]);
    }

    #[tokio::test]
    async fn test_every_status_is_recognized() {
        for status in StatusCode::ALL.into_iter().filter(|s| !s.is_ok()) {
            let (mut device, host) = tokio::io::duplex(64);
            let mut channel = IoChannel::new(host, Some(TIMEOUT));
            device.write_all(&[b'b', status.as_byte(), 0]).await.unwrap();
            device.write_all(&[b'b', 0, 1, 0x42]).await.unwrap();

            match FrameCodec::read_response(&mut channel).await {
                Err(BincomsError::Device(got)) => assert_eq!(got, status),
                other => panic!("unexpected {:?}", other),
            }
            // Only the header was consumed
            assert_eq!(FrameCodec::read_response(&mut channel).await.unwrap(), vec![0x42]);
        }
    }

    #[tokio::test]
    async fn test_status_out_of_range() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        device.write_all(&[b'b', 8, 0, 0xAA]).await.unwrap();

        match FrameCodec::read_response(&mut channel).await {
            Err(BincomsError::ProtocolFraming(_)) => {}
            other => panic!("unexpected {:?}", other),
        }
        assert!(channel.discard_input().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bad_marker_discards() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        device.write_all(&[b'x', 0, 1, 7, 7, 7]).await.unwrap();

        assert!(matches!(
            FrameCodec::read_response(&mut channel).await,
            Err(BincomsError::ProtocolFraming(_))
        ));
        assert!(channel.discard_input().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_short_payload() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        device.write_all(&[b'b', 0, 5, 1, 2]).await.unwrap();

        match FrameCodec::read_response(&mut channel).await {
            Err(BincomsError::ProtocolFraming(msg)) => assert!(msg.contains("received 2")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_no_answer_is_framing_error() {
        let (_device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));

        assert!(matches!(
            FrameCodec::read_response(&mut channel).await,
            Err(BincomsError::ProtocolFraming(_))
        ));
    }

    #[tokio::test]
    async fn test_closed_link_is_connection_error() {
        let (device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        drop(device);

        assert!(matches!(
            FrameCodec::read_response(&mut channel).await,
            Err(BincomsError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_failed_drain_keeps_framing_error() {
        // Three bytes of a bad header, then a broken pipe while draining
        let mock = tokio_test::io::Builder::new()
            .read(&[b'x', 0, 0])
            .read_error(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "unplugged"))
            .build();
        let mut channel = IoChannel::new(mock, Some(TIMEOUT));

        assert!(matches!(
            FrameCodec::read_response(&mut channel).await,
            Err(BincomsError::ProtocolFraming(_))
        ));
        assert!(channel.is_closed());
    }

    #[tokio::test]
    async fn test_format_mismatch_reports_residual() {
        let (mut device, host) = tokio::io::duplex(64);
        let mut channel = IoChannel::new(host, Some(TIMEOUT));
        device.write_all(&[0xDE, 0xAD]).await.unwrap();

        let layout = ReturnLayout::parse("I").unwrap();
        match FrameCodec::decode_payload(&mut channel, &layout, &[1, 2]).await {
            Err(BincomsError::FormatMismatch {
                layout,
                received,
                residual,
            }) => {
                assert_eq!(layout, "I");
                assert_eq!(received, vec![1, 2]);
                assert_eq!(residual, vec![0xDE, 0xAD]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
