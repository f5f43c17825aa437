use std::io::{self, Cursor};
use std::sync::Arc;

use thiserror::Error;
use tokio::time::timeout;

use crate::tftp::core::packet::{self, DATAGRAM_SIZE};
use crate::tftp::core::{ErrorCode, OpCode, Socket, TransferOptions};

/// Why a transfer ended without delivering the whole payload
#[derive(Debug, Error)]
pub enum TransferError {
    #[error("write: {0}")]
    Write(#[source] io::Error),
    #[error("waiting for ACK: {0}")]
    Read(#[source] io::Error),
    #[error("preparing data packet: {0}")]
    Payload(#[source] io::Error),
    #[error("exhausted retries ({attempts} attempts on block {block})")]
    RetriesExhausted { block: u16, attempts: u8 },
    #[error("received error {code}: {message}")]
    Aborted { code: ErrorCode, message: String },
}

/// Totals of a completed transfer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransferSummary {
    /// DATA blocks acknowledged, including the final short block
    pub blocks: u64,
    /// Payload bytes delivered
    pub bytes: u64,
}

/// What came back from the peer after sending a block
enum Reply {
    Ack(u16),
    Error { code: ErrorCode, message: String },
    Malformed(String),
}

impl Reply {
    fn classify(buf: &[u8]) -> Self {
        if let Ok(block_num) = packet::decode_ack(buf) {
            return Reply::Ack(block_num);
        }

        // An ERROR opcode ends the transfer even when the message is garbage.
        if OpCode::peek(buf) == Some(OpCode::Error) {
            return match packet::decode_error(buf) {
                Ok(err) => Reply::Error {
                    code: err.code,
                    message: err.message,
                },
                Err(e) => Reply::Error {
                    code: ErrorCode::Unknown,
                    message: e.to_string(),
                },
            };
        }

        match packet::Packet::deserialize(buf) {
            Ok(_) => Reply::Malformed("unexpected packet type".to_string()),
            Err(e) => Reply::Malformed(e.to_string()),
        }
    }
}

/// Sends the payload to a single client, one acknowledged block at a time
///
/// The worker owns its socket, block counter, retry counter and payload
/// cursor. Only the payload buffer itself is shared with other workers.
pub struct Worker<S: Socket> {
    socket: S,
    payload: Arc<[u8]>,
    options: TransferOptions,
    peer: String,
}

impl<S: Socket> Worker<S> {
    /// Create a worker for a socket already connected to the client.
    pub fn new(socket: S, payload: Arc<[u8]>, options: TransferOptions) -> Self {
        let peer = socket
            .remote_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        Self {
            socket,
            payload,
            options: options.normalized(),
            peer,
        }
    }

    /// Run the transfer to completion.
    ///
    /// Ends successfully once a block shorter than 512 bytes has been
    /// acknowledged. A payload whose length is a multiple of 512 therefore
    /// finishes with an empty block.
    pub async fn send_file(self) -> Result<TransferSummary, TransferError> {
        let mut cursor = Cursor::new(Arc::clone(&self.payload));
        let mut block_num: u16 = 0;
        let mut summary = TransferSummary::default();

        loop {
            let (data, next) =
                packet::encode_data(block_num, &mut cursor).map_err(TransferError::Payload)?;
            // NOTE: block numbers wrap after 65535, so an ACK for a wrapped
            // block cannot be told apart from one for the same number before
            // the wrap.
            block_num = next;

            self.send_block(&data, block_num).await?;

            summary.blocks += 1;
            summary.bytes += (data.len() - 4) as u64;

            if data.len() < DATAGRAM_SIZE {
                return Ok(summary);
            }
        }
    }

    /// Send one block until it is acknowledged or the retry budget runs out.
    async fn send_block(&self, data: &[u8], block_num: u16) -> Result<(), TransferError> {
        let mut buf = [0u8; DATAGRAM_SIZE];

        for attempt in 1..=self.options.retries {
            self.socket.send(data).await.map_err(TransferError::Write)?;

            let len = match timeout(self.options.timeout, self.socket.recv(&mut buf)).await {
                Ok(Ok(len)) => len,
                Ok(Err(e)) => return Err(TransferError::Read(e)),
                Err(_) => {
                    log::debug!(
                        "[{}] timeout waiting for ACK {} (attempt {}/{})",
                        self.peer,
                        block_num,
                        attempt,
                        self.options.retries
                    );
                    continue;
                }
            };

            match Reply::classify(&buf[..len]) {
                Reply::Ack(acked) if acked == block_num => return Ok(()),
                Reply::Ack(acked) => {
                    log::warn!(
                        "[{}] unexpected ACK {}, expected {}",
                        self.peer,
                        acked,
                        block_num
                    );
                }
                Reply::Error { code, message } => {
                    log::warn!("[{}] received error {}: {}", self.peer, code, message);
                    return Err(TransferError::Aborted { code, message });
                }
                Reply::Malformed(reason) => {
                    log::warn!("[{}] bad packet: {}", self.peer, reason);
                }
            }
        }

        Err(TransferError::RetriesExhausted {
            block: block_num,
            attempts: self.options.retries,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tftp::core::packet::{BLOCK_SIZE, decode_data, encode_ack, encode_error};
    use std::collections::VecDeque;
    use std::future::Future;
    use std::net::SocketAddr;
    use std::sync::Mutex;
    use std::time::Duration;

    enum Script {
        /// Acknowledge whatever block was sent last
        AckLast,
        Datagram(Vec<u8>),
        Silence,
        Fail(io::ErrorKind),
    }

    /// In-memory socket replaying a fixed script of replies
    struct ScriptedSocket {
        sent: Arc<Mutex<Vec<Vec<u8>>>>,
        script: Mutex<VecDeque<Script>>,
    }

    impl ScriptedSocket {
        fn new(script: Vec<Script>) -> (Self, Arc<Mutex<Vec<Vec<u8>>>>) {
            let sent = Arc::new(Mutex::new(Vec::new()));
            let socket = Self {
                sent: Arc::clone(&sent),
                script: Mutex::new(script.into()),
            };
            (socket, sent)
        }
    }

    impl Socket for ScriptedSocket {
        fn send(&self, buf: &[u8]) -> impl Future<Output = io::Result<usize>> + Send {
            self.sent.lock().unwrap().push(buf.to_vec());
            let len = buf.len();
            async move { Ok(len) }
        }

        fn recv(&self, buf: &mut [u8]) -> impl Future<Output = io::Result<usize>> + Send {
            let next = self.script.lock().unwrap().pop_front();
            let reply = match next {
                Some(Script::AckLast) => {
                    let sent = self.sent.lock().unwrap();
                    let last = sent.last().expect("nothing sent yet");
                    Some(Ok(encode_ack(decode_data(last).unwrap().block_num)))
                }
                Some(Script::Datagram(datagram)) => Some(Ok(datagram)),
                Some(Script::Fail(kind)) => Some(Err(io::Error::from(kind))),
                Some(Script::Silence) | None => None,
            };

            async move {
                match reply {
                    Some(Ok(datagram)) => {
                        buf[..datagram.len()].copy_from_slice(&datagram);
                        Ok(datagram.len())
                    }
                    Some(Err(e)) => Err(e),
                    None => std::future::pending().await,
                }
            }
        }

        fn remote_addr(&self) -> io::Result<SocketAddr> {
            Ok("127.0.0.1:50000".parse().unwrap())
        }
    }

    fn options(retries: u8) -> TransferOptions {
        TransferOptions::new(retries, Duration::from_millis(20))
    }

    fn payload(len: usize) -> Arc<[u8]> {
        (0..len).map(|i| (i % 251) as u8).collect::<Vec<u8>>().into()
    }

    fn blocks(sent: &Arc<Mutex<Vec<Vec<u8>>>>) -> Vec<(u16, usize)> {
        sent.lock()
            .unwrap()
            .iter()
            .map(|d| {
                let packet = decode_data(d).unwrap();
                (packet.block_num, packet.data.len())
            })
            .collect()
    }

    #[tokio::test]
    async fn short_final_block_completes_transfer() {
        let (socket, sent) = ScriptedSocket::new(vec![Script::AckLast, Script::AckLast]);
        let summary = Worker::new(socket, payload(1000), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(summary, TransferSummary { blocks: 2, bytes: 1000 });
        assert_eq!(blocks(&sent), vec![(1, 512), (2, 488)]);
    }

    #[tokio::test]
    async fn exact_multiple_ends_with_empty_block() {
        let script = (0..3).map(|_| Script::AckLast).collect();
        let (socket, sent) = ScriptedSocket::new(script);
        let summary = Worker::new(socket, payload(1024), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(summary.blocks, 3);
        assert_eq!(blocks(&sent), vec![(1, 512), (2, 512), (3, 0)]);
    }

    #[tokio::test]
    async fn payload_is_delivered_in_order() {
        let data = payload(5 * BLOCK_SIZE + 1);
        let script = (0..6).map(|_| Script::AckLast).collect();
        let (socket, sent) = ScriptedSocket::new(script);
        Worker::new(socket, Arc::clone(&data), options(3))
            .send_file()
            .await
            .unwrap();

        let sent = sent.lock().unwrap();
        let numbers: Vec<u16> = sent.iter().map(|d| decode_data(d).unwrap().block_num).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);

        let received: Vec<u8> = sent.iter().flat_map(|d| d[4..].to_vec()).collect();
        assert_eq!(received, data.to_vec());
    }

    #[tokio::test]
    async fn silent_client_exhausts_retries() {
        let (socket, sent) = ScriptedSocket::new(vec![]);
        let err = Worker::new(socket, payload(1000), options(3))
            .send_file()
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            TransferError::RetriesExhausted { block: 1, attempts: 3 }
        ));
        assert_eq!(blocks(&sent), vec![(1, 512); 3]);
    }

    #[tokio::test]
    async fn timeout_resends_same_block() {
        let (socket, sent) =
            ScriptedSocket::new(vec![Script::Silence, Script::AckLast, Script::AckLast]);
        Worker::new(socket, payload(600), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(blocks(&sent), vec![(1, 512), (1, 512), (2, 88)]);
    }

    #[tokio::test]
    async fn wrong_ack_consumes_a_retry() {
        let (socket, sent) = ScriptedSocket::new(vec![
            Script::Datagram(encode_ack(5)),
            Script::AckLast,
        ]);
        let summary = Worker::new(socket, payload(100), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(summary.blocks, 1);
        assert_eq!(blocks(&sent), vec![(1, 100), (1, 100)]);
    }

    #[tokio::test]
    async fn wrong_acks_count_against_the_budget() {
        let (socket, sent) = ScriptedSocket::new(vec![
            Script::Datagram(encode_ack(5)),
            Script::Datagram(encode_ack(0)),
        ]);
        let err = Worker::new(socket, payload(100), options(2))
            .send_file()
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::RetriesExhausted { .. }));
        assert_eq!(sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn garbage_reply_resends_block() {
        let (socket, sent) = ScriptedSocket::new(vec![
            Script::Datagram(b"\x00\x09nonsense".to_vec()),
            Script::AckLast,
        ]);
        Worker::new(socket, payload(10), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(blocks(&sent), vec![(1, 10), (1, 10)]);
    }

    #[tokio::test]
    async fn error_packet_aborts_immediately() {
        let (socket, sent) = ScriptedSocket::new(vec![Script::Datagram(encode_error(
            ErrorCode::DiskFull,
            "disk full",
        ))]);
        let err = Worker::new(socket, payload(1000), options(5))
            .send_file()
            .await
            .unwrap_err();

        match err {
            TransferError::Aborted { code, message } => {
                assert_eq!(code, ErrorCode::DiskFull);
                assert_eq!(message, "disk full");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_error_packet_still_aborts() {
        let (socket, sent) =
            ScriptedSocket::new(vec![Script::Datagram(b"\x00\x05\x00\x01no terminator".to_vec())]);
        let err = Worker::new(socket, payload(1000), options(5))
            .send_file()
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Aborted { code: ErrorCode::Unknown, .. }));
        assert_eq!(sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn read_failure_ends_transfer() {
        let (socket, _) =
            ScriptedSocket::new(vec![Script::Fail(io::ErrorKind::ConnectionRefused)]);
        let err = Worker::new(socket, payload(1000), options(5))
            .send_file()
            .await
            .unwrap_err();

        assert!(matches!(err, TransferError::Read(_)));
    }

    #[tokio::test]
    async fn block_numbers_wrap_after_65535() {
        let full_blocks = u16::MAX as usize;
        let script = (0..=full_blocks).map(|_| Script::AckLast).collect();
        let (socket, sent) = ScriptedSocket::new(script);
        let summary = Worker::new(socket, payload(full_blocks * BLOCK_SIZE + 10), options(3))
            .send_file()
            .await
            .unwrap();

        assert_eq!(summary.blocks, 65536);
        let sent = blocks(&sent);
        assert_eq!(sent.len(), 65536);
        assert_eq!(sent[65534], (65535, BLOCK_SIZE));
        assert_eq!(sent[65535], (0, 10));
    }

    #[tokio::test]
    async fn zero_retries_use_default_budget() {
        let (socket, _) = ScriptedSocket::new(vec![Script::AckLast]);
        let worker = Worker::new(socket, payload(1), TransferOptions::new(0, Duration::ZERO));
        assert_eq!(worker.options, TransferOptions::default());
    }
}
