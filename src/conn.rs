//! The router's authoritative side of the handshake (§4.2) and the
//! per-connection operational dispatch (§4.4-4.5/4.7), grounded on
//! `RouterProtocol.stringReceived` in the original implementation.

use std::time::Duration;

use codec::{
    PROTOCOL_VERSION,
    handshake::{self, Role},
    message::Message,
    opcode::Status,
    read_frame, write_frame,
};
use service::Router;
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    net::TcpStream,
    sync::mpsc,
};

use crate::{observer::Observer, statistics::Statistics};

const PASSWORD_MISMATCH_DELAY: Duration = Duration::from_secs(3);

/// Why a connection never reached an operational mode; bumps
/// `Statistics::handshake_failed` at the call site.
#[derive(Debug)]
pub enum HandshakeFailure {
    VersionMismatch,
    IncorrectPassword,
    ProtocolViolation,
    Closed,
}

/// Drives one accepted TCP connection end to end: handshake, then
/// operational dispatch until the peer disconnects or violates the
/// protocol.
pub async fn handle(stream: TcpStream, router: std::sync::Arc<Router<Observer>>, statistics: Statistics) {
    stream.set_nodelay(true).ok();
    let (mut read_half, mut write_half) = stream.into_split();

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<u8>>();
    let writer = tokio::spawn(async move {
        while let Some(frame) = rx.recv().await {
            if write_frame(&mut write_half, &frame).await.is_err() {
                break;
            }
        }
        let _ = write_half.shutdown().await;
    });

    let role = match handshake(&mut read_half, &tx, &router).await {
        Ok(role) => role,
        Err(failure) => {
            log::debug!("handshake failed: {failure:?}");
            statistics.handshake_failed();
            drop(tx);
            writer.abort();
            return;
        }
    };

    let (id, range) = router.join(role, tx.clone());
    if tx.send(range.encode().to_vec()).is_err() {
        router.leave(id);
        writer.abort();
        return;
    }
    let mut mode = role;

    loop {
        let frame = match read_frame(&mut read_half, codec::MAX_FRAME_LEN).await {
            Ok(frame) => frame,
            Err(_) => break,
        };

        let message = match Message::decode(&frame) {
            Ok(message) => message,
            Err(_) => break,
        };

        if matches!(message, Message::Switch) {
            if router.switch(id) {
                mode = if mode == Role::Server { Role::Client } else { Role::Server };
            }
            continue;
        }

        match mode {
            Role::Server => match message {
                Message::Answer { .. } | Message::NotFound { .. } | Message::AllKeys { .. } => {
                    router.got_answer(message);
                }
                _ => break,
            },
            Role::Client => match message {
                Message::Set { key, value } => router.set(key, value),
                Message::Del { key } => router.delete(key),
                Message::Get { rid, key } => {
                    let outcome = router.get(rid, key);
                    let reply = match outcome.await {
                        Ok(service::GetOutcome::Value(value)) => Message::Answer { rid, value },
                        _ => Message::NotFound { rid },
                    };
                    statistics.get_served();
                    if tx.send(reply.encode()).is_err() {
                        break;
                    }
                }
                Message::GetKeys { rid } => {
                    let keys = router.getkeys(rid).await.unwrap_or_default();
                    statistics.getkeys_served();
                    if tx.send(Message::AllKeys { rid, keys }.encode()).is_err() {
                        break;
                    }
                }
                _ => break,
            },
        }
    }

    router.leave(id);
    drop(tx);
    writer.abort();
}

async fn handshake<R>(
    read_half: &mut R,
    tx: &mpsc::UnboundedSender<Vec<u8>>,
    router: &Router<Observer>,
) -> Result<Role, HandshakeFailure>
where
    R: AsyncRead + Unpin,
{
    let version_frame = read_frame(read_half, codec::MAX_FRAME_LEN).await.map_err(|_| HandshakeFailure::Closed)?;
    let version = handshake::decode_version(&version_frame).map_err(|_| HandshakeFailure::ProtocolViolation)?;

    if version != PROTOCOL_VERSION {
        let _ = tx.send(handshake::encode_status(Status::Error).to_vec());
        return Err(HandshakeFailure::VersionMismatch);
    }

    if let Some(password) = router.password() {
        let _ = tx.send(handshake::encode_status(Status::PasswordRequired).to_vec());

        let password_frame = read_frame(read_half, codec::MAX_FRAME_LEN).await.map_err(|_| HandshakeFailure::Closed)?;
        if password_frame != password.as_ref() {
            tokio::time::sleep(PASSWORD_MISMATCH_DELAY).await;
            let _ = tx.send(handshake::encode_status(Status::Error).to_vec());
            return Err(HandshakeFailure::IncorrectPassword);
        }
    }

    let _ = tx.send(handshake::encode_status(Status::Ok).to_vec());

    let mode_frame = read_frame(read_half, codec::MAX_FRAME_LEN).await.map_err(|_| HandshakeFailure::Closed)?;
    let marker = handshake::decode_marker(&mode_frame).map_err(|_| HandshakeFailure::ProtocolViolation)?;
    let role = Role::try_from(marker).map_err(|_| HandshakeFailure::ProtocolViolation)?;

    Ok(role)
}
