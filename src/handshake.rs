//! Initiating side of the handshake (§4.2): the peer or client process
//! connecting out to the router. Mirrors `conn`'s authoritative side,
//! one write/read pair per step, since the two ends of a socket play
//! complementary roles over the same frame sequence.

use anyhow::{Context, bail};
use codec::{
    MAX_FRAME_LEN, PROTOCOL_VERSION,
    handshake::{self, RidRange, Role},
    opcode::{Marker, Status},
    read_frame, write_frame,
};
use tokio::net::TcpStream;

/// Runs the initiating side of the handshake and returns the RID range the
/// router assigned, leaving `stream` positioned to exchange operational
/// frames in `role`.
pub async fn perform(stream: &mut TcpStream, password: Option<&str>, role: Role) -> anyhow::Result<RidRange> {
    write_frame(stream, &handshake::encode_version(PROTOCOL_VERSION)).await.context("send version")?;

    let status = handshake::decode_status(&read_frame(stream, MAX_FRAME_LEN).await.context("read version reply")?)
        .context("decode version reply")?;

    if status == Status::Error {
        bail!("router rejected our protocol version");
    }

    if status == Status::PasswordRequired {
        let password = password.context("router requires a password but none was given")?;
        write_frame(stream, password.as_bytes()).await.context("send password")?;

        let reply = handshake::decode_status(&read_frame(stream, MAX_FRAME_LEN).await.context("read password reply")?)
            .context("decode password reply")?;

        if reply != Status::Ok {
            bail!("incorrect password");
        }
    }

    let marker: Marker = role.into();
    write_frame(stream, &handshake::encode_marker(marker)).await.context("send role")?;

    let range_frame = read_frame(stream, MAX_FRAME_LEN).await.context("read rid range")?;
    RidRange::decode(&range_frame).map_err(|e| anyhow::anyhow!("decode rid range: {e}"))
}
