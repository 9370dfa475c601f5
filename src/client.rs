//! Interactive command-line client (§6.3 `cmd` subcommand): a line-oriented
//! REPL over the client side of the wire protocol. A client connection
//! carries no unsolicited traffic (fan-out only reaches peers), so every
//! command is a simple send-then-read-the-next-frame round trip.

use std::io::Write;

use anyhow::Context;
use bytes::Bytes;
use codec::{
    MAX_FRAME_LEN,
    handshake::Role,
    message::{Message, Rid},
    read_frame, write_frame,
};
use service::rid::RidAllocator;
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    net::TcpStream,
};

use crate::{config::Cli, handshake};

pub async fn run(cli: &Cli) -> anyhow::Result<()> {
    let mut stream = TcpStream::connect(cli.address()).await.context("connect to router")?;
    stream.set_nodelay(true).ok();

    let range = handshake::perform(&mut stream, cli.password.as_deref(), Role::Client)
        .await
        .context("client handshake")?;
    let mut rids = RidAllocator::new(range);

    println!("connected to {}", cli.address());
    println!("commands: get <key> | set <key> <value> | del <key> | keys | quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush().ok();

        let Some(line) = lines.next_line().await? else {
            break;
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.splitn(3, ' ');
        let command = parts.next().unwrap_or_default();

        match command {
            "get" => {
                let Some(key) = parts.next() else {
                    println!("usage: get <key>");
                    continue;
                };

                let rid = rids.alloc().context("rid range exhausted")?;
                let key = Bytes::copy_from_slice(key.as_bytes());
                write_frame(&mut stream, &Message::Get { rid, key }.encode()).await?;

                match read_reply(&mut stream, rid).await? {
                    Some(value) => println!("{}", String::from_utf8_lossy(&value)),
                    None => println!("(not found)"),
                }

                rids.free(rid);
            }
            "set" => {
                let Some(key) = parts.next() else {
                    println!("usage: set <key> <value>");
                    continue;
                };

                let value = parts.next().unwrap_or_default();
                let message = Message::Set {
                    key: Bytes::copy_from_slice(key.as_bytes()),
                    value: Bytes::copy_from_slice(value.as_bytes()),
                };
                write_frame(&mut stream, &message.encode()).await?;
            }
            "del" => {
                let Some(key) = parts.next() else {
                    println!("usage: del <key>");
                    continue;
                };

                let message = Message::Del { key: Bytes::copy_from_slice(key.as_bytes()) };
                write_frame(&mut stream, &message.encode()).await?;
            }
            "keys" => {
                let rid = rids.alloc().context("rid range exhausted")?;
                write_frame(&mut stream, &Message::GetKeys { rid }.encode()).await?;

                let frame = read_frame(&mut stream, MAX_FRAME_LEN).await?;
                match Message::decode(&frame)? {
                    Message::AllKeys { keys, .. } => {
                        for key in keys {
                            println!("{}", String::from_utf8_lossy(&key));
                        }
                    }
                    _ => println!("(unexpected reply)"),
                }

                rids.free(rid);
            }
            "quit" | "exit" => break,
            other => println!("unknown command: {other}"),
        }
    }

    Ok(())
}

/// Reads the next frame and returns it as a reply to `rid` if it
/// correlates, `None` otherwise (a NOTFOUND, or a mismatched/garbled
/// frame — there is nothing else to wait for on a client connection).
async fn read_reply(stream: &mut TcpStream, rid: Rid) -> anyhow::Result<Option<Bytes>> {
    let frame = read_frame(stream, MAX_FRAME_LEN).await?;

    Ok(match Message::decode(&frame)? {
        Message::Answer { rid: got, value } if got == rid => Some(value),
        _ => None,
    })
}
