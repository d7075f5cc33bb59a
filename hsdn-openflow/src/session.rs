//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::packet::{Header, Message, OFP_HEADER_SIZE};

pub type SessionId = u64;

// Messages from session tasks to the driver main task.
#[derive(Debug)]
pub enum SessionMsg {
    Connected {
        session_id: SessionId,
        addr: SocketAddr,
        tx: SessionTx,
    },
    Message {
        session_id: SessionId,
        xid: u32,
        msg: Message,
    },
    Disconnected {
        session_id: SessionId,
    },
}

// Handle for sending messages to one switch connection.
#[derive(Clone, Debug)]
pub struct SessionTx {
    tx: UnboundedSender<Bytes>,
    next_xid: std::sync::Arc<std::sync::atomic::AtomicU32>,
}

// ===== impl SessionTx =====

impl SessionTx {
    pub fn send(&self, msg: &Message) {
        let xid = self
            .next_xid
            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        self.send_xid(msg, xid);
    }

    pub fn send_xid(&self, msg: &Message, xid: u32) {
        let _ = self.tx.send(msg.encode(xid).freeze());
    }
}

// ===== global functions =====

// Binds the controller socket and accepts switch connections, spawning a
// session task pair per switch.
pub async fn listen(
    addr: String,
    session_tx: UnboundedSender<SessionMsg>,
) -> std::io::Result<()> {
    let listener = TcpListener::bind(&addr).await?;
    let mut next_session_id: SessionId = 0;

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                next_session_id += 1;
                spawn_session(next_session_id, stream, addr, session_tx.clone());
            }
            Err(error) => {
                warn!(%error, "failed to accept connection");
            }
        }
    }
}

fn spawn_session(
    session_id: SessionId,
    stream: TcpStream,
    addr: SocketAddr,
    session_tx: UnboundedSender<SessionMsg>,
) {
    debug!(%addr, "switch connected");
    let (read_half, write_half) = stream.into_split();

    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(write_loop(write_half, rx));

    let _ = session_tx.send(SessionMsg::Connected {
        session_id,
        addr,
        tx: SessionTx {
            tx,
            next_xid: Default::default(),
        },
    });
    tokio::spawn(async move {
        if let Err(error) = read_loop(read_half, session_id, &session_tx).await
        {
            debug!(%error, %addr, "connection closed");
        }
        let _ = session_tx.send(SessionMsg::Disconnected { session_id });
    });
}

async fn write_loop(
    mut write_half: OwnedWriteHalf,
    mut rx: mpsc::UnboundedReceiver<Bytes>,
) {
    while let Some(frame) = rx.recv().await {
        if let Err(error) = write_half.write_all(&frame).await {
            debug!(%error, "failed to write message");
            return;
        }
    }
}

async fn read_loop(
    mut read_half: OwnedReadHalf,
    session_id: SessionId,
    session_tx: &UnboundedSender<SessionMsg>,
) -> std::io::Result<()> {
    loop {
        let mut frame = vec![0u8; OFP_HEADER_SIZE];
        read_half.read_exact(&mut frame).await?;

        let Ok(header) = Header::decode(&frame) else {
            return Err(std::io::Error::other("invalid message header"));
        };
        frame.resize(header.length as usize, 0);
        read_half.read_exact(&mut frame[OFP_HEADER_SIZE..]).await?;

        match Message::decode(&frame) {
            Ok((header, msg)) => {
                let _ = session_tx.send(SessionMsg::Message {
                    session_id,
                    xid: header.xid,
                    msg,
                });
            }
            Err(error) => {
                // Message types the controller doesn't track are skipped.
                debug!(%error, "ignoring message");
            }
        }
    }
}
