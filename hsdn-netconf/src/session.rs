//
// Copyright (c) The HSDN Project Contributors
//
// SPDX-License-Identifier: MIT
//

use std::net::Ipv4Addr;
use std::pin::Pin;
use std::time::Duration;

use async_ssh2_tokio::client::{AuthMethod, Client, ServerCheckMethod};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;
use tracing::debug;

use crate::error::Error;

// NETCONF 1.0 end-of-message delimiter.
const NETCONF_EOM: &str = "]]>]]>";
// NETCONF-over-SSH well-known port.
const NETCONF_PORT: u16 = 830;
// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

trait NetconfIo: AsyncRead + AsyncWrite + Send + Unpin {}
impl<T> NetconfIo for T where T: AsyncRead + AsyncWrite + Send + Unpin {}

// One NETCONF session over an SSH `netconf` subsystem channel.
//
// Password authentication only, no host key verification; RPCs are
// framed with the base-1.0 end-of-message delimiter.
pub struct Session {
    #[allow(dead_code)]
    client: Client,
    stream: Pin<Box<dyn NetconfIo>>,
    next_message_id: u32,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("next_message_id", &self.next_message_id)
            .finish_non_exhaustive()
    }
}

// ===== impl Session =====

impl Session {
    pub async fn connect(
        addr: Ipv4Addr,
        username: &str,
        password: &str,
    ) -> Result<Session, Error> {
        let auth = AuthMethod::with_password(password);
        let client = timeout(
            CONNECT_TIMEOUT,
            Client::connect(
                (addr.to_string(), NETCONF_PORT),
                username,
                auth,
                ServerCheckMethod::NoCheck,
            ),
        )
        .await
        .map_err(|_| Error::ConnectTimeout)??;

        let channel = client.get_channel().await?;
        channel
            .request_subsystem(true, "netconf")
            .await
            .map_err(|error| Error::IoError(std::io::Error::other(error)))?;
        let stream = channel.into_stream();

        let mut session = Session {
            client,
            stream: Box::pin(stream),
            next_message_id: 1,
        };
        session.hello().await?;
        debug!(%addr, "established NETCONF session");
        Ok(session)
    }

    // Exchanges hello messages with the server.
    async fn hello(&mut self) -> Result<(), Error> {
        let hello = concat!(
            r#"<?xml version="1.0" encoding="UTF-8"?>"#,
            r#"<hello xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">"#,
            "<capabilities>",
            "<capability>urn:ietf:params:netconf:base:1.0</capability>",
            "</capabilities>",
            "</hello>",
            "]]>]]>",
        );
        self.stream.as_mut().write_all(hello.as_bytes()).await?;
        self.stream.as_mut().flush().await?;
        let _server_hello = self.read_reply().await?;
        Ok(())
    }

    // Issues a `<get>` with the given subtree filter and returns the raw
    // reply.
    pub async fn get(&mut self, filter: &str) -> Result<String, Error> {
        self.rpc(&format!("<get>{filter}</get>")).await
    }

    // Issues an `<edit-config>` against the candidate datastore.
    pub async fn edit_config(&mut self, config: &str) -> Result<(), Error> {
        self.rpc(&format!(
            "<edit-config><target><candidate/></target>{config}</edit-config>"
        ))
        .await?;
        Ok(())
    }

    // Commits the candidate configuration.
    pub async fn commit(&mut self) -> Result<(), Error> {
        self.rpc("<commit/>").await?;
        Ok(())
    }

    async fn rpc(&mut self, inner: &str) -> Result<String, Error> {
        let message_id = self.next_message_id;
        self.next_message_id += 1;
        let payload = format!(
            r#"<?xml version="1.0" encoding="UTF-8"?><rpc message-id="{message_id}" xmlns="urn:ietf:params:xml:ns:netconf:base:1.0">{inner}</rpc>{NETCONF_EOM}"#
        );
        self.stream.as_mut().write_all(payload.as_bytes()).await?;
        self.stream.as_mut().flush().await?;

        let reply = self.read_reply().await?;
        if reply.contains("<rpc-error>") && !reply.contains("<ok/>") {
            return Err(Error::RpcError(reply));
        }
        Ok(reply)
    }

    async fn read_reply(&mut self) -> Result<String, Error> {
        let mut buf = Vec::new();
        loop {
            let mut chunk = vec![0u8; 4096];
            let read = self.stream.as_mut().read(&mut chunk).await?;
            if read == 0 {
                return Err(Error::IoError(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "NETCONF stream closed",
                )));
            }
            buf.extend_from_slice(&chunk[..read]);
            if buf.len() >= NETCONF_EOM.len()
                && buf[buf.len() - NETCONF_EOM.len()..]
                    == NETCONF_EOM.as_bytes()[..]
            {
                break;
            }
        }
        buf.truncate(buf.len() - NETCONF_EOM.len());
        String::from_utf8(buf).map_err(|_| {
            Error::IoError(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "NETCONF reply is not UTF-8",
            ))
        })
    }
}
