//! Peer file sessions.
//!
//! A file session is an authenticated connection to a peer's file service
//! supporting exactly the operations a transfer worker needs: store a
//! file, retrieve a file, quit. The production implementation speaks a
//! minimal FTP subset (`USER`/`PASS`/`TYPE I`/`PASV`/`STOR`/`RETR`/`QUIT`)
//! over a control connection plus a passive-mode data connection.
//!
//! A session handle is an exclusively-owned resource: one transfer job at
//! a time.

use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;

/// Errors a file session operation can fail with
#[derive(Debug, Clone, thiserror::Error)]
pub enum SessionError {
    /// Transport-level failure
    #[error("session I/O error: {0}")]
    Io(String),

    /// The peer did not answer within the timeout
    #[error("session timed out")]
    Timeout,

    /// The peer answered with an unexpected or refusing reply
    #[error("peer rejected the operation: {code} {text}")]
    Rejected {
        /// Reply code the peer sent
        code: u16,
        /// Reply text the peer sent
        text: String,
    },

    /// The peer's reply did not follow the protocol
    #[error("malformed session reply: {0}")]
    Malformed(String),

    /// Login was refused
    #[error("login refused: {0}")]
    LoginRefused(String),
}

impl From<io::Error> for SessionError {
    fn from(err: io::Error) -> Self {
        SessionError::Io(err.to_string())
    }
}

/// The file operations a transfer worker drives.
///
/// Workers are generic over this trait; tests exercise them with scripted
/// sessions instead of live connections.
pub trait FileSession: Send {
    /// Peer address this session is connected to
    fn host(&self) -> IpAddr;

    /// Peer port this session is connected to
    fn port(&self) -> u16;

    /// Send the contents of `source` to the peer under `basename`
    fn store(
        &mut self,
        basename: &str,
        source: &mut File,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// Fetch `basename` from the peer into `sink`
    fn retrieve(
        &mut self,
        basename: &str,
        sink: &mut File,
    ) -> impl Future<Output = Result<(), SessionError>> + Send;

    /// End the session politely
    fn quit(&mut self) -> impl Future<Output = Result<(), SessionError>> + Send;
}

/// One parsed control-channel reply
#[derive(Debug, Clone, PartialEq, Eq)]
struct Reply {
    code: u16,
    text: String,
}

fn parse_reply(line: &str) -> Result<Reply, SessionError> {
    let line = line.trim_end();
    let code: u16 = line
        .get(..3)
        .and_then(|digits| digits.parse().ok())
        .ok_or_else(|| SessionError::Malformed(format!("no reply code in {line:?}")))?;
    Ok(Reply {
        code,
        text: line
            .get(3..)
            .unwrap_or("")
            .trim_start_matches([' ', '-'])
            .to_string(),
    })
}

/// Extract the data-channel target from a passive-mode reply,
/// `227 Entering Passive Mode (h1,h2,h3,h4,p1,p2)`.
fn parse_passive_target(text: &str) -> Option<SocketAddr> {
    let inner = text.split_once('(')?.1.split_once(')')?.0;
    let mut parts = inner.split(',').map(|p| p.trim().parse::<u8>());

    let mut next = || parts.next()?.ok();
    let (h1, h2, h3, h4) = (next()?, next()?, next()?, next()?);
    let (p1, p2) = (next()?, next()?);

    let addr = Ipv4Addr::new(h1, h2, h3, h4);
    let port = u16::from_be_bytes([p1, p2]);
    Some(SocketAddr::from((addr, port)))
}

/// Production file session over TCP
pub struct TcpFileSession {
    control: BufReader<TcpStream>,
    host: IpAddr,
    port: u16,
    timeout: Duration,
}

impl TcpFileSession {
    /// Connect to a peer's file service and read its banner.
    ///
    /// Returns the session and the banner text.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::Timeout`] when the peer does not answer
    /// in time, or [`SessionError::Io`] on transport failure.
    pub async fn connect(
        addr: IpAddr,
        port: u16,
        timeout: Duration,
    ) -> Result<(Self, String), SessionError> {
        let stream = time::timeout(timeout, TcpStream::connect((addr, port)))
            .await
            .map_err(|_| SessionError::Timeout)??;

        let mut session = Self {
            control: BufReader::new(stream),
            host: addr,
            port,
            timeout,
        };

        let banner = session.read_reply().await?;
        if banner.code != 220 {
            return Err(SessionError::Rejected {
                code: banner.code,
                text: banner.text,
            });
        }
        tracing::debug!(%addr, port, banner = %banner.text, "file session connected");
        Ok((session, banner.text))
    }

    /// Authenticate with the peer's fixed credential pair and switch the
    /// session to binary mode.
    ///
    /// # Errors
    ///
    /// Fails with [`SessionError::LoginRefused`] when the peer rejects the
    /// credentials.
    pub async fn login(&mut self, user: &str, password: &str) -> Result<(), SessionError> {
        let reply = self.command(&format!("USER {user}")).await?;
        match reply.code {
            331 => {
                let reply = self.command(&format!("PASS {password}")).await?;
                if reply.code != 230 {
                    return Err(SessionError::LoginRefused(reply.text));
                }
            }
            230 => {}
            _ => return Err(SessionError::LoginRefused(reply.text)),
        }

        let reply = self.command("TYPE I").await?;
        if reply.code != 200 {
            return Err(SessionError::Rejected {
                code: reply.code,
                text: reply.text,
            });
        }
        Ok(())
    }

    async fn command(&mut self, cmd: &str) -> Result<Reply, SessionError> {
        let stream = self.control.get_mut();
        stream.write_all(cmd.as_bytes()).await?;
        stream.write_all(b"\r\n").await?;
        self.read_reply().await
    }

    async fn read_reply(&mut self) -> Result<Reply, SessionError> {
        let mut line = String::new();
        let n = time::timeout(self.timeout, self.control.read_line(&mut line))
            .await
            .map_err(|_| SessionError::Timeout)??;
        if n == 0 {
            return Err(SessionError::Io("connection closed by peer".to_string()));
        }
        parse_reply(&line)
    }

    /// Negotiate a passive-mode data connection
    async fn open_data_channel(&mut self) -> Result<TcpStream, SessionError> {
        let reply = self.command("PASV").await?;
        if reply.code != 227 {
            return Err(SessionError::Rejected {
                code: reply.code,
                text: reply.text,
            });
        }
        let target = parse_passive_target(&reply.text)
            .ok_or_else(|| SessionError::Malformed(format!("bad passive reply: {}", reply.text)))?;

        let stream = time::timeout(self.timeout, TcpStream::connect(target))
            .await
            .map_err(|_| SessionError::Timeout)??;
        Ok(stream)
    }

    /// Run one data-channel transfer command to completion
    async fn transfer_command(&mut self, cmd: &str) -> Result<TcpStream, SessionError> {
        let data = self.open_data_channel().await?;
        let reply = self.command(cmd).await?;
        if reply.code != 150 && reply.code != 125 {
            return Err(SessionError::Rejected {
                code: reply.code,
                text: reply.text,
            });
        }
        Ok(data)
    }

    async fn expect_complete(&mut self) -> Result<(), SessionError> {
        let reply = self.read_reply().await?;
        if reply.code != 226 {
            return Err(SessionError::Rejected {
                code: reply.code,
                text: reply.text,
            });
        }
        Ok(())
    }
}

impl FileSession for TcpFileSession {
    fn host(&self) -> IpAddr {
        self.host
    }

    fn port(&self) -> u16 {
        self.port
    }

    async fn store(&mut self, basename: &str, source: &mut File) -> Result<(), SessionError> {
        let mut data = self.transfer_command(&format!("STOR {basename}")).await?;
        tokio::io::copy(source, &mut data).await?;
        data.shutdown().await?;
        drop(data);
        self.expect_complete().await
    }

    async fn retrieve(&mut self, basename: &str, sink: &mut File) -> Result<(), SessionError> {
        let mut data = self.transfer_command(&format!("RETR {basename}")).await?;
        tokio::io::copy(&mut data, sink).await?;
        sink.flush().await?;
        drop(data);
        self.expect_complete().await
    }

    async fn quit(&mut self) -> Result<(), SessionError> {
        let reply = self.command("QUIT").await?;
        if reply.code != 221 {
            tracing::debug!(code = reply.code, "peer answered quit with an odd code");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reply() {
        let reply = parse_reply("220 service ready\r\n").unwrap();
        assert_eq!(reply.code, 220);
        assert_eq!(reply.text, "service ready");
    }

    #[test]
    fn test_parse_reply_without_text() {
        let reply = parse_reply("230\r\n").unwrap();
        assert_eq!(reply.code, 230);
        assert_eq!(reply.text, "");
    }

    #[test]
    fn test_parse_reply_rejects_garbage() {
        assert!(parse_reply("hi").is_err());
        assert!(parse_reply("abc hello").is_err());
        assert!(parse_reply("").is_err());
    }

    #[test]
    fn test_parse_passive_target() {
        let target =
            parse_passive_target("Entering Passive Mode (127,0,0,1,200,21)").unwrap();
        assert_eq!(
            target,
            SocketAddr::from((Ipv4Addr::new(127, 0, 0, 1), 200 * 256 + 21))
        );
    }

    #[test]
    fn test_parse_passive_target_rejects_malformed() {
        assert!(parse_passive_target("no tuple here").is_none());
        assert!(parse_passive_target("(1,2,3)").is_none());
        assert!(parse_passive_target("(1,2,3,4,5,999)").is_none());
    }
}
