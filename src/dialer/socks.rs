//! SOCKS5 CONNECT dialer (RFC 1928, username/password auth per RFC 1929)

use super::{BoxedStream, Dialer};
use futures::future::BoxFuture;
use std::fmt;
use std::io;
use std::net::IpAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;

const VERSION: u8 = 0x05;
const AUTH_VERSION: u8 = 0x01;

const METHOD_NO_AUTH: u8 = 0x00;
const METHOD_USER_PASS: u8 = 0x02;
const METHOD_NONE_ACCEPTABLE: u8 = 0xFF;

const CMD_CONNECT: u8 = 0x01;

const ATYP_IPV4: u8 = 0x01;
const ATYP_DOMAIN: u8 = 0x03;
const ATYP_IPV6: u8 = 0x04;

/// Dialer that reaches targets through a SOCKS5 proxy
#[derive(Clone)]
pub struct Socks5Dialer {
    proxy_addr: String,
    credentials: Option<Credentials>,
}

#[derive(Clone)]
struct Credentials {
    username: String,
    password: String,
}

impl fmt::Debug for Socks5Dialer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Socks5Dialer")
            .field("proxy_addr", &self.proxy_addr)
            .field(
                "username",
                &self.credentials.as_ref().map(|c| c.username.as_str()),
            )
            .finish()
    }
}

impl Socks5Dialer {
    /// Dialer using the proxy at `proxy_addr` (`host:port`) without authentication
    pub fn new(proxy_addr: impl Into<String>) -> Self {
        Self {
            proxy_addr: proxy_addr.into(),
            credentials: None,
        }
    }

    /// Offer username/password authentication to the proxy
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some(Credentials {
            username: username.into(),
            password: password.into(),
        });
        self
    }

    /// Proxy address
    pub fn proxy_addr(&self) -> &str {
        &self.proxy_addr
    }
}

impl Dialer for Socks5Dialer {
    fn dial<'a>(&'a self, addr: &'a str) -> BoxFuture<'a, io::Result<BoxedStream>> {
        Box::pin(async move {
            let mut stream = TcpStream::connect(&self.proxy_addr).await?;
            stream.set_nodelay(true)?;
            handshake(&mut stream, addr, self.credentials.as_ref()).await?;
            tracing::trace!(proxy = %self.proxy_addr, target = addr, "socks5 connect established");
            Ok(Box::new(stream) as BoxedStream)
        })
    }
}

/// Negotiate a CONNECT to `target` on an open proxy stream
async fn handshake<S>(stream: &mut S, target: &str, credentials: Option<&Credentials>) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let (host, port) = split_target(target)?;

    // Method selection
    if credentials.is_some() {
        stream
            .write_all(&[VERSION, 2, METHOD_NO_AUTH, METHOD_USER_PASS])
            .await?;
    } else {
        stream.write_all(&[VERSION, 1, METHOD_NO_AUTH]).await?;
    }

    let mut choice = [0u8; 2];
    stream.read_exact(&mut choice).await?;
    if choice[0] != VERSION {
        return Err(invalid_data(format!(
            "unexpected SOCKS version {} in method selection",
            choice[0]
        )));
    }
    match (choice[1], credentials) {
        (METHOD_NO_AUTH, _) => {}
        (METHOD_USER_PASS, Some(creds)) => authenticate(stream, creds).await?,
        (METHOD_NONE_ACCEPTABLE, _) | (METHOD_USER_PASS, None) => {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "SOCKS5 proxy rejected all offered authentication methods",
            ));
        }
        (other, _) => {
            return Err(invalid_data(format!(
                "SOCKS5 proxy selected unoffered method {:#04x}",
                other
            )));
        }
    }

    // CONNECT request
    let mut request = vec![VERSION, CMD_CONNECT, 0x00];
    match host.parse::<IpAddr>() {
        Ok(IpAddr::V4(ip)) => {
            request.push(ATYP_IPV4);
            request.extend_from_slice(&ip.octets());
        }
        Ok(IpAddr::V6(ip)) => {
            request.push(ATYP_IPV6);
            request.extend_from_slice(&ip.octets());
        }
        Err(_) => {
            let len = u8::try_from(host.len())
                .map_err(|_| invalid_input(format!("hostname too long for SOCKS5: {}", host)))?;
            request.push(ATYP_DOMAIN);
            request.push(len);
            request.extend_from_slice(host.as_bytes());
        }
    }
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;
    stream.flush().await?;

    // Reply: VER REP RSV ATYP BND.ADDR BND.PORT
    let mut head = [0u8; 4];
    stream.read_exact(&mut head).await?;
    if head[0] != VERSION {
        return Err(invalid_data(format!(
            "unexpected SOCKS version {} in reply",
            head[0]
        )));
    }
    if head[1] != 0x00 {
        return Err(reply_error(head[1], target));
    }

    let bound_len = match head[3] {
        ATYP_IPV4 => 4,
        ATYP_IPV6 => 16,
        ATYP_DOMAIN => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => {
            return Err(invalid_data(format!(
                "unknown address type {:#04x} in SOCKS5 reply",
                other
            )));
        }
    };
    let mut bound = vec![0u8; bound_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(())
}

async fn authenticate<S>(stream: &mut S, creds: &Credentials) -> io::Result<()>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let user = u8::try_from(creds.username.len())
        .map_err(|_| invalid_input("SOCKS5 username longer than 255 bytes"))?;
    let pass = u8::try_from(creds.password.len())
        .map_err(|_| invalid_input("SOCKS5 password longer than 255 bytes"))?;

    let mut request = Vec::with_capacity(3 + creds.username.len() + creds.password.len());
    request.push(AUTH_VERSION);
    request.push(user);
    request.extend_from_slice(creds.username.as_bytes());
    request.push(pass);
    request.extend_from_slice(creds.password.as_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(io::Error::new(
            io::ErrorKind::PermissionDenied,
            "SOCKS5 proxy rejected username/password",
        ));
    }
    Ok(())
}

/// Split `host:port`, removing IPv6 brackets
fn split_target(target: &str) -> io::Result<(&str, u16)> {
    let (host, port) = target
        .rsplit_once(':')
        .ok_or_else(|| invalid_input(format!("target '{}' has no port", target)))?;
    let host = host
        .strip_prefix('[')
        .and_then(|h| h.strip_suffix(']'))
        .unwrap_or(host);
    let port = port
        .parse::<u16>()
        .map_err(|_| invalid_input(format!("invalid port in target '{}'", target)))?;
    if host.is_empty() {
        return Err(invalid_input(format!("target '{}' has no host", target)));
    }
    Ok((host, port))
}

fn reply_error(code: u8, target: &str) -> io::Error {
    let (kind, reason) = match code {
        0x01 => (io::ErrorKind::Other, "general SOCKS server failure"),
        0x02 => (io::ErrorKind::PermissionDenied, "connection not allowed by ruleset"),
        0x03 => (io::ErrorKind::Other, "network unreachable"),
        0x04 => (io::ErrorKind::Other, "host unreachable"),
        0x05 => (io::ErrorKind::ConnectionRefused, "connection refused"),
        0x06 => (io::ErrorKind::TimedOut, "TTL expired"),
        0x07 => (io::ErrorKind::Unsupported, "command not supported"),
        0x08 => (io::ErrorKind::Unsupported, "address type not supported"),
        _ => (io::ErrorKind::Other, "unknown reply code"),
    };
    io::Error::new(
        kind,
        format!("SOCKS5 proxy could not reach {}: {} ({:#04x})", target, reason, code),
    )
}

fn invalid_data(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, msg.into())
}

fn invalid_input(msg: impl Into<String>) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio_test::io::Builder;

    const OK_REPLY_V4: [u8; 10] = [5, 0, 0, ATYP_IPV4, 0, 0, 0, 0, 0, 0];

    fn creds() -> Credentials {
        Credentials {
            username: "admin".into(),
            password: "secret".into(),
        }
    }

    #[tokio::test]
    async fn test_connect_domain_without_auth() {
        let mut connect = vec![5, CMD_CONNECT, 0, ATYP_DOMAIN, 11];
        connect.extend_from_slice(b"db.internal");
        connect.extend_from_slice(&5432u16.to_be_bytes());

        let mut mock = Builder::new()
            .write(&[5, 1, METHOD_NO_AUTH])
            .read(&[5, METHOD_NO_AUTH])
            .write(&connect)
            .read(&OK_REPLY_V4)
            .build();

        handshake(&mut mock, "db.internal:5432", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_connect_ipv4_with_credentials() {
        let mut auth = vec![AUTH_VERSION, 5];
        auth.extend_from_slice(b"admin");
        auth.push(6);
        auth.extend_from_slice(b"secret");

        // Bound address returned as a domain name
        let mut reply = vec![5, 0, 0, ATYP_DOMAIN, 3];
        reply.extend_from_slice(b"abc");
        reply.extend_from_slice(&[0, 80]);

        let mut mock = Builder::new()
            .write(&[5, 2, METHOD_NO_AUTH, METHOD_USER_PASS])
            .read(&[5, METHOD_USER_PASS])
            .write(&auth)
            .read(&[AUTH_VERSION, 0])
            .write(&[5, CMD_CONNECT, 0, ATYP_IPV4, 10, 0, 0, 5, 0x15, 0x38])
            .read(&reply)
            .build();

        let creds = creds();
        handshake(&mut mock, "10.0.0.5:5432", Some(&creds))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_connect_ipv6() {
        let mut connect = vec![5, CMD_CONNECT, 0, ATYP_IPV6];
        connect.extend_from_slice(&[0; 15]);
        connect.push(1);
        connect.extend_from_slice(&5432u16.to_be_bytes());

        let mut mock = Builder::new()
            .write(&[5, 1, METHOD_NO_AUTH])
            .read(&[5, METHOD_NO_AUTH])
            .write(&connect)
            .read(&OK_REPLY_V4)
            .build();

        handshake(&mut mock, "[::1]:5432", None).await.unwrap();
    }

    #[tokio::test]
    async fn test_proxy_refuses_target() {
        let mut mock = Builder::new()
            .write(&[5, 1, METHOD_NO_AUTH])
            .read(&[5, METHOD_NO_AUTH])
            .write(&[5, CMD_CONNECT, 0, ATYP_IPV4, 127, 0, 0, 1, 0x15, 0x38])
            .read(&[5, 0x05, 0, ATYP_IPV4])
            .build();

        let err = handshake(&mut mock, "127.0.0.1:5432", None)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::ConnectionRefused);
        assert!(err.to_string().contains("127.0.0.1:5432"));
    }

    #[tokio::test]
    async fn test_proxy_requires_auth_we_do_not_have() {
        let mut mock = Builder::new()
            .write(&[5, 1, METHOD_NO_AUTH])
            .read(&[5, METHOD_NONE_ACCEPTABLE])
            .build();

        let err = handshake(&mut mock, "db:5432", None).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[tokio::test]
    async fn test_bad_credentials() {
        let mut auth = vec![AUTH_VERSION, 5];
        auth.extend_from_slice(b"admin");
        auth.push(6);
        auth.extend_from_slice(b"secret");

        let mut mock = Builder::new()
            .write(&[5, 2, METHOD_NO_AUTH, METHOD_USER_PASS])
            .read(&[5, METHOD_USER_PASS])
            .write(&auth)
            .read(&[AUTH_VERSION, 1])
            .build();

        let creds = creds();
        let err = handshake(&mut mock, "db:5432", Some(&creds))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::PermissionDenied);
    }

    #[test]
    fn test_split_target() {
        assert_eq!(split_target("db:5432").unwrap(), ("db", 5432));
        assert_eq!(split_target("[fe80::1]:6432").unwrap(), ("fe80::1", 6432));
        assert!(split_target("db").is_err());
        assert!(split_target(":5432").is_err());
        assert!(split_target("db:notaport").is_err());
    }

    #[test]
    fn test_debug_hides_password() {
        let dialer = Socks5Dialer::new("bastion:1080").with_credentials("admin", "hunter2");
        let debug = format!("{:?}", dialer);
        assert!(debug.contains("admin"));
        assert!(!debug.contains("hunter2"));
    }
}
