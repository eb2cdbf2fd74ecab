//! Newline-delimited JSON framing shared by the TCP adapters.

use crate::endpoint::domain::{HostPort, ManagedObject, ObjectName, ServiceAddress};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::io;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream, lookup_host};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, warn};

/// Pause after a failed `accept` so a persistent failure does not spin.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Largest frame either side reads, newline included.
pub(crate) const MAX_FRAME_BYTES: u64 = 1024 * 1024;

/// Requests understood by the locate registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum RegistryRequest {
    Lookup { name: String },
    List,
}

/// Replies sent by the locate registry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum RegistryReply {
    Found { address: ServiceAddress },
    NotFound { name: String },
    Names { names: Vec<String> },
    Error { message: String },
}

/// Requests understood by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub(crate) enum ConnectorRequest {
    QueryAll,
    QueryNames,
    DefaultDomain,
}

/// Replies sent by the connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub(crate) enum ConnectorReply {
    Objects { objects: Vec<ManagedObject> },
    Names { names: Vec<ObjectName> },
    Domain { domain: String },
    Error { message: String },
}

/// Reply types that can report a request failure.
pub(crate) trait ErrorReply {
    fn error_reply(message: String) -> Self;
}

impl ErrorReply for RegistryReply {
    fn error_reply(message: String) -> Self {
        Self::Error { message }
    }
}

impl ErrorReply for ConnectorReply {
    fn error_reply(message: String) -> Self {
        Self::Error { message }
    }
}

/// Spawns an accept loop that answers every frame with `handler`.
///
/// The loop owns the listener and its connection tasks; aborting the
/// returned handle closes the listener and every open connection.
pub(crate) fn spawn_accept_loop<Req, Resp, H>(
    listener: TcpListener,
    service: &'static str,
    handler: Arc<H>,
) -> JoinHandle<()>
where
    Req: DeserializeOwned + Send + 'static,
    Resp: Serialize + ErrorReply + Send + Sync + 'static,
    H: Fn(Req) -> Resp + Send + Sync + 'static,
{
    tokio::spawn(async move {
        let mut connections = JoinSet::new();
        loop {
            tokio::select! {
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        debug!(service, %peer, "accepted connection");
                        let connection_handler = Arc::clone(&handler);
                        connections.spawn(async move {
                            match serve_connection::<Req, Resp, H>(stream, connection_handler, MAX_FRAME_BYTES).await {
                                Ok(()) => debug!(service, %peer, "connection closed"),
                                Err(err) => debug!(service, %peer, error = %err, "connection failed"),
                            }
                        });
                    }
                    Err(err) => {
                        warn!(service, error = %err, "accept failed");
                        tokio::time::sleep(ACCEPT_BACKOFF).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }
    })
}

async fn serve_connection<Req, Resp, H>(
    stream: TcpStream,
    handler: Arc<H>,
    frame_limit: u64,
) -> io::Result<()>
where
    Req: DeserializeOwned,
    Resp: Serialize + ErrorReply + Sync,
    H: Fn(Req) -> Resp + Send + Sync,
{
    let (read_half, mut writer) = stream.into_split();
    let mut reader = BufReader::new(read_half);
    loop {
        let reply = match read_frame(&mut reader, frame_limit).await {
            Ok(None) => return Ok(()),
            Ok(Some(frame)) if frame.trim_ascii().is_empty() => continue,
            Ok(Some(frame)) => match serde_json::from_slice::<Req>(&frame) {
                Ok(request) => handler(request),
                Err(err) => Resp::error_reply(format!("undecodable request: {err}")),
            },
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                Resp::error_reply(err.to_string())
            }
            Err(err) => return Err(err),
        };
        write_frame(&mut writer, &reply).await?;
    }
}

/// Reads one newline-terminated frame of at most `limit` bytes.
///
/// Returns `Ok(None)` at end of stream. An oversized frame is skipped up to
/// its newline and reported as [`io::ErrorKind::InvalidData`], leaving the
/// reader positioned at the next frame.
async fn read_frame<R>(reader: &mut R, limit: u64) -> io::Result<Option<Vec<u8>>>
where
    R: AsyncBufRead + Unpin,
{
    let mut frame = Vec::new();
    let read = (&mut *reader)
        .take(limit)
        .read_until(b'\n', &mut frame)
        .await?;
    if read == 0 {
        return Ok(None);
    }
    if frame.last() == Some(&b'\n') {
        frame.pop();
        return Ok(Some(frame));
    }
    if reader.fill_buf().await?.is_empty() {
        return Ok(Some(frame));
    }
    discard_line(reader).await?;
    Err(io::Error::new(
        io::ErrorKind::InvalidData,
        format!("frame exceeds {limit} bytes"),
    ))
}

async fn discard_line<R>(reader: &mut R) -> io::Result<()>
where
    R: AsyncBufRead + Unpin,
{
    loop {
        let buffered = reader.fill_buf().await?;
        if buffered.is_empty() {
            return Ok(());
        }
        let newline = buffered.iter().position(|byte| *byte == b'\n');
        let consumed = newline.map_or(buffered.len(), |end| end + 1);
        reader.consume(consumed);
        if newline.is_some() {
            return Ok(());
        }
    }
}

async fn write_frame<W, T>(writer: &mut W, frame: &T) -> io::Result<()>
where
    W: AsyncWrite + Unpin,
    T: Serialize + ?Sized,
{
    let mut payload = serde_json::to_vec(frame).map_err(io::Error::other)?;
    payload.push(b'\n');
    writer.write_all(&payload).await?;
    writer.flush().await
}

/// Client side of a framed connection.
#[derive(Debug)]
pub(crate) struct FramedStream {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl FramedStream {
    /// Connects to an advertised address, trying every resolved socket
    /// address in turn.
    pub(crate) async fn connect(target: &HostPort) -> io::Result<Self> {
        if target.port() == 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("no port advertised for {target}"),
            ));
        }

        let mut last_error = None;
        for address in lookup_host((target.host(), target.port())).await? {
            match TcpStream::connect(address).await {
                Ok(stream) => {
                    let (read_half, writer) = stream.into_split();
                    return Ok(Self {
                        reader: BufReader::new(read_half),
                        writer,
                    });
                }
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or_else(|| {
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("{target} resolved to no addresses"),
            )
        }))
    }

    /// Sends one request and waits for its reply.
    pub(crate) async fn call<Req, Resp>(&mut self, request: &Req) -> io::Result<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned,
    {
        write_frame(&mut self.writer, request).await?;
        let frame = read_frame(&mut self.reader, MAX_FRAME_BYTES)
            .await?
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::UnexpectedEof, "connection closed before reply")
            })?;
        serde_json::from_slice(&frame).map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(RegistryRequest::Lookup { name: "demo".to_owned() }, r#"{"op":"lookup","name":"demo"}"#)]
    #[case(RegistryRequest::List, r#"{"op":"list"}"#)]
    fn registry_requests_use_op_tag(#[case] request: RegistryRequest, #[case] expected: &str) {
        assert_eq!(
            serde_json::to_string(&request).expect("serialise"),
            expected
        );
    }

    #[test]
    fn connector_request_decodes_from_snake_case() {
        let request: ConnectorRequest =
            serde_json::from_str(r#"{"op":"query_names"}"#).expect("decode");

        assert_eq!(request, ConnectorRequest::QueryNames);
    }

    #[test]
    fn error_reply_carries_message() {
        let reply = ConnectorReply::error_reply("boom".to_owned());

        assert_eq!(
            serde_json::to_string(&reply).expect("serialise"),
            r#"{"status":"error","message":"boom"}"#
        );
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn accept_loop_answers_and_survives_bad_frames() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let handler = Arc::new(|request: RegistryRequest| match request {
            RegistryRequest::Lookup { name } => RegistryReply::NotFound { name },
            RegistryRequest::List => RegistryReply::Names { names: Vec::new() },
        });
        let accept_loop = spawn_accept_loop(listener, "test", handler);

        let target = HostPort::new(Some("127.0.0.1"), port);
        let mut stream = FramedStream::connect(&target).await.expect("connect");
        let garbage: RegistryReply = stream
            .call(&serde_json::json!({"op": "explode"}))
            .await
            .expect("reply to bad frame");
        let listed: RegistryReply = stream
            .call(&RegistryRequest::List)
            .await
            .expect("reply to list");

        assert!(matches!(garbage, RegistryReply::Error { .. }));
        assert_eq!(listed, RegistryReply::Names { names: Vec::new() });
        accept_loop.abort();
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn oversized_frames_are_skipped() {
        let input: &[u8] = b"{\"op\":\"list\"}\n0123456789abcdef-overflow\n{\"op\":\"list\"}";
        let mut reader = BufReader::new(input);

        let first = read_frame(&mut reader, 16).await.expect("first frame");
        let oversized = read_frame(&mut reader, 16).await;
        let last = read_frame(&mut reader, 16).await.expect("last frame");
        let end = read_frame(&mut reader, 16).await.expect("end of stream");

        assert_eq!(first.as_deref(), Some(&b"{\"op\":\"list\"}"[..]));
        assert!(matches!(oversized, Err(err) if err.kind() == io::ErrorKind::InvalidData));
        assert_eq!(last.as_deref(), Some(&b"{\"op\":\"list\"}"[..]));
        assert_eq!(end, None);
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connection_answers_oversized_frame_and_keeps_serving() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let port = listener.local_addr().expect("local addr").port();
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.expect("accept");
            let handler = Arc::new(|_: RegistryRequest| RegistryReply::Names { names: Vec::new() });
            serve_connection::<RegistryRequest, RegistryReply, _>(stream, handler, 32).await
        });

        let target = HostPort::new(Some("127.0.0.1"), port);
        let mut stream = FramedStream::connect(&target).await.expect("connect");
        let oversized: RegistryReply = stream
            .call(&RegistryRequest::Lookup {
                name: "a-context-name-longer-than-the-frame-limit".to_owned(),
            })
            .await
            .expect("reply to oversized frame");
        let listed: RegistryReply = stream
            .call(&RegistryRequest::List)
            .await
            .expect("reply to list");
        drop(stream);

        assert!(matches!(oversized, RegistryReply::Error { message } if message.contains("exceeds")));
        assert_eq!(listed, RegistryReply::Names { names: Vec::new() });
        assert!(server.await.expect("server task").is_ok());
    }

    #[rstest]
    #[tokio::test(flavor = "multi_thread")]
    async fn connect_without_port_is_rejected() {
        let result = FramedStream::connect(&HostPort::new(None, 0)).await;

        assert!(matches!(result, Err(err) if err.kind() == io::ErrorKind::InvalidInput));
    }
}
