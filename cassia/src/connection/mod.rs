//! The connection state machine: a single multiplexed TCP socket speaking CQL.
//!
//! A reader task owns the socket's read half and demultiplexes incoming
//! frames by stream id into the waiter registered by [`Connection::request`];
//! a writer task owns the write half and serializes outgoing frames. This is
//! the one piece with no sequential-protocol analogue to imitate: it is
//! grounded on the reporter/worker split in `scylla-rs`'s `app::worker`
//! module, reimplemented here with plain `tokio::sync` channels rather than
//! an actor framework.
mod stream_id;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU8, Ordering},
        Arc,
    },
};

use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt, ReadHalf, WriteHalf},
    net::TcpStream,
    sync::{broadcast, mpsc, oneshot, Mutex},
    task::JoinHandle,
    time::timeout,
};

use crate::{
    auth::{self, AuthProvider},
    error::ErrorKind,
    frame::{decode_body, encode_frame, DecodedFrame, FrameCompressor, Header, HeaderFlags},
    macros::{span, verbose},
    message::{
        request::{AuthResponse, Options, Startup},
        response::{self, Event},
        OpCode,
    },
    options::ConnectOptions,
    result::QueryResult,
    Result,
};
use stream_id::StreamIdPool;

/// Where a connection sits in its handshake/request lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum State {
    Disconnected = 0,
    TcpConnected = 1,
    OptionsSent = 2,
    StartupSent = 3,
    Authenticating = 4,
    Ready = 5,
    Closing = 6,
    Closed = 7,
}

impl From<u8> for State {
    fn from(raw: u8) -> Self {
        match raw {
            0 => State::Disconnected,
            1 => State::TcpConnected,
            2 => State::OptionsSent,
            3 => State::StartupSent,
            4 => State::Authenticating,
            5 => State::Ready,
            6 => State::Closing,
            _ => State::Closed,
        }
    }
}

struct Outbound {
    stream: i16,
    bytes: BytesMut,
    respond_to: oneshot::Sender<Result<DecodedFrame>>,
}

type InFlight = Arc<Mutex<HashMap<i16, oneshot::Sender<Result<DecodedFrame>>>>>;

/// A live connection to one Cassandra node.
///
/// Pooling across nodes, topology-aware routing and retry-on-a-different-node
/// are out of scope here: a `Connection` is one socket to one host.
pub struct Connection {
    state: Arc<AtomicU8>,
    outbound: mpsc::Sender<Outbound>,
    in_flight: InFlight,
    stream_ids: Arc<StreamIdPool>,
    events: broadcast::Sender<Event>,
    protocol_version: u8,
    max_frame_len: usize,
    compressor: Option<Arc<dyn FrameCompressor>>,
    request_timeout: Option<std::time::Duration>,
    reader: JoinHandle<()>,
    writer: JoinHandle<()>,
}

impl Connection {
    /// Opens a TCP socket to `options.host:options.port` and drives it
    /// through `OPTIONS`/`STARTUP`, authentication (if requested), to `READY`.
    pub async fn connect(options: ConnectOptions, auth_provider: Option<Arc<dyn AuthProvider>>) -> Result<Self> {
        Self::connect_with_compressor(options, auth_provider, None).await
    }

    pub async fn connect_with_compressor(
        options: ConnectOptions,
        auth_provider: Option<Arc<dyn AuthProvider>>,
        compressor: Option<Arc<dyn FrameCompressor>>,
    ) -> Result<Self> {
        span!("connect", host = %options.host, port = options.port);
        let state = Arc::new(AtomicU8::new(State::Disconnected as u8));
        let stream = timeout(options.connect_timeout, TcpStream::connect((options.host.as_str(), options.port)))
            .await
            .map_err(|_| ErrorKind::Timeout)??;
        stream.set_nodelay(true).ok();
        state.store(State::TcpConnected as u8, Ordering::SeqCst);
        verbose!("tcp connected");

        let (read_half, write_half) = tokio::io::split(stream);
        let in_flight: InFlight = Arc::new(Mutex::new(HashMap::new()));
        let (events_tx, _events_rx) = broadcast::channel(64);
        let (outbound_tx, outbound_rx) = mpsc::channel::<Outbound>(options.max_streams as usize);

        let writer = tokio::spawn(run_writer(write_half, outbound_rx, in_flight.clone()));
        let reader = tokio::spawn(run_reader(read_half, in_flight.clone(), events_tx.clone(), compressor.clone(), options.max_frame_len, state.clone()));

        let conn = Self {
            state,
            outbound: outbound_tx,
            in_flight,
            stream_ids: Arc::new(StreamIdPool::new(options.max_streams)),
            events: events_tx,
            protocol_version: options.protocol_version,
            max_frame_len: options.max_frame_len,
            compressor,
            request_timeout: options.request_timeout,
            reader,
            writer,
        };

        conn.handshake(&options, auth_provider.as_deref()).await?;
        Ok(conn)
    }

    async fn handshake(&self, options: &ConnectOptions, auth_provider: Option<&dyn AuthProvider>) -> Result<()> {
        self.state.store(State::OptionsSent as u8, Ordering::SeqCst);
        // Queried so a caller-supplied compressor can check its algorithm
        // against what the server advertises; nothing here negotiates it yet.
        let _supported = self.options_request().await?;

        self.state.store(State::StartupSent as u8, Ordering::SeqCst);
        let startup = Startup::default();
        let mut body = BytesMut::new();
        startup.encode(&mut body)?;
        let frame = self.request(OpCode::Startup, body).await?;

        match frame.header.opcode {
            OpCode::Ready => {}
            OpCode::Authenticate => {
                self.state.store(State::Authenticating as u8, Ordering::SeqCst);
                let mut body = frame.body;
                let authenticate = response::Authenticate::decode(&mut body)?;
                let provider = auth_provider.ok_or_else(|| ErrorKind::Authentication("server requires authentication but no AuthProvider was configured".into()))?;
                auth::check_authenticator_class(provider, &authenticate.authenticator_class)?;
                self.authenticate(provider).await?;
            }
            other => return Err(ErrorKind::ProtocolViolation(format!("unexpected opcode {other:?} in response to STARTUP")).into()),
        }

        self.state.store(State::Ready as u8, Ordering::SeqCst);
        verbose!("handshake complete");

        if let Some(keyspace) = &options.keyspace {
            let query = crate::message::request::Query::new(format!("USE {keyspace}"), crate::message::request::QueryParams::default());
            let mut body = BytesMut::new();
            query.encode(&mut body)?;
            self.request(OpCode::Query, body).await?;
        }
        Ok(())
    }

    async fn options_request(&self) -> Result<response::Supported> {
        let options_msg = Options;
        let mut body = BytesMut::new();
        options_msg.encode(&mut body);
        let frame = self.request(OpCode::Options, body).await?;
        let mut b = frame.body;
        response::Supported::decode(&mut b)
    }

    async fn authenticate(&self, provider: &dyn AuthProvider) -> Result<()> {
        let mut token = provider.initial_response();
        loop {
            let response = AuthResponse { token };
            let mut body = BytesMut::new();
            response.encode(&mut body)?;
            let frame = self.request(OpCode::AuthResponse, body).await?;
            match frame.header.opcode {
                OpCode::AuthSuccess => return Ok(()),
                OpCode::AuthChallenge => {
                    let mut b = frame.body;
                    let challenge = response::AuthChallenge::decode(&mut b)?;
                    match provider.evaluate_challenge(&challenge.token)? {
                        Some(next) => token = next,
                        None => return Err(ErrorKind::Authentication("server issued a challenge this provider could not answer".into())),
                    }
                }
                OpCode::Error => {
                    let mut b = frame.body;
                    return Err(response::ServerError::decode(&mut b)?.into());
                }
                other => return Err(ErrorKind::ProtocolViolation(format!("unexpected opcode {other:?} during authentication")).into()),
            }
        }
    }

    pub fn state(&self) -> State {
        State::from(self.state.load(Ordering::SeqCst))
    }

    pub fn protocol_version(&self) -> u8 {
        self.protocol_version
    }

    /// Subscribes to server-pushed `EVENT` frames. Send a `REGISTER` request
    /// with [`Connection::request`] to actually receive any.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.events.subscribe()
    }

    /// Sends one request and awaits its correlated response, applying the
    /// connection's configured request timeout.
    pub async fn request(&self, opcode: OpCode, body: BytesMut) -> Result<DecodedFrame> {
        if self.state() == State::Closed || self.state() == State::Closing {
            return Err(ErrorKind::ConnectionClosed.into());
        }

        let stream = self.stream_ids.acquire().await;
        self.send_on_stream(stream, opcode, body).await
    }

    /// Like [`Connection::request`], but fails fast with
    /// [`ErrorKind::QueueFull`] instead of waiting for a free stream id.
    pub async fn try_request(&self, opcode: OpCode, body: BytesMut) -> Result<DecodedFrame> {
        if self.state() == State::Closed || self.state() == State::Closing {
            return Err(ErrorKind::ConnectionClosed.into());
        }

        let stream = self.stream_ids.try_acquire().await.ok_or(ErrorKind::QueueFull)?;
        self.send_on_stream(stream, opcode, body).await
    }

    async fn send_on_stream(&self, stream: i16, opcode: OpCode, body: BytesMut) -> Result<DecodedFrame> {
        let header = Header::request(stream, opcode, self.protocol_version, HeaderFlags::new());
        let bytes = encode_frame(header, &body, self.compressor.as_deref())?;

        let (tx, mut rx) = oneshot::channel();
        self.outbound.send(Outbound { stream, bytes, respond_to: tx }).await.map_err(|_| ErrorKind::ConnectionClosed)?;

        let received = match self.request_timeout {
            Some(d) => match timeout(d, &mut rx).await {
                Ok(received) => received,
                Err(_) => {
                    // The response (or a connection-closed notification) may
                    // still arrive after the deadline. Reclaiming the stream
                    // id now would let a future request collide with it, so
                    // a detached task keeps the id reserved until whichever
                    // comes first, rather than returning it here.
                    let stream_ids = self.stream_ids.clone();
                    tokio::spawn(async move {
                        let _ = rx.await;
                        stream_ids.release(stream).await;
                    });
                    return Err(ErrorKind::Timeout.into());
                }
            },
            None => rx.await,
        };
        self.stream_ids.release(stream).await;

        let frame = received.map_err(|_| ErrorKind::ConnectionClosed)??;
        if frame.header.opcode == OpCode::Error {
            let mut b = frame.body;
            return Err(response::ServerError::decode(&mut b)?.into());
        }
        Ok(frame)
    }

    /// Sends a request whose body already encodes a `[result]`-shaped
    /// opcode (`QUERY`/`EXECUTE`/`PREPARE`/`BATCH`) and decodes the result.
    pub async fn request_result(&self, opcode: OpCode, body: BytesMut) -> Result<QueryResult> {
        let frame = self.request(opcode, body).await?;
        let mut b = frame.body;
        QueryResult::decode(&mut b, self.protocol_version)
    }

    /// Closes the connection. Requests already in flight are given `grace`
    /// to complete before the sockets are torn down; subsequent `request`
    /// calls fail immediately with [`ErrorKind::ConnectionClosed`].
    pub async fn close(self, grace: std::time::Duration) {
        self.state.store(State::Closing as u8, Ordering::SeqCst);
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);
        loop {
            if self.in_flight.lock().await.is_empty() {
                break;
            }
            tokio::select! {
                _ = &mut deadline => break,
                _ = tokio::time::sleep(std::time::Duration::from_millis(10)) => {}
            }
        }
        self.state.store(State::Closed as u8, Ordering::SeqCst);
        drop(self.outbound);
        self.writer.abort();
        self.reader.abort();

        for (_, respond_to) in self.in_flight.lock().await.drain() {
            let _ = respond_to.send(Err(ErrorKind::ConnectionClosed.into()));
        }
    }
}

async fn run_writer(mut write_half: WriteHalf<TcpStream>, mut outbound_rx: mpsc::Receiver<Outbound>, in_flight: InFlight) {
    while let Some(item) = outbound_rx.recv().await {
        in_flight.lock().await.insert(item.stream, item.respond_to);
        if let Err(_err) = write_half.write_all(&item.bytes).await {
            #[cfg(feature = "log")]
            log::error!("write error on stream {}: {_err}", item.stream);

            if let Some(respond_to) = in_flight.lock().await.remove(&item.stream) {
                let _ = respond_to.send(Err(ErrorKind::ConnectionClosed.into()));
            }
            break;
        }
    }
}

async fn run_reader(
    mut read_half: ReadHalf<TcpStream>,
    in_flight: InFlight,
    events: broadcast::Sender<Event>,
    compressor: Option<Arc<dyn FrameCompressor>>,
    max_frame_len: usize,
    state: Arc<AtomicU8>,
) {
    loop {
        match read_one_frame(&mut read_half, compressor.as_deref(), max_frame_len).await {
            Ok(frame) => {
                if frame.header.stream == -1 {
                    if frame.header.opcode == OpCode::Event {
                        let mut b = frame.body;
                        if let Ok(event) = Event::decode(&mut b) {
                            let _ = events.send(event);
                        }
                    }
                    continue;
                }
                if let Some(respond_to) = in_flight.lock().await.remove(&frame.header.stream) {
                    let _ = respond_to.send(Ok(frame));
                }
            }
            Err(_err) => {
                #[cfg(feature = "log")]
                log::error!("reader closing connection: {_err}");

                state.store(State::Closed as u8, Ordering::SeqCst);
                let mut pending = in_flight.lock().await;
                for (_, respond_to) in pending.drain() {
                    let _ = respond_to.send(Err(ErrorKind::ConnectionClosed.into()));
                }
                break;
            }
        }
    }
}

async fn read_one_frame(read_half: &mut ReadHalf<TcpStream>, compressor: Option<&dyn FrameCompressor>, max_frame_len: usize) -> Result<DecodedFrame> {
    let mut header_bytes = [0u8; crate::frame::HEADER_LEN];
    read_half.read_exact(&mut header_bytes).await?;
    let mut header_buf = Bytes::copy_from_slice(&header_bytes);
    let header = Header::decode(&mut header_buf)?;

    let len = header.length as usize;
    if len > max_frame_len {
        return Err(ErrorKind::OversizedFrame { len, max: max_frame_len }.into());
    }
    let mut body = vec![0u8; len];
    read_half.read_exact(&mut body).await?;

    decode_body(header, Bytes::from(body), compressor)
}

#[cfg(all(test, feature = "tokio"))]
mod test {
    use super::*;

    #[test]
    fn state_roundtrips_through_u8() {
        for s in [State::Disconnected, State::TcpConnected, State::OptionsSent, State::StartupSent, State::Authenticating, State::Ready, State::Closing, State::Closed] {
            assert_eq!(State::from(s as u8), s);
        }
    }
}
