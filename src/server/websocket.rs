use crate::cli::Args;
use crate::error::ChatError;
use crate::models::websocket::{ClientMessage, ServerMessage};
use crate::models::chat::{Persona, TranscriptEntry};
use crate::server::ChatState;
use crate::session::Session;

use std::error::Error;
use std::fs::File;
use std::io::BufReader;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::collections::HashMap;

use tokio::net::TcpListener;
use tokio::io::{AsyncRead, AsyncWrite};

use tokio_tungstenite::{accept_hdr_async, WebSocketStream};
use tokio_tungstenite::tungstenite::handshake::server::{Request, Response, ErrorResponse};
use tokio_tungstenite::tungstenite::http::StatusCode;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_rustls::TlsAcceptor;

use rustls::ServerConfig;
use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls_pemfile::{certs, pkcs8_private_keys};

use lazy_static::lazy_static;
use governor::{RateLimiter, Quota, state::{InMemoryState, NotKeyed}, clock::DefaultClock};

use hmac::{Hmac, Mac};
use sha2::Sha256;
use chrono::Utc;
use url::form_urlencoded;

use log::{info, warn, error, debug};
use futures::{Sink, SinkExt, StreamExt};

type HmacSha256 = Hmac<Sha256>;

const MAX_MESSAGE_SIZE: usize = 64 * 1024;
const MAX_CLOCK_SKEW_SECS: u64 = 300;
const CONNECTIONS_PER_SECOND: u32 = 10;

lazy_static! {
    static ref CONNECTION_LIMITER: RateLimiter<NotKeyed, InMemoryState, DefaultClock> =
        RateLimiter::direct(
            Quota::per_second(NonZeroU32::new(CONNECTIONS_PER_SECOND).unwrap_or(NonZeroU32::MIN))
        );
}

pub fn load_tls_config(
    cert_path: &str,
    key_path: &str
) -> Result<Arc<ServerConfig>, Box<dyn Error + Send + Sync>> {
    let cert_file = File::open(cert_path).map_err(|e|
        format!("Failed to open TLS certificate file '{}': {}", cert_path, e)
    )?;
    let key_file = File::open(key_path).map_err(|e|
        format!("Failed to open TLS key file '{}': {}", key_path, e)
    )?;

    let mut cert_reader = BufReader::new(cert_file);
    let mut key_reader = BufReader::new(key_file);
    let cert_chain: Vec<CertificateDer<'static>> = certs(&mut cert_reader)
        .collect::<Result<_, _>>()
        .map_err(|e| format!("Failed to read certificate(s): {}", e))?;

    let mut keys = pkcs8_private_keys(&mut key_reader);
    let key = match keys.next() {
        Some(Ok(k)) => PrivateKeyDer::Pkcs8(k),
        Some(Err(e)) => {
            return Err(format!("Error reading private key: {}", e).into());
        }
        None => {
            return Err("No PKCS8 private key found in key file".into());
        }
    };

    let config = ServerConfig::builder().with_no_client_auth().with_single_cert(cert_chain, key)?;
    Ok(Arc::new(config))
}

pub async fn start_ws_server(
    addr: &str,
    state: Arc<ChatState>,
    api_key: Option<String>,
    args: Args,
) -> Result<(), Box<dyn Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;

    let tls_acceptor = if args.enable_tls {
        match (&args.tls_cert_path, &args.tls_key_path) {
            (Some(cert_path), Some(key_path)) => {
                info!(
                    "TLS enabled. Loading certificate from '{}' and key from '{}'",
                    cert_path,
                    key_path
                );
                let config = load_tls_config(cert_path, key_path)?;
                Some(TlsAcceptor::from(config))
            }
            (Some(_), None) | (None, Some(_)) => {
                error!("Both --tls-cert-path and --tls-key-path must be provided to enable TLS.");
                return Err("Missing TLS certificate or key path".into());
            }
            (None, None) => {
                error!("--enable-tls was set but no certificate/key paths provided.");
                return Err("TLS enabled without cert/key".into());
            }
        }
    } else {
        info!("TLS not enabled. Running plain WebSocket (WS) server.");
        None
    };
    let protocol = if tls_acceptor.is_some() { "WSS" } else { "WS" };
    info!("{} server listening on: {}", protocol, addr);

    loop {
        let (stream, peer) = listener.accept().await?;

        if CONNECTION_LIMITER.check().is_err() {
            warn!("Global connection rate limit exceeded for {}. Dropping connection.", peer);
            continue;
        }

        info!("Incoming connection from: {}", peer);
        let state_clone = Arc::clone(&state);
        let required_api_key = api_key.clone();
        let tls_acceptor_clone = tls_acceptor.clone();

        tokio::spawn(async move {
            let process_result = if let Some(acceptor) = tls_acceptor_clone {
                match acceptor.accept(stream).await {
                    Ok(tls_stream) => {
                        debug!("TLS handshake successful for {}", peer);
                        process_connection(peer, tls_stream, state_clone, required_api_key).await
                    }
                    Err(e) => {
                        error!("TLS handshake error for {}: {}", peer, e);
                        Err(Box::new(e) as Box<dyn Error + Send + Sync>)
                    }
                }
            } else {
                process_connection(peer, stream, state_clone, required_api_key).await
            };

            if let Err(e) = process_result {
                error!("Failed to process connection for {}: {}", peer, e);
            }
        });
    }
}

/// Checks `sig` against HMAC-SHA256(secret, ts) and that `ts` is recent.
pub fn verify_signature(secret: &str, ts: &str, sig: &str, now: i64) -> Result<(), &'static str> {
    let ts_i: i64 = ts.parse().map_err(|_| "bad timestamp")?;
    if now.abs_diff(ts_i) > MAX_CLOCK_SKEW_SECS {
        return Err("timestamp out of range");
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| "bad server key")?;
    mac.update(ts.as_bytes());
    let expected = hex::decode(sig).map_err(|_| "bad signature")?;
    mac.verify_slice(&expected).map_err(|_| "bad signature")
}

fn reject(reason: &str) -> ErrorResponse {
    let mut res = ErrorResponse::new(Some(reason.to_string()));
    *res.status_mut() = StatusCode::UNAUTHORIZED;
    res
}

async fn process_connection<S>(
    peer: SocketAddr,
    stream: S,
    state: Arc<ChatState>,
    required_api_key: Option<String>
) -> Result<(), Box<dyn Error + Send + Sync>>
    where S: AsyncRead + AsyncWrite + Unpin + Send + 'static
{
    let auth_callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        let secret = match &required_api_key {
            Some(k) if !k.is_empty() => k,
            _ => return Ok(response),
        };

        let qs = req.uri().query().unwrap_or("");
        let params: HashMap<String, String> =
            form_urlencoded::parse(qs.as_bytes()).into_owned().collect();

        let ts = params.get("ts").or_else(|| params.get("X-Api-Ts"));
        let sig = params.get("sig").or_else(|| params.get("X-Api-Sign"));

        match (ts, sig) {
            (Some(ts), Some(sig)) => match verify_signature(secret, ts, sig, Utc::now().timestamp()) {
                Ok(()) => Ok(response),
                Err(reason) => {
                    warn!("Rejected handshake from {}: {}", peer, reason);
                    Err(reject(reason))
                }
            },
            _ => Err(reject("missing ts/sig")),
        }
    };

    match accept_hdr_async(stream, auth_callback).await {
        Ok(ws) => {
            handle_connection(peer, ws, state).await;
            Ok(())
        }
        Err(e) => {
            error!("Handshake failed for {}: {}", peer, e);
            Err(Box::new(e) as _)
        }
    }
}

async fn send<W>(tx: &mut W, msg: &ServerMessage) -> Result<(), Box<dyn Error + Send + Sync>>
where
    W: Sink<Message> + Unpin,
    W::Error: Error + Send + Sync + 'static,
{
    let json = serde_json::to_string(msg)?;
    tx.send(Message::Text(json)).await?;
    Ok(())
}

fn error_frame(e: &ChatError) -> ServerMessage {
    ServerMessage::error(e.kind(), e.to_string())
}

fn transcript_frame(session: &Session) -> ServerMessage {
    ServerMessage::Transcript { entries: session.snapshot().to_vec() }
}

fn entry_frame(entry: TranscriptEntry) -> ServerMessage {
    ServerMessage::Entry {
        role: entry.role,
        message: entry.message,
        timestamp: Utc::now().timestamp(),
    }
}

fn logged_in_frame(session: &Session) -> ServerMessage {
    ServerMessage::LoggedIn { display_name: session.display_name().to_string() }
}

/// Applies one client message to the session and returns the frames to send
/// back, in order.
pub async fn handle_client_message(
    state: &ChatState,
    session: &mut Session,
    message: ClientMessage
) -> Vec<ServerMessage> {
    match message {
        ClientMessage::SelectPersona { persona } => {
            match state.personas.get(&persona) {
                Ok(selected) => {
                    session.set_persona(selected.clone());
                    vec![ServerMessage::PersonaSelected {
                        name: selected.name.clone(),
                        description: selected.description.clone(),
                    }]
                }
                Err(e) => vec![ServerMessage::error("validation", e.to_string())],
            }
        }
        ClientMessage::CustomPersona { name, description } => {
            let name = name.trim();
            if name.is_empty() {
                return vec![ServerMessage::error("validation", "Persona name cannot be empty")];
            }
            let persona = Persona::custom(name, description.trim());
            let frame = ServerMessage::PersonaSelected {
                name: persona.name.clone(),
                description: persona.description.clone(),
            };
            session.set_persona(persona);
            vec![frame]
        }
        ClientMessage::Login { name } => {
            match state.controller.login(session, &name).await {
                Ok(()) => vec![logged_in_frame(session), transcript_frame(session)],
                Err(e @ ChatError::Validation(_)) => vec![error_frame(&e)],
                Err(e) => {
                    warn!("Login for {} completed with error: {}", session.display_name(), e);
                    vec![logged_in_frame(session), transcript_frame(session), error_frame(&e)]
                }
            }
        }
        ClientMessage::History => {
            match state.controller.resume(session).await {
                Ok(()) => vec![transcript_frame(session)],
                Err(e @ ChatError::Validation(_)) => vec![error_frame(&e)],
                Err(e) => vec![transcript_frame(session), error_frame(&e)],
            }
        }
        ClientMessage::Chat { content } => {
            match state.controller.submit(session, &content).await {
                Ok(outcome) => {
                    let mut frames = vec![entry_frame(outcome.user), entry_frame(outcome.reply)];
                    frames.extend(outcome.persist_errors.iter().map(error_frame));
                    frames
                }
                Err(e @ ChatError::Validation(_)) => vec![error_frame(&e)],
                Err(e) => vec![transcript_frame(session), error_frame(&e)],
            }
        }
        ClientMessage::Clear => {
            match session.clear().await {
                Ok(()) => vec![transcript_frame(session)],
                Err(e @ ChatError::Validation(_)) => vec![error_frame(&e)],
                Err(e) => vec![transcript_frame(session), error_frame(&e)],
            }
        }
    }
}

pub async fn handle_connection<S>(
    peer: SocketAddr,
    websocket: WebSocketStream<S>,
    state: Arc<ChatState>
)
    where S: AsyncRead + AsyncWrite + Unpin
{
    let (mut tx, mut rx) = websocket.split();
    let mut session = state.controller.new_session(state.personas.default_persona().clone());
    let identity = session.ensure_identity().clone();
    info!("Assigned identity {} to {}", identity, peer);

    let welcome = ServerMessage::Welcome {
        identity: identity.to_string(),
        personas: state.personas.summaries(),
    };
    if let Err(e) = send(&mut tx, &welcome).await {
        error!("Failed to greet {}: {}", peer, e);
        return;
    }

    'session: while let Some(msg) = rx.next().await {
        match msg {
            Ok(message) => {
                if message.len() > MAX_MESSAGE_SIZE {
                    warn!(
                        "Message from {} exceeds size limit ({} > {})",
                        peer,
                        message.len(),
                        MAX_MESSAGE_SIZE
                    );
                    let error_msg = ServerMessage::error("validation", "Message too large");
                    if send(&mut tx, &error_msg).await.is_err() {
                        error!("Failed to send size limit error to {}", peer);
                    }
                    break;
                }

                match message {
                    Message::Text(text) => {
                        match serde_json::from_str::<ClientMessage>(&text) {
                            Ok(client_msg) => {
                                if matches!(client_msg, ClientMessage::Chat { .. }) {
                                    if let Err(e) = send(&mut tx, &ServerMessage::Processing).await {
                                        error!("Error sending processing status to {}: {}", peer, e);
                                        break;
                                    }
                                }

                                let frames = handle_client_message(&state, &mut session, client_msg).await;
                                for frame in &frames {
                                    if let Err(e) = send(&mut tx, frame).await {
                                        error!("Error sending to {}: {}", peer, e);
                                        break 'session;
                                    }
                                }
                            }
                            Err(e) => {
                                error!("Failed to parse message from {}: {}", peer, e);
                                let error_msg = ServerMessage::error(
                                    "validation",
                                    format!("Failed to parse message: {}", e)
                                );
                                if let Err(e) = send(&mut tx, &error_msg).await {
                                    error!("Error sending parse error to {}: {}", peer, e);
                                    break;
                                }
                            }
                        }
                    }
                    Message::Close(_) => {
                        info!("Received close frame from {}", peer);
                        break;
                    }
                    Message::Ping(ping_data) => {
                        if tx.send(Message::Pong(ping_data)).await.is_err() {
                            error!("Failed to send pong to {}", peer);
                            break;
                        }
                    }
                    Message::Pong(_) => {}
                    Message::Binary(_) => {
                        warn!("Ignoring binary message from {}", peer);
                    }
                    Message::Frame(_) => {}
                }
            }
            Err(e) => {
                match e {
                    | tokio_tungstenite::tungstenite::Error::ConnectionClosed
                    | tokio_tungstenite::tungstenite::Error::Protocol(_)
                    | tokio_tungstenite::tungstenite::Error::Utf8 => {
                        info!("WebSocket connection closed or protocol error for {}: {}", peer, e);
                    }
                    tokio_tungstenite::tungstenite::Error::Io(ref io_err) if
                        io_err.kind() == std::io::ErrorKind::ConnectionReset
                    => {
                        info!("WebSocket connection reset by peer {}", peer);
                    }
                    _ => {
                        error!("Error receiving message from {}: {}", peer, e);
                    }
                }
                break;
            }
        }
    }
    info!("WebSocket connection closed for {} (identity: {})", peer, identity);
}
