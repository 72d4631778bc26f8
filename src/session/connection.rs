use super::SessionConfig;
use super::dispatch::ConnectionContext;
use super::mailbox::{Mailbox, MailboxReceiver};
use crate::game::core::messages::{ClientMessage, ServerEvent};
use crate::game::engine::GameService;
use crate::hub::{Hub, SessionHandle};
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::time::{Instant, interval_at, timeout};
use tracing::{debug, info, trace, warn};

#[derive(Debug, thiserror::Error)]
enum WriteError {
    #[error("socket write failed: {0}")]
    Socket(#[from] axum::Error),
    #[error("write timed out")]
    Timeout(#[from] tokio::time::error::Elapsed),
}

/// Serve one authenticated connection until either side gives up.
///
/// The session is registered before any frame is read and unregistered on
/// every exit path.
pub async fn run_connection(
    socket: WebSocket,
    user_id: String,
    hub: Hub,
    games: GameService,
    config: SessionConfig,
) {
    let (mailbox, outbox) = Mailbox::new(config.mailbox_capacity);
    let session = SessionHandle::new(user_id, mailbox);
    let session_id = session.id;
    info!(%session_id, user_id = %session.user_id, "WebSocket connection opened");

    hub.register(session.clone()).await;
    let ctx = ConnectionContext::new(session, hub.clone(), games);

    let (sender, receiver) = socket.split();
    let mut send_task = tokio::spawn(send_loop(sender, outbox, config.clone()));
    let mut recv_task = tokio::spawn(receive_loop(receiver, ctx, config.pong_wait));

    tokio::select! {
        _ = &mut send_task => recv_task.abort(),
        _ = &mut recv_task => {},
    }

    // Closes the mailbox, which lets the outbound duty send its close frame
    hub.unregister(session_id).await;
    if timeout(config.write_wait, send_task).await.is_err() {
        debug!(%session_id, "Outbound duty did not finish in time");
    }

    info!(%session_id, "WebSocket connection closed");
}

/// Inbound duty: read frames, renew the liveness deadline, dispatch.
async fn receive_loop(
    mut receiver: SplitStream<WebSocket>,
    ctx: ConnectionContext,
    pong_wait: Duration,
) {
    let session_id = ctx.session.id;
    loop {
        // Any frame at all, heartbeat replies included, proves the peer is alive
        let frame = match timeout(pong_wait, receiver.next()).await {
            Err(_) => {
                info!(%session_id, "Liveness deadline passed");
                break;
            }
            Ok(None) => break,
            Ok(Some(Err(err))) => {
                debug!(%session_id, %err, "Read failed");
                break;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        let text = match frame {
            Message::Text(text) => text,
            Message::Close(_) => break,
            _ => continue,
        };
        trace!(%session_id, raw = %text, "Received frame");

        match ClientMessage::decode(&text) {
            Ok(Some(msg)) => {
                if let Err(err) = ctx.dispatch(msg).await {
                    ctx.reply_error(&err);
                }
            }
            Ok(None) => debug!(%session_id, "Ignoring unknown message kind"),
            Err(err) => {
                warn!(%session_id, %err, "Failed to decode client message");
                ctx.reply_error(&err);
            }
        }
    }
}

/// Outbound duty: drain the mailbox in bursts, probe the peer every ping period.
async fn send_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut outbox: MailboxReceiver,
    config: SessionConfig,
) {
    let mut ticker = interval_at(Instant::now() + config.ping_period, config.ping_period);

    loop {
        tokio::select! {
            event = outbox.recv() => {
                let Some(event) = event else { break };
                let burst = timeout(config.write_wait, write_burst(&mut sender, &mut outbox, &event)).await;
                match burst.map_err(WriteError::from).and_then(|written| written) {
                    Ok(written) => trace!(written, "Flushed write burst"),
                    Err(err) => {
                        debug!(%err, "Outbound duty stopping");
                        return;
                    }
                }
            }
            _ = ticker.tick() => {
                // Data frames draw no reply, so probe even while events flow
                let ping = sender.send(Message::Ping(Vec::new()));
                if !matches!(timeout(config.write_wait, ping).await, Ok(Ok(()))) {
                    debug!("Ping failed, outbound duty stopping");
                    return;
                }
            }
        }
    }

    let _ = timeout(config.write_wait, sender.send(Message::Close(None))).await;
}

fn encode(event: &ServerEvent) -> Option<Message> {
    match serde_json::to_string(event) {
        Ok(json) => Some(Message::Text(json)),
        Err(err) => {
            warn!(kind = event.kind(), %err, "Failed to encode event");
            None
        }
    }
}

/// Write `first` plus whatever else is already queued, then flush once.
async fn write_burst(
    sender: &mut SplitSink<WebSocket, Message>,
    outbox: &mut MailboxReceiver,
    first: &ServerEvent,
) -> Result<usize, WriteError> {
    let mut written = 0;
    if let Some(frame) = encode(first) {
        sender.feed(frame).await?;
        written += 1;
    }
    while let Some(event) = outbox.try_recv() {
        if let Some(frame) = encode(&event) {
            sender.feed(frame).await?;
            written += 1;
        }
    }
    sender.flush().await?;
    Ok(written)
}
