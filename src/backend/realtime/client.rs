/**
 * Client Connection Pumps
 *
 * One upgraded socket is served by two tasks sharing the client's outbound
 * queue:
 *
 * - the **write pump** drains the queue into JSON text frames and pings the
 *   peer every `ping_period`; each write has a `write_wait` deadline.
 * - the **read pump** reads envelopes and hands them to the hub; it gives
 *   up when nothing (frame or pong) arrives within `pong_wait`.
 *
 * Whichever pump stops first ends the connection. The hub is always told
 * to unregister; if the client was displaced meanwhile that is a no-op.
 */

use axum::extract::ws::{Message, WebSocket};
use bytes::Bytes;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::time::{interval_at, timeout, Instant};

use crate::backend::realtime::hub::{ClientRef, Hub, LiveClient};
use crate::shared::config::RealtimeConfig;
use crate::shared::event::{Envelope, ServerEvent};

/// Why a pump stopped
#[derive(Debug)]
enum PumpExit {
    QueueClosed,
    WriteFailed(axum::Error),
    WriteTimeout,
    PeerClosed,
    ReadFailed(axum::Error),
    IdleTimeout,
    FrameTooLarge(usize),
    HubClosed,
}

/// Serve an upgraded socket for `identity` until either side gives up.
pub async fn serve_connection(socket: WebSocket, hub: Hub, identity: ClientRef, settings: RealtimeConfig) {
    let (client, outbound) = LiveClient::channel(identity.clone(), settings.queue_capacity);
    if hub.register(client).await.is_err() {
        tracing::warn!("[Client] hub stopped, refusing connection for {}", identity.user_id);
        return;
    }

    let (sink, stream) = socket.split();
    let mut writer = tokio::spawn(write_pump(sink, outbound, settings.clone()));
    let mut reader = tokio::spawn(read_pump(stream, hub.clone(), identity.clone(), settings.clone()));

    let writer_finished = tokio::select! {
        exit = &mut writer => {
            reader.abort();
            tracing::debug!("[Client] write pump for {} exited: {:?}", identity.user_id, exit);
            true
        }
        exit = &mut reader => {
            tracing::debug!("[Client] read pump for {} exited: {:?}", identity.user_id, exit);
            false
        }
    };

    if hub.unregister(&identity).await.is_err() {
        tracing::debug!("[Client] hub already stopped while closing {}", identity.user_id);
    }

    // Unregistering closes the queue, so the writer sends its close frame and stops.
    if !writer_finished && timeout(settings.write_wait, &mut writer).await.is_err() {
        writer.abort();
    }

    tracing::info!("[Client] connection {} for {} closed", identity.id, identity.user_id);
}

async fn write_pump(
    mut sink: SplitSink<WebSocket, Message>,
    mut outbound: mpsc::Receiver<ServerEvent>,
    settings: RealtimeConfig,
) -> PumpExit {
    let mut ping = interval_at(Instant::now() + settings.ping_period, settings.ping_period);

    let exit = loop {
        tokio::select! {
            next = outbound.recv() => match next {
                Some(event) => {
                    let text = match event.to_json() {
                        Ok(text) => text,
                        Err(e) => {
                            tracing::error!("[Client] failed to encode {} frame: {}", event.name(), e);
                            continue;
                        }
                    };
                    if let Err(exit) = write_frame(&mut sink, Message::Text(text.into()), &settings).await {
                        break exit;
                    }
                }
                None => {
                    let _ = write_frame(&mut sink, Message::Close(None), &settings).await;
                    break PumpExit::QueueClosed;
                }
            },
            _ = ping.tick() => {
                if let Err(exit) = write_frame(&mut sink, Message::Ping(Bytes::new()), &settings).await {
                    break exit;
                }
            }
        }
    };

    let _ = sink.close().await;
    exit
}

async fn write_frame(
    sink: &mut SplitSink<WebSocket, Message>,
    frame: Message,
    settings: &RealtimeConfig,
) -> Result<(), PumpExit> {
    match timeout(settings.write_wait, sink.send(frame)).await {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(PumpExit::WriteFailed(e)),
        Err(_) => Err(PumpExit::WriteTimeout),
    }
}

async fn read_pump(
    mut stream: SplitStream<WebSocket>,
    hub: Hub,
    identity: ClientRef,
    settings: RealtimeConfig,
) -> PumpExit {
    loop {
        // The deadline restarts with every frame, pongs included.
        let frame = match timeout(settings.pong_wait, stream.next()).await {
            Err(_) => return PumpExit::IdleTimeout,
            Ok(None) => return PumpExit::PeerClosed,
            Ok(Some(Err(e))) => return PumpExit::ReadFailed(e),
            Ok(Some(Ok(frame))) => frame,
        };

        let handled = match frame {
            Message::Text(text) => {
                if text.len() > settings.max_frame_size {
                    return PumpExit::FrameTooLarge(text.len());
                }
                match Envelope::parse(text.as_str()) {
                    Ok(envelope) => hub.handle_message(&identity, envelope).await,
                    Err(_) => hub.reject(&identity, "Invalid message format").await,
                }
            }
            Message::Binary(_) => hub.reject(&identity, "Binary frames are not supported").await,
            Message::Ping(_) | Message::Pong(_) => Ok(()),
            Message::Close(_) => return PumpExit::PeerClosed,
        };

        if handled.is_err() {
            return PumpExit::HubClosed;
        }
    }
}
