//! Client session
//!
//! A session pairs one WebSocket endpoint with one outbound queue and runs
//! two pumps over it:
//! - the inbound pump relays every data frame from the endpoint to the room
//! - the outbound pump writes every queued payload to the endpoint
//!
//! Either pump ending ends the session and the session leaves the room. If
//! the read side failed, the write side is torn down at once. If the peer
//! closed cleanly, the room closes the outbound queue and the outbound pump
//! gets [`DRAIN_TIMEOUT`] to flush what is left before it is aborted.

use std::time::Duration;

use axum::extract::ws::Message;
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::error::{AppError, RoomError};
use crate::message::Payload;
use crate::room::RoomHandle;
use crate::types::ClientId;

/// How long the outbound pump may keep draining after a clean close
pub const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

type WriteResult = Result<Result<(), AppError>, tokio::task::JoinError>;

/// A registered client session
///
/// Owns the receiving half of its outbound queue. The sending half lives in
/// the room, which is the only writer and the only one that can close it.
#[derive(Debug)]
pub struct ClientSession {
    id: ClientId,
    room: RoomHandle,
    outbound: mpsc::Receiver<Payload>,
}

impl ClientSession {
    /// Create a session and register it with the room
    ///
    /// Returns once the room has admitted the session.
    pub async fn join(room: RoomHandle, outbound_capacity: usize) -> Result<Self, RoomError> {
        let id = ClientId::new();
        let (outbound_tx, outbound) = mpsc::channel(outbound_capacity);

        room.join(id, outbound_tx).await?;

        Ok(Self { id, room, outbound })
    }

    /// Identity of this session
    pub fn id(&self) -> ClientId {
        self.id
    }

    /// Drive the session over an endpoint until it ends
    ///
    /// `stream` and `sink` are the two halves of the same endpoint. Always
    /// leaves the room before returning, and never outlives a dead endpoint.
    pub async fn run<S, K>(self, stream: S, sink: K)
    where
        S: Stream<Item = Result<Message, axum::Error>> + Unpin + Send,
        K: Sink<Message, Error = axum::Error> + Unpin + Send + 'static,
    {
        let Self { id, room, outbound } = self;

        let mut write_task = tokio::spawn(outbound_pump(id, outbound, sink));

        // Whichever pump ends first ends the session; None if the writer did
        let read_outcome = tokio::select! {
            result = inbound_pump(id, stream, &room) => Some(result),
            result = &mut write_task => {
                log_write_result(id, result);
                None
            }
        };

        if room.leave(id).await.is_err() {
            debug!("Room closed before {} could leave", id);
        }

        match read_outcome {
            Some(Ok(())) => drain(id, write_task).await,
            Some(Err(e)) => {
                error!("Read side failed for {}: {}", id, e);
                // The endpoint is gone; release the write half too
                write_task.abort();
            }
            None => {}
        }

        info!("Client {} disconnected", id);
    }
}

/// Give the writer a bounded window to flush the closed queue
async fn drain(id: ClientId, mut write_task: JoinHandle<Result<(), AppError>>) {
    match tokio::time::timeout(DRAIN_TIMEOUT, &mut write_task).await {
        Ok(result) => log_write_result(id, result),
        Err(_) => {
            warn!("Client {} did not drain within {:?}, aborting", id, DRAIN_TIMEOUT);
            write_task.abort();
        }
    }
}

fn log_write_result(id: ClientId, result: WriteResult) {
    match result {
        Ok(Err(e)) => error!("Write side failed for {}: {}", id, e),
        Err(e) if e.is_cancelled() => debug!("Write task for {} cancelled", id),
        Err(e) => error!("Write task for {} panicked: {}", id, e),
        Ok(Ok(())) => {}
    }
}

/// Relay data frames from the endpoint to the room
///
/// Returns Ok when the peer closes the connection, Err on a read failure or
/// when the room is gone.
pub async fn inbound_pump<S>(id: ClientId, mut stream: S, room: &RoomHandle) -> Result<(), AppError>
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    while let Some(msg_result) = stream.next().await {
        match msg_result? {
            Message::Close(_) => {
                debug!("Client {} sent close frame", id);
                break;
            }
            msg => {
                // Pings are answered by the WebSocket layer itself
                let Some(payload) = Payload::from_message(msg) else {
                    continue;
                };
                debug!("Client {} sent {} bytes", id, payload.len());
                room.forward(payload).await?;
            }
        }
    }

    debug!("Read side ended for {}", id);
    Ok(())
}

/// Write queued payloads to the endpoint
///
/// Returns Ok once the queue is closed and drained, after sending a close
/// frame. Returns Err on the first write failure.
pub async fn outbound_pump<K>(
    id: ClientId,
    mut outbound: mpsc::Receiver<Payload>,
    mut sink: K,
) -> Result<(), AppError>
where
    K: Sink<Message, Error = axum::Error> + Unpin,
{
    while let Some(payload) = outbound.recv().await {
        sink.send(payload.to_message()).await?;
    }

    debug!("Outbound queue closed for {}", id);

    // Send close frame when done
    let _ = sink.close().await;

    Ok(())
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;

    use futures_util::{future, sink, stream};

    use super::*;
    use crate::config::OverflowPolicy;
    use crate::room::Room;

    type TestSink = Pin<Box<dyn Sink<Message, Error = axum::Error> + Send>>;

    fn text(body: &str) -> Message {
        Message::Text(body.to_string().into())
    }

    fn texts(frames: &[&str]) -> Vec<Result<Message, axum::Error>> {
        frames.iter().map(|body| Ok(text(body))).collect()
    }

    fn read_failure() -> axum::Error {
        axum::Error::new(io::Error::from(io::ErrorKind::ConnectionReset))
    }

    /// Sink that hands every written frame to a channel
    fn capture_sink() -> (TestSink, mpsc::UnboundedReceiver<Message>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = sink::unfold(tx, |tx, msg: Message| async move {
            tx.send(msg).map_err(|_| read_failure())?;
            Ok::<_, axum::Error>(tx)
        });
        (Box::pin(sink), rx)
    }

    /// Sink whose every write fails
    fn broken_sink() -> TestSink {
        let sink = sink::unfold((), |(), _msg: Message| async move {
            Err::<(), _>(read_failure())
        });
        Box::pin(sink)
    }

    /// Sink whose writes never complete, like a peer that stopped reading
    fn stalled_sink() -> TestSink {
        let sink = sink::unfold((), |(), _msg: Message| {
            future::pending::<Result<(), axum::Error>>()
        });
        Box::pin(sink)
    }

    fn spawn_room() -> RoomHandle {
        let (room, handle) = Room::new(OverflowPolicy::DropNewest);
        tokio::spawn(room.run());
        handle
    }

    async fn observer(room: &RoomHandle) -> mpsc::Receiver<Payload> {
        let (tx, rx) = mpsc::channel(16);
        room.join(ClientId::new(), tx).await.unwrap();
        rx
    }

    async fn wait_for_members(room: &RoomHandle, expected: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while room.member_count().await.unwrap() != expected {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("member count never reached expected value");
    }

    #[tokio::test]
    async fn test_outbound_pump_drains_then_ends_cleanly() {
        let (tx, rx) = mpsc::channel(8);
        let (sink, mut written) = capture_sink();
        for body in ["m1", "m2", "m3"] {
            tx.send(Payload::from(body)).await.unwrap();
        }
        drop(tx);

        outbound_pump(ClientId::new(), rx, sink).await.unwrap();

        for body in ["m1", "m2", "m3"] {
            assert_eq!(written.recv().await, Some(text(body)));
        }
        assert!(written.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_outbound_pump_waits_while_queue_open() {
        let (tx, rx) = mpsc::channel(8);
        let (sink, mut written) = capture_sink();
        let mut pump = tokio::spawn(outbound_pump(ClientId::new(), rx, sink));

        tx.send(Payload::from("m1")).await.unwrap();
        assert_eq!(written.recv().await, Some(text("m1")));
        assert!(tokio::time::timeout(Duration::from_millis(50), &mut pump)
            .await
            .is_err());

        drop(tx);
        assert!(pump.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn test_outbound_pump_stops_on_write_failure() {
        let (tx, rx) = mpsc::channel(8);
        tx.send(Payload::from("m1")).await.unwrap();

        let result = outbound_pump(ClientId::new(), rx, broken_sink()).await;

        assert!(matches!(result, Err(AppError::WebSocket(_))));
    }

    #[tokio::test]
    async fn test_inbound_pump_relays_data_frames_in_order() {
        let room = spawn_room();
        let mut seen = observer(&room).await;
        let mut frames = texts(&["m1", "m2"]);
        frames.insert(1, Ok(Message::Ping(vec![1u8].into())));
        frames.push(Ok(Message::Binary(vec![7u8, 8].into())));

        inbound_pump(ClientId::new(), stream::iter(frames), &room)
            .await
            .unwrap();

        assert_eq!(seen.recv().await, Some(Payload::from("m1")));
        assert_eq!(seen.recv().await, Some(Payload::from("m2")));
        assert_eq!(seen.recv().await, Some(Payload::from(vec![7u8, 8])));
    }

    #[tokio::test]
    async fn test_inbound_pump_stops_at_close_frame() {
        let room = spawn_room();
        let mut seen = observer(&room).await;
        let mut frames = texts(&["before"]);
        frames.push(Ok(Message::Close(None)));
        frames.extend(texts(&["after"]));

        inbound_pump(ClientId::new(), stream::iter(frames), &room)
            .await
            .unwrap();
        room.forward(Payload::from("marker")).await.unwrap();

        assert_eq!(seen.recv().await, Some(Payload::from("before")));
        assert_eq!(seen.recv().await, Some(Payload::from("marker")));
    }

    #[tokio::test]
    async fn test_inbound_pump_reports_read_failure() {
        let room = spawn_room();
        let frames = vec![Err(read_failure())];

        let result = inbound_pump(ClientId::new(), stream::iter(frames), &room).await;

        assert!(matches!(result, Err(AppError::WebSocket(_))));
    }

    #[tokio::test]
    async fn test_session_broadcasts_and_leaves() {
        let room = spawn_room();
        let mut seen = observer(&room).await;
        let session = ClientSession::join(room.clone(), 8).await.unwrap();
        let (sink, mut written) = capture_sink();
        assert_eq!(room.member_count().await.unwrap(), 2);

        session
            .run(stream::iter(texts(&["hi", "there"])), sink)
            .await;

        assert_eq!(seen.recv().await, Some(Payload::from("hi")));
        assert_eq!(seen.recv().await, Some(Payload::from("there")));

        // Echoes processed before the leave are flushed, in order
        let mut echoed = Vec::new();
        while let Some(frame) = written.recv().await {
            echoed.push(frame);
        }
        let expected = [text("hi"), text("there")];
        assert!(expected.starts_with(&echoed));

        wait_for_members(&room, 1).await;
    }

    #[tokio::test]
    async fn test_session_ends_when_writes_fail() {
        let room = spawn_room();
        let session = ClientSession::join(room.clone(), 8).await.unwrap();
        room.forward(Payload::from("undeliverable")).await.unwrap();

        // The read side never ends on its own
        session.run(stream::pending(), broken_sink()).await;

        wait_for_members(&room, 0).await;
    }

    #[tokio::test]
    async fn test_session_releases_stalled_writer_after_read_failure() {
        let room = spawn_room();
        let session = ClientSession::join(room.clone(), 8).await.unwrap();
        room.forward(Payload::from("stuck")).await.unwrap();

        let frames = vec![Err(read_failure())];
        let ended = tokio::time::timeout(
            Duration::from_secs(2),
            session.run(stream::iter(frames), stalled_sink()),
        )
        .await;

        assert!(ended.is_ok());
        wait_for_members(&room, 0).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_bounds_drain_after_clean_close() {
        let room = spawn_room();
        let session = ClientSession::join(room.clone(), 8).await.unwrap();
        room.forward(Payload::from("stuck")).await.unwrap();

        let ended = tokio::time::timeout(
            DRAIN_TIMEOUT * 2,
            session.run(stream::iter(texts(&["bye"])), stalled_sink()),
        )
        .await;

        assert!(ended.is_ok());
        wait_for_members(&room, 0).await;
    }
}
