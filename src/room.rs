//! Room actor implementation
//!
//! The room is the hub's only piece of shared state. It owns the member map
//! and is driven by a single task that consumes its intake channels one event
//! at a time. Nothing else ever touches the map, so no locks are needed.
//!
//! Sessions talk to the room exclusively through a [`RoomHandle`].

use std::collections::HashMap;

use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::OverflowPolicy;
use crate::error::RoomError;
use crate::message::Payload;
use crate::types::ClientId;

/// Buffer size of each room intake channel
pub const ROOM_INTAKE_CAPACITY: usize = 256;

/// Request to add a session to the room
#[derive(Debug)]
pub struct Admission {
    /// Identity of the joining session
    pub client_id: ClientId,
    /// Sending half of the session's outbound queue
    pub outbound: mpsc::Sender<Payload>,
    /// Completed once the session is a member
    pub ack: oneshot::Sender<()>,
}

/// The room actor
///
/// Holds the sending half of every member's outbound queue. Dropping that
/// sender is how the room closes a member's queue.
pub struct Room {
    /// Active members: ClientId -> outbound queue
    members: HashMap<ClientId, mpsc::Sender<Payload>>,
    /// Full-queue behavior during broadcast
    overflow: OverflowPolicy,
    join_rx: mpsc::Receiver<Admission>,
    leave_rx: mpsc::Receiver<ClientId>,
    forward_rx: mpsc::Receiver<Payload>,
    census_rx: mpsc::Receiver<oneshot::Sender<usize>>,
}

impl Room {
    /// Create a room and the handle used to reach it
    ///
    /// The room does nothing until [`Room::run`] is spawned.
    pub fn new(overflow: OverflowPolicy) -> (Self, RoomHandle) {
        let (join_tx, join_rx) = mpsc::channel(ROOM_INTAKE_CAPACITY);
        let (leave_tx, leave_rx) = mpsc::channel(ROOM_INTAKE_CAPACITY);
        let (forward_tx, forward_rx) = mpsc::channel(ROOM_INTAKE_CAPACITY);
        let (census_tx, census_rx) = mpsc::channel(ROOM_INTAKE_CAPACITY);

        let room = Self {
            members: HashMap::new(),
            overflow,
            join_rx,
            leave_rx,
            forward_rx,
            census_rx,
        };
        let handle = RoomHandle {
            join_tx,
            leave_tx,
            forward_tx,
            census_tx,
        };

        (room, handle)
    }

    /// Run the room's control loop
    ///
    /// Processes whichever event is ready next, one at a time, until every
    /// handle has been dropped. Ready sources are picked fairly, so steady
    /// broadcast traffic never starves joins or leaves.
    pub async fn run(mut self) {
        info!("Room started (overflow policy: {:?})", self.overflow);

        loop {
            tokio::select! {
                Some(admission) = self.join_rx.recv() => self.admit(admission),
                Some(payload) = self.forward_rx.recv() => self.forward(payload),
                Some(client_id) = self.leave_rx.recv() => {
                    self.remove(client_id);
                }
                Some(reply) = self.census_rx.recv() => {
                    let _ = reply.send(self.members.len());
                }
                else => break,
            }
        }

        info!("Room shutting down");
    }

    /// Add a session to the member set and acknowledge
    fn admit(&mut self, admission: Admission) {
        let Admission {
            client_id,
            outbound,
            ack,
        } = admission;

        self.members.insert(client_id, outbound);
        info!("Client {} joined", client_id);
        debug!("Total members: {}", self.members.len());

        let _ = ack.send(());
    }

    /// Remove a session and close its outbound queue
    ///
    /// Returns false if the session was not a member.
    fn remove(&mut self, client_id: ClientId) -> bool {
        // Dropping the sender closes the queue
        match self.members.remove(&client_id) {
            Some(_outbound) => {
                info!("Client {} left", client_id);
                debug!("Total members: {}", self.members.len());
                true
            }
            None => {
                debug!("Client {} already removed", client_id);
                false
            }
        }
    }

    /// Offer a payload to every member without waiting on any of them
    fn forward(&mut self, payload: Payload) {
        let mut evicted = Vec::new();

        for (client_id, outbound) in &self.members {
            match outbound.try_send(payload.clone()) {
                Ok(()) => {}
                Err(TrySendError::Full(_)) => match self.overflow {
                    OverflowPolicy::DropNewest => {
                        warn!("Outbound queue full for {}, dropping message", client_id);
                    }
                    OverflowPolicy::Disconnect => {
                        warn!("Outbound queue full for {}, disconnecting", client_id);
                        evicted.push(*client_id);
                    }
                },
                Err(TrySendError::Closed(_)) => {
                    debug!("Outbound queue closed for {}", client_id);
                    evicted.push(*client_id);
                }
            }
        }

        for client_id in evicted {
            self.remove(client_id);
        }
    }
}

/// Handle for interacting with the room actor
///
/// Cheap to clone. Every session holds one; the front door holds the
/// original. The room stops once all handles are gone.
#[derive(Debug, Clone)]
pub struct RoomHandle {
    join_tx: mpsc::Sender<Admission>,
    leave_tx: mpsc::Sender<ClientId>,
    forward_tx: mpsc::Sender<Payload>,
    census_tx: mpsc::Sender<oneshot::Sender<usize>>,
}

impl RoomHandle {
    /// Register a session with the room
    ///
    /// Resolves once the room has admitted the session, so anything forwarded
    /// afterwards reaches its queue.
    pub async fn join(
        &self,
        client_id: ClientId,
        outbound: mpsc::Sender<Payload>,
    ) -> Result<(), RoomError> {
        let (ack, acked) = oneshot::channel();

        self.join_tx
            .send(Admission {
                client_id,
                outbound,
                ack,
            })
            .await
            .map_err(|_| RoomError::Closed)?;

        acked.await.map_err(|_| RoomError::Closed)
    }

    /// Unregister a session; a no-op if it is not a member
    pub async fn leave(&self, client_id: ClientId) -> Result<(), RoomError> {
        self.leave_tx
            .send(client_id)
            .await
            .map_err(|_| RoomError::Closed)
    }

    /// Broadcast a payload to every member, the sender included
    pub async fn forward(&self, payload: Payload) -> Result<(), RoomError> {
        self.forward_tx
            .send(payload)
            .await
            .map_err(|_| RoomError::Closed)
    }

    /// Current number of members
    pub async fn member_count(&self) -> Result<usize, RoomError> {
        let (tx, rx) = oneshot::channel();

        self.census_tx.send(tx).await.map_err(|_| RoomError::Closed)?;

        rx.await.map_err(|_| RoomError::Closed)
    }
}
