//! The ring node actor.
//!
//! One task owns every piece of ring state: both neighbor slots, the parked
//! splice candidate, the awaited-join set, the dedup history and the
//! membership state. Link reader tasks and the listener feed it
//! `LinkEvent`s; `NodeHandle`s feed it commands. Nothing else mutates it.

use bytes::Bytes;
use serde::Serialize;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use ringchat_core::config::TimeoutConfig;
use ringchat_core::wire::{Command, FramingError, ProtocolError};
use ringchat_core::{ControlMessage, PeerAddress, RingId};

use crate::dispatch::{dispatch, Inbound};
use crate::error::{ApplicationError, ConnectionError};
use crate::link::{self, Direction, Greeting, LinkEvent, LinkId, NeighborLink};
use crate::membership::{self, AwaitedJoins, GreetingAction, MembershipState, Repoint};
use crate::relay::{Relay, Verdict};

const COMMAND_QUEUE: usize = 64;

// ── Public surface ────────────────────────────────────────────────────────────

/// Something the local user should see.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatEvent {
    Message { sender: String, text: String },
    Joined { id: String },
    Left { id: String },
    IdAssigned(RingId),
    LinkClosed {
        direction: Direction,
        peer: PeerAddress,
        reason: String,
    },
}

/// What a neighbor slot currently holds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Neighbor {
    /// Points back at this node.
    Own,
    Peer(PeerAddress),
    /// The link failed and nothing replaced it.
    Closed,
}

/// Point-in-time view of a node, for `!status` and tests.
#[derive(Debug, Clone, Serialize)]
pub struct Snapshot {
    pub address: PeerAddress,
    pub id: Option<RingId>,
    pub state: MembershipState,
    pub left: Neighbor,
    pub right: Neighbor,
    pub awaited: Vec<PeerAddress>,
    pub pending_candidate: Option<PeerAddress>,
    pub remembered: usize,
}

enum NodeCommand {
    Chat {
        text: String,
        reply: oneshot::Sender<Result<(), ApplicationError>>,
    },
    Disconnect {
        reply: oneshot::Sender<()>,
    },
    Snapshot {
        reply: oneshot::Sender<Snapshot>,
    },
}

impl std::fmt::Debug for NodeCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NodeCommand::Chat { text, .. } => write!(f, "Chat({text:?})"),
            NodeCommand::Disconnect { .. } => write!(f, "Disconnect"),
            NodeCommand::Snapshot { .. } => write!(f, "Snapshot"),
        }
    }
}

/// Cheap, cloneable way to talk to a running node.
#[derive(Debug, Clone)]
pub struct NodeHandle {
    address: PeerAddress,
    commands: mpsc::Sender<NodeCommand>,
}

impl NodeHandle {
    /// The address other peers use to reach this node.
    pub fn address(&self) -> &PeerAddress {
        &self.address
    }

    /// Flood a chat line to the ring. Surrounding whitespace is trimmed.
    pub async fn send_chat(&self, text: impl Into<String>) -> Result<(), ApplicationError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::Chat {
            text: text.into(),
            reply,
        })
        .await?;
        rx.await.map_err(|_| ApplicationError::NodeStopped)?
    }

    /// Leave the ring gracefully. The node task ends afterwards.
    pub async fn disconnect(&self) -> Result<(), ApplicationError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::Disconnect { reply }).await?;
        rx.await.map_err(|_| ApplicationError::NodeStopped)
    }

    pub async fn snapshot(&self) -> Result<Snapshot, ApplicationError> {
        let (reply, rx) = oneshot::channel();
        self.request(NodeCommand::Snapshot { reply }).await?;
        rx.await.map_err(|_| ApplicationError::NodeStopped)
    }

    pub async fn id(&self) -> Result<RingId, ApplicationError> {
        self.snapshot()
            .await?
            .id
            .ok_or(ApplicationError::IdNotAssigned)
    }

    async fn request(&self, command: NodeCommand) -> Result<(), ApplicationError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ApplicationError::NodeStopped)
    }
}

/// A started node: its handle, the user-facing event stream and the actor task.
pub struct NodeRuntime {
    pub handle: NodeHandle,
    pub events: mpsc::UnboundedReceiver<ChatEvent>,
    pub task: JoinHandle<()>,
}

/// Start a node on a bound listener.
///
/// With no `entry` the node founds a new ring. Otherwise it joins through
/// `entry` before returning; a join that fails or times out is returned as
/// an error and nothing keeps running.
pub async fn start(
    listener: TcpListener,
    address: PeerAddress,
    entry: Option<PeerAddress>,
    timeouts: TimeoutConfig,
) -> Result<NodeRuntime, ConnectionError> {
    let (link_tx, link_rx) = mpsc::unbounded_channel();
    let (chat_tx, chat_rx) = mpsc::unbounded_channel();

    let mut node = RingNode::new(address.clone(), timeouts, link_tx.clone(), chat_tx);
    match entry {
        Some(entry) => node.join(&entry).await?,
        None => node.bootstrap(),
    }

    let listener_task = tokio::spawn(link::listen_loop(listener, link_tx, timeouts.control()));
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_QUEUE);
    let task = tokio::spawn(node.run(cmd_rx, link_rx, listener_task));

    Ok(NodeRuntime {
        handle: NodeHandle {
            address,
            commands: cmd_tx,
        },
        events: chat_rx,
        task,
    })
}

// ── Actor ─────────────────────────────────────────────────────────────────────

enum Slot {
    Own,
    Live(NeighborLink),
    Closed,
}

impl Slot {
    fn view(&self) -> Neighbor {
        match self {
            Slot::Own => Neighbor::Own,
            Slot::Live(link) => Neighbor::Peer(link.address().clone()),
            Slot::Closed => Neighbor::Closed,
        }
    }

    fn link_id(&self) -> Option<LinkId> {
        match self {
            Slot::Live(link) => Some(link.id()),
            _ => None,
        }
    }

    fn peer(&self) -> Option<&PeerAddress> {
        match self {
            Slot::Live(link) => Some(link.address()),
            _ => None,
        }
    }
}

struct RingNode {
    address: PeerAddress,
    id: Option<RingId>,
    state: MembershipState,
    left: Slot,
    right: Slot,
    /// Joiner parked while our right neighbor prepares the splice.
    pending: Option<NeighborLink>,
    awaited: AwaitedJoins,
    /// When an outstanding splice is given up.
    splice_deadline: Option<Instant>,
    relay: Relay,
    timeouts: TimeoutConfig,
    next_link: LinkId,
    link_tx: mpsc::UnboundedSender<LinkEvent>,
    chat_tx: mpsc::UnboundedSender<ChatEvent>,
}

impl RingNode {
    fn new(
        address: PeerAddress,
        timeouts: TimeoutConfig,
        link_tx: mpsc::UnboundedSender<LinkEvent>,
        chat_tx: mpsc::UnboundedSender<ChatEvent>,
    ) -> Self {
        Self {
            address,
            id: None,
            state: MembershipState::Solo,
            left: Slot::Own,
            right: Slot::Own,
            pending: None,
            awaited: AwaitedJoins::default(),
            splice_deadline: None,
            relay: Relay::new(),
            timeouts,
            next_link: 0,
            link_tx,
            chat_tx,
        }
    }

    fn bootstrap(&mut self) {
        let id = RingId::for_address(&self.address);
        self.id = Some(id);
        self.state = MembershipState::Solo;
        tracing::info!(address = %self.address, %id, "started a new ring");
        self.emit(ChatEvent::IdAssigned(id));
    }

    /// Splice into the ring behind `entry`.
    async fn join(&mut self, entry: &PeerAddress) -> Result<(), ConnectionError> {
        self.state = MembershipState::Joining;
        tracing::info!(%entry, address = %self.address, "joining ring");

        let hello = Greeting::new("", ControlMessage::NewMember(self.address.clone()));
        let mut stream = link::dial(entry, self.timeouts.join(), &hello).await?;

        // The first reply may take as long as the splice does; the rest
        // follows right behind it.
        let mut wait = self.timeouts.join();
        let next_hop = loop {
            let raw = link::read_frame(&mut stream, Some(wait), self.timeouts.relay()).await?;
            wait = self.timeouts.control();

            let frame = match self.relay.on_receive(&raw, Direction::Left) {
                Verdict::Deliver { frame, .. } => frame,
                Verdict::Duplicate => continue,
                Verdict::Malformed(e) => {
                    tracing::warn!(%entry, error = %e, "malformed frame while joining");
                    continue;
                }
            };
            match dispatch(frame)? {
                Inbound::AssignId(id) => {
                    tracing::info!(%id, "ring id assigned");
                    self.id = Some(id);
                    self.emit(ChatEvent::IdAssigned(id));
                }
                Inbound::Control(ControlMessage::SpliceComplete(next)) => break next,
                other => tracing::debug!(?other, "ignoring frame before splice completed"),
            }
        };

        let id = self.id.ok_or_else(|| ProtocolError::InvalidForState {
            event: "splice completion",
            state: "joining without an id".into(),
        })?;

        let left = self.adopt(entry.clone(), stream);
        self.left = Slot::Live(left);

        let greeting = Greeting::new(
            id.to_string(),
            ControlMessage::SpliceComplete(self.address.clone()),
        );
        let stream = link::dial(&next_hop, self.timeouts.control(), &greeting).await?;
        let right = self.adopt(next_hop.clone(), stream);
        self.right = Slot::Live(right);

        self.state = MembershipState::Joined;
        tracing::info!(left = %entry, right = %next_hop, %id, "joined ring");
        self.broadcast(Command::Connected, &id.to_string()).await?;
        Ok(())
    }

    async fn run(
        mut self,
        mut commands: mpsc::Receiver<NodeCommand>,
        mut links: mpsc::UnboundedReceiver<LinkEvent>,
        listener: JoinHandle<()>,
    ) {
        loop {
            if !self.splice_outstanding() {
                self.splice_deadline = None;
            }
            let splice_deadline = self.splice_deadline;

            tokio::select! {
                command = commands.recv() => match command {
                    Some(NodeCommand::Chat { text, reply }) => {
                        let result = self.send_chat(text.trim()).await;
                        let _ = reply.send(result);
                    }
                    Some(NodeCommand::Snapshot { reply }) => {
                        let _ = reply.send(self.snapshot());
                    }
                    Some(NodeCommand::Disconnect { reply }) => {
                        self.leave().await;
                        let _ = reply.send(());
                        break;
                    }
                    None => {
                        tracing::info!("all handles dropped, node stopping");
                        break;
                    }
                },

                Some(event) = links.recv() => self.on_link_event(event).await,

                _ = tokio::time::sleep_until(splice_deadline.unwrap_or_else(Instant::now)),
                    if splice_deadline.is_some() => self.abandon_splice().await,
            }
        }

        listener.abort();
        self.close_all().await;
        tracing::info!(address = %self.address, "node stopped");
    }

    async fn send_chat(&mut self, text: &str) -> Result<(), ApplicationError> {
        if self.id.is_none() {
            return Err(ApplicationError::IdNotAssigned);
        }
        if text.is_empty() {
            return Ok(());
        }
        self.broadcast(Command::Print, text).await?;
        Ok(())
    }

    fn snapshot(&self) -> Snapshot {
        Snapshot {
            address: self.address.clone(),
            id: self.id,
            state: self.state.clone(),
            left: self.left.view(),
            right: self.right.view(),
            awaited: self.awaited.to_vec(),
            pending_candidate: self.pending.as_ref().map(|l| l.address().clone()),
            remembered: self.relay.remembered(),
        }
    }

    // ── Link events ───────────────────────────────────────────────────────────

    async fn on_link_event(&mut self, event: LinkEvent) {
        match event {
            LinkEvent::Frame { link, raw } => match self.direction_of(link) {
                Some(from) => self.on_receive(raw, from).await,
                None if self.is_pending(link) => {
                    tracing::debug!("dropping frame from parked candidate");
                }
                None => tracing::trace!(link, "frame from a replaced link"),
            },
            LinkEvent::Closed { link, error } => match self.direction_of(link) {
                Some(Direction::Left) if matches!(self.state, MembershipState::Inserting { .. }) => {
                    // The old left neighbor hangs up once it handed us over.
                    tracing::debug!(error = %error, "left link closed during splice");
                    self.set_slot(Direction::Left, Slot::Closed).await;
                }
                Some(direction) => self.close_slot(direction, error).await,
                None if self.is_pending(link) => {
                    tracing::warn!(error = %error, "splice candidate went away");
                    self.pending = None;
                }
                None => tracing::trace!(link, "replaced link closed"),
            },
            LinkEvent::Inbound { stream, greeting } => self.on_inbound(stream, greeting).await,
        }
    }

    async fn on_receive(&mut self, raw: Bytes, from: Direction) {
        match self.relay.on_receive(&raw, from) {
            Verdict::Duplicate => {}
            Verdict::Malformed(e) => {
                tracing::warn!(direction = ?from, error = %e, "dropping malformed frame");
            }
            Verdict::Deliver { frame, forward } => {
                if let Some(to) = forward {
                    self.send_to(to, &raw).await;
                }
                let sender = frame.sender_id.clone();
                let result = match dispatch(frame) {
                    Ok(inbound) => self.handle(inbound, from, &raw).await,
                    Err(e) => Err(e),
                };
                if let Err(e) = result {
                    tracing::warn!(%sender, direction = ?from, error = %e, "protocol violation");
                }
            }
        }
    }

    async fn handle(
        &mut self,
        inbound: Inbound,
        from: Direction,
        raw: &[u8],
    ) -> Result<(), ProtocolError> {
        match inbound {
            Inbound::Chat { sender, text } => self.emit(ChatEvent::Message { sender, text }),
            Inbound::Arrived { id } => self.emit(ChatEvent::Joined { id }),
            Inbound::Departed { id } => self.emit(ChatEvent::Left { id }),
            Inbound::AssignId(id) => {
                if self.pending.is_none() {
                    return Err(ProtocolError::InvalidForState {
                        event: "ASSIGN_ID",
                        state: self.state.to_string(),
                    });
                }
                tracing::debug!(%id, "passing id to candidate");
                self.send_to_candidate(raw).await;
            }
            Inbound::Control(message) => self.on_control(message, from, raw).await?,
        }
        Ok(())
    }

    async fn on_control(
        &mut self,
        message: ControlMessage,
        from: Direction,
        raw: &[u8],
    ) -> Result<(), ProtocolError> {
        match message {
            ControlMessage::NewMember(candidate) => {
                membership::admit_relayed_member(&self.state)?;
                self.prepare_splice(candidate, from).await;
            }
            ControlMessage::SpliceComplete(next) => {
                if self.pending.is_none() {
                    return Err(ProtocolError::InvalidForState {
                        event: "splice completion",
                        state: self.state.to_string(),
                    });
                }
                tracing::debug!(%next, "handing candidate over to our right neighbor");
                if self.send_to_candidate(raw).await {
                    if let Some(candidate) = self.pending.take() {
                        tracing::info!(peer = %candidate.address(), "candidate spliced in on the right");
                        self.set_slot(Direction::Right, Slot::Live(candidate)).await;
                    }
                }
            }
            ControlMessage::RepointRight(next) => {
                match membership::plan_repoint_right(&self.address, &next) {
                    Repoint::Dial(next) => self.attach_right(next).await,
                    _ => {
                        tracing::info!("right side of the ring is now empty");
                        self.set_slot(Direction::Right, Slot::Own).await;
                    }
                }
            }
            ControlMessage::RepointLeft(next) => {
                match membership::plan_repoint_left(&self.address, self.left.peer(), &next) {
                    Repoint::PointAtSelf => {
                        tracing::info!("left side of the ring is now empty");
                        self.set_slot(Direction::Left, Slot::Own).await;
                    }
                    Repoint::Await(next) => {
                        tracing::debug!(%next, "awaiting new left neighbor");
                        self.awaited.insert(next);
                        if from == Direction::Left {
                            // The sender is our departing left neighbor.
                            self.set_slot(Direction::Left, Slot::Closed).await;
                        }
                    }
                    Repoint::Keep | Repoint::Dial(_) => {}
                }
            }
        }
        Ok(())
    }

    async fn on_inbound(&mut self, stream: TcpStream, greeting: Greeting) {
        let action = membership::classify_greeting(
            &self.state,
            &self.awaited,
            self.pending.is_some(),
            &greeting.intent,
        );
        match action {
            GreetingAction::SpliceDirect(candidate) => {
                let link = self.adopt(candidate.clone(), stream);
                self.set_slot(Direction::Right, Slot::Live(link)).await;
                self.prepare_splice(candidate, Direction::Right).await;
            }
            GreetingAction::RelayNewMember(candidate) => {
                if self.right.link_id().is_none() {
                    tracing::warn!(%candidate, "no right neighbor to splice against");
                    return;
                }
                tracing::info!(%candidate, "new member asked to join, relaying");
                self.pending = Some(self.adopt(candidate.clone(), stream));
                self.arm_splice_deadline();
                self.send_control(Direction::Right, ControlMessage::NewMember(candidate))
                    .await;
            }
            GreetingAction::CompleteSplice(peer) => {
                self.awaited.remove(&peer);
                let link = self.adopt(peer.clone(), stream);
                self.set_slot(Direction::Left, Slot::Live(link)).await;
                if matches!(&self.state, MembershipState::Inserting { candidate } if *candidate == peer)
                {
                    self.state = MembershipState::Joined;
                }
                tracing::info!(%peer, "splice complete, new left neighbor");
            }
            GreetingAction::AttachLeft(peer) => {
                self.awaited.remove(&peer);
                let link = self.adopt(peer.clone(), stream);
                self.set_slot(Direction::Left, Slot::Live(link)).await;
                tracing::info!(%peer, "repointed left neighbor");
            }
            GreetingAction::Reject(e) => {
                tracing::warn!(
                    sender = %greeting.sender_id,
                    intent = %greeting.intent,
                    error = %e,
                    "rejecting inbound link"
                );
            }
        }
    }

    // ── Membership transitions ────────────────────────────────────────────────

    /// Right side of a splice: hand the joiner its id and our address over
    /// the link the request came in on, then wait for it to dial us.
    async fn prepare_splice(&mut self, candidate: PeerAddress, reply_on: Direction) {
        let id = RingId::for_address(&candidate);
        tracing::info!(%candidate, %id, "preparing splice");
        self.awaited.insert(candidate.clone());
        self.state = MembershipState::Inserting {
            candidate: candidate.clone(),
        };
        self.arm_splice_deadline();

        if let Err(e) = self.send_local(reply_on, Command::AssignId, &id.to_string()).await {
            tracing::warn!(error = %e, "failed to frame id assignment");
        }
        self.send_control(reply_on, ControlMessage::SpliceComplete(self.address.clone()))
            .await;
    }

    fn splice_outstanding(&self) -> bool {
        self.pending.is_some() || matches!(self.state, MembershipState::Inserting { .. })
    }

    /// The joiner gets a relay hop to hear from us and a control dial to
    /// reach us.
    fn arm_splice_deadline(&mut self) {
        let allowance = self.timeouts.control() + self.timeouts.relay();
        self.splice_deadline = Some(Instant::now() + allowance);
    }

    /// The joiner never completed its splice: forget it and take joins again.
    async fn abandon_splice(&mut self) {
        self.splice_deadline = None;

        if let MembershipState::Inserting { candidate } = &self.state {
            let candidate = candidate.clone();
            tracing::warn!(%candidate, "splice timed out, candidate never dialed back");
            self.awaited.remove(&candidate);
            if matches!(self.left, Slot::Own) {
                // We were alone before it came; drop its half of the ring.
                self.set_slot(Direction::Right, Slot::Own).await;
            } else {
                self.state = MembershipState::Joined;
            }
        }

        if let Some(candidate) = self.pending.take() {
            tracing::warn!(peer = %candidate.address(), "splice timed out, dropping parked candidate");
            candidate.close().await;
        }
    }

    /// Our right neighbor left; connect to the one behind it.
    async fn attach_right(&mut self, next: PeerAddress) {
        let sender = self.sender_id();
        let greeting = Greeting::new(sender, ControlMessage::RepointLeft(self.address.clone()));
        match link::dial(&next, self.timeouts.control(), &greeting).await {
            Ok(stream) => {
                let link = self.adopt(next.clone(), stream);
                self.set_slot(Direction::Right, Slot::Live(link)).await;
                tracing::info!(peer = %next, "repointed right neighbor");
            }
            Err(e) => self.close_slot(Direction::Right, e).await,
        }
    }

    /// Announce departure and stitch our neighbors together.
    async fn leave(&mut self) {
        let Some(id) = self.id else {
            return;
        };
        tracing::info!(%id, "leaving ring");
        if let Err(e) = self.broadcast(Command::Disconnected, &id.to_string()).await {
            tracing::warn!(error = %e, "failed to frame departure notice");
        }

        let left = self.left.peer().cloned();
        let right = self.right.peer().cloned();
        if let (Some(left), Some(right)) = (left, right) {
            self.send_control(Direction::Left, ControlMessage::RepointRight(right))
                .await;
            self.send_control(Direction::Right, ControlMessage::RepointLeft(left))
                .await;
        }
        self.close_all().await;
    }

    // ── Sending ───────────────────────────────────────────────────────────────

    fn sender_id(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    /// Originate a frame toward both neighbors.
    async fn broadcast(&mut self, command: Command, payload: &str) -> Result<(), FramingError> {
        let sender = self.sender_id();
        let raw = self.relay.on_local_send(command, &sender, payload)?;
        self.send_to(Direction::Left, &raw).await;
        self.send_to(Direction::Right, &raw).await;
        Ok(())
    }

    /// Originate a frame toward one neighbor.
    async fn send_local(
        &mut self,
        to: Direction,
        command: Command,
        payload: &str,
    ) -> Result<(), FramingError> {
        let sender = self.sender_id();
        let raw = self.relay.on_local_send(command, &sender, payload)?;
        self.send_to(to, &raw).await;
        Ok(())
    }

    async fn send_control(&mut self, to: Direction, message: ControlMessage) {
        if let Err(e) = self
            .send_local(to, Command::NewConnection, &message.to_string())
            .await
        {
            tracing::warn!(%message, error = %e, "failed to frame control message");
        }
    }

    /// Write to a neighbor. A self or closed slot swallows the frame; a
    /// failed write closes the slot.
    async fn send_to(&mut self, to: Direction, raw: &[u8]) {
        let after = self.timeouts.relay();
        let result = match self.slot_mut(to) {
            Slot::Live(link) => link.send(raw, after).await,
            Slot::Own | Slot::Closed => return,
        };
        if let Err(e) = result {
            self.close_slot(to, e).await;
        }
    }

    /// Returns whether the candidate got the frame.
    async fn send_to_candidate(&mut self, raw: &[u8]) -> bool {
        let after = self.timeouts.relay();
        let Some(candidate) = self.pending.as_mut() else {
            return false;
        };
        match candidate.send(raw, after).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(peer = %candidate.address(), error = %e, "splice candidate unreachable");
                if let Some(candidate) = self.pending.take() {
                    candidate.close().await;
                }
                false
            }
        }
    }

    // ── Slots ─────────────────────────────────────────────────────────────────

    fn adopt(&mut self, address: PeerAddress, stream: TcpStream) -> NeighborLink {
        self.next_link += 1;
        NeighborLink::spawn(
            self.next_link,
            address,
            stream,
            self.link_tx.clone(),
            self.timeouts.relay(),
        )
    }

    fn slot_mut(&mut self, direction: Direction) -> &mut Slot {
        match direction {
            Direction::Left => &mut self.left,
            Direction::Right => &mut self.right,
        }
    }

    fn direction_of(&self, link: LinkId) -> Option<Direction> {
        if self.left.link_id() == Some(link) {
            Some(Direction::Left)
        } else if self.right.link_id() == Some(link) {
            Some(Direction::Right)
        } else {
            None
        }
    }

    fn is_pending(&self, link: LinkId) -> bool {
        self.pending.as_ref().map(NeighborLink::id) == Some(link)
    }

    /// Put `slot` in place, closing whatever link it replaces.
    async fn set_slot(&mut self, direction: Direction, slot: Slot) {
        let old = std::mem::replace(self.slot_mut(direction), slot);
        if let Slot::Live(link) = old {
            link.close().await;
        }
        if matches!((&self.left, &self.right), (Slot::Own, Slot::Own))
            && self.state != MembershipState::Solo
        {
            tracing::info!("ring is down to this node");
            self.state = MembershipState::Solo;
        }
    }

    /// A link failed: mark the slot closed and tell the user.
    async fn close_slot(&mut self, direction: Direction, reason: ConnectionError) {
        let old = std::mem::replace(self.slot_mut(direction), Slot::Closed);
        if let Slot::Live(link) = old {
            tracing::warn!(?direction, peer = %link.address(), error = %reason, "neighbor link closed");
            self.emit(ChatEvent::LinkClosed {
                direction,
                peer: link.address().clone(),
                reason: reason.to_string(),
            });
            link.close().await;
        }
    }

    /// Both neighbors may be the same peer on two links; send every FIN
    /// before waiting on any of them.
    async fn close_all(&mut self) {
        let mut links = Vec::new();
        for direction in [Direction::Left, Direction::Right] {
            if let Slot::Live(link) = std::mem::replace(self.slot_mut(direction), Slot::Closed) {
                links.push(link);
            }
        }
        links.extend(self.pending.take());

        for link in links.iter_mut() {
            link.shutdown().await;
        }
        for link in links {
            link.close().await;
        }
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.chat_tx.send(event);
    }
}
