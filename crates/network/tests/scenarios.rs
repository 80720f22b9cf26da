//! End-to-end dispatch and broadcast scenarios

use bytes::Bytes;
use mapgate_core::{
    BattlegroundId, ConnectionId, GuildId, MapGateError, MapId, PacketVersion, PartyId, TilePosition, UnitId,
    UnitKind,
};
use mapgate_game::{PlayerState, Scope, Unit, World};
use mapgate_network::{
    BroadcastRouter, DispatchTarget, Dispatcher, HandlerContext, HandlerFunction, ParseReport, ParseStop,
    RouterConfig, Session, SessionRegistry,
};
use mapgate_protocol::{
    Frame, FrameLength, OpcodeCipher, Packet, PacketAction, PacketKeys, PacketTable, PacketWriter,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const FRAME_OPCODE: u16 = 0x0100;
const HANDSHAKE: u16 = 0x0072;
const READY: u16 = 0x007d;
const WALK: u16 = 0x0085;
const FAILING: u16 = 0x0120;
const DEBUG: u16 = 0x0200;

fn handler<F>(f: F) -> HandlerFunction
where
    F: Fn(&mut HandlerContext<'_>, &Frame<'_>) -> mapgate_core::Result<()> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct Harness {
    sessions: SessionRegistry,
    world: World,
    router: BroadcastRouter,
    dispatcher: Dispatcher,
    calls: Arc<AtomicUsize>,
    last_len: Arc<AtomicUsize>,
}

impl Harness {
    fn new() -> Self {
        Self::with_router(RouterConfig::default())
    }

    fn with_router(config: RouterConfig) -> Self {
        let calls = Arc::new(AtomicUsize::new(0));
        let last_len = Arc::new(AtomicUsize::new(0));

        let counting: HandlerFunction = {
            let calls = calls.clone();
            let last_len = last_len.clone();
            handler(move |_ctx, frame| {
                calls.fetch_add(1, Ordering::SeqCst);
                last_len.store(frame.len(), Ordering::SeqCst);
                Ok(())
            })
        };
        let handshake: HandlerFunction = {
            let calls = calls.clone();
            handler(move |ctx, frame| {
                calls.fetch_add(1, Ordering::SeqCst);
                let char_id = frame.field_i32(1)?;
                ctx.session_mut()?.attach_player(UnitId::new(char_id));
                Ok(())
            })
        };
        let ready: HandlerFunction = {
            let calls = calls.clone();
            handler(move |ctx, _frame| {
                calls.fetch_add(1, Ordering::SeqCst);
                ctx.session_mut()?.enter_world();
                Ok(())
            })
        };
        let failing = handler(|_ctx, _frame| Err(MapGateError::InvalidData("rejected".to_string())));

        let mut table: PacketTable<HandlerFunction> = PacketTable::new();
        table.register(FRAME_OPCODE, FrameLength::Variable, PacketAction::GlobalMessage, Some(counting.clone()), &[2, 4]).unwrap();
        table.register(HANDSHAKE, FrameLength::Fixed(19), PacketAction::WantToConnection, Some(handshake), &[2, 6, 10, 14, 18]).unwrap();
        table.register(READY, FrameLength::Fixed(2), PacketAction::LoadEndAck, Some(ready), &[]).unwrap();
        table.register(WALK, FrameLength::Fixed(5), PacketAction::WalkToXY, Some(counting.clone()), &[2]).unwrap();
        table.register(FAILING, FrameLength::Fixed(4), PacketAction::ActionRequest, Some(failing), &[2]).unwrap();
        table.register(DEBUG, FrameLength::Fixed(4), PacketAction::Debug, Some(counting), &[]).unwrap();

        Self {
            sessions: SessionRegistry::new(),
            world: World::new(),
            router: BroadcastRouter::new(config),
            dispatcher: Dispatcher::new(Arc::new(table)),
            calls,
            last_len,
        }
    }

    fn connect(&mut self, id: u32, keys: Option<PacketKeys>) -> ConnectionId {
        let conn = ConnectionId::new(id);
        self.sessions.insert(Session::new(conn, PacketVersion::DEFAULT, keys));
        conn
    }

    /// Connected session already attached to a player that entered the world
    fn player(&mut self, id: i32, map: u16, x: i16, y: i16) -> UnitId {
        let conn = self.connect(id as u32, None);
        let uid = UnitId::new(id);
        let session = self.sessions.get_mut(conn).unwrap();
        session.attach_player(uid);
        session.enter_world();
        let state = PlayerState::new(conn, format!("p{}", id));
        self.world.spawn(Unit::player(uid, state, MapId::new(map), TilePosition::new(x, y))).unwrap();
        uid
    }

    fn feed(&mut self, conn: ConnectionId, bytes: &[u8]) {
        self.sessions.get_mut(conn).unwrap().receive(bytes);
    }

    fn parse(&mut self, conn: ConnectionId) -> ParseReport {
        let mut target = DispatchTarget {
            sessions: &mut self.sessions,
            world: &mut self.world,
            router: &self.router,
            tick: 0,
        };
        self.dispatcher.parse(conn, &mut target)
    }

    fn available(&self, conn: ConnectionId) -> usize {
        self.sessions.get(conn).unwrap().buffer.bytes_available()
    }

    fn recipients(&self, anchor: UnitId, scope: Scope) -> Vec<ConnectionId> {
        let mut got = self.router.recipients(&self.sessions, &self.world, anchor, scope);
        got.sort();
        got
    }

    fn send(&mut self, packet: &Packet, anchor: UnitId, scope: Scope) -> usize {
        self.router.send(&mut self.sessions, &self.world, packet, anchor, scope)
    }

    fn outbound(&self, id: i32) -> Bytes {
        Bytes::copy_from_slice(self.sessions.get(conn(id)).unwrap().buffer.outbound())
    }
}

fn conn(id: i32) -> ConnectionId {
    ConnectionId::new(id as u32)
}

fn conns(ids: &[i32]) -> Vec<ConnectionId> {
    ids.iter().map(|&id| conn(id)).collect()
}

fn handshake_frame(char_id: i32) -> Vec<u8> {
    let mut frame = vec![0x72, 0x00];
    frame.extend_from_slice(&2_000_000u32.to_le_bytes());
    frame.extend_from_slice(&char_id.to_le_bytes());
    frame.extend_from_slice(&[0; 8]);
    frame.push(1);
    assert_eq!(frame.len(), 19);
    frame
}

fn identity_packet(id: UnitId) -> Packet {
    let mut w = PacketWriter::variable(0x008d);
    w.write_unit_id(id).unwrap();
    w.write_cstr("hello").unwrap();
    w.finish().unwrap()
}

//=== Descriptor table ===//

#[test]
fn test_last_registration_wins() {
    let mut table: PacketTable<u8> = PacketTable::new();
    table.register(0x0360, FrameLength::Fixed(6), PacketAction::TickSend, Some(1), &[2]).unwrap();
    table.register(0x0360, FrameLength::Fixed(6), PacketAction::ReqClickBuyingStore, Some(2), &[2]).unwrap();
    assert_eq!(table.lookup(0x0360).unwrap().handler, Some(2));
}

//=== Dispatch loop ===//

#[test]
fn test_variable_frame_consumed_in_one_cycle() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    h.feed(conn(1), &[0x00, 0x01, 0x06, 0x00, 0xAA, 0xBB]);
    let report = h.parse(conn(1));

    assert_eq!(report.frames, 1);
    assert_eq!(report.stop, ParseStop::Suspended);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert_eq!(h.last_len.load(Ordering::SeqCst), 6);
    assert_eq!(h.available(conn(1)), 0);
}

#[test]
fn test_fixed_frame_consumes_declared_length() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    // one walk frame plus the first byte of the next
    h.feed(conn(1), &[0x85, 0x00, 0x01, 0x02, 0x03, 0x85]);
    let report = h.parse(conn(1));

    assert_eq!(report.frames, 1);
    assert_eq!(h.last_len.load(Ordering::SeqCst), 5);
    assert_eq!(h.available(conn(1)), 1);
}

#[test]
fn test_truncated_frame_is_idempotent() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    h.feed(conn(1), &[0x00, 0x01, 0x08, 0x00, 0xAA]);
    for _ in 0..3 {
        let report = h.parse(conn(1));
        assert_eq!(report.frames, 0);
        assert_eq!(report.stop, ParseStop::Suspended);
        assert_eq!(h.available(conn(1)), 5);
    }

    h.feed(conn(1), &[0xBB, 0xCC, 0xDD]);
    assert_eq!(h.parse(conn(1)).frames, 1);
    assert_eq!(h.last_len.load(Ordering::SeqCst), 8);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_short_variable_header_suspends() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    h.feed(conn(1), &[0x00, 0x01, 0x06]);
    let report = h.parse(conn(1));
    assert_eq!(report.stop, ParseStop::Suspended);
    assert_eq!(h.available(conn(1)), 3);
}

#[test]
fn test_unknown_opcode_terminates_without_consuming() {
    let mut h = Harness::new();
    let c = h.connect(1, None);

    h.feed(c, &[0xFF, 0xFF, 0x01, 0x02]);
    let report = h.parse(c);

    assert_eq!(report.stop, ParseStop::Closed);
    assert_eq!(report.frames, 0);
    assert_eq!(h.available(c), 4);
    assert!(!h.sessions.get(c).unwrap().is_active());
}

#[test]
fn test_bad_variable_length_terminates() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    h.feed(conn(1), &[0x00, 0x01, 0x02, 0x00, 0xAA, 0xBB]);
    assert_eq!(h.parse(conn(1)).stop, ParseStop::Closed);
    assert_eq!(h.available(conn(1)), 6);

    let mut h = Harness::new();
    h.player(1, 1, 0, 0);
    h.feed(conn(1), &[0x00, 0x01, 0x01, 0x80]);
    assert_eq!(h.parse(conn(1)).stop, ParseStop::Closed);
}

#[test]
fn test_premature_frames_ignored_but_consumed() {
    let mut h = Harness::new();
    let c = h.connect(1, None);

    // before the handshake: ready and walk are dropped
    h.feed(c, &[0x7d, 0x00]);
    h.feed(c, &[0x85, 0x00, 0x01, 0x02, 0x03]);
    let report = h.parse(c);
    assert_eq!(report.frames, 2);
    assert_eq!(report.ignored, 2);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    assert_eq!(h.available(c), 0);

    // handshake attaches the player
    h.feed(c, &handshake_frame(150001));
    h.parse(c);
    assert_eq!(h.sessions.get(c).unwrap().player, Some(UnitId::new(150001)));
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);

    // loading: walk is dropped, ready runs
    h.feed(c, &[0x85, 0x00, 0x01, 0x02, 0x03]);
    h.feed(c, &[0x7d, 0x00]);
    let report = h.parse(c);
    assert_eq!(report.frames, 2);
    assert_eq!(report.ignored, 1);
    assert!(h.sessions.get(c).unwrap().is_in_world());

    // in world: walk runs
    h.feed(c, &[0x85, 0x00, 0x01, 0x02, 0x03]);
    let report = h.parse(c);
    assert_eq!(report.ignored, 0);
    assert_eq!(h.calls.load(Ordering::SeqCst), 3);
}

#[test]
fn test_frames_per_cycle_bounded() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    for _ in 0..5 {
        h.feed(conn(1), &[0x85, 0x00, 0x01, 0x02, 0x03]);
    }

    let first = h.parse(conn(1));
    assert_eq!(first.frames, 3);
    assert_eq!(first.stop, ParseStop::Budget);
    assert_eq!(h.available(conn(1)), 10);

    let second = h.parse(conn(1));
    assert_eq!(second.frames, 2);
    assert_eq!(second.stop, ParseStop::Suspended);
}

#[test]
fn test_handler_error_keeps_connection() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);

    h.feed(conn(1), &[0x20, 0x01, 0x00, 0x00]);
    h.feed(conn(1), &[0x85, 0x00, 0x01, 0x02, 0x03]);
    let report = h.parse(conn(1));

    assert_eq!(report.frames, 2);
    assert!(h.sessions.get(conn(1)).unwrap().is_active());
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_debug_frame_dumped_not_handled() {
    let mut h = Harness::new();
    let c = h.connect(1, None);

    h.feed(c, &[0x00, 0x02, 0xDE, 0xAD]);
    let report = h.parse(c);
    assert_eq!(report.frames, 1);
    assert_eq!(report.ignored, 1);
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[test]
fn test_eof_session_not_read() {
    let mut h = Harness::new();
    h.player(1, 1, 0, 0);
    h.feed(conn(1), &[0x85, 0x00, 0x01, 0x02, 0x03]);
    h.sessions.get_mut(conn(1)).unwrap().close();

    let report = h.parse(conn(1));
    assert_eq!(report.stop, ParseStop::Closed);
    assert_eq!(h.available(conn(1)), 5);
}

#[test]
fn test_cipher_advances_only_on_consumed_frames() {
    let keys = PacketKeys::new(0x631C_511C, 0x111C_111C, 0x111C_111C);
    let mut h = Harness::new();
    let c = h.connect(1, Some(keys));
    let mut client = OpcodeCipher::new(keys);

    let start_key = h.sessions.get(c).unwrap().cipher.as_ref().unwrap().current_key();

    // truncated handshake: decoded but not consumed, key unchanged
    let mut frame = handshake_frame(150001);
    frame[..2].copy_from_slice(&client.encode(HANDSHAKE).to_le_bytes());
    h.feed(c, &frame[..10]);
    assert_eq!(h.parse(c).stop, ParseStop::Suspended);
    assert_eq!(h.sessions.get(c).unwrap().cipher.as_ref().unwrap().current_key(), start_key);

    h.feed(c, &frame[10..]);
    assert_eq!(h.parse(c).frames, 1);
    assert!(h.sessions.get(c).unwrap().is_authenticated());
    client.advance();
    assert_eq!(h.sessions.get(c).unwrap().cipher.as_ref().unwrap().current_key(), client.current_key());

    // next frame must use the stepped key
    h.feed(c, &client.encode(READY).to_le_bytes());
    assert_eq!(h.parse(c).frames, 1);
    assert!(h.sessions.get(c).unwrap().is_in_world());
}

#[test]
fn test_unobfuscated_opcode_rejected_when_keys_active() {
    let keys = PacketKeys::new(0x631C_511C, 0x111C_111C, 0x111C_111C);
    let mut h = Harness::new();
    let c = h.connect(1, Some(keys));

    // the raw handshake opcode decodes to something else
    let decoded = OpcodeCipher::new(keys).decode(HANDSHAKE);
    assert_ne!(decoded, HANDSHAKE);
    h.feed(c, &handshake_frame(150001));
    h.parse(c);
    assert!(!h.sessions.get(c).unwrap().is_authenticated());
}

//=== Broadcast router ===//

#[test]
fn test_area_scope_across_two_maps() {
    let mut h = Harness::new();
    let anchor = h.player(1, 1, 100, 100);
    h.player(2, 1, 101, 100);
    h.player(3, 1, 105, 105);
    h.player(4, 1, 114, 86);
    h.player(5, 1, 115, 100);
    h.player(6, 2, 100, 100);
    h.player(7, 2, 101, 100);

    let mut previous: Vec<ConnectionId> = Vec::new();
    for radius in [0u16, 1, 5, 14, 20] {
        let got = h.recipients(anchor, Scope::area(radius, mapgate_game::AreaFilter::Everyone));
        assert!(previous.iter().all(|c| got.contains(c)), "radius {} lost a recipient", radius);
        assert!(!got.contains(&conn(6)) && !got.contains(&conn(7)));
        previous = got;
    }

    assert_eq!(h.recipients(anchor, Scope::AREA), conns(&[1, 2, 3, 4]));
    assert_eq!(h.send(&identity_packet(anchor), anchor, Scope::AREA), 4);
    assert!(h.outbound(6).is_empty());
}

#[test]
fn test_area_without_self_excludes_anchor() {
    let mut h = Harness::new();
    let anchor = h.player(1, 1, 50, 50);
    h.player(2, 1, 52, 50);

    assert_eq!(h.recipients(anchor, Scope::AREA_WITHOUT_SELF), conns(&[2]));
    assert_eq!(h.send(&identity_packet(anchor), anchor, Scope::AREA_WITHOUT_SELF), 1);
    assert!(h.outbound(1).is_empty());
}

#[test]
fn test_chat_area_uses_reduced_radius() {
    let mut h = Harness::new();
    let anchor = h.player(1, 1, 50, 50);
    h.player(2, 1, 59, 50);
    h.player(3, 1, 60, 50);
    let seated = h.player(4, 1, 51, 50);
    let chat = h.world.open_chat(seated, "shop", 5).unwrap();
    assert!(h.world.chat(chat).is_some());

    assert_eq!(h.recipients(anchor, Scope::AREA_CHAT_WITHOUT_CHATTING), conns(&[2]));
    assert_eq!(h.recipients(anchor, Scope::AREA_WITHOUT_CHATTING), conns(&[2, 3]));
}

#[test]
fn test_disguise_adds_one_self_copy() {
    let mut h = Harness::new();
    let anchor = h.player(1, 1, 10, 10);
    h.player(2, 1, 12, 10);
    h.world.set_disguise(anchor, Some(1002)).unwrap();

    let packet = identity_packet(anchor);
    assert_eq!(h.send(&packet, anchor, Scope::AREA), 3);

    let own = h.outbound(1);
    assert_eq!(own.len(), packet.len() * 2);
    assert_eq!(&own[..packet.len()], &packet.as_bytes()[..]);
    let copy = &own[packet.len()..];
    assert_eq!(&copy[4..8], &anchor.disguised().get().to_le_bytes());

    assert_eq!(&h.outbound(2)[..], &packet.as_bytes()[..]);

    // non-area scopes do not duplicate
    let mut h2 = Harness::new();
    let a = h2.player(1, 1, 10, 10);
    h2.world.set_disguise(a, Some(1002)).unwrap();
    assert_eq!(h2.send(&identity_packet(a), a, Scope::SelfOnly), 1);
}

#[test]
fn test_party_with_spy() {
    let mut h = Harness::with_router(RouterConfig { area_size: 14, enable_spy: true });
    let party = PartyId::new(10);
    let a = h.player(1, 1, 0, 0);
    let b = h.player(2, 1, 0, 0);
    let c = h.player(3, 2, 0, 0);
    h.player(4, 3, 0, 0);
    for id in [a, b, c] {
        h.world.join_party(id, party).unwrap();
    }
    h.sessions.get_mut(conn(4)).unwrap().party_spy = Some(party);

    assert_eq!(h.send(&identity_packet(a), a, Scope::PARTY), 4);
    assert_eq!(h.recipients(a, Scope::PARTY_SAME_MAP_WITHOUT_SELF), conns(&[2, 4]));

    // spying off: members only
    let mut quiet = Harness::new();
    let a = quiet.player(1, 1, 0, 0);
    quiet.player(4, 1, 0, 0);
    quiet.world.join_party(a, party).unwrap();
    quiet.sessions.get_mut(conn(4)).unwrap().party_spy = Some(party);
    assert_eq!(quiet.send(&identity_packet(a), a, Scope::PARTY), 1);
}

#[test]
fn test_spy_member_receives_twice() {
    let mut h = Harness::with_router(RouterConfig { area_size: 14, enable_spy: true });
    let guild = GuildId::new(5);
    let a = h.player(1, 1, 0, 0);
    let b = h.player(2, 1, 0, 0);
    h.world.join_guild(a, guild).unwrap();
    h.world.join_guild(b, guild).unwrap();
    h.sessions.get_mut(conn(2)).unwrap().guild_spy = Some(guild);

    assert_eq!(h.send(&identity_packet(a), a, Scope::GUILD), 3);
}

#[test]
fn test_guild_excluding_battleground() {
    let mut h = Harness::new();
    let guild = GuildId::new(1);
    let members: Vec<UnitId> = (1..=5).map(|id| h.player(id, 1, 0, 0)).collect();
    for &id in &members {
        h.world.join_guild(id, guild).unwrap();
    }
    h.world.join_battleground(members[3], BattlegroundId::new(1)).unwrap();
    h.world.join_battleground(members[4], BattlegroundId::new(1)).unwrap();

    assert_eq!(h.send(&identity_packet(members[0]), members[0], Scope::GuildNoBattleground), 3);
    assert_eq!(h.recipients(members[0], Scope::GUILD).len(), 5);
}

#[test]
fn test_hidden_anchor_suppressed() {
    let mut h = Harness::new();
    let anchor = h.player(1, 1, 0, 0);
    h.player(2, 1, 1, 0);
    let seer = h.player(3, 1, 2, 0);
    h.world.set_sees_hidden(seer, true).unwrap();
    h.world.set_hidden(anchor, true).unwrap();

    assert_eq!(h.recipients(anchor, Scope::AREA), conns(&[1, 3]));
    assert_eq!(h.recipients(anchor, Scope::AREA_WITHOUT_SELF), conns(&[3]));
    // group scopes are unaffected
    h.world.join_party(anchor, PartyId::new(1)).unwrap();
    h.world.join_party(UnitId::new(2), PartyId::new(1)).unwrap();
    assert_eq!(h.recipients(anchor, Scope::PARTY), conns(&[1, 2]));
}

#[test]
fn test_chat_room_scopes() {
    let mut h = Harness::new();
    let a = h.player(1, 1, 0, 0);
    let b = h.player(2, 1, 0, 0);
    h.player(3, 1, 0, 0);
    let chat = h.world.open_chat(a, "room", 5).unwrap();
    h.world.join_chat(b, chat).unwrap();

    assert_eq!(h.recipients(a, Scope::CHAT), conns(&[1, 2]));
    assert_eq!(h.recipients(a, Scope::CHAT_WITHOUT_SELF), conns(&[2]));
    assert_eq!(h.recipients(b, Scope::CHAT_WITHOUT_SELF), conns(&[1]));

    let npc = UnitId::new(110000000);
    h.world.spawn(Unit::new(npc, UnitKind::Npc, MapId::new(1), TilePosition::new(0, 0))).unwrap();
    let waiting = h.world.open_chat(npc, "waiting", 10).unwrap();
    h.world.join_chat(UnitId::new(3), waiting).unwrap();
    assert_eq!(h.recipients(npc, Scope::CHAT), conns(&[3]));
}

#[test]
fn test_without_same_chat_for_npc_anchor() {
    let mut h = Harness::new();
    let npc = UnitId::new(110000000);
    h.world.spawn(Unit::new(npc, UnitKind::Npc, MapId::new(1), TilePosition::new(10, 10))).unwrap();
    let seated = h.player(1, 1, 11, 10);
    h.player(2, 1, 12, 10);
    let other = h.player(3, 1, 13, 10);

    let waiting = h.world.open_chat(npc, "waiting", 10).unwrap();
    h.world.join_chat(seated, waiting).unwrap();
    h.world.open_chat(other, "mine", 2).unwrap();

    assert_eq!(h.recipients(npc, Scope::AREA_WITHOUT_SAME_CHAT), conns(&[2, 3]));
}
