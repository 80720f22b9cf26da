//! Game handlers bundled with the zone binary
//!
//! Each handler reads its frame through the declared field offsets, updates
//! the world and hands the resulting packets to the router. None of them
//! touch buffers directly.

use mapgate_core::{MapGateError, MapId, Result, TilePosition, UnitId};
use mapgate_game::{PlayerState, Scope, Unit};
use mapgate_network::{HandlerContext, HandlerRegistry};
use mapgate_protocol::encoders;
use mapgate_protocol::{Frame, PacketAction};

/// Where freshly connected characters appear
#[derive(Debug, Clone, Copy)]
pub struct SpawnPoint {
    pub map: MapId,
    pub pos: TilePosition,
}

/// Register every bundled handler
pub fn register_all(registry: &mut HandlerRegistry, spawn: SpawnPoint) {
    registry.register_function(PacketAction::WantToConnection, move |ctx, frame| {
        handle_want_to_connection(ctx, frame, spawn)
    });
    registry.register_function(PacketAction::LoadEndAck, handle_load_end_ack);
    registry.register_function(PacketAction::TickSend, handle_tick_send);
    registry.register_function(PacketAction::WalkToXY, handle_walk_to_xy);
    registry.register_function(PacketAction::ChangeDir, handle_change_dir);
    registry.register_function(PacketAction::GlobalMessage, handle_global_message);
    registry.register_function(PacketAction::PartyMessage, handle_party_message);
    registry.register_function(PacketAction::GuildMessage, handle_guild_message);
    registry.register_function(PacketAction::ChatLeave, handle_chat_leave);
    registry.register_function(PacketAction::QuitGame, handle_quit_game);

    tracing::info!("Registered {} packet handlers", registry.handler_count());
}

/// Map-server login
///
/// # Fields
/// account id, character id, login id, client tick, sex
fn handle_want_to_connection(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>, spawn: SpawnPoint) -> Result<()> {
    if ctx.session()?.is_authenticated() {
        tracing::warn!("Session {}: repeated login ignored", ctx.conn);
        return Ok(());
    }

    let account_id = frame.field_u32(0)?;
    let char_id = frame.field_i32(1)?;
    if char_id <= 0 {
        return Err(MapGateError::InvalidData(format!("character id {}", char_id)));
    }

    let unit = UnitId::new(char_id);
    let state = PlayerState::new(ctx.conn, format!("char{}", char_id));
    ctx.world.spawn(Unit::player(unit, state, spawn.map, spawn.pos))?;
    ctx.session_mut()?.attach_player(unit);

    tracing::info!("Session {}: account {} logged in as {} on map {}", ctx.conn, account_id, unit, spawn.map);

    let packet = encoders::accept_enter(ctx.version(), ctx.current_tick(), spawn.pos, 0)?;
    ctx.reply(&packet)
}

fn handle_load_end_ack(ctx: &mut HandlerContext<'_>, _frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    ctx.session_mut()?.enter_world();
    tracing::debug!("Session {}: {} finished loading", ctx.conn, unit);
    Ok(())
}

fn handle_tick_send(ctx: &mut HandlerContext<'_>, _frame: &Frame<'_>) -> Result<()> {
    let packet = encoders::notify_time(ctx.current_tick())?;
    ctx.reply(&packet)
}

fn handle_walk_to_xy(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    let (x, y, _) = frame.field_position(0)?;
    let to = TilePosition::new(x, y);

    let from = ctx.world.move_unit(unit, to)?;
    let packet = encoders::notify_move(unit, from, to, ctx.current_tick())?;
    ctx.send_to_scope(&packet, unit, Scope::AREA);
    Ok(())
}

fn handle_change_dir(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    let head = frame.field_u16(0)?;
    let dir = frame.field_u8(1)? & 0x07;

    ctx.world.set_direction(unit, dir)?;
    let packet = encoders::change_direction(unit, head, dir)?;
    ctx.send_to_scope(&packet, unit, Scope::AREA_WITHOUT_SELF);
    Ok(())
}

/// Public chat; seated players talk to their room instead
fn handle_global_message(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    let text = frame.field_string(1)?;
    if text.is_empty() {
        return Ok(());
    }

    let seated = ctx.world.unit(unit).and_then(|u| u.chat).is_some();
    let packet = encoders::notify_chat(unit, &text)?;
    if seated {
        ctx.send_to_scope(&packet, unit, Scope::CHAT_WITHOUT_SELF);
    } else {
        ctx.send_to_scope(&packet, unit, Scope::AREA_CHAT_WITHOUT_CHATTING);
    }

    let echo = encoders::notify_playerchat(&text)?;
    ctx.reply(&echo)
}

fn handle_party_message(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    if ctx.world.unit(unit).and_then(|u| u.party()).is_none() {
        return Ok(());
    }

    let text = frame.field_string(1)?;
    let packet = encoders::party_chat(unit, &text)?;
    ctx.send_to_scope(&packet, unit, Scope::PARTY);
    Ok(())
}

fn handle_guild_message(ctx: &mut HandlerContext<'_>, frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    if ctx.world.unit(unit).and_then(|u| u.guild()).is_none() {
        return Ok(());
    }

    let text = frame.field_string(1)?;
    let packet = encoders::guild_chat(&text)?;
    ctx.send_to_scope(&packet, unit, Scope::GuildNoBattleground);
    Ok(())
}

fn handle_chat_leave(ctx: &mut HandlerContext<'_>, _frame: &Frame<'_>) -> Result<()> {
    let unit = ctx.player()?;
    let name = ctx.world.unit(unit).map(|u| u.name().to_string()).unwrap_or_default();

    let Some((chat, remaining)) = ctx.world.leave_chat(unit) else {
        return Ok(());
    };

    let packet = encoders::chat_member_exit(remaining as u16, &name, false)?;
    ctx.reply(&packet)?;
    ctx.router.send_to_room(ctx.sessions, ctx.world, &packet, chat, None);
    Ok(())
}

fn handle_quit_game(ctx: &mut HandlerContext<'_>, _frame: &Frame<'_>) -> Result<()> {
    tracing::info!("Session {}: quit requested", ctx.conn);
    ctx.close();
    Ok(())
}
