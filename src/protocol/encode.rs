//! Capability-conditioned command encoder.
//!
//! [`encode`] turns a [`ClientCommand`] into its wire bytes under one
//! [`FeatureSet`]; field widths and optional fields follow the negotiated
//! capabilities, never raw version numbers. [`encode_login`] builds the
//! login packet separately because its RSA-sealed regions need a cipher and
//! fresh key material.

use bytes::Bytes;
use rand::Rng;

use crate::core::packet::PacketWriter;
use crate::error::{ProtocolError, Result};
use crate::features::{FeatureSet, GameFeature};
use crate::protocol::command::ClientCommand;
use crate::protocol::opcodes;
use crate::protocol::types::{Credentials, Direction, HostIdentifiers};
use crate::transport::RsaCipher;

/// Hard limit on talk text, in bytes. Longer messages are rejected locally.
pub const MAX_TALK_LENGTH: usize = 255;

/// Store product type whose purchase carries a name payload.
const PRODUCT_TYPE_NAME_CHANGE: u8 = 1;

/// Username and CPU name are clamped to this many bytes in the host
/// identifiers region.
const MAX_IDENTIFIER_LENGTH: usize = 20;

/// At most this many MAC-like identifiers are sent.
const MAX_MAC_COUNT: usize = 4;

fn put_count(writer: &mut PacketWriter, features: &FeatureSet, count: u16) {
    if features.has(GameFeature::WIDE_COUNT) {
        writer.put_u16(count);
    } else {
        writer.put_u8(count as u8);
    }
}

fn put_walk_direction(writer: &mut PacketWriter, direction: Direction) {
    writer.put_u8(direction.wire_byte());
}

fn walk_opcode(direction: Direction) -> Result<u8> {
    Ok(match direction {
        Direction::North => opcodes::WALK_NORTH,
        Direction::East => opcodes::WALK_EAST,
        Direction::South => opcodes::WALK_SOUTH,
        Direction::West => opcodes::WALK_WEST,
        Direction::NorthEast => opcodes::WALK_NORTH_EAST,
        Direction::SouthEast => opcodes::WALK_SOUTH_EAST,
        Direction::SouthWest => opcodes::WALK_SOUTH_WEST,
        Direction::NorthWest => opcodes::WALK_NORTH_WEST,
        Direction::Invalid => {
            return Err(ProtocolError::ProtocolLimit(
                "cannot walk in an invalid direction".into(),
            ))
        }
    })
}

fn turn_opcode(direction: Direction) -> Result<u8> {
    Ok(match direction {
        Direction::North => opcodes::TURN_NORTH,
        Direction::East => opcodes::TURN_EAST,
        Direction::South => opcodes::TURN_SOUTH,
        Direction::West => opcodes::TURN_WEST,
        _ => {
            return Err(ProtocolError::ProtocolLimit(
                "turns must be cardinal".into(),
            ))
        }
    })
}

/// Encode one outbound command under the negotiated capability set.
pub fn encode(command: &ClientCommand, features: &FeatureSet) -> Result<Bytes> {
    let mut w = PacketWriter::new();
    match command {
        ClientCommand::EnterGame => w.put_u8(opcodes::ENTER_GAME),
        ClientCommand::LeaveGame => w.put_u8(opcodes::LEAVE_GAME),
        ClientCommand::Ping => w.put_u8(opcodes::PING),
        ClientCommand::PingBack => w.put_u8(opcodes::PING_BACK),
        ClientCommand::NewPing {
            ping_id,
            local_ping,
            frame_rate,
        } => {
            w.put_u8(opcodes::NEW_PING);
            w.put_u32(*ping_id);
            w.put_u16(*local_ping);
            w.put_u16(*frame_rate);
        }
        ClientCommand::ExtendedOpcode { opcode, buffer } => {
            w.put_u8(opcodes::EXTENDED_OPCODE);
            w.put_u8(*opcode);
            w.put_string(buffer);
        }
        ClientCommand::ChangeMapAwareRange { x_range, y_range } => {
            w.put_u8(opcodes::CHANGE_MAP_AWARE_RANGE);
            w.put_u8(*x_range);
            w.put_u8(*y_range);
        }

        ClientCommand::AutoWalk { path } => {
            if path.len() > u8::MAX as usize {
                return Err(ProtocolError::ProtocolLimit(format!(
                    "auto-walk path of {} steps does not fit a byte count",
                    path.len()
                )));
            }
            w.put_u8(opcodes::AUTO_WALK);
            w.put_u8(path.len() as u8);
            for direction in path {
                put_walk_direction(&mut w, *direction);
            }
        }
        ClientCommand::Walk { direction } => w.put_u8(walk_opcode(*direction)?),
        ClientCommand::Stop => w.put_u8(opcodes::STOP),
        ClientCommand::Turn { direction } => w.put_u8(turn_opcode(*direction)?),
        ClientCommand::NewWalk {
            walk_id,
            prediction_id,
            origin,
            flags,
            path,
        } => {
            w.put_u8(opcodes::NEW_WALK);
            w.put_u32(*walk_id);
            w.put_u32(*prediction_id);
            w.put_position(*origin);
            w.put_u8(*flags);
            w.put_u16(path.len() as u16);
            for direction in path {
                put_walk_direction(&mut w, *direction);
            }
        }

        ClientCommand::EquipItem { item_id, count } => {
            w.put_u8(opcodes::EQUIP_ITEM);
            w.put_u16(*item_id);
            put_count(&mut w, features, *count);
        }
        ClientCommand::Move {
            from,
            thing_id,
            stack_pos,
            to,
            count,
        } => {
            w.put_u8(opcodes::MOVE);
            w.put_position(*from);
            w.put_u16(*thing_id);
            w.put_u8(*stack_pos);
            w.put_position(*to);
            put_count(&mut w, features, *count);
        }
        ClientCommand::UseItem {
            position,
            item_id,
            stack_pos,
            index,
        } => {
            w.put_u8(opcodes::USE_ITEM);
            w.put_position(*position);
            w.put_u16(*item_id);
            w.put_u8(*stack_pos);
            w.put_u8(*index);
        }
        ClientCommand::UseItemWith {
            from,
            item_id,
            from_stack_pos,
            to,
            to_thing_id,
            to_stack_pos,
        } => {
            w.put_u8(opcodes::USE_ITEM_WITH);
            w.put_position(*from);
            w.put_u16(*item_id);
            w.put_u8(*from_stack_pos);
            w.put_position(*to);
            w.put_u16(*to_thing_id);
            w.put_u8(*to_stack_pos);
        }
        ClientCommand::UseOnCreature {
            position,
            item_id,
            stack_pos,
            creature_id,
        } => {
            w.put_u8(opcodes::USE_ON_CREATURE);
            w.put_position(*position);
            w.put_u16(*item_id);
            w.put_u8(*stack_pos);
            w.put_u32(*creature_id);
        }
        ClientCommand::RotateItem {
            position,
            item_id,
            stack_pos,
        } => {
            w.put_u8(opcodes::ROTATE_ITEM);
            w.put_position(*position);
            w.put_u16(*item_id);
            w.put_u8(*stack_pos);
        }
        ClientCommand::WrapItem {
            position,
            item_id,
            stack_pos,
        } => {
            w.put_u8(opcodes::WRAP_ITEM);
            w.put_position(*position);
            w.put_u16(*item_id);
            w.put_u8(*stack_pos);
        }

        ClientCommand::CloseContainer { container_id } => {
            w.put_u8(opcodes::CLOSE_CONTAINER);
            w.put_u8(*container_id);
        }
        ClientCommand::UpContainer { container_id } => {
            w.put_u8(opcodes::UP_CONTAINER);
            w.put_u8(*container_id);
        }
        ClientCommand::RefreshContainer { container_id } => {
            w.put_u8(opcodes::REFRESH_CONTAINER);
            w.put_u8(*container_id);
        }
        ClientCommand::SeekInContainer {
            container_id,
            index,
        } => {
            w.put_u8(opcodes::SEEK_IN_CONTAINER);
            w.put_u8(*container_id);
            w.put_u16(*index);
        }
        ClientCommand::BrowseField { position } => {
            w.put_u8(opcodes::BROWSE_FIELD);
            w.put_position(*position);
        }

        ClientCommand::EditText { id, text } => {
            w.put_u8(opcodes::EDIT_TEXT);
            w.put_u32(*id);
            w.put_string(text);
        }
        ClientCommand::EditList { list_id, id, text } => {
            w.put_u8(opcodes::EDIT_LIST);
            w.put_u8(*list_id);
            w.put_u32(*id);
            w.put_string(text);
        }

        ClientCommand::Look {
            position,
            thing_id,
            stack_pos,
        } => {
            w.put_u8(opcodes::LOOK);
            w.put_position(*position);
            w.put_u16(*thing_id);
            w.put_u8(*stack_pos);
        }
        ClientCommand::LookCreature { creature_id } => {
            w.put_u8(opcodes::LOOK_CREATURE);
            w.put_u32(*creature_id);
        }

        ClientCommand::Talk {
            mode,
            channel_id,
            receiver,
            text,
            position,
            direction,
        } => {
            if text.len() > MAX_TALK_LENGTH {
                return Err(ProtocolError::ProtocolLimit(format!(
                    "talk text of {} bytes exceeds the {MAX_TALK_LENGTH} byte limit",
                    text.len()
                )));
            }
            w.put_u8(opcodes::TALK);
            w.put_u8(mode.wire_byte());
            if mode.addresses_receiver() {
                w.put_string(receiver);
            } else if mode.addresses_channel() {
                w.put_u16(*channel_id);
            }
            w.put_string(text);
            if features.has(GameFeature::NEW_WALKING) {
                w.put_position(*position);
                w.put_u8(direction.collapsed_byte());
            }
        }
        ClientCommand::RequestChannels => w.put_u8(opcodes::REQUEST_CHANNELS),
        ClientCommand::JoinChannel { channel_id } => {
            w.put_u8(opcodes::JOIN_CHANNEL);
            w.put_u16(*channel_id);
        }
        ClientCommand::LeaveChannel { channel_id } => {
            w.put_u8(opcodes::LEAVE_CHANNEL);
            w.put_u16(*channel_id);
        }
        ClientCommand::OpenPrivateChannel { receiver } => {
            w.put_u8(opcodes::OPEN_PRIVATE_CHANNEL);
            w.put_string(receiver);
        }
        ClientCommand::OpenOwnChannel => w.put_u8(opcodes::OPEN_OWN_CHANNEL),
        ClientCommand::InviteToOwnChannel { name } => {
            w.put_u8(opcodes::INVITE_TO_OWN_CHANNEL);
            w.put_string(name);
        }
        ClientCommand::ExcludeFromOwnChannel { name } => {
            w.put_u8(opcodes::EXCLUDE_FROM_OWN_CHANNEL);
            w.put_string(name);
        }
        ClientCommand::CloseNpcChannel => w.put_u8(opcodes::CLOSE_NPC_CHANNEL),

        ClientCommand::ChangeFightModes {
            fight,
            chase,
            safe_fight,
            pvp,
        } => {
            w.put_u8(opcodes::CHANGE_FIGHT_MODES);
            w.put_u8(fight.wire_byte());
            w.put_u8(chase.wire_byte());
            w.put_u8(u8::from(*safe_fight));
            if features.has(GameFeature::PVP_MODE) {
                w.put_u8(pvp.wire_byte());
            }
        }
        ClientCommand::Attack { creature_id, seq } => {
            w.put_u8(opcodes::ATTACK);
            w.put_u32(*creature_id);
            if features.has(GameFeature::ATTACK_SEQ) {
                w.put_u32(*seq);
            }
        }
        ClientCommand::Follow { creature_id, seq } => {
            w.put_u8(opcodes::FOLLOW);
            w.put_u32(*creature_id);
            if features.has(GameFeature::ATTACK_SEQ) {
                w.put_u32(*seq);
            }
        }
        ClientCommand::CancelAttackAndFollow => w.put_u8(opcodes::CANCEL_ATTACK_AND_FOLLOW),

        ClientCommand::InviteToParty { creature_id } => {
            w.put_u8(opcodes::INVITE_TO_PARTY);
            w.put_u32(*creature_id);
        }
        ClientCommand::JoinParty { creature_id } => {
            w.put_u8(opcodes::JOIN_PARTY);
            w.put_u32(*creature_id);
        }
        ClientCommand::RevokePartyInvitation { creature_id } => {
            w.put_u8(opcodes::REVOKE_PARTY_INVITATION);
            w.put_u32(*creature_id);
        }
        ClientCommand::PassPartyLeadership { creature_id } => {
            w.put_u8(opcodes::PASS_PARTY_LEADERSHIP);
            w.put_u32(*creature_id);
        }
        ClientCommand::LeaveParty => w.put_u8(opcodes::LEAVE_PARTY),
        ClientCommand::ShareExperience { active } => {
            w.put_u8(opcodes::SHARE_EXPERIENCE);
            w.put_u8(u8::from(*active));
            if features.has(GameFeature::LEGACY_SHARE_EXPERIENCE) {
                w.put_u8(0);
            }
        }

        ClientCommand::InspectNpcTrade { item_id, count } => {
            w.put_u8(opcodes::INSPECT_NPC_TRADE);
            w.put_u16(*item_id);
            put_count(&mut w, features, *count);
        }
        ClientCommand::BuyItem {
            item_id,
            sub_type,
            amount,
            ignore_capacity,
            buy_with_backpack,
        } => {
            w.put_u8(opcodes::BUY_ITEM);
            w.put_u16(*item_id);
            w.put_u8(*sub_type);
            w.put_u8(*amount);
            w.put_u8(u8::from(*ignore_capacity));
            w.put_u8(u8::from(*buy_with_backpack));
        }
        ClientCommand::SellItem {
            item_id,
            sub_type,
            amount,
            ignore_equipped,
        } => {
            w.put_u8(opcodes::SELL_ITEM);
            w.put_u16(*item_id);
            w.put_u8(*sub_type);
            if features.has(GameFeature::DOUBLE_SHOP_SELL_AMOUNT) {
                w.put_u16(*amount);
            } else {
                w.put_u8(*amount as u8);
            }
            w.put_u8(u8::from(*ignore_equipped));
        }
        ClientCommand::CloseNpcTrade => w.put_u8(opcodes::CLOSE_NPC_TRADE),
        ClientCommand::RequestTrade {
            position,
            thing_id,
            stack_pos,
            creature_id,
        } => {
            w.put_u8(opcodes::REQUEST_TRADE);
            w.put_position(*position);
            w.put_u16(*thing_id);
            w.put_u8(*stack_pos);
            w.put_u32(*creature_id);
        }
        ClientCommand::InspectTrade {
            counter_offer,
            index,
        } => {
            w.put_u8(opcodes::INSPECT_TRADE);
            w.put_u8(u8::from(*counter_offer));
            w.put_u8(*index);
        }
        ClientCommand::AcceptTrade => w.put_u8(opcodes::ACCEPT_TRADE),
        ClientCommand::RejectTrade => w.put_u8(opcodes::REJECT_TRADE),

        ClientCommand::RequestOutfit => w.put_u8(opcodes::REQUEST_OUTFIT),
        ClientCommand::ChangeOutfit { outfit } => {
            w.put_u8(opcodes::CHANGE_OUTFIT);
            if features.has(GameFeature::OUTFIT_TYPE_BYTE) {
                w.put_u8(0);
            }
            if features.has(GameFeature::LOOKTYPE_U16) {
                w.put_u16(outfit.id);
            } else {
                w.put_u8(outfit.id as u8);
            }
            w.put_u8(outfit.head);
            w.put_u8(outfit.body);
            w.put_u8(outfit.legs);
            w.put_u8(outfit.feet);
            if features.has(GameFeature::PLAYER_ADDONS) {
                w.put_u8(outfit.addons);
            }
            if features.has(GameFeature::PLAYER_MOUNTS) {
                w.put_u16(outfit.mount);
            }
            if features.has(GameFeature::WINGS_AND_AURA) {
                w.put_u16(outfit.wings);
                w.put_u16(outfit.aura);
            }
            if features.has(GameFeature::OUTFIT_SHADERS) {
                w.put_string(&outfit.shader);
            }
            if features.has(GameFeature::HEALTH_INFO_BACKGROUND) {
                w.put_u16(outfit.health_bar);
                w.put_u16(outfit.mana_bar);
            }
        }
        ClientCommand::OutfitExtensions {
            mount,
            wings,
            aura,
            shader,
            health_bar,
            mana_bar,
        } => {
            let supported = features.has(GameFeature::PLAYER_MOUNTS)
                || features.has(GameFeature::WINGS_AND_AURA)
                || features.has(GameFeature::OUTFIT_SHADERS)
                || features.has(GameFeature::HEALTH_INFO_BACKGROUND);
            if !supported {
                return Err(ProtocolError::ProtocolLimit(
                    "no outfit extension is available in this protocol".into(),
                ));
            }
            w.put_u8(opcodes::OUTFIT_EXTENSIONS);
            if features.has(GameFeature::PLAYER_MOUNTS) {
                w.put_u8(*mount);
            }
            if features.has(GameFeature::WINGS_AND_AURA) {
                w.put_u8(*wings);
                w.put_u8(*aura);
            }
            if features.has(GameFeature::OUTFIT_SHADERS) {
                w.put_u8(*shader);
            }
            if features.has(GameFeature::HEALTH_INFO_BACKGROUND) {
                w.put_u8(*health_bar);
                w.put_u8(*mana_bar);
            }
        }

        ClientCommand::ApplyImbuement {
            slot,
            imbuement_id,
            protection_charm,
        } => {
            w.put_u8(opcodes::APPLY_IMBUEMENT);
            w.put_u8(*slot);
            w.put_u32(*imbuement_id);
            w.put_u8(u8::from(*protection_charm));
        }
        ClientCommand::ClearImbuement { slot } => {
            w.put_u8(opcodes::CLEAR_IMBUEMENT);
            w.put_u8(*slot);
        }
        ClientCommand::CloseImbuingWindow => w.put_u8(opcodes::CLOSE_IMBUING_WINDOW),

        ClientCommand::AddVip { name } => {
            w.put_u8(opcodes::ADD_VIP);
            w.put_string(name);
        }
        ClientCommand::RemoveVip { player_id } => {
            w.put_u8(opcodes::REMOVE_VIP);
            w.put_u32(*player_id);
        }
        ClientCommand::EditVip {
            player_id,
            description,
            icon_id,
            notify_login,
        } => {
            w.put_u8(opcodes::EDIT_VIP);
            w.put_u32(*player_id);
            w.put_string(description);
            w.put_u32(*icon_id);
            w.put_u8(u8::from(*notify_login));
        }

        ClientCommand::BugReport { comment } => {
            w.put_u8(opcodes::BUG_REPORT);
            if features.has(GameFeature::CATEGORIZED_BUG_REPORT) {
                // "other" category
                w.put_u8(3);
            }
            w.put_string(comment);
        }
        ClientCommand::RuleViolation {
            target,
            reason,
            action,
            comment,
            statement,
            statement_id,
            ip_banishment,
        } => {
            w.put_u8(opcodes::RULE_VIOLATION);
            w.put_string(target);
            w.put_u8(*reason);
            w.put_u8(*action);
            w.put_string(comment);
            w.put_string(statement);
            w.put_u16(*statement_id);
            w.put_u8(u8::from(*ip_banishment));
        }
        ClientCommand::NewRuleViolation {
            reason,
            action,
            character_name,
            comment,
            translation,
        } => {
            w.put_u8(opcodes::NEW_RULE_VIOLATION);
            w.put_u8(*reason);
            w.put_u8(*action);
            w.put_string(character_name);
            w.put_string(comment);
            w.put_string(translation);
        }
        ClientCommand::DebugReport {
            what,
            signature,
            date,
            description,
        } => {
            w.put_u8(opcodes::DEBUG_REPORT);
            w.put_string(what);
            w.put_string(signature);
            w.put_string(date);
            w.put_string(description);
        }

        ClientCommand::RequestQuestLog => w.put_u8(opcodes::REQUEST_QUEST_LOG),
        ClientCommand::RequestQuestLine { quest_id } => {
            w.put_u8(opcodes::REQUEST_QUEST_LINE);
            w.put_u16(*quest_id);
        }
        ClientCommand::RequestItemInfo {
            item_id,
            sub_type,
            index,
        } => {
            w.put_u8(opcodes::REQUEST_ITEM_INFO);
            w.put_u8(*sub_type);
            w.put_u16(*item_id);
            w.put_u8(*index);
        }
        ClientCommand::AnswerModalDialog {
            dialog_id,
            button,
            choice,
        } => {
            w.put_u8(opcodes::ANSWER_MODAL_DIALOG);
            w.put_u32(*dialog_id);
            w.put_u8(*button);
            w.put_u8(*choice);
        }

        ClientCommand::OpenStore { service_type } => {
            w.put_u8(opcodes::OPEN_STORE);
            if features.has(GameFeature::INGAME_STORE_SERVICE_TYPE) {
                w.put_u8(*service_type);
            }
        }
        ClientCommand::RequestStoreOffers {
            category_name,
            service_type,
        } => {
            w.put_u8(opcodes::REQUEST_STORE_OFFERS);
            if features.has(GameFeature::INGAME_STORE_SERVICE_TYPE) {
                w.put_u8(*service_type);
            }
            w.put_string(category_name);
        }
        ClientCommand::BuyStoreOffer {
            offer_id,
            product_type,
            name,
        } => {
            w.put_u8(opcodes::BUY_STORE_OFFER);
            w.put_u32(*offer_id);
            w.put_u8(*product_type);
            if *product_type == PRODUCT_TYPE_NAME_CHANGE {
                w.put_string(name);
            }
        }
        ClientCommand::OpenTransactionHistory { entries_per_page } => {
            w.put_u8(opcodes::OPEN_TRANSACTION_HISTORY);
            w.put_u8(*entries_per_page);
        }
        ClientCommand::RequestTransactionHistory {
            page,
            entries_per_page,
        } => {
            w.put_u8(opcodes::REQUEST_TRANSACTION_HISTORY);
            if features.has(GameFeature::STORE_HISTORY_U16_PAGE) {
                w.put_u16(*page as u16);
                w.put_u32(*entries_per_page);
            } else {
                w.put_u32(*page);
                w.put_u8(*entries_per_page as u8);
            }
        }
        ClientCommand::TransferCoins { recipient, amount } => {
            w.put_u8(opcodes::TRANSFER_COINS);
            w.put_string(recipient);
            w.put_u16(*amount);
        }

        ClientCommand::PreyAction {
            slot,
            action_type,
            index,
        } => {
            w.put_u8(opcodes::PREY_ACTION);
            w.put_u8(*slot);
            w.put_u8(*action_type);
            match action_type {
                2 | 5 => w.put_u8(*index as u8),
                4 => w.put_u16(*index),
                _ => {}
            }
        }
        ClientCommand::PreyRequest => w.put_u8(opcodes::PREY_REQUEST),

        ClientCommand::UpdateAutoLoot {
            client_id,
            name,
            remove,
        } => {
            w.put_u8(opcodes::UPDATE_AUTO_LOOT);
            w.put_u16(*client_id);
            w.put_string(name);
            w.put_u8(u8::from(*remove));
        }

        ClientCommand::OpenRuleViolation { reporter } => {
            w.put_u8(opcodes::OPEN_RULE_VIOLATION);
            w.put_string(reporter);
        }
        ClientCommand::CloseRuleViolation { reporter } => {
            w.put_u8(opcodes::CLOSE_RULE_VIOLATION);
            w.put_string(reporter);
        }
        ClientCommand::CancelRuleViolation => w.put_u8(opcodes::CANCEL_RULE_VIOLATION),
    }
    Ok(w.freeze())
}

/// Server challenge echoed back inside the login packet.
#[derive(Debug, Clone, Copy, Default)]
pub struct Challenge {
    pub timestamp: u32,
    pub random: u8,
}

/// Inputs to the login packet beyond the capability set.
#[derive(Debug)]
pub struct LoginRequest<'a> {
    pub credentials: &'a Credentials,
    pub os_code: u16,
    pub client_version: u32,
    pub content_revision: u16,
    pub challenge: Option<Challenge>,
    /// Vendor id for the client identification trailer.
    pub vendor: &'a str,
    /// Human-readable build version, normalized into a 2-digit code.
    pub build_version: &'a str,
    /// Full replacement for the identification trailer, when supplied.
    pub custom_identification: Option<&'a str>,
    /// Host identification block for the optional second sealed region.
    pub identifiers: Option<&'a HostIdentifiers>,
}

/// Normalize a build version like `"3.2 rc1"` into its wire code: first
/// whitespace token, dots stripped, 2-digit results padded with a trailing
/// zero. Unparseable input maps to 0.
pub fn normalized_version_code(version: &str) -> u16 {
    let mut digits: String = version
        .split_whitespace()
        .next()
        .unwrap_or("")
        .replace('.', "");
    if digits.len() == 2 {
        digits.push('0');
    }
    digits.parse().unwrap_or(0)
}

fn seal_region(w: &mut PacketWriter, start: usize, rsa: &dyn RsaCipher) -> Result<()> {
    let block = rsa.block_size();
    let used = w.len() - start;
    if used > block {
        return Err(ProtocolError::PackingOverflow {
            region: used,
            block,
        });
    }
    w.put_padding(block - used);
    rsa.encrypt_block(w.region_mut(start))
}

fn clamped(value: &str, limit: usize) -> &str {
    let mut end = value.len().min(limit);
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// Build the login packet.
///
/// Returns the frame and, when login packet encryption is active, the
/// freshly generated 4-word stream key the transport must be switched to
/// right after the frame is sent.
pub fn encode_login(
    request: &LoginRequest<'_>,
    features: &FeatureSet,
    rsa: &dyn RsaCipher,
) -> Result<(Bytes, Option<[u32; 4]>)> {
    let mut w = PacketWriter::new();
    let credentials = request.credentials;

    w.put_u8(opcodes::LOGIN);
    w.put_u16(request.os_code);
    w.put_u16(features.protocol_version());

    if features.has(GameFeature::CLIENT_VERSION) {
        w.put_u32(request.client_version);
    }
    if features.has(GameFeature::STRING_CLIENT_VERSION) {
        w.put_string(&request.client_version.to_string());
    }
    if features.has(GameFeature::CONTENT_REVISION) {
        w.put_u16(request.content_revision);
    }
    if features.has(GameFeature::PREVIEW_STATE) {
        w.put_u8(0);
    }

    let region_start = w.len();
    // first byte of a sealed region is always 0
    w.put_u8(0);

    let stream_key = if features.has(GameFeature::LOGIN_PACKET_ENCRYPTION) {
        let key: [u32; 4] = rand::rng().random();
        for word in key {
            w.put_u32(word);
        }
        // gm flag, always clear
        w.put_u8(0);
        Some(key)
    } else {
        None
    };

    if features.has(GameFeature::SESSION_KEY) {
        w.put_string(&credentials.session_key);
        w.put_string(&credentials.character_name);
    } else {
        if features.has(GameFeature::ACCOUNT_NAMES) {
            w.put_string(&credentials.account_name);
        } else {
            w.put_u32(credentials.account_name.parse().unwrap_or(0));
        }
        w.put_string(&credentials.character_name);
        w.put_string(&credentials.password);
        if features.has(GameFeature::AUTHENTICATOR) {
            w.put_string(&credentials.authenticator_token);
        }
    }

    if features.has(GameFeature::CHALLENGE_ON_LOGIN) {
        let challenge = request.challenge.unwrap_or_default();
        w.put_u32(challenge.timestamp);
        w.put_u8(challenge.random);
    }

    if let Some(custom) = request.custom_identification {
        w.put_string(custom);
    } else {
        w.put_string(request.vendor);
        w.put_u16(normalized_version_code(request.build_version));
    }

    if features.has(GameFeature::LOGIN_PACKET_ENCRYPTION) {
        seal_region(&mut w, region_start, rsa)?;
    }

    if features.has(GameFeature::SEND_IDENTIFIERS) {
        let identifiers = request.identifiers.cloned().unwrap_or_default();
        let region_start = w.len();
        w.put_u8(0);
        w.put_string(clamped(&identifiers.user_name, MAX_IDENTIFIER_LENGTH));
        w.put_string(clamped(&identifiers.cpu_name, MAX_IDENTIFIER_LENGTH));
        w.put_u32(identifiers.memory_mb);
        let macs = &identifiers.macs[..identifiers.macs.len().min(MAX_MAC_COUNT)];
        w.put_u8(macs.len() as u8);
        for mac in macs {
            w.put_string(mac);
        }
        if features.has(GameFeature::LOGIN_PACKET_ENCRYPTION) {
            seal_region(&mut w, region_start, rsa)?;
        }
    }

    Ok((w.freeze(), stream_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct XorCipher {
        block: usize,
    }

    impl RsaCipher for XorCipher {
        fn block_size(&self) -> usize {
            self.block
        }

        fn encrypt_block(&self, block: &mut [u8]) -> Result<()> {
            for byte in block {
                *byte ^= 0xFF;
            }
            Ok(())
        }
    }

    fn request<'a>(credentials: &'a Credentials) -> LoginRequest<'a> {
        LoginRequest {
            credentials,
            os_code: 21,
            client_version: 1098,
            content_revision: 0,
            challenge: Some(Challenge {
                timestamp: 1234,
                random: 7,
            }),
            vendor: "MyClient",
            build_version: "3.2",
            custom_identification: None,
            identifiers: None,
        }
    }

    #[test]
    fn version_code_normalization() {
        assert_eq!(normalized_version_code("3.2"), 320);
        assert_eq!(normalized_version_code("3.2.1 beta"), 321);
        assert_eq!(normalized_version_code("garbage"), 0);
    }

    #[test]
    fn login_region_is_padded_to_the_block_size() {
        let credentials = Credentials {
            account_name: "acc".into(),
            password: "pw".into(),
            character_name: "Knight".into(),
            ..Default::default()
        };
        let features = FeatureSet::negotiate(1098);
        let rsa = XorCipher { block: 128 };
        let (frame, key) = encode_login(&request(&credentials), &features, &rsa).unwrap();
        assert!(key.is_some());
        // header: opcode + os + version + client version u32
        let header = 1 + 2 + 2 + 4;
        assert_eq!(frame.len(), header + 128);
    }

    #[test]
    fn oversized_login_region_is_a_packing_overflow() {
        let credentials = Credentials {
            account_name: "a".repeat(200),
            password: "pw".into(),
            character_name: "Knight".into(),
            ..Default::default()
        };
        let features = FeatureSet::negotiate(1098);
        let rsa = XorCipher { block: 128 };
        let result = encode_login(&request(&credentials), &features, &rsa);
        assert!(matches!(
            result,
            Err(ProtocolError::PackingOverflow { .. })
        ));
    }

    #[test]
    fn unencrypted_login_has_no_stream_key() {
        let credentials = Credentials {
            account_name: "12345".into(),
            password: "pw".into(),
            character_name: "Knight".into(),
            ..Default::default()
        };
        let features = FeatureSet::negotiate(740);
        let rsa = XorCipher { block: 128 };
        let (_, key) = encode_login(&request(&credentials), &features, &rsa).unwrap();
        assert!(key.is_none());
    }

    #[test]
    fn oversized_talk_is_rejected_locally() {
        let features = FeatureSet::negotiate(1098);
        let command = ClientCommand::Talk {
            mode: crate::protocol::types::MessageMode::Say,
            channel_id: 0,
            receiver: String::new(),
            text: "a".repeat(256),
            position: crate::protocol::types::Position::default(),
            direction: Direction::South,
        };
        assert!(matches!(
            encode(&command, &features),
            Err(ProtocolError::ProtocolLimit(_))
        ));
    }
}
