//! Capability-conditioned command decoder.
//!
//! Structural inverse of [`super::encode`]: under one [`FeatureSet`], every
//! frame produced by [`super::encode::encode`] parses back into the command
//! it came from. Truncated frames, trailing garbage, and unknown leading
//! bytes are decode errors, never silently ignored.

use bytes::Bytes;

use crate::core::packet::PacketReader;
use crate::error::{ProtocolError, Result};
use crate::features::{FeatureSet, GameFeature};
use crate::protocol::command::ClientCommand;
use crate::protocol::opcodes;
use crate::protocol::types::{
    ChaseMode, Direction, FightMode, MessageMode, Outfit, Position, PvpMode,
};

fn get_count(r: &mut PacketReader, features: &FeatureSet) -> Result<u16> {
    if features.has(GameFeature::WIDE_COUNT) {
        r.get_u16()
    } else {
        Ok(r.get_u8()? as u16)
    }
}

fn get_path(r: &mut PacketReader, steps: usize) -> Result<Vec<Direction>> {
    let mut path = Vec::with_capacity(steps.min(4096));
    for _ in 0..steps {
        path.push(Direction::from_wire_byte(r.get_u8()?));
    }
    Ok(path)
}

/// Decode one client-to-server frame under the negotiated capability set.
pub fn decode(frame: Bytes, features: &FeatureSet) -> Result<ClientCommand> {
    let mut r = PacketReader::new(frame);
    let opcode = r.get_u8()?;

    let command = match opcode {
        opcodes::ENTER_GAME => ClientCommand::EnterGame,
        opcodes::LEAVE_GAME => ClientCommand::LeaveGame,
        opcodes::PING => ClientCommand::Ping,
        opcodes::PING_BACK => ClientCommand::PingBack,
        opcodes::NEW_PING => ClientCommand::NewPing {
            ping_id: r.get_u32()?,
            local_ping: r.get_u16()?,
            frame_rate: r.get_u16()?,
        },
        opcodes::EXTENDED_OPCODE => ClientCommand::ExtendedOpcode {
            opcode: r.get_u8()?,
            buffer: r.get_string()?,
        },
        opcodes::CHANGE_MAP_AWARE_RANGE => ClientCommand::ChangeMapAwareRange {
            x_range: r.get_u8()?,
            y_range: r.get_u8()?,
        },

        opcodes::AUTO_WALK => {
            let steps = r.get_u8()? as usize;
            ClientCommand::AutoWalk {
                path: get_path(&mut r, steps)?,
            }
        }
        opcodes::WALK_NORTH => ClientCommand::Walk {
            direction: Direction::North,
        },
        opcodes::WALK_EAST => ClientCommand::Walk {
            direction: Direction::East,
        },
        opcodes::WALK_SOUTH => ClientCommand::Walk {
            direction: Direction::South,
        },
        opcodes::WALK_WEST => ClientCommand::Walk {
            direction: Direction::West,
        },
        opcodes::WALK_NORTH_EAST => ClientCommand::Walk {
            direction: Direction::NorthEast,
        },
        opcodes::WALK_SOUTH_EAST => ClientCommand::Walk {
            direction: Direction::SouthEast,
        },
        opcodes::WALK_SOUTH_WEST => ClientCommand::Walk {
            direction: Direction::SouthWest,
        },
        opcodes::WALK_NORTH_WEST => ClientCommand::Walk {
            direction: Direction::NorthWest,
        },
        opcodes::STOP => ClientCommand::Stop,
        opcodes::TURN_NORTH => ClientCommand::Turn {
            direction: Direction::North,
        },
        opcodes::TURN_EAST => ClientCommand::Turn {
            direction: Direction::East,
        },
        opcodes::TURN_SOUTH => ClientCommand::Turn {
            direction: Direction::South,
        },
        opcodes::TURN_WEST => ClientCommand::Turn {
            direction: Direction::West,
        },
        opcodes::NEW_WALK => {
            let walk_id = r.get_u32()?;
            let prediction_id = r.get_u32()?;
            let origin = r.get_position()?;
            let flags = r.get_u8()?;
            let steps = r.get_u16()? as usize;
            ClientCommand::NewWalk {
                walk_id,
                prediction_id,
                origin,
                flags,
                path: get_path(&mut r, steps)?,
            }
        }

        opcodes::EQUIP_ITEM => ClientCommand::EquipItem {
            item_id: r.get_u16()?,
            count: get_count(&mut r, features)?,
        },
        opcodes::MOVE => ClientCommand::Move {
            from: r.get_position()?,
            thing_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
            to: r.get_position()?,
            count: get_count(&mut r, features)?,
        },
        opcodes::USE_ITEM => ClientCommand::UseItem {
            position: r.get_position()?,
            item_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
            index: r.get_u8()?,
        },
        opcodes::USE_ITEM_WITH => ClientCommand::UseItemWith {
            from: r.get_position()?,
            item_id: r.get_u16()?,
            from_stack_pos: r.get_u8()?,
            to: r.get_position()?,
            to_thing_id: r.get_u16()?,
            to_stack_pos: r.get_u8()?,
        },
        opcodes::USE_ON_CREATURE => ClientCommand::UseOnCreature {
            position: r.get_position()?,
            item_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
            creature_id: r.get_u32()?,
        },
        opcodes::ROTATE_ITEM => ClientCommand::RotateItem {
            position: r.get_position()?,
            item_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
        },
        opcodes::WRAP_ITEM => ClientCommand::WrapItem {
            position: r.get_position()?,
            item_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
        },

        opcodes::CLOSE_CONTAINER => ClientCommand::CloseContainer {
            container_id: r.get_u8()?,
        },
        opcodes::UP_CONTAINER => ClientCommand::UpContainer {
            container_id: r.get_u8()?,
        },
        opcodes::REFRESH_CONTAINER => ClientCommand::RefreshContainer {
            container_id: r.get_u8()?,
        },
        opcodes::SEEK_IN_CONTAINER => ClientCommand::SeekInContainer {
            container_id: r.get_u8()?,
            index: r.get_u16()?,
        },
        opcodes::BROWSE_FIELD => ClientCommand::BrowseField {
            position: r.get_position()?,
        },

        opcodes::EDIT_TEXT => ClientCommand::EditText {
            id: r.get_u32()?,
            text: r.get_string()?,
        },
        opcodes::EDIT_LIST => ClientCommand::EditList {
            list_id: r.get_u8()?,
            id: r.get_u32()?,
            text: r.get_string()?,
        },

        opcodes::LOOK => ClientCommand::Look {
            position: r.get_position()?,
            thing_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
        },
        opcodes::LOOK_CREATURE => ClientCommand::LookCreature {
            creature_id: r.get_u32()?,
        },

        opcodes::TALK => {
            let mode_byte = r.get_u8()?;
            let mode = MessageMode::from_wire_byte(mode_byte).ok_or_else(|| {
                ProtocolError::MalformedMessage(format!("unknown talk mode {mode_byte}"))
            })?;
            let mut receiver = String::new();
            let mut channel_id = 0;
            if mode.addresses_receiver() {
                receiver = r.get_string()?;
            } else if mode.addresses_channel() {
                channel_id = r.get_u16()?;
            }
            let text = r.get_string()?;
            let (position, direction) = if features.has(GameFeature::NEW_WALKING) {
                (
                    r.get_position()?,
                    Direction::from_collapsed_byte(r.get_u8()?),
                )
            } else {
                (Position::default(), Direction::Invalid)
            };
            ClientCommand::Talk {
                mode,
                channel_id,
                receiver,
                text,
                position,
                direction,
            }
        }
        opcodes::REQUEST_CHANNELS => ClientCommand::RequestChannels,
        opcodes::JOIN_CHANNEL => ClientCommand::JoinChannel {
            channel_id: r.get_u16()?,
        },
        opcodes::LEAVE_CHANNEL => ClientCommand::LeaveChannel {
            channel_id: r.get_u16()?,
        },
        opcodes::OPEN_PRIVATE_CHANNEL => ClientCommand::OpenPrivateChannel {
            receiver: r.get_string()?,
        },
        opcodes::OPEN_OWN_CHANNEL => ClientCommand::OpenOwnChannel,
        opcodes::INVITE_TO_OWN_CHANNEL => ClientCommand::InviteToOwnChannel {
            name: r.get_string()?,
        },
        opcodes::EXCLUDE_FROM_OWN_CHANNEL => ClientCommand::ExcludeFromOwnChannel {
            name: r.get_string()?,
        },
        opcodes::CLOSE_NPC_CHANNEL => ClientCommand::CloseNpcChannel,

        opcodes::CHANGE_FIGHT_MODES => {
            let fight_byte = r.get_u8()?;
            let fight = FightMode::from_wire_byte(fight_byte).ok_or_else(|| {
                ProtocolError::MalformedMessage(format!("unknown fight mode {fight_byte}"))
            })?;
            let chase_byte = r.get_u8()?;
            let chase = ChaseMode::from_wire_byte(chase_byte).ok_or_else(|| {
                ProtocolError::MalformedMessage(format!("unknown chase mode {chase_byte}"))
            })?;
            let safe_fight = r.get_u8()? != 0;
            let pvp = if features.has(GameFeature::PVP_MODE) {
                let pvp_byte = r.get_u8()?;
                PvpMode::from_wire_byte(pvp_byte).ok_or_else(|| {
                    ProtocolError::MalformedMessage(format!("unknown pvp mode {pvp_byte}"))
                })?
            } else {
                PvpMode::WhiteDove
            };
            ClientCommand::ChangeFightModes {
                fight,
                chase,
                safe_fight,
                pvp,
            }
        }
        opcodes::ATTACK => ClientCommand::Attack {
            creature_id: r.get_u32()?,
            seq: if features.has(GameFeature::ATTACK_SEQ) {
                r.get_u32()?
            } else {
                0
            },
        },
        opcodes::FOLLOW => ClientCommand::Follow {
            creature_id: r.get_u32()?,
            seq: if features.has(GameFeature::ATTACK_SEQ) {
                r.get_u32()?
            } else {
                0
            },
        },
        opcodes::CANCEL_ATTACK_AND_FOLLOW => ClientCommand::CancelAttackAndFollow,

        opcodes::INVITE_TO_PARTY => ClientCommand::InviteToParty {
            creature_id: r.get_u32()?,
        },
        opcodes::JOIN_PARTY => ClientCommand::JoinParty {
            creature_id: r.get_u32()?,
        },
        opcodes::REVOKE_PARTY_INVITATION => ClientCommand::RevokePartyInvitation {
            creature_id: r.get_u32()?,
        },
        opcodes::PASS_PARTY_LEADERSHIP => ClientCommand::PassPartyLeadership {
            creature_id: r.get_u32()?,
        },
        opcodes::LEAVE_PARTY => ClientCommand::LeaveParty,
        opcodes::SHARE_EXPERIENCE => {
            let active = r.get_u8()? != 0;
            if features.has(GameFeature::LEGACY_SHARE_EXPERIENCE) {
                r.get_u8()?;
            }
            ClientCommand::ShareExperience { active }
        }

        opcodes::INSPECT_NPC_TRADE => ClientCommand::InspectNpcTrade {
            item_id: r.get_u16()?,
            count: get_count(&mut r, features)?,
        },
        opcodes::BUY_ITEM => ClientCommand::BuyItem {
            item_id: r.get_u16()?,
            sub_type: r.get_u8()?,
            amount: r.get_u8()?,
            ignore_capacity: r.get_u8()? != 0,
            buy_with_backpack: r.get_u8()? != 0,
        },
        opcodes::SELL_ITEM => {
            let item_id = r.get_u16()?;
            let sub_type = r.get_u8()?;
            let amount = if features.has(GameFeature::DOUBLE_SHOP_SELL_AMOUNT) {
                r.get_u16()?
            } else {
                r.get_u8()? as u16
            };
            ClientCommand::SellItem {
                item_id,
                sub_type,
                amount,
                ignore_equipped: r.get_u8()? != 0,
            }
        }
        opcodes::CLOSE_NPC_TRADE => ClientCommand::CloseNpcTrade,
        opcodes::REQUEST_TRADE => ClientCommand::RequestTrade {
            position: r.get_position()?,
            thing_id: r.get_u16()?,
            stack_pos: r.get_u8()?,
            creature_id: r.get_u32()?,
        },
        opcodes::INSPECT_TRADE => ClientCommand::InspectTrade {
            counter_offer: r.get_u8()? != 0,
            index: r.get_u8()?,
        },
        opcodes::ACCEPT_TRADE => ClientCommand::AcceptTrade,
        opcodes::REJECT_TRADE => ClientCommand::RejectTrade,

        opcodes::REQUEST_OUTFIT => ClientCommand::RequestOutfit,
        opcodes::CHANGE_OUTFIT => {
            if features.has(GameFeature::OUTFIT_TYPE_BYTE) {
                r.get_u8()?;
            }
            let mut outfit = Outfit {
                id: if features.has(GameFeature::LOOKTYPE_U16) {
                    r.get_u16()?
                } else {
                    r.get_u8()? as u16
                },
                head: r.get_u8()?,
                body: r.get_u8()?,
                legs: r.get_u8()?,
                feet: r.get_u8()?,
                ..Default::default()
            };
            if features.has(GameFeature::PLAYER_ADDONS) {
                outfit.addons = r.get_u8()?;
            }
            if features.has(GameFeature::PLAYER_MOUNTS) {
                outfit.mount = r.get_u16()?;
            }
            if features.has(GameFeature::WINGS_AND_AURA) {
                outfit.wings = r.get_u16()?;
                outfit.aura = r.get_u16()?;
            }
            if features.has(GameFeature::OUTFIT_SHADERS) {
                outfit.shader = r.get_string()?;
            }
            if features.has(GameFeature::HEALTH_INFO_BACKGROUND) {
                outfit.health_bar = r.get_u16()?;
                outfit.mana_bar = r.get_u16()?;
            }
            ClientCommand::ChangeOutfit { outfit }
        }
        opcodes::OUTFIT_EXTENSIONS => {
            let mut mount = 0;
            let mut wings = 0;
            let mut aura = 0;
            let mut shader = 0;
            let mut health_bar = 0;
            let mut mana_bar = 0;
            if features.has(GameFeature::PLAYER_MOUNTS) {
                mount = r.get_u8()?;
            }
            if features.has(GameFeature::WINGS_AND_AURA) {
                wings = r.get_u8()?;
                aura = r.get_u8()?;
            }
            if features.has(GameFeature::OUTFIT_SHADERS) {
                shader = r.get_u8()?;
            }
            if features.has(GameFeature::HEALTH_INFO_BACKGROUND) {
                health_bar = r.get_u8()?;
                mana_bar = r.get_u8()?;
            }
            ClientCommand::OutfitExtensions {
                mount,
                wings,
                aura,
                shader,
                health_bar,
                mana_bar,
            }
        }

        opcodes::APPLY_IMBUEMENT => ClientCommand::ApplyImbuement {
            slot: r.get_u8()?,
            imbuement_id: r.get_u32()?,
            protection_charm: r.get_u8()? != 0,
        },
        opcodes::CLEAR_IMBUEMENT => ClientCommand::ClearImbuement { slot: r.get_u8()? },
        opcodes::CLOSE_IMBUING_WINDOW => ClientCommand::CloseImbuingWindow,

        opcodes::ADD_VIP => ClientCommand::AddVip {
            name: r.get_string()?,
        },
        opcodes::REMOVE_VIP => ClientCommand::RemoveVip {
            player_id: r.get_u32()?,
        },
        opcodes::EDIT_VIP => ClientCommand::EditVip {
            player_id: r.get_u32()?,
            description: r.get_string()?,
            icon_id: r.get_u32()?,
            notify_login: r.get_u8()? != 0,
        },

        opcodes::BUG_REPORT => {
            if features.has(GameFeature::CATEGORIZED_BUG_REPORT) {
                r.get_u8()?;
            }
            ClientCommand::BugReport {
                comment: r.get_string()?,
            }
        }
        opcodes::RULE_VIOLATION => ClientCommand::RuleViolation {
            target: r.get_string()?,
            reason: r.get_u8()?,
            action: r.get_u8()?,
            comment: r.get_string()?,
            statement: r.get_string()?,
            statement_id: r.get_u16()?,
            ip_banishment: r.get_u8()? != 0,
        },
        opcodes::NEW_RULE_VIOLATION => ClientCommand::NewRuleViolation {
            reason: r.get_u8()?,
            action: r.get_u8()?,
            character_name: r.get_string()?,
            comment: r.get_string()?,
            translation: r.get_string()?,
        },
        opcodes::DEBUG_REPORT => ClientCommand::DebugReport {
            what: r.get_string()?,
            signature: r.get_string()?,
            date: r.get_string()?,
            description: r.get_string()?,
        },

        opcodes::REQUEST_QUEST_LOG => ClientCommand::RequestQuestLog,
        opcodes::REQUEST_QUEST_LINE => ClientCommand::RequestQuestLine {
            quest_id: r.get_u16()?,
        },
        opcodes::REQUEST_ITEM_INFO => {
            let sub_type = r.get_u8()?;
            let item_id = r.get_u16()?;
            ClientCommand::RequestItemInfo {
                item_id,
                sub_type,
                index: r.get_u8()?,
            }
        }
        opcodes::ANSWER_MODAL_DIALOG => ClientCommand::AnswerModalDialog {
            dialog_id: r.get_u32()?,
            button: r.get_u8()?,
            choice: r.get_u8()?,
        },

        opcodes::OPEN_STORE => ClientCommand::OpenStore {
            service_type: if features.has(GameFeature::INGAME_STORE_SERVICE_TYPE) {
                r.get_u8()?
            } else {
                0
            },
        },
        opcodes::REQUEST_STORE_OFFERS => {
            let service_type = if features.has(GameFeature::INGAME_STORE_SERVICE_TYPE) {
                r.get_u8()?
            } else {
                0
            };
            ClientCommand::RequestStoreOffers {
                category_name: r.get_string()?,
                service_type,
            }
        }
        opcodes::BUY_STORE_OFFER => {
            let offer_id = r.get_u32()?;
            let product_type = r.get_u8()?;
            let name = if product_type == 1 {
                r.get_string()?
            } else {
                String::new()
            };
            ClientCommand::BuyStoreOffer {
                offer_id,
                product_type,
                name,
            }
        }
        opcodes::OPEN_TRANSACTION_HISTORY => ClientCommand::OpenTransactionHistory {
            entries_per_page: r.get_u8()?,
        },
        opcodes::REQUEST_TRANSACTION_HISTORY => {
            if features.has(GameFeature::STORE_HISTORY_U16_PAGE) {
                ClientCommand::RequestTransactionHistory {
                    page: r.get_u16()? as u32,
                    entries_per_page: r.get_u32()?,
                }
            } else {
                ClientCommand::RequestTransactionHistory {
                    page: r.get_u32()?,
                    entries_per_page: r.get_u8()? as u32,
                }
            }
        }
        opcodes::TRANSFER_COINS => ClientCommand::TransferCoins {
            recipient: r.get_string()?,
            amount: r.get_u16()?,
        },

        opcodes::PREY_ACTION => {
            let slot = r.get_u8()?;
            let action_type = r.get_u8()?;
            let index = match action_type {
                2 | 5 => r.get_u8()? as u16,
                4 => r.get_u16()?,
                _ => 0,
            };
            ClientCommand::PreyAction {
                slot,
                action_type,
                index,
            }
        }
        opcodes::PREY_REQUEST => ClientCommand::PreyRequest,

        opcodes::UPDATE_AUTO_LOOT => ClientCommand::UpdateAutoLoot {
            client_id: r.get_u16()?,
            name: r.get_string()?,
            remove: r.get_u8()? != 0,
        },

        opcodes::OPEN_RULE_VIOLATION => ClientCommand::OpenRuleViolation {
            reporter: r.get_string()?,
        },
        opcodes::CLOSE_RULE_VIOLATION => ClientCommand::CloseRuleViolation {
            reporter: r.get_string()?,
        },
        opcodes::CANCEL_RULE_VIOLATION => ClientCommand::CancelRuleViolation,

        other => return Err(ProtocolError::UnknownOpcode(other)),
    };

    if !r.is_exhausted() {
        return Err(ProtocolError::MalformedMessage(format!(
            "{} trailing bytes after opcode {opcode:#04x}",
            r.remaining()
        )));
    }
    Ok(command)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode::encode;

    #[test]
    fn unknown_opcode_is_reported() {
        let features = FeatureSet::negotiate(1098);
        let frame = Bytes::from_static(&[0x01]);
        assert!(matches!(
            decode(frame, &features),
            Err(ProtocolError::UnknownOpcode(0x01))
        ));
    }

    #[test]
    fn trailing_garbage_is_malformed() {
        let features = FeatureSet::negotiate(1098);
        let frame = Bytes::from_static(&[opcodes::PING, 0xFF]);
        assert!(matches!(
            decode(frame, &features),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn truncated_attack_is_malformed() {
        let features = FeatureSet::negotiate(1098);
        let frame = Bytes::from_static(&[opcodes::ATTACK, 0x01, 0x02]);
        assert!(matches!(
            decode(frame, &features),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn attack_seq_width_follows_capabilities() {
        let command = ClientCommand::Attack {
            creature_id: 0x10000042,
            seq: 9,
        };
        let with_seq = FeatureSet::negotiate(1098);
        let frame = encode(&command, &with_seq).unwrap();
        assert_eq!(frame.len(), 1 + 4 + 4);
        assert_eq!(decode(frame, &with_seq).unwrap(), command);

        let without_seq = FeatureSet::negotiate(800);
        let frame = encode(&command, &without_seq).unwrap();
        assert_eq!(frame.len(), 1 + 4);
        assert_eq!(
            decode(frame, &without_seq).unwrap(),
            ClientCommand::Attack {
                creature_id: 0x10000042,
                seq: 0,
            }
        );
    }
}
