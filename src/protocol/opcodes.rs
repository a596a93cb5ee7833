//! Client-to-server wire opcodes.
//!
//! One table, one byte per outbound packet. The direction-carrying walk and
//! turn packets use one opcode per direction rather than a direction field.

pub const LOGIN: u8 = 0x0A;
pub const ENTER_GAME: u8 = 0x0F;
pub const LEAVE_GAME: u8 = 0x14;
pub const PING: u8 = 0x1D;
pub const PING_BACK: u8 = 0x1E;
pub const NEW_PING: u8 = 0x1F;

pub const EXTENDED_OPCODE: u8 = 0x32;
pub const CHANGE_MAP_AWARE_RANGE: u8 = 0x33;
pub const NEW_WALK: u8 = 0x3A;
pub const UPDATE_AUTO_LOOT: u8 = 0x3B;

pub const AUTO_WALK: u8 = 0x64;
pub const WALK_NORTH: u8 = 0x65;
pub const WALK_EAST: u8 = 0x66;
pub const WALK_SOUTH: u8 = 0x67;
pub const WALK_WEST: u8 = 0x68;
pub const STOP: u8 = 0x69;
pub const WALK_NORTH_EAST: u8 = 0x6A;
pub const WALK_SOUTH_EAST: u8 = 0x6B;
pub const WALK_SOUTH_WEST: u8 = 0x6C;
pub const WALK_NORTH_WEST: u8 = 0x6D;
pub const TURN_NORTH: u8 = 0x6F;
pub const TURN_EAST: u8 = 0x70;
pub const TURN_SOUTH: u8 = 0x71;
pub const TURN_WEST: u8 = 0x72;

pub const EQUIP_ITEM: u8 = 0x77;
pub const MOVE: u8 = 0x78;
pub const INSPECT_NPC_TRADE: u8 = 0x79;
pub const BUY_ITEM: u8 = 0x7A;
pub const SELL_ITEM: u8 = 0x7B;
pub const CLOSE_NPC_TRADE: u8 = 0x7C;
pub const REQUEST_TRADE: u8 = 0x7D;
pub const INSPECT_TRADE: u8 = 0x7E;
pub const ACCEPT_TRADE: u8 = 0x7F;
pub const REJECT_TRADE: u8 = 0x80;
pub const USE_ITEM: u8 = 0x82;
pub const USE_ITEM_WITH: u8 = 0x83;
pub const USE_ON_CREATURE: u8 = 0x84;
pub const ROTATE_ITEM: u8 = 0x85;
pub const CLOSE_CONTAINER: u8 = 0x87;
pub const UP_CONTAINER: u8 = 0x88;
pub const EDIT_TEXT: u8 = 0x89;
pub const EDIT_LIST: u8 = 0x8A;
pub const WRAP_ITEM: u8 = 0x8B;
pub const LOOK: u8 = 0x8C;
pub const LOOK_CREATURE: u8 = 0x8D;

pub const TALK: u8 = 0x96;
pub const REQUEST_CHANNELS: u8 = 0x97;
pub const JOIN_CHANNEL: u8 = 0x98;
pub const LEAVE_CHANNEL: u8 = 0x99;
pub const OPEN_PRIVATE_CHANNEL: u8 = 0x9A;
pub const OPEN_RULE_VIOLATION: u8 = 0x9B;
pub const CLOSE_RULE_VIOLATION: u8 = 0x9C;
pub const CANCEL_RULE_VIOLATION: u8 = 0x9D;
pub const CLOSE_NPC_CHANNEL: u8 = 0x9E;

pub const CHANGE_FIGHT_MODES: u8 = 0xA0;
pub const ATTACK: u8 = 0xA1;
pub const FOLLOW: u8 = 0xA2;
pub const INVITE_TO_PARTY: u8 = 0xA3;
pub const JOIN_PARTY: u8 = 0xA4;
pub const REVOKE_PARTY_INVITATION: u8 = 0xA5;
pub const PASS_PARTY_LEADERSHIP: u8 = 0xA6;
pub const LEAVE_PARTY: u8 = 0xA7;
pub const SHARE_EXPERIENCE: u8 = 0xA8;
pub const OPEN_OWN_CHANNEL: u8 = 0xAA;
pub const INVITE_TO_OWN_CHANNEL: u8 = 0xAB;
pub const EXCLUDE_FROM_OWN_CHANNEL: u8 = 0xAC;

pub const CANCEL_ATTACK_AND_FOLLOW: u8 = 0xBE;

pub const REFRESH_CONTAINER: u8 = 0xCA;
pub const BROWSE_FIELD: u8 = 0xCB;
pub const SEEK_IN_CONTAINER: u8 = 0xCC;

pub const REQUEST_OUTFIT: u8 = 0xD2;
pub const CHANGE_OUTFIT: u8 = 0xD3;
pub const OUTFIT_EXTENSIONS: u8 = 0xD4;
pub const APPLY_IMBUEMENT: u8 = 0xD5;
pub const CLEAR_IMBUEMENT: u8 = 0xD6;
pub const CLOSE_IMBUING_WINDOW: u8 = 0xD7;
pub const ADD_VIP: u8 = 0xDC;
pub const REMOVE_VIP: u8 = 0xDD;
pub const EDIT_VIP: u8 = 0xDE;

pub const BUG_REPORT: u8 = 0xE6;
pub const RULE_VIOLATION: u8 = 0xE7;
pub const DEBUG_REPORT: u8 = 0xE8;
pub const PREY_ACTION: u8 = 0xEB;
pub const PREY_REQUEST: u8 = 0xEC;
pub const TRANSFER_COINS: u8 = 0xEF;

pub const REQUEST_QUEST_LOG: u8 = 0xF0;
pub const REQUEST_QUEST_LINE: u8 = 0xF1;
pub const NEW_RULE_VIOLATION: u8 = 0xF2;
pub const REQUEST_ITEM_INFO: u8 = 0xF3;
pub const ANSWER_MODAL_DIALOG: u8 = 0xF9;
pub const OPEN_STORE: u8 = 0xFA;
pub const REQUEST_STORE_OFFERS: u8 = 0xFB;
pub const BUY_STORE_OFFER: u8 = 0xFC;
pub const OPEN_TRANSACTION_HISTORY: u8 = 0xFD;
pub const REQUEST_TRANSACTION_HISTORY: u8 = 0xFE;
