//! Outbound command model.
//!
//! [`ClientCommand`] carries one variant per client-to-server packet, with
//! the fields the packet needs in host terms. The capability-conditioned
//! byte layout lives in [`super::encode`] and [`super::decode`]; the login
//! packet is the one outbound frame not modeled here because its encrypted
//! regions make it one-way (see [`super::encode::encode_login`]).

use crate::protocol::types::{
    ChaseMode, Direction, FightMode, MessageMode, Outfit, Position, PvpMode,
};

/// A single client-to-server packet, pre-encoding.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientCommand {
    EnterGame,
    LeaveGame,
    Ping,
    PingBack,
    /// Keepalive probe of the extended scheme. `local_ping` is the last
    /// measured round trip, `frame_rate` a smoothness hint for the server.
    NewPing {
        ping_id: u32,
        local_ping: u16,
        frame_rate: u16,
    },
    ExtendedOpcode {
        opcode: u8,
        buffer: String,
    },
    ChangeMapAwareRange {
        x_range: u8,
        y_range: u8,
    },

    AutoWalk {
        path: Vec<Direction>,
    },
    Walk {
        direction: Direction,
    },
    Stop,
    Turn {
        direction: Direction,
    },
    /// Rewritten walking scheme: the full path plus the sequencing state
    /// the server needs to reconcile prediction.
    NewWalk {
        walk_id: u32,
        prediction_id: u32,
        origin: Position,
        flags: u8,
        path: Vec<Direction>,
    },

    EquipItem {
        item_id: u16,
        count: u16,
    },
    Move {
        from: Position,
        thing_id: u16,
        stack_pos: u8,
        to: Position,
        count: u16,
    },
    UseItem {
        position: Position,
        item_id: u16,
        stack_pos: u8,
        index: u8,
    },
    UseItemWith {
        from: Position,
        item_id: u16,
        from_stack_pos: u8,
        to: Position,
        to_thing_id: u16,
        to_stack_pos: u8,
    },
    UseOnCreature {
        position: Position,
        item_id: u16,
        stack_pos: u8,
        creature_id: u32,
    },
    RotateItem {
        position: Position,
        item_id: u16,
        stack_pos: u8,
    },
    WrapItem {
        position: Position,
        item_id: u16,
        stack_pos: u8,
    },

    CloseContainer {
        container_id: u8,
    },
    UpContainer {
        container_id: u8,
    },
    RefreshContainer {
        container_id: u8,
    },
    SeekInContainer {
        container_id: u8,
        index: u16,
    },
    BrowseField {
        position: Position,
    },

    EditText {
        id: u32,
        text: String,
    },
    EditList {
        list_id: u8,
        id: u32,
        text: String,
    },

    Look {
        position: Position,
        thing_id: u16,
        stack_pos: u8,
    },
    LookCreature {
        creature_id: u32,
    },

    /// `position` and `direction` only reach the wire when the rewritten
    /// walking scheme is negotiated, where the server wants the caster's
    /// tile and facing alongside the text.
    Talk {
        mode: MessageMode,
        channel_id: u16,
        receiver: String,
        text: String,
        position: Position,
        direction: Direction,
    },
    RequestChannels,
    JoinChannel {
        channel_id: u16,
    },
    LeaveChannel {
        channel_id: u16,
    },
    OpenPrivateChannel {
        receiver: String,
    },
    OpenOwnChannel,
    InviteToOwnChannel {
        name: String,
    },
    ExcludeFromOwnChannel {
        name: String,
    },
    CloseNpcChannel,

    ChangeFightModes {
        fight: FightMode,
        chase: ChaseMode,
        safe_fight: bool,
        pvp: PvpMode,
    },
    Attack {
        creature_id: u32,
        seq: u32,
    },
    Follow {
        creature_id: u32,
        seq: u32,
    },
    CancelAttackAndFollow,

    InviteToParty {
        creature_id: u32,
    },
    JoinParty {
        creature_id: u32,
    },
    RevokePartyInvitation {
        creature_id: u32,
    },
    PassPartyLeadership {
        creature_id: u32,
    },
    LeaveParty,
    ShareExperience {
        active: bool,
    },

    InspectNpcTrade {
        item_id: u16,
        count: u16,
    },
    BuyItem {
        item_id: u16,
        sub_type: u8,
        amount: u8,
        ignore_capacity: bool,
        buy_with_backpack: bool,
    },
    SellItem {
        item_id: u16,
        sub_type: u8,
        amount: u16,
        ignore_equipped: bool,
    },
    CloseNpcTrade,
    RequestTrade {
        position: Position,
        thing_id: u16,
        stack_pos: u8,
        creature_id: u32,
    },
    InspectTrade {
        counter_offer: bool,
        index: u8,
    },
    AcceptTrade,
    RejectTrade,

    RequestOutfit,
    ChangeOutfit {
        outfit: Outfit,
    },
    /// Per-extension enable bytes; only the extensions the capability set
    /// names reach the wire.
    OutfitExtensions {
        mount: u8,
        wings: u8,
        aura: u8,
        shader: u8,
        health_bar: u8,
        mana_bar: u8,
    },

    ApplyImbuement {
        slot: u8,
        imbuement_id: u32,
        protection_charm: bool,
    },
    ClearImbuement {
        slot: u8,
    },
    CloseImbuingWindow,

    AddVip {
        name: String,
    },
    RemoveVip {
        player_id: u32,
    },
    EditVip {
        player_id: u32,
        description: String,
        icon_id: u32,
        notify_login: bool,
    },

    BugReport {
        comment: String,
    },
    RuleViolation {
        target: String,
        reason: u8,
        action: u8,
        comment: String,
        statement: String,
        statement_id: u16,
        ip_banishment: bool,
    },
    NewRuleViolation {
        reason: u8,
        action: u8,
        character_name: String,
        comment: String,
        translation: String,
    },
    DebugReport {
        what: String,
        signature: String,
        date: String,
        description: String,
    },

    RequestQuestLog,
    RequestQuestLine {
        quest_id: u16,
    },
    RequestItemInfo {
        item_id: u16,
        sub_type: u8,
        index: u8,
    },
    AnswerModalDialog {
        dialog_id: u32,
        button: u8,
        choice: u8,
    },

    OpenStore {
        service_type: u8,
    },
    RequestStoreOffers {
        category_name: String,
        service_type: u8,
    },
    BuyStoreOffer {
        offer_id: u32,
        product_type: u8,
        name: String,
    },
    OpenTransactionHistory {
        entries_per_page: u8,
    },
    RequestTransactionHistory {
        page: u32,
        entries_per_page: u32,
    },
    TransferCoins {
        recipient: String,
        amount: u16,
    },

    PreyAction {
        slot: u8,
        action_type: u8,
        index: u16,
    },
    PreyRequest,

    UpdateAutoLoot {
        client_id: u16,
        name: String,
        remove: bool,
    },

    OpenRuleViolation {
        reporter: String,
    },
    CloseRuleViolation {
        reporter: String,
    },
    CancelRuleViolation,
}
