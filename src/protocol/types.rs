//! Shared protocol value types: positions, directions, combat modes,
//! message modes, outfits, VIP records, login credentials.

/// Map coordinate. `z` is the floor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Position {
    pub x: u16,
    pub y: u16,
    pub z: u8,
}

impl Position {
    pub fn new(x: u16, y: u16, z: u8) -> Self {
        Self { x, y, z }
    }

    /// The adjacent tile one step in `direction`, saturating at map edges.
    pub fn stepped(&self, direction: Direction) -> Position {
        let (dx, dy): (i32, i32) = match direction {
            Direction::North => (0, -1),
            Direction::East => (1, 0),
            Direction::South => (0, 1),
            Direction::West => (-1, 0),
            Direction::NorthEast => (1, -1),
            Direction::SouthEast => (1, 1),
            Direction::SouthWest => (-1, 1),
            Direction::NorthWest => (-1, -1),
            Direction::Invalid => (0, 0),
        };
        Position {
            x: (self.x as i32 + dx).clamp(0, u16::MAX as i32) as u16,
            y: (self.y as i32 + dy).clamp(0, u16::MAX as i32) as u16,
            z: self.z,
        }
    }
}

/// Walking / facing direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    East,
    South,
    West,
    NorthEast,
    SouthEast,
    SouthWest,
    NorthWest,
    /// Unknown direction; encodes as 0 on the wire.
    Invalid,
}

impl Direction {
    /// Exact wire mapping used by walk paths. Must never change:
    /// East=1, NorthEast=2, North=3, NorthWest=4, West=5, SouthWest=6,
    /// South=7, SouthEast=8, anything else 0.
    pub fn wire_byte(self) -> u8 {
        match self {
            Direction::East => 1,
            Direction::NorthEast => 2,
            Direction::North => 3,
            Direction::NorthWest => 4,
            Direction::West => 5,
            Direction::SouthWest => 6,
            Direction::South => 7,
            Direction::SouthEast => 8,
            Direction::Invalid => 0,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Direction {
        match byte {
            1 => Direction::East,
            2 => Direction::NorthEast,
            3 => Direction::North,
            4 => Direction::NorthWest,
            5 => Direction::West,
            6 => Direction::SouthWest,
            7 => Direction::South,
            8 => Direction::SouthEast,
            _ => Direction::Invalid,
        }
    }

    /// Collapsed 4-bucket mapping appended to talk packets under the new
    /// walking capability: {E, NE, SE}→1, {N}→3, {SW, NW, W}→5, {S}→7,
    /// else 0.
    pub fn collapsed_byte(self) -> u8 {
        match self {
            Direction::East | Direction::NorthEast | Direction::SouthEast => 1,
            Direction::North => 3,
            Direction::SouthWest | Direction::NorthWest | Direction::West => 5,
            Direction::South => 7,
            Direction::Invalid => 0,
        }
    }

    pub fn from_collapsed_byte(byte: u8) -> Direction {
        match byte {
            1 => Direction::East,
            3 => Direction::North,
            5 => Direction::West,
            7 => Direction::South,
            _ => Direction::Invalid,
        }
    }
}

/// Attack stance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FightMode {
    Offensive,
    Balanced,
    Defensive,
}

impl FightMode {
    pub fn wire_byte(self) -> u8 {
        match self {
            FightMode::Offensive => 1,
            FightMode::Balanced => 2,
            FightMode::Defensive => 3,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(FightMode::Offensive),
            2 => Some(FightMode::Balanced),
            3 => Some(FightMode::Defensive),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChaseMode {
    DontChase,
    ChaseOpponent,
}

impl ChaseMode {
    pub fn wire_byte(self) -> u8 {
        match self {
            ChaseMode::DontChase => 0,
            ChaseMode::ChaseOpponent => 1,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(ChaseMode::DontChase),
            1 => Some(ChaseMode::ChaseOpponent),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PvpMode {
    WhiteDove,
    WhiteHand,
    YellowHand,
    RedFist,
}

impl PvpMode {
    pub fn wire_byte(self) -> u8 {
        match self {
            PvpMode::WhiteDove => 0,
            PvpMode::WhiteHand => 1,
            PvpMode::YellowHand => 2,
            PvpMode::RedFist => 3,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            0 => Some(PvpMode::WhiteDove),
            1 => Some(PvpMode::WhiteHand),
            2 => Some(PvpMode::YellowHand),
            3 => Some(PvpMode::RedFist),
            _ => None,
        }
    }
}

/// How a talk packet is addressed. Private modes carry a receiver name,
/// channel modes a channel id, the rest neither.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageMode {
    Say,
    Whisper,
    Yell,
    PrivateTo,
    GamemasterPrivateTo,
    RuleViolationAnswer,
    Channel,
    ChannelHighlight,
    ChannelManagement,
    GamemasterChannel,
    NpcTo,
}

impl MessageMode {
    pub fn wire_byte(self) -> u8 {
        match self {
            MessageMode::Say => 1,
            MessageMode::Whisper => 2,
            MessageMode::Yell => 3,
            MessageMode::PrivateTo => 4,
            MessageMode::GamemasterPrivateTo => 5,
            MessageMode::RuleViolationAnswer => 6,
            MessageMode::Channel => 7,
            MessageMode::ChannelHighlight => 8,
            MessageMode::ChannelManagement => 9,
            MessageMode::GamemasterChannel => 10,
            MessageMode::NpcTo => 11,
        }
    }

    pub fn from_wire_byte(byte: u8) -> Option<Self> {
        match byte {
            1 => Some(MessageMode::Say),
            2 => Some(MessageMode::Whisper),
            3 => Some(MessageMode::Yell),
            4 => Some(MessageMode::PrivateTo),
            5 => Some(MessageMode::GamemasterPrivateTo),
            6 => Some(MessageMode::RuleViolationAnswer),
            7 => Some(MessageMode::Channel),
            8 => Some(MessageMode::ChannelHighlight),
            9 => Some(MessageMode::ChannelManagement),
            10 => Some(MessageMode::GamemasterChannel),
            11 => Some(MessageMode::NpcTo),
            _ => None,
        }
    }

    /// Private modes address a named receiver.
    pub fn addresses_receiver(self) -> bool {
        matches!(
            self,
            MessageMode::PrivateTo
                | MessageMode::GamemasterPrivateTo
                | MessageMode::RuleViolationAnswer
        )
    }

    /// Channel modes address a numeric channel.
    pub fn addresses_channel(self) -> bool {
        matches!(
            self,
            MessageMode::Channel
                | MessageMode::ChannelHighlight
                | MessageMode::ChannelManagement
                | MessageMode::GamemasterChannel
        )
    }
}

/// Character appearance. Which fields reach the wire depends on the
/// negotiated outfit capabilities.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Outfit {
    pub id: u16,
    pub head: u8,
    pub body: u8,
    pub legs: u8,
    pub feet: u8,
    pub addons: u8,
    pub mount: u16,
    pub wings: u16,
    pub aura: u16,
    pub shader: String,
    pub health_bar: u16,
    pub mana_bar: u16,
}

/// VIP list entry, keyed externally by the player id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VipEntry {
    pub name: String,
    pub status: VipStatus,
    pub description: String,
    pub icon_id: u32,
    pub notify_login: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VipStatus {
    Offline,
    Online,
    Pending,
}

impl VipStatus {
    pub fn from_wire_byte(byte: u8) -> VipStatus {
        match byte {
            1 => VipStatus::Online,
            2 => VipStatus::Pending,
            _ => VipStatus::Offline,
        }
    }
}

/// Operating system identifier sent in the login packet. A custom numeric
/// override from configuration takes precedence over the detected value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientOs {
    Windows,
    Linux,
    Mac,
    Android,
    Ios,
    Web,
}

impl ClientOs {
    pub fn wire_code(self) -> u16 {
        match self {
            ClientOs::Windows => 20,
            ClientOs::Linux => 21,
            ClientOs::Mac => 22,
            ClientOs::Android => 23,
            ClientOs::Ios => 24,
            ClientOs::Web => 25,
        }
    }
}

/// Everything a login attempt needs. Either `session_key` or the
/// account/password pair is consulted, depending on the negotiated
/// capability set.
#[derive(Debug, Clone, Default)]
pub struct Credentials {
    pub account_name: String,
    pub password: String,
    pub character_name: String,
    pub authenticator_token: String,
    pub session_key: String,
    pub world_name: String,
    pub world_host: String,
    pub world_port: u16,
}

/// Host identification block for the optional second RSA region of the
/// login packet.
#[derive(Debug, Clone, Default)]
pub struct HostIdentifiers {
    pub user_name: String,
    pub cpu_name: String,
    pub memory_mb: u32,
    pub macs: Vec<String>,
}
