//! # Feature Flag Registry
//!
//! Maps a negotiated protocol version to an immutable capability set.
//!
//! Every version-dependent branch in the codec and the session goes through
//! [`FeatureSet::has`]; no other module is allowed to compare raw protocol
//! version numbers. The version-to-flag assignment lives in one fixed,
//! version-ordered table ([`VERSION_TABLE`]) so the mapping is deterministic
//! and auditable in a single place.
//!
//! Some capabilities are not tied to a version range at all but are
//! advertised by the server during the pre-login exchange (extended pings,
//! the rewritten walking system, wide count fields, ...). Those are folded
//! in once via [`FeatureSet::negotiate_with`] and the set is immutable
//! afterwards.

use bitflags::bitflags;

bitflags! {
    /// Individual protocol capabilities.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct GameFeature: u64 {
        // Login packet layout
        const CLIENT_VERSION          = 1 << 0;
        const STRING_CLIENT_VERSION   = 1 << 1;
        const CONTENT_REVISION        = 1 << 2;
        const PREVIEW_STATE           = 1 << 3;
        const LOGIN_PACKET_ENCRYPTION = 1 << 4;
        const SESSION_KEY             = 1 << 5;
        const ACCOUNT_NAMES           = 1 << 6;
        const AUTHENTICATOR           = 1 << 7;
        const CHALLENGE_ON_LOGIN      = 1 << 8;
        const SEND_IDENTIFIERS        = 1 << 9;

        // Transport modes flipped after the login packet
        const PROTOCOL_CHECKSUM       = 1 << 10;
        const PACKET_COMPRESSION      = 1 << 11;
        const SEQUENCED_PACKETS       = 1 << 12;

        // Keepalive schemes
        const CLIENT_PING             = 1 << 13;
        const EXTENDED_CLIENT_PING    = 1 << 14;

        // Movement
        const NEW_WALKING             = 1 << 15;

        // Field widths and optional fields
        const WIDE_COUNT              = 1 << 16;
        const ATTACK_SEQ              = 1 << 17;
        const ID_BASED_ATTACK_SEQ     = 1 << 18;
        const LOOK_CREATURE           = 1 << 19;
        const PVP_MODE                = 1 << 20;
        const ADDITIONAL_VIP_INFO     = 1 << 21;
        const CONTAINER_PAGINATION    = 1 << 22;
        const BROWSE_FIELD            = 1 << 23;
        const CHANGE_MAP_AWARE_RANGE  = 1 << 24;
        const CATEGORIZED_BUG_REPORT  = 1 << 25;
        const LEGACY_SHARE_EXPERIENCE = 1 << 26;
        const STORE_HISTORY_U16_PAGE  = 1 << 27;
        const INGAME_STORE_SERVICE_TYPE = 1 << 28;
        const DOUBLE_SHOP_SELL_AMOUNT = 1 << 29;
        const USE_ON_CREATURE         = 1 << 30;

        // Outfit fields
        const LOOKTYPE_U16            = 1 << 31;
        const PLAYER_ADDONS           = 1 << 32;
        const PLAYER_MOUNTS           = 1 << 33;
        const WINGS_AND_AURA          = 1 << 34;
        const OUTFIT_SHADERS          = 1 << 35;
        const HEALTH_INFO_BACKGROUND  = 1 << 36;
        const OUTFIT_TYPE_BYTE        = 1 << 37;

        // Misc
        const EXTENDED_OPCODE         = 1 << 38;
        const BOT_PROTECTION          = 1 << 39;
    }
}

/// One row of the version table: a flag and the inclusive version range in
/// which it is active. `None` for the upper bound means "every later
/// version".
struct VersionRange {
    flag: GameFeature,
    from: u16,
    until: Option<u16>,
}

const fn row(flag: GameFeature, from: u16, until: Option<u16>) -> VersionRange {
    VersionRange { flag, from, until }
}

/// Fixed, version-ordered capability table. Thresholds follow the wire
/// history of the protocol family; flags not listed here are never derived
/// from a version and can only arrive as negotiated extras.
const VERSION_TABLE: &[VersionRange] = &[
    row(GameFeature::CHALLENGE_ON_LOGIN, 770, None),
    row(GameFeature::LOGIN_PACKET_ENCRYPTION, 770, None),
    row(GameFeature::BOT_PROTECTION, 770, None),
    row(GameFeature::PLAYER_ADDONS, 780, None),
    row(GameFeature::USE_ON_CREATURE, 780, None),
    row(GameFeature::LOOKTYPE_U16, 790, None),
    row(GameFeature::CLIENT_PING, 827, None),
    row(GameFeature::PROTOCOL_CHECKSUM, 830, None),
    row(GameFeature::ACCOUNT_NAMES, 830, None),
    row(GameFeature::ATTACK_SEQ, 862, None),
    row(GameFeature::PLAYER_MOUNTS, 870, None),
    row(GameFeature::LEGACY_SHARE_EXPERIENCE, 770, Some(909)),
    row(GameFeature::LOOK_CREATURE, 961, None),
    row(GameFeature::ID_BASED_ATTACK_SEQ, 963, None),
    row(GameFeature::ADDITIONAL_VIP_INFO, 963, None),
    row(GameFeature::CLIENT_VERSION, 971, None),
    row(GameFeature::CONTAINER_PAGINATION, 976, None),
    row(GameFeature::BROWSE_FIELD, 976, None),
    row(GameFeature::PVP_MODE, 1000, None),
    row(GameFeature::CATEGORIZED_BUG_REPORT, 1001, None),
    row(GameFeature::CONTENT_REVISION, 1036, None),
    row(GameFeature::PREVIEW_STATE, 1050, None),
    row(GameFeature::SESSION_KEY, 1074, None),
    row(GameFeature::AUTHENTICATOR, 1080, None),
    row(GameFeature::INGAME_STORE_SERVICE_TYPE, 1092, None),
    row(GameFeature::STORE_HISTORY_U16_PAGE, 770, Some(1096)),
    row(GameFeature::DOUBLE_SHOP_SELL_AMOUNT, 1100, None),
    row(GameFeature::OUTFIT_TYPE_BYTE, 1220, None),
    row(GameFeature::STRING_CLIENT_VERSION, 1240, None),
    row(GameFeature::PACKET_COMPRESSION, 1240, None),
];

/// Immutable set of capabilities for one negotiated session.
///
/// Constructed exactly once per session and never mutated afterwards; the
/// codec and the session borrow it read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeatureSet {
    protocol_version: u16,
    flags: GameFeature,
}

impl FeatureSet {
    /// Derive the capability set for a protocol version from the fixed
    /// version table. Deterministic and side-effect-free.
    pub fn negotiate(protocol_version: u16) -> Self {
        Self::negotiate_with(protocol_version, GameFeature::empty())
    }

    /// Like [`negotiate`](Self::negotiate), additionally folding in
    /// capabilities the server advertised out of band (extended pings, new
    /// walking, wide counts, ...). The result is still immutable.
    pub fn negotiate_with(protocol_version: u16, extras: GameFeature) -> Self {
        let mut flags = extras;
        for range in VERSION_TABLE {
            let active = protocol_version >= range.from
                && range.until.map_or(true, |until| protocol_version <= until);
            if active {
                flags |= range.flag;
            }
        }
        Self {
            protocol_version,
            flags,
        }
    }

    /// Single source of truth for every capability-gated branch.
    #[inline]
    pub fn has(&self, flag: GameFeature) -> bool {
        self.flags.contains(flag)
    }

    /// The protocol version this set was negotiated for. Carried as wire
    /// data (the login packet echoes it); never compared against elsewhere.
    pub fn protocol_version(&self) -> u16 {
        self.protocol_version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_ranges_are_inclusive() {
        let old = FeatureSet::negotiate(800);
        assert!(old.has(GameFeature::CHALLENGE_ON_LOGIN));
        assert!(old.has(GameFeature::LEGACY_SHARE_EXPERIENCE));
        assert!(!old.has(GameFeature::ACCOUNT_NAMES));
        assert!(!old.has(GameFeature::CLIENT_PING));

        let boundary = FeatureSet::negotiate(909);
        assert!(boundary.has(GameFeature::LEGACY_SHARE_EXPERIENCE));
        let past = FeatureSet::negotiate(910);
        assert!(!past.has(GameFeature::LEGACY_SHARE_EXPERIENCE));
    }

    #[test]
    fn modern_version_enables_session_key_stack() {
        let features = FeatureSet::negotiate(1100);
        assert!(features.has(GameFeature::SESSION_KEY));
        assert!(features.has(GameFeature::AUTHENTICATOR));
        assert!(features.has(GameFeature::ID_BASED_ATTACK_SEQ));
        assert!(features.has(GameFeature::PVP_MODE));
        assert!(!features.has(GameFeature::STORE_HISTORY_U16_PAGE));
    }

    #[test]
    fn extras_fold_in_and_stay_set() {
        let features = FeatureSet::negotiate_with(
            1098,
            GameFeature::NEW_WALKING | GameFeature::EXTENDED_CLIENT_PING,
        );
        assert!(features.has(GameFeature::NEW_WALKING));
        assert!(features.has(GameFeature::EXTENDED_CLIENT_PING));
        // extras never appear without being asked for
        assert!(!FeatureSet::negotiate(1098).has(GameFeature::NEW_WALKING));
    }

    #[test]
    fn negotiation_is_deterministic() {
        assert_eq!(FeatureSet::negotiate(1076), FeatureSet::negotiate(1076));
    }
}
