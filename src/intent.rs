//! Desired subscription state.
//!
//! A [`SubscriptionIntent`] is the set of notification categories the user
//! wants pushed. The empty set is the only value meaning "no subscription".

use serde::Serialize;

/// Notification categories requested for push delivery.
///
/// Encoded on the wire (the relay callback path) as a bitmask:
/// boost = 1, favourite = 2, follow = 4, mention = 8.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct SubscriptionIntent {
    /// Boosts (reblogs) of the user's posts.
    pub boost: bool,
    /// Favourites of the user's posts.
    pub favourite: bool,
    /// New followers.
    pub follow: bool,
    /// Mentions.
    pub mention: bool,
}

impl SubscriptionIntent {
    /// Intent that wants no subscription at all.
    pub const NONE: Self = Self {
        boost: false,
        favourite: false,
        follow: false,
        mention: false,
    };

    /// Build an intent from the four account notification settings.
    pub fn new(boost: bool, favourite: bool, follow: bool, mention: bool) -> Self {
        Self {
            boost,
            favourite,
            follow,
            mention,
        }
    }

    /// Bitmask used in the relay callback path.
    pub fn flags(self) -> u8 {
        u8::from(self.boost)
            | u8::from(self.favourite) << 1
            | u8::from(self.follow) << 2
            | u8::from(self.mention) << 3
    }

    /// Inverse of [`flags`](Self::flags); bits above the fourth are ignored.
    pub fn from_flags(flags: u8) -> Self {
        Self {
            boost: flags & 1 != 0,
            favourite: flags & 2 != 0,
            follow: flags & 4 != 0,
            mention: flags & 8 != 0,
        }
    }

    /// Whether no category is requested, i.e. the subscription should not exist.
    pub fn is_empty(self) -> bool {
        self.flags() == 0
    }

    /// Per-category alert switches sent to the server.
    pub fn alerts(self) -> Alerts {
        Alerts {
            follow: self.follow,
            favourite: self.favourite,
            reblog: self.boost,
            mention: self.mention,
        }
    }
}

/// `data.alerts` object of the subscription POST body.
///
/// The server calls boosts "reblog".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Alerts {
    /// Follow notifications.
    pub follow: bool,
    /// Favourite notifications.
    pub favourite: bool,
    /// Reblog (boost) notifications.
    pub reblog: bool,
    /// Mention notifications.
    pub mention: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_bits() {
        assert_eq!(SubscriptionIntent::new(true, false, false, false).flags(), 1);
        assert_eq!(SubscriptionIntent::new(false, true, false, false).flags(), 2);
        assert_eq!(SubscriptionIntent::new(false, false, true, false).flags(), 4);
        assert_eq!(SubscriptionIntent::new(false, false, false, true).flags(), 8);
        assert_eq!(SubscriptionIntent::new(true, true, true, true).flags(), 15);
    }

    #[test]
    fn test_only_all_false_is_empty() {
        assert!(SubscriptionIntent::NONE.is_empty());
        assert!(SubscriptionIntent::default().is_empty());
        for flags in 1..16 {
            assert!(!SubscriptionIntent::from_flags(flags).is_empty());
        }
    }

    #[test]
    fn test_from_flags_inverts_flags() {
        for flags in 0..16 {
            assert_eq!(SubscriptionIntent::from_flags(flags).flags(), flags);
        }
    }

    #[test]
    fn test_alerts_rename_boost_to_reblog() {
        let alerts = SubscriptionIntent::new(true, false, true, false).alerts();
        let json = serde_json::to_value(alerts).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "follow": true,
                "favourite": false,
                "reblog": true,
                "mention": false
            })
        );
    }
}
