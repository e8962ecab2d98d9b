//! Collection and field names shared with the clients that read these
//! documents. They are part of the external contract and must not change.

use crate::db::models::{CollectionPath, DocPath};

pub const CHANNELS: &str = "channels";
pub const SUBSCRIBERS: &str = "subscribers";
pub const OPTIONS: &str = "options";
pub const VOTES: &str = "votes";
pub const USERS: &str = "users";
pub const SUBSCRIBED_CHANNELS: &str = "subscribed_channels";

pub const CHANNEL_ID_FIELD: &str = "channelId";
pub const CHANNEL_NAME_FIELD: &str = "channelName";
pub const CURRENT_ALARM_FIELD: &str = "currentAlarm";
pub const TIME_FIELD: &str = "time";
pub const VOTES_FIELD: &str = "votes";
pub const HAS_VOTED_FIELD: &str = "hasVoted";

/// `channels/{channel_id}`
pub fn channel(channel_id: &str) -> DocPath {
    DocPath::from_segments(&[CHANNELS, channel_id])
}

/// `channels/{channel_id}/options`
pub fn options(channel_id: &str) -> CollectionPath {
    channel(channel_id).collection(OPTIONS)
}

/// `channels/{channel_id}/votes`
pub fn votes(channel_id: &str) -> CollectionPath {
    channel(channel_id).collection(VOTES)
}

/// `channels/{channel_id}/votes/{user_id}`
pub fn vote(channel_id: &str, user_id: &str) -> DocPath {
    votes(channel_id).doc(user_id)
}

/// `channels/{channel_id}/subscribers/{user_id}`
pub fn subscriber(channel_id: &str, user_id: &str) -> DocPath {
    channel(channel_id).collection(SUBSCRIBERS).doc(user_id)
}

/// `users/{user_id}/subscribed_channels/{channel_id}`
pub fn subscription(user_id: &str, channel_id: &str) -> DocPath {
    DocPath::from_segments(&[USERS, user_id, SUBSCRIBED_CHANNELS, channel_id])
}
