// Per-chat notification settings and their translation.

use serde::{Deserialize, Serialize};

use crate::error::ClientError;
use crate::protocol::{api, wire};

/// Mute periods beyond this are treated as "forever".
pub const MAX_PRECISE_MUTE_FOR: i32 = 366 * 86_400;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationSound {
    #[default]
    Default,
    None,
    Ringtone(i64),
}

impl NotificationSound {
    /// External encoding: `-1` default, `0` silent, otherwise a ringtone.
    pub fn from_api(use_default_sound: bool, sound_id: i64) -> Self {
        match (use_default_sound, sound_id) {
            (true, _) | (false, -1) => Self::Default,
            (false, 0) => Self::None,
            (false, id) => Self::Ringtone(id),
        }
    }

    pub fn from_wire(sound: Option<wire::NotificationSound>) -> Self {
        match sound {
            None | Some(wire::NotificationSound::Default) => Self::Default,
            Some(wire::NotificationSound::None) => Self::None,
            Some(wire::NotificationSound::Ringtone { id }) => Self::Ringtone(id),
        }
    }

    pub fn is_default(self) -> bool {
        self == Self::Default
    }

    pub fn ringtone_id(self) -> i64 {
        match self {
            Self::Default => -1,
            Self::None => 0,
            Self::Ringtone(id) => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DialogNotificationSettings {
    pub use_default_mute_until: bool,
    pub mute_until: i32,
    pub sound: NotificationSound,
    pub use_default_show_preview: bool,
    pub show_preview: bool,
    pub silent_send_message: bool,
    pub use_default_disable_pinned_message_notifications: bool,
    pub disable_pinned_message_notifications: bool,
    pub use_default_disable_mention_notifications: bool,
    pub disable_mention_notifications: bool,
    pub is_synchronized: bool,
}

impl Default for DialogNotificationSettings {
    fn default() -> Self {
        Self {
            use_default_mute_until: true,
            mute_until: 0,
            sound: NotificationSound::Default,
            use_default_show_preview: true,
            show_preview: true,
            silent_send_message: false,
            use_default_disable_pinned_message_notifications: true,
            disable_pinned_message_notifications: false,
            use_default_disable_mention_notifications: true,
            disable_mention_notifications: false,
            is_synchronized: false,
        }
    }
}

/// Which sides a settings change has to reach.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NeedUpdate {
    pub need_update_server: bool,
    pub need_update_local: bool,
    pub are_changed: bool,
}

/// Absolute unix time until which a chat muted for `mute_for` seconds at
/// `now` stays muted.
pub fn get_mute_until(mute_for: i32, now: i32) -> i32 {
    if mute_for <= 0 {
        return 0;
    }
    if mute_for > MAX_PRECISE_MUTE_FOR || mute_for >= i32::MAX - now {
        return i32::MAX;
    }
    mute_for + now
}

/// Builds settings from a caller request; `silent_send_message` and a
/// default sound are kept from `old`.
pub fn from_api(
    settings: Option<api::ChatNotificationSettings>,
    old: &DialogNotificationSettings,
    now: i32,
) -> Result<DialogNotificationSettings, ClientError> {
    let settings = settings
        .ok_or_else(|| ClientError::validation("New notification settings must be non-empty"))?;

    let mute_until =
        if settings.use_default_mute_for { 0 } else { get_mute_until(settings.mute_for, now) };
    let mut sound = NotificationSound::from_api(settings.use_default_sound, settings.sound_id);
    if old.sound.is_default() && sound.is_default() {
        sound = old.sound;
    }

    Ok(DialogNotificationSettings {
        use_default_mute_until: settings.use_default_mute_for,
        mute_until,
        sound,
        use_default_show_preview: settings.use_default_show_preview,
        show_preview: settings.show_preview,
        silent_send_message: old.silent_send_message,
        use_default_disable_pinned_message_notifications: settings
            .use_default_disable_pinned_message_notifications,
        disable_pinned_message_notifications: settings.disable_pinned_message_notifications,
        use_default_disable_mention_notifications: settings.use_default_disable_mention_notifications,
        disable_mention_notifications: settings.disable_mention_notifications,
        is_synchronized: false,
    })
}

/// Builds settings from the server. Pinned/mention preferences exist only
/// locally and are carried over from `old`.
pub fn from_wire(
    settings: Option<wire::PeerNotifySettings>,
    old: Option<&DialogNotificationSettings>,
    now: i32,
) -> DialogNotificationSettings {
    let defaults = DialogNotificationSettings::default();
    let old = old.unwrap_or(&defaults);
    let local_only = DialogNotificationSettings {
        use_default_disable_pinned_message_notifications: old
            .use_default_disable_pinned_message_notifications,
        disable_pinned_message_notifications: old.disable_pinned_message_notifications,
        use_default_disable_mention_notifications: old.use_default_disable_mention_notifications,
        disable_mention_notifications: old.disable_mention_notifications,
        ..defaults
    };

    let Some(settings) = settings else {
        return local_only;
    };

    let use_default_mute_until = settings.flags & wire::PeerNotifySettings::MUTE_UNTIL_MASK == 0;
    let use_default_show_preview =
        settings.flags & wire::PeerNotifySettings::SHOW_PREVIEWS_MASK == 0;
    let mute_until = if use_default_mute_until || settings.mute_until <= now {
        0
    } else {
        settings.mute_until
    };

    DialogNotificationSettings {
        use_default_mute_until,
        mute_until,
        sound: NotificationSound::from_wire(settings.sound),
        use_default_show_preview,
        show_preview: settings.show_previews,
        silent_send_message: settings.silent,
        is_synchronized: true,
        ..local_only
    }
}

pub fn are_default(settings: &DialogNotificationSettings, compare_sound: bool) -> bool {
    settings.use_default_mute_until
        && (!compare_sound || settings.sound.is_default())
        && settings.use_default_show_preview
        && settings.use_default_disable_pinned_message_notifications
        && settings.use_default_disable_mention_notifications
}

pub fn need_update(current: &DialogNotificationSettings, new: &DialogNotificationSettings) -> NeedUpdate {
    let need_update_server = current.mute_until != new.mute_until
        || current.sound != new.sound
        || current.show_preview != new.show_preview
        || current.use_default_mute_until != new.use_default_mute_until
        || current.use_default_show_preview != new.use_default_show_preview;
    let need_update_local = current.use_default_disable_pinned_message_notifications
        != new.use_default_disable_pinned_message_notifications
        || current.disable_pinned_message_notifications != new.disable_pinned_message_notifications
        || current.use_default_disable_mention_notifications
            != new.use_default_disable_mention_notifications
        || current.disable_mention_notifications != new.disable_mention_notifications;
    NeedUpdate {
        need_update_server,
        need_update_local,
        are_changed: need_update_server
            || need_update_local
            || current.is_synchronized != new.is_synchronized,
    }
}

/// External view; `mute_for` counts down from `now`.
pub fn to_api(settings: &DialogNotificationSettings, now: i32) -> api::ChatNotificationSettings {
    api::ChatNotificationSettings {
        use_default_mute_for: settings.use_default_mute_until,
        mute_for: settings.mute_until.saturating_sub(now).max(0),
        use_default_sound: settings.sound.is_default(),
        sound_id: settings.sound.ringtone_id(),
        use_default_show_preview: settings.use_default_show_preview,
        show_preview: settings.show_preview,
        use_default_disable_pinned_message_notifications: settings
            .use_default_disable_pinned_message_notifications,
        disable_pinned_message_notifications: settings.disable_pinned_message_notifications,
        use_default_disable_mention_notifications: settings.use_default_disable_mention_notifications,
        disable_mention_notifications: settings.disable_mention_notifications,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOW: i32 = 1_700_000_000;

    #[test]
    fn mute_until_caps_long_periods() {
        assert_eq!(get_mute_until(0, NOW), 0);
        assert_eq!(get_mute_until(-5, NOW), 0);
        assert_eq!(get_mute_until(3600, NOW), NOW + 3600);
        assert_eq!(get_mute_until(MAX_PRECISE_MUTE_FOR + 1, NOW), i32::MAX);
        assert_eq!(get_mute_until(i32::MAX - NOW, NOW), i32::MAX);
    }

    #[test]
    fn missing_request_settings_is_validation_error() {
        let err = from_api(None, &DialogNotificationSettings::default(), NOW)
            .expect_err("empty settings should fail");
        assert_eq!(err.message(), "New notification settings must be non-empty");
    }

    #[test]
    fn request_keeps_silent_flag_from_old_settings() {
        let old = DialogNotificationSettings { silent_send_message: true, ..Default::default() };
        let request = api::ChatNotificationSettings {
            mute_for: 600,
            sound_id: 0,
            use_default_show_preview: true,
            ..Default::default()
        };
        let settings = from_api(Some(request), &old, NOW).expect("should convert");
        assert!(settings.silent_send_message);
        assert_eq!(settings.mute_until, NOW + 600);
        assert_eq!(settings.sound, NotificationSound::None);
    }

    #[test]
    fn server_settings_keep_local_only_preferences() {
        let old = DialogNotificationSettings {
            use_default_disable_mention_notifications: false,
            disable_mention_notifications: true,
            ..Default::default()
        };
        let remote = wire::PeerNotifySettings {
            flags: wire::PeerNotifySettings::MUTE_UNTIL_MASK,
            mute_until: NOW - 1,
            sound: Some(wire::NotificationSound::Ringtone { id: 77 }),
            ..Default::default()
        };
        let settings = from_wire(Some(remote), Some(&old), NOW);
        assert!(!settings.use_default_mute_until);
        assert_eq!(settings.mute_until, 0, "expired mute is dropped");
        assert!(settings.use_default_show_preview);
        assert_eq!(settings.sound, NotificationSound::Ringtone(77));
        assert!(settings.disable_mention_notifications);
        assert!(settings.is_synchronized);

        let absent = from_wire(None, Some(&old), NOW);
        assert!(absent.disable_mention_notifications);
        assert!(!absent.is_synchronized);
    }

    #[test]
    fn need_update_splits_server_and_local_changes() {
        let current = DialogNotificationSettings::default();
        assert!(are_default(&current, true));

        let local = DialogNotificationSettings { disable_pinned_message_notifications: true, ..current };
        let result = need_update(&current, &local);
        assert!(!result.need_update_server);
        assert!(result.need_update_local);
        assert!(result.are_changed);

        let server = DialogNotificationSettings { mute_until: NOW, ..current };
        assert!(need_update(&current, &server).need_update_server);
        assert_eq!(need_update(&current, &current), NeedUpdate::default());
    }

    #[test]
    fn external_view_counts_mute_down() {
        let settings = DialogNotificationSettings {
            use_default_mute_until: false,
            mute_until: NOW + 90,
            sound: NotificationSound::Ringtone(5),
            ..Default::default()
        };
        let view = to_api(&settings, NOW);
        assert_eq!(view.mute_for, 90);
        assert!(!view.use_default_sound);
        assert_eq!(view.sound_id, 5);
        assert_eq!(to_api(&settings, NOW + 1000).mute_for, 0);
    }
}
