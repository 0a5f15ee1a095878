//! Alarm and speaker settings.
//!
//! Manual alarms only behave once the baseline (automatic alarms off,
//! speaker unmuted, default volume) has been pushed; the session remembers
//! that it was done so it is sent once per session.

use serde_json::json;
use tracing::{debug, info, warn};

use crate::control::{CommandError, Dispatcher};
use crate::handshake::transport::DeviceTransport;
use crate::messages::CommandPayload;

pub const MAX_VOLUME: i32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AlarmBaseline {
    #[default]
    Uninitialized,
    BaselineSet,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmAction {
    Start,
    Stop,
}

impl AlarmAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlarmAction::Start => "start",
            AlarmAction::Stop => "stop",
        }
    }
}

pub fn baseline_command(volume: u8, alarm_type: u32) -> CommandPayload {
    CommandPayload::set()
        .with(
            "msg_alarm",
            "chn1_msg_alarm_info",
            json!({
                "sound_alarm_enabled": "off",
                "light_alarm_enabled": "off",
                "alarm_type": alarm_type.to_string(),
            }),
        )
        .with(
            "audio_config",
            "speaker",
            json!({
                "mute": "off",
                "system_volume": volume.to_string(),
            }),
        )
}

pub fn volume_command(volume: u8) -> CommandPayload {
    CommandPayload::set().with(
        "audio_config",
        "speaker",
        json!({ "system_volume": volume.to_string() }),
    )
}

pub fn sound_type_command(sound_id: u32) -> CommandPayload {
    CommandPayload::set().with(
        "msg_alarm",
        "chn1_msg_alarm_info",
        json!({ "alarm_type": sound_id.to_string() }),
    )
}

pub fn manual_alarm_command(action: AlarmAction) -> CommandPayload {
    CommandPayload::exec().with(
        "msg_alarm",
        "manual_msg_alarm",
        json!({ "action": action.as_str() }),
    )
}

pub fn test_audio_command(sound_id: u32) -> CommandPayload {
    CommandPayload::exec().with("usr_def_audio_alarm", "test_audio", json!({ "id": sound_id }))
}

pub struct AlarmController<'a, T> {
    dispatcher: &'a mut Dispatcher<T>,
}

impl<'a, T: DeviceTransport> AlarmController<'a, T> {
    pub fn new(dispatcher: &'a mut Dispatcher<T>) -> Self {
        Self { dispatcher }
    }

    pub fn baseline(&self) -> AlarmBaseline {
        self.dispatcher.session().baseline()
    }

    /// Pushes the baseline unless this session already did. The session only
    /// records it when the device answers `error_code == 0`.
    pub async fn ensure_baseline(&mut self) -> Result<(), CommandError> {
        if self.baseline() == AlarmBaseline::BaselineSet {
            return Ok(());
        }
        let defaults = &self.dispatcher.session().config().defaults;
        let payload = baseline_command(defaults.baseline_volume, defaults.baseline_alarm_type);
        self.dispatcher.execute(&payload).await?;
        self.dispatcher.session_mut().mark_baseline_set();
        info!("alarm baseline set");
        Ok(())
    }

    pub async fn set_volume(&mut self, volume: i32) -> Result<(), CommandError> {
        let volume = u8::try_from(volume)
            .ok()
            .filter(|v| i32::from(*v) <= MAX_VOLUME)
            .ok_or_else(|| {
                CommandError::Precondition(format!("volume {} outside 0..={}", volume, MAX_VOLUME))
            })?;
        self.dispatcher.execute(&volume_command(volume)).await?;
        debug!(volume, "speaker volume set");
        Ok(())
    }

    pub async fn set_alarm_sound_type(&mut self, sound_id: u32) -> Result<(), CommandError> {
        self.dispatcher.execute(&sound_type_command(sound_id)).await?;
        debug!(sound_id, "alarm sound type set");
        Ok(())
    }

    /// Starts or stops the manual alarm.
    ///
    /// `Start` also applies `volume` and `sound_id` first; failures of those
    /// two steps are logged and do not prevent the trigger. Only the trigger
    /// reply decides the result.
    pub async fn trigger_manual_alarm(
        &mut self,
        action: AlarmAction,
        sound_id: u32,
        volume: i32,
    ) -> Result<(), CommandError> {
        self.ensure_baseline().await?;

        if action == AlarmAction::Start {
            if let Err(err) = self.set_volume(volume).await {
                warn!(volume, error = %err, "could not set alarm volume");
            }
            if let Err(err) = self.set_alarm_sound_type(sound_id).await {
                warn!(sound_id, error = %err, "could not set alarm sound");
            }
        }

        self.dispatcher.execute(&manual_alarm_command(action)).await?;
        info!(action = action.as_str(), "manual alarm triggered");
        Ok(())
    }

    /// One-shot playback of a sound; needs no baseline.
    pub async fn test_audio(&mut self, sound_id: u32) -> Result<(), CommandError> {
        self.dispatcher.execute(&test_audio_command(sound_id)).await?;
        debug!(sound_id, "test playback requested");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn baseline_command_shape() {
        assert_eq!(
            baseline_command(10, 1).to_value(),
            json!({
                "msg_alarm": {
                    "chn1_msg_alarm_info": {
                        "sound_alarm_enabled": "off",
                        "light_alarm_enabled": "off",
                        "alarm_type": "1"
                    }
                },
                "audio_config": {"speaker": {"mute": "off", "system_volume": "10"}},
                "method": "set"
            })
        );
    }

    #[test]
    fn values_are_sent_as_strings() {
        assert_eq!(
            volume_command(55).to_value()["audio_config"]["speaker"]["system_volume"],
            "55"
        );
        assert_eq!(
            sound_type_command(3).to_value()["msg_alarm"]["chn1_msg_alarm_info"]["alarm_type"],
            "3"
        );
    }

    #[test]
    fn manual_and_test_commands_use_do() {
        let stop = manual_alarm_command(AlarmAction::Stop).to_value();
        assert_eq!(stop["method"], "do");
        assert_eq!(stop["msg_alarm"]["manual_msg_alarm"]["action"], "stop");
        let test = test_audio_command(101).to_value();
        assert_eq!(test["usr_def_audio_alarm"]["test_audio"]["id"], 101);
    }
}
