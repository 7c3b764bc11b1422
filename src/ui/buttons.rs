use serenity::{
    all::ButtonStyle,
    builder::{CreateActionRow, CreateButton},
};

/// Something a listener can do from a now-playing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Skip,
    ShowQueue,
}

/// Custom ids carried by the buttons. Anything not listed here is ignored.
const CONTROLS: &[(&str, ControlAction)] = &[
    ("player/skip", ControlAction::Skip),
    ("player/queue", ControlAction::ShowQueue),
];

impl ControlAction {
    pub fn from_custom_id(custom_id: &str) -> Option<Self> {
        CONTROLS
            .iter()
            .find(|(id, _)| *id == custom_id)
            .map(|(_, action)| *action)
    }

    pub fn custom_id(self) -> &'static str {
        CONTROLS
            .iter()
            .find(|(_, action)| *action == self)
            .map(|(id, _)| *id)
            .unwrap_or_default()
    }

    fn button(self) -> CreateButton {
        let button = CreateButton::new(self.custom_id());
        match self {
            Self::Skip => button.label("Skip").emoji('⏭').style(ButtonStyle::Primary),
            Self::ShowQueue => button.label("Queue").emoji('📋').style(ButtonStyle::Secondary),
        }
    }
}

/// Button row attached to now-playing messages.
pub fn player_controls() -> CreateActionRow {
    CreateActionRow::Buttons(vec![ControlAction::Skip.button(), ControlAction::ShowQueue.button()])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_ids_map_back_to_actions() {
        for action in [ControlAction::Skip, ControlAction::ShowQueue] {
            assert_eq!(ControlAction::from_custom_id(action.custom_id()), Some(action));
        }
    }

    #[test]
    fn unknown_ids_are_ignored() {
        assert_eq!(ControlAction::from_custom_id("music_skip"), None);
        assert_eq!(ControlAction::from_custom_id(""), None);
    }

    #[test]
    fn controls_row_carries_both_buttons() {
        let value = serde_json::to_value(player_controls()).unwrap();
        let ids: Vec<_> = value["components"]
            .as_array()
            .unwrap()
            .iter()
            .map(|button| button["custom_id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(ids, vec!["player/skip", "player/queue"]);
    }
}
