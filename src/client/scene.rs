// Scene tokens and the controller layout each one selects

use std::fmt;

pub const GAME_SELECTION: &str = "GameSelectionScene";
pub const TANK_MENU: &str = "TankMenuScene";
pub const ARENA: &str = "ArenaScene";
pub const TEAM_LOBBY: &str = "TeamLobbyScene";
pub const WINNER: &str = "WinnerScene";
pub const SETTINGS: &str = "SettingsScene";
pub const MAZE_MENU: &str = "MazeMenuScene";
pub const MAZE: &str = "MazeScene";
pub const MAZE_WINNER: &str = "MazeWinnerScene";
pub const MAZE_SETTINGS: &str = "MazeSettingsScene";
pub const SEQUENCE_MENU: &str = "SequenceMenuScene";
pub const SEQUENCE: &str = "SequenceScene";
pub const SEQUENCE_WINNER: &str = "SequenceWinnerScene";
pub const SEQUENCE_SETTINGS: &str = "SequenceSettingsScene";

/// Announced while the game is paused
pub const PAUSED: &str = "paused";

/// Every known token, in menu order
pub const ALL_SCENES: [&str; 15] = [
    GAME_SELECTION,
    TANK_MENU,
    TEAM_LOBBY,
    ARENA,
    WINNER,
    SETTINGS,
    MAZE_MENU,
    MAZE,
    MAZE_WINNER,
    MAZE_SETTINGS,
    SEQUENCE_MENU,
    SEQUENCE,
    SEQUENCE_WINNER,
    SEQUENCE_SETTINGS,
    PAUSED,
];

/// Control layout a phone shows
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerMode {
    /// Twin sticks + fire
    Arena,
    /// Stick + ready
    Lobby,
    /// D-pad + select
    Menu,
    Maze,
    /// Four coloured buttons
    Sequence,
}

impl fmt::Display for ControllerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ControllerMode::Arena => write!(f, "arena"),
            ControllerMode::Lobby => write!(f, "lobby"),
            ControllerMode::Menu => write!(f, "menu"),
            ControllerMode::Maze => write!(f, "maze"),
            ControllerMode::Sequence => write!(f, "sequence"),
        }
    }
}

/// What a controller renders for a given scene token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SceneLayout {
    pub mode: ControllerMode,
    pub label: &'static str,
    /// In-game scenes offer a pause/menu button
    pub show_menu_button: bool,
}

impl SceneLayout {
    /// Unknown tokens fall back to the menu layout with no label
    pub fn for_scene(scene: &str) -> Self {
        let (mode, label, show_menu_button) = match scene {
            PAUSED => (ControllerMode::Menu, "Paused", true),
            ARENA => (ControllerMode::Arena, "In Game", true),
            GAME_SELECTION => (ControllerMode::Menu, "Game Selection", false),
            TANK_MENU => (ControllerMode::Menu, "Tank Menu", false),
            WINNER => (ControllerMode::Menu, "Results", false),
            SETTINGS => (ControllerMode::Menu, "Settings", false),
            TEAM_LOBBY => (ControllerMode::Lobby, "Team Selection", false),
            MAZE_MENU => (ControllerMode::Menu, "Maze Menu", false),
            MAZE => (ControllerMode::Maze, "Maze Race", true),
            MAZE_WINNER => (ControllerMode::Menu, "Maze Results", false),
            MAZE_SETTINGS => (ControllerMode::Menu, "Maze Settings", false),
            SEQUENCE_MENU => (ControllerMode::Menu, "Sequence Menu", false),
            SEQUENCE => (ControllerMode::Sequence, "Sequence Challenge", true),
            SEQUENCE_WINNER => (ControllerMode::Menu, "Sequence Results", false),
            SEQUENCE_SETTINGS => (ControllerMode::Menu, "Sequence Settings", false),
            _ => (ControllerMode::Menu, "", false),
        };
        Self {
            mode,
            label,
            show_menu_button,
        }
    }
}

/// Token after `current` in `ALL_SCENES`, wrapping around
pub fn next_scene(current: Option<&str>) -> &'static str {
    let next = current
        .and_then(|scene| ALL_SCENES.iter().position(|s| *s == scene))
        .map_or(0, |i| (i + 1) % ALL_SCENES.len());
    ALL_SCENES[next]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_scenes_map_to_modes() {
        assert_eq!(SceneLayout::for_scene(ARENA).mode, ControllerMode::Arena);
        assert_eq!(SceneLayout::for_scene(TEAM_LOBBY).mode, ControllerMode::Lobby);
        assert_eq!(SceneLayout::for_scene(MAZE).label, "Maze Race");
        assert_eq!(SceneLayout::for_scene(SEQUENCE).mode, ControllerMode::Sequence);
        assert_eq!(SceneLayout::for_scene(WINNER).label, "Results");
    }

    #[test]
    fn test_paused_and_unknown() {
        let paused = SceneLayout::for_scene(PAUSED);
        assert_eq!(paused.mode, ControllerMode::Menu);
        assert_eq!(paused.label, "Paused");
        assert!(paused.show_menu_button);

        let unknown = SceneLayout::for_scene("BonusRoundScene");
        assert_eq!(unknown.mode, ControllerMode::Menu);
        assert_eq!(unknown.label, "");
        assert!(!unknown.show_menu_button);
        assert_eq!(unknown, SceneLayout::for_scene(""));
    }

    #[test]
    fn test_every_menu_scene_hides_menu_button() {
        for scene in ALL_SCENES.into_iter().filter(|s| *s != PAUSED) {
            let layout = SceneLayout::for_scene(scene);
            if layout.mode == ControllerMode::Menu {
                assert!(!layout.show_menu_button, "{}", scene);
            }
        }
    }

    #[test]
    fn test_next_scene_cycles() {
        assert_eq!(next_scene(None), GAME_SELECTION);
        assert_eq!(next_scene(Some(GAME_SELECTION)), TANK_MENU);
        assert_eq!(next_scene(Some(PAUSED)), GAME_SELECTION);
        assert_eq!(next_scene(Some("nope")), GAME_SELECTION);
    }
}
