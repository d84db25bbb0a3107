/// Best-effort playback commands, typically bound to UI buttons or keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Action {
    #[default]
    None,
    ToggleMute,
    VolumeDown,
    VolumeUp,
    PlayPause,
    Stop,
    SeekBackward,
    SeekForward,
}
