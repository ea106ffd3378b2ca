//! External events delivered to event-sink and item nodes.

/// Discrete navigation actions an observer can send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Activate,
    Up,
    Down,
    Left,
    Right,
    PageUp,
    PageDown,
    Top,
    Bottom,
    Back,
    Forward,
    Menu,
    Select,
    Close,
    Stop,
    PlayPause,
    Next,
    Previous,
    Reload,
}

impl Action {
    /// Script-visible name of the action, matched against `onEvent` names.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::Activate => "activate",
            Action::Up => "up",
            Action::Down => "down",
            Action::Left => "left",
            Action::Right => "right",
            Action::PageUp => "pageUp",
            Action::PageDown => "pageDown",
            Action::Top => "top",
            Action::Bottom => "bottom",
            Action::Back => "back",
            Action::Forward => "forward",
            Action::Menu => "menu",
            Action::Select => "select",
            Action::Close => "close",
            Action::Stop => "stop",
            Action::PlayPause => "playpause",
            Action::Next => "next",
            Action::Previous => "previous",
            Action::Reload => "reload",
        }
    }
}

/// An event sent by an observer to a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// One or more discrete action codes.
    ActionVector(Vec<Action>),
    /// A single action identified by name.
    DynamicAction(String),
    /// Anything else; never matched against handlers.
    Other(String),
}

impl Event {
    pub fn action(action: Action) -> Self {
        Event::ActionVector(vec![action])
    }

    pub fn dynamic(name: impl Into<String>) -> Self {
        Event::DynamicAction(name.into())
    }

    /// Action names carried by this event, in delivery order.
    pub fn action_names(&self) -> Vec<&str> {
        match self {
            Event::ActionVector(actions) => actions.iter().map(|a| a.as_str()).collect(),
            Event::DynamicAction(name) => vec![name.as_str()],
            Event::Other(_) => Vec::new(),
        }
    }
}
