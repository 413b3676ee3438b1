//! Message dispatch and the trigger-action table.
//!
//! Pure logic, no I/O. [`handle_message`] maps one request onto
//! [`ControllerState`] and returns a [`Dispatch`]: either an immediate
//! response plus an optional [`Effect`] for the loop to carry out, or a
//! [`Job`] that answers the request itself once it has touched the disk.

use std::collections::HashMap;

use crate::ipc::protocol::{Message, PROTOCOL_VERSION, Status, UiEvent};
use crate::wallpaper::{Category, Resolution};

use super::state::{ConnectionId, ControllerState};

/// A trigger the UI collaborator can fire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Change(Category),
    ForceHighDefinition,
    SaveCurrent,
    ClearCache,
}

impl Action {
    /// Wire identifier, e.g. `change:nature`.
    pub fn id(self) -> String {
        match self {
            Action::Change(category) => format!("change:{}", category.keyword()),
            Action::ForceHighDefinition => "force-hd".into(),
            Action::SaveCurrent => "save".into(),
            Action::ClearCache => "clear-cache".into(),
        }
    }

    pub fn all() -> impl Iterator<Item = Action> {
        Category::ALL
            .into_iter()
            .map(Action::Change)
            .chain([
                Action::ForceHighDefinition,
                Action::SaveCurrent,
                Action::ClearCache,
            ])
    }
}

/// Side effect the loop performs after sending the response.
#[derive(Debug, PartialEq)]
pub enum Effect {
    /// State is already `Loading(category)`; spawn the worker.
    StartChange(Category),
    Post(UiEvent),
}

/// Background filesystem work that owns the reply to request `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    Save { id: u32 },
    Clear { id: u32 },
}

#[derive(Debug, PartialEq)]
pub enum Dispatch {
    Respond(Message, Option<Effect>),
    Defer(Job),
}

type ActionHandler = fn(&mut ControllerState, u32, Action) -> Dispatch;

/// Action id → handler, built once at startup.
pub struct DispatchTable {
    handlers: HashMap<String, (Action, ActionHandler)>,
}

impl DispatchTable {
    pub fn new() -> Self {
        let handlers = Action::all()
            .map(|action| {
                let handler: ActionHandler = match action {
                    Action::Change(_) => on_change,
                    Action::ForceHighDefinition => on_force_high_definition,
                    Action::SaveCurrent => on_save,
                    Action::ClearCache => on_clear,
                };
                (action.id(), (action, handler))
            })
            .collect();
        Self { handlers }
    }

    fn lookup(&self, id: &str) -> Option<(Action, ActionHandler)> {
        self.handlers.get(id).copied()
    }
}

/// Dispatch a request message.
///
/// Server-originated variants get `unknown_type`.
pub fn handle_message(
    state: &mut ControllerState,
    table: &DispatchTable,
    request: Message,
    connection_id: ConnectionId,
) -> Dispatch {
    match request {
        Message::Hello { id, version } => {
            Dispatch::Respond(handle_hello(state, id, version, connection_id), None)
        }
        Message::Trigger { id, action } => match table.lookup(&action) {
            Some((action, handler)) => {
                tracing::debug!(action = %action.id(), ?connection_id, "trigger");
                handler(state, id, action)
            }
            None => Dispatch::Respond(error_response(id, "unknown_action"), None),
        },
        Message::Query { id } => Dispatch::Respond(
            Message::Response {
                id,
                status: Status::Ok,
                error: None,
                notice: None,
                path: None,
                snapshot: Some(state.snapshot()),
            },
            None,
        ),
        Message::Subscribe { id } => {
            let response = match state.subscribe(connection_id) {
                Ok(()) => ok_response(id),
                Err(reason) => error_response(id, reason),
            };
            Dispatch::Respond(response, None)
        }
        Message::HelloAck { id, .. } | Message::Response { id, .. } | Message::Event { id, .. } => {
            Dispatch::Respond(error_response(id, "unknown_type"), None)
        }
    }
}

fn handle_hello(
    state: &mut ControllerState,
    id: u32,
    version: u32,
    connection_id: ConnectionId,
) -> Message {
    let error = if id != 0 {
        Some("invalid_hello_id")
    } else if version != PROTOCOL_VERSION {
        Some("version_mismatch")
    } else {
        None
    };
    if error.is_none() {
        state.add_connection(connection_id);
    }
    Message::HelloAck {
        id: 0,
        status: if error.is_some() {
            Status::Error
        } else {
            Status::Ok
        },
        error: error.map(Into::into),
    }
}

// -- Action handlers --

fn on_change(state: &mut ControllerState, id: u32, action: Action) -> Dispatch {
    let Action::Change(category) = action else {
        return Dispatch::Respond(error_response(id, "unknown_action"), None);
    };
    match state.begin_change(category) {
        Ok(()) => Dispatch::Respond(ok_response(id), Some(Effect::StartChange(category))),
        Err(reason) => {
            tracing::debug!(%category, "change rejected, already loading");
            Dispatch::Respond(error_response(id, reason), None)
        }
    }
}

fn on_force_high_definition(state: &mut ControllerState, id: u32, _: Action) -> Dispatch {
    let Resolution { width, height } = state.force_high_definition();
    tracing::info!(%width, %height, "resolution forced");
    Dispatch::Respond(
        ok_response(id),
        Some(Effect::Post(UiEvent::notify(
            "Resolution Set",
            format!("Resolution changed to 4K ({width}x{height})"),
        ))),
    )
}

fn on_save(_: &mut ControllerState, id: u32, _: Action) -> Dispatch {
    Dispatch::Defer(Job::Save { id })
}

fn on_clear(_: &mut ControllerState, id: u32, _: Action) -> Dispatch {
    Dispatch::Defer(Job::Clear { id })
}

// -- Helpers --

pub(super) fn ok_response(id: u32) -> Message {
    Message::Response {
        id,
        status: Status::Ok,
        error: None,
        notice: None,
        path: None,
        snapshot: None,
    }
}

pub(super) fn error_response(id: u32, reason: &str) -> Message {
    Message::Response {
        id,
        status: Status::Error,
        error: Some(reason.into()),
        notice: None,
        path: None,
        snapshot: None,
    }
}
