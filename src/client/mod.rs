//! CLI client: the trigger surface.
//!
//! One-shot commands connect to the daemon, fire one action or query,
//! print the result and exit. `watch` stays connected and prints UI events
//! until the daemon goes away.

mod controller_client;
mod format;

use crate::cli::ClientAction;
use crate::controller::Action;
use crate::ipc::protocol::UiEvent;
use controller_client::ControllerClient;

/// Client error type.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("$XDG_RUNTIME_DIR is not set")]
    NoRuntimeDir,
    #[error("controller: {0}")]
    Controller(String),
    #[error("{what} rejected: {reason}")]
    Rejected { what: String, reason: String },
    /// A waited-for change ended with an alert.
    #[error("{title}: {message}")]
    Failed { title: String, message: String },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Run the client command. Called from `main.rs` for `Command::Client`.
pub async fn run(action: ClientAction) -> Result<(), ClientError> {
    let mut controller = ControllerClient::connect().await?;

    match action {
        ClientAction::Change { category, wait } => {
            let id = Action::Change(category).id();
            if wait {
                controller.subscribe().await?;
            }
            let reply = controller.trigger(&id).await?;
            format::print_trigger(&id, &reply);
            if wait {
                wait_for_idle(&mut controller).await?;
                format::print_snapshot(&controller.status().await?);
            }
        }
        ClientAction::ForceHd => fire(&mut controller, Action::ForceHighDefinition).await?,
        ClientAction::Save => fire(&mut controller, Action::SaveCurrent).await?,
        ClientAction::ClearCache => fire(&mut controller, Action::ClearCache).await?,
        ClientAction::Status => format::print_snapshot(&controller.status().await?),
        ClientAction::Watch => {
            controller.subscribe().await?;
            while let Some(event) = controller.next_event().await? {
                format::print_event(&event);
            }
        }
    }

    Ok(())
}

async fn fire(controller: &mut ControllerClient, action: Action) -> Result<(), ClientError> {
    let id = action.id();
    let reply = controller.trigger(&id).await?;
    format::print_trigger(&id, &reply);
    Ok(())
}

/// Print events until the change finishes. An alert seen while the change
/// was loading turns into the returned error.
async fn wait_for_idle(controller: &mut ControllerClient) -> Result<(), ClientError> {
    let mut change = ChangeWatch::default();
    loop {
        let Some(event) = controller.next_event().await? else {
            return Err(ClientError::Controller(
                "connection closed before the change finished".into(),
            ));
        };
        if change.observe(&event) {
            break;
        }
        if !change.captured(&event) {
            format::print_event(&event);
        }
    }
    change.failure.map_or(Ok(()), Err)
}

/// Follows one change through the event stream.
///
/// Only events between its `loading` and the next `idle` belong to it;
/// earlier alerts come from other clients' saves or clears.
#[derive(Debug, Default)]
struct ChangeWatch {
    started: bool,
    failure: Option<ClientError>,
}

impl ChangeWatch {
    /// Feed one event. Returns `true` once the change has finished.
    fn observe(&mut self, event: &UiEvent) -> bool {
        match event {
            UiEvent::Loading { .. } => self.started = true,
            UiEvent::Idle => return self.started,
            UiEvent::Alert { title, message } if self.started => {
                self.failure = Some(ClientError::Failed {
                    title: title.clone(),
                    message: message.clone(),
                });
            }
            _ => {}
        }
        false
    }

    /// Whether `event` was taken as the change's failure.
    fn captured(&self, event: &UiEvent) -> bool {
        self.started && matches!(event, UiEvent::Alert { .. })
    }
}
