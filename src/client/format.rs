//! Output formatting for client commands.
//!
//! Status lines go to stdout. `watch` prints one line per event, with
//! multi-line alert messages folded onto that line.

use crate::ipc::protocol::{Snapshot, UiEvent};

use super::controller_client::TriggerReply;

/// Print controller state as aligned key/value lines.
pub fn print_snapshot(snapshot: &Snapshot) {
    let loading = snapshot
        .loading
        .map(|c| c.to_string())
        .unwrap_or_else(|| "-".into());
    println!("Loading:    {loading}");
    println!("Resolution: {}", snapshot.resolution);
    match &snapshot.current {
        Some(current) => {
            println!("Current:    {} ({})", current.path.display(), current.category);
        }
        None => println!("Current:    -"),
    }
}

/// Print the acknowledgement of a fired action.
pub fn print_trigger(action: &str, reply: &TriggerReply) {
    if let Some(notice) = &reply.notice {
        println!("{notice}");
    } else if let Some(path) = &reply.path {
        println!("{action}: {path}");
    } else {
        println!("{action}: ok");
    }
}

pub fn print_event(event: &UiEvent) {
    println!("{}", format_event(event));
}

fn format_event(event: &UiEvent) -> String {
    match event {
        UiEvent::Loading { label, .. } => format!("[loading] {label}"),
        UiEvent::Idle => "[idle]".to_string(),
        UiEvent::Alert { title, message } => format!("[alert] {title}: {}", fold(message)),
        UiEvent::Notify { title, message } => format!("[notify] {title}: {}", fold(message)),
    }
}

fn fold(message: &str) -> String {
    message.lines().collect::<Vec<_>>().join(" / ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wallpaper::Category;

    #[test]
    fn loading_line() {
        assert_eq!(
            format_event(&UiEvent::loading(Category::City)),
            "[loading] Loading City..."
        );
    }

    #[test]
    fn alert_folds_lines() {
        let event = UiEvent::alert(
            "No Internet",
            "You're not connected to the internet.\nPlease check your connection and try again.",
        );
        assert_eq!(
            format_event(&event),
            "[alert] No Internet: You're not connected to the internet. / Please check your connection and try again."
        );
    }

    #[test]
    fn idle_line() {
        assert_eq!(format_event(&UiEvent::Idle), "[idle]");
    }
}
