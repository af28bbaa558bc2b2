/// Desktop notifications for alarms and completions
/// Currently only implements macOS notifications

#[cfg(target_os = "macos")]
use std::process::Command;

/// Alarm text shown for a task at `level` times its estimate
pub fn alarm_message(task_name: &str, level: u32) -> String {
    if level <= 1 {
        format!("⏰ '{}' reached its estimate", task_name)
    } else {
        format!("⏰ '{}' is at {}x its estimate", task_name, level)
    }
}

pub fn completion_message(task_name: &str, within_ambitious: bool) -> String {
    if within_ambitious {
        format!("🎯 Completed '{}' within ambitious time", task_name)
    } else {
        format!("✓ Completed '{}'", task_name)
    }
}

/// Send a notification when a task crosses an alarm threshold
pub fn notify_alarm(task_name: &str, level: u32) {
    send("etime - Over Estimate", &alarm_message(task_name, level));
}

/// Send a notification when a task is completed
pub fn notify_completed(task_name: &str, within_ambitious: bool) {
    send("etime - Task Completed", &completion_message(task_name, within_ambitious));
}

fn send(title: &str, body: &str) {
    #[cfg(target_os = "macos")]
    {
        let script = format!(
            r#"display notification "{}" with title "{}""#,
            applescript_escape(body),
            applescript_escape(title)
        );

        if let Err(e) = Command::new("osascript").arg("-e").arg(&script).output() {
            tracing::debug!("Notification failed: {}", e);
        }
    }

    #[cfg(not(target_os = "macos"))]
    {
        // No-op on other platforms
        let _ = (title, body);
    }
}

/// Quote-safe text for an AppleScript string literal; backslashes go first
#[cfg(any(target_os = "macos", test))]
fn applescript_escape(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}
