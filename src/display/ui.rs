use std::collections::HashMap;
use std::io::{Write, stdout};

use anyhow::Result;
use colorful::{Colorful, RGB};
use crossterm::{
    ExecutableCommand,
    style::{Color, ResetColor, SetForegroundColor},
};

use crate::models::{ConversationKind, ConversationSet, Message, PollStats};

struct Palette {
    primary: RGB,
    secondary: RGB,
    success: RGB,
    warning: RGB,
    info: RGB,
    subtle: RGB,
}

impl Palette {
    fn new() -> Self {
        Self {
            primary: RGB::new(79, 70, 229),    // Indigo
            secondary: RGB::new(236, 72, 153), // Pink
            success: RGB::new(16, 185, 129),   // Emerald
            warning: RGB::new(245, 158, 11),   // Amber
            info: RGB::new(59, 130, 246),      // Blue
            subtle: RGB::new(107, 114, 128),   // Gray
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RoomActivity {
    pub messages: usize,
    pub last_author: String,
}

/// Terminal feed of incoming messages plus a per-room tally.
#[derive(Debug, Default)]
pub struct Display {
    pub rooms: HashMap<String, RoomActivity>,
    labels: HashMap<String, String>,
    pub total_messages: usize,
    pub total_saved: usize,
}

impl Display {
    pub fn new() -> Self {
        Self::default()
    }

    /// Labels used instead of raw room ids: `@dm` for direct rooms,
    /// `#name` for the rest.
    pub fn set_labels(&mut self, conversations: &ConversationSet, names: &HashMap<String, String>) {
        for conversation in conversations.in_poll_order() {
            let label = match (conversation.kind, names.get(&conversation.id)) {
                (ConversationKind::DirectMessage, _) => format!("@{}", conversation.id),
                (_, Some(name)) => format!("#{name}"),
                (_, None) => format!("#{}", conversation.id),
            };
            self.labels.insert(conversation.id.clone(), label);
        }
    }

    pub fn label_for(&self, room_id: &str) -> String {
        self.labels
            .get(room_id)
            .cloned()
            .unwrap_or_else(|| format!("#{room_id}"))
    }

    pub fn record(&mut self, message: &Message) {
        let activity = self.rooms.entry(message.room_id.clone()).or_default();
        activity.messages += 1;
        activity.last_author = message.author.display_name().to_string();
        self.total_messages += 1;
    }

    /// Uncoloured one-line rendering.
    pub fn format_line(&self, message: &Message) -> String {
        format!(
            "[{}] {} {}: {}",
            message.sent_at.format("%H:%M:%S"),
            self.label_for(&message.room_id),
            message.author.display_name(),
            message.text.replace('\n', " ")
        )
    }

    pub fn print_message(&mut self, message: &Message) -> Result<()> {
        self.record(message);
        let p = Palette::new();
        let mut stdout = stdout();
        writeln!(
            stdout,
            "  {} {} {} {}",
            message.sent_at.format("%H:%M:%S").to_string().color(p.subtle),
            self.label_for(&message.room_id).color(p.info),
            format!("{}:", message.author.display_name()).color(p.primary),
            message.text.replace('\n', " ")
        )?;
        stdout.flush()?;
        Ok(())
    }

    pub fn show_shutdown_message(&self) -> Result<()> {
        let mut stdout = stdout();
        let msg = "⚠️  Shutting down gracefully..."
            .color(RGB::new(231, 76, 60))
            .to_string();
        writeln!(stdout, "\n  {}\n", msg)?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_summary(&self, stats: &PollStats) -> Result<()> {
        let p = Palette::new();
        let mut stdout = stdout();
        stdout.execute(SetForegroundColor(Color::Cyan))?;
        writeln!(stdout, "\n  📊 Stream Statistics:")?;
        stdout.execute(ResetColor)?;

        let elapsed = stats.elapsed();
        writeln!(
            stdout,
            "     ├─ ⏱️  Time: {}m {}s",
            (elapsed.as_secs() / 60).to_string().color(p.subtle),
            (elapsed.as_secs() % 60).to_string().color(p.subtle)
        )?;
        writeln!(
            stdout,
            "     ├─ 🔄 Cycles: {} ({} degraded)",
            stats.cycles.to_string().color(p.info),
            stats.degraded_cycles.to_string().color(p.warning)
        )?;
        writeln!(
            stdout,
            "     ├─ 📨 Messages: {}",
            stats.total_emitted.to_string().color(p.success)
        )?;
        writeln!(
            stdout,
            "     ├─ 🔁 Skipped: {} own, {} repeats",
            stats.total_skipped_self.to_string().color(p.subtle),
            stats.total_skipped_duplicate.to_string().color(p.subtle)
        )?;
        writeln!(
            stdout,
            "     ├─ 💾 Saved: {}",
            self.total_saved.to_string().color(p.secondary)
        )?;
        writeln!(
            stdout,
            "     └─ ⚠️  Failed fetches: {}",
            stats.total_failed_fetches.to_string().color(p.warning)
        )?;

        if !self.rooms.is_empty() {
            writeln!(stdout, "\n  📋 Per-room breakdown:")?;
            let mut rooms: Vec<_> = self.rooms.iter().collect();
            rooms.sort_by(|a, b| b.1.messages.cmp(&a.1.messages).then(a.0.cmp(b.0)));
            for (room_id, activity) in rooms {
                writeln!(
                    stdout,
                    "     ├─ {} ({} msgs, last from {})",
                    self.label_for(room_id).color(p.info),
                    activity.messages.to_string().color(p.success),
                    activity.last_author.clone().color(p.primary)
                )?;
            }
        }
        stdout.flush()?;
        Ok(())
    }
}
